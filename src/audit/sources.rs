use std::collections::HashSet;

use url::Url;

use super::types::{GroundingSource, ResolvedSource};

const REDIRECT_HOST: &str = "vertexaisearch.cloud.google.com";
const REDIRECT_PREFIX: &str = "/grounding-api-redirect/";

/// Unwrap a grounding redirect URL into its destination.
///
/// Only `https://<redirect host>/grounding-api-redirect/<percent-encoded>` is
/// unwrapped, and only when the decoded target starts with `http`. Anything
/// else, including unparseable input, is returned unchanged.
pub fn unwrap_redirect(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return raw.to_string();
    };
    if parsed.host_str() != Some(REDIRECT_HOST) {
        return raw.to_string();
    }
    let Some(encoded) = parsed.path().strip_prefix(REDIRECT_PREFIX) else {
        return raw.to_string();
    };

    match urlencoding::decode(encoded) {
        Ok(decoded) if decoded.starts_with("http") => decoded.into_owned(),
        _ => raw.to_string(),
    }
}

/// Host name without a leading `www.`, if the URL has one.
fn host_label(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Merge grounding citations and model-declared URLs into one ordered,
/// duplicate-free list.
///
/// - `grounding`: citations harvested from the research stream, in arrival order
/// - `declared`: `source_urls` the model wrote into its structured answer
///
/// Grounding entries are resolved first, so their order (and title) wins
/// when both lists name the same destination.
pub fn resolve_sources(grounding: &[GroundingSource], declared: &[String]) -> Vec<ResolvedSource> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    let candidates = grounding
        .iter()
        .map(|s| (s.url.as_str(), s.title.as_deref()))
        .chain(declared.iter().map(|u| (u.as_str(), None)));

    for (raw, title) in candidates {
        let url = unwrap_redirect(raw.trim());
        if url.is_empty() || !seen.insert(url.clone()) {
            continue;
        }

        let position = resolved.len() + 1;
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| host_label(&url))
            .unwrap_or_else(|| format!("Source {}", position));

        resolved.push(ResolvedSource { url, title });
    }

    resolved
}
