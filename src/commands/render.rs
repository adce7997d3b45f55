use std::fmt::Write;

use tokio::sync::mpsc;

use crate::audit::types::{
    Analysis, AuditRequest, AuditResult, ClaimAnalysis, ConceptAnalysis, ForecastAnalysis,
    ThoughtEntry,
};
use crate::session::SessionUpdate;
use crate::state::Context;

/// Longest message body sent in one go; Discord caps content at 2000.
const MESSAGE_LIMIT: usize = 1990;
/// Input echoed in the progress header is cut to this many characters.
const HEADER_INPUT_CHARS: usize = 200;

/// The live progress message of one audit: revealed thoughts plus the
/// latest status line.
pub struct ProgressLog {
    header: String,
    thoughts: Vec<ThoughtEntry>,
    status: Option<String>,
}

impl ProgressLog {
    pub fn new(request: &AuditRequest) -> Self {
        Self {
            header: format!(
                "**Auditing {}:** {}",
                request.mode,
                clip(&request.input, HEADER_INPUT_CHARS)
            ),
            thoughts: Vec::new(),
            status: None,
        }
    }

    pub fn apply(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::Status(status) => self.status = Some(status),
            SessionUpdate::Thought(entry) => self.thoughts.push(entry),
        }
    }

    /// Apply every update already queued. Returns whether any arrived.
    pub fn absorb(&mut self, updates: &mut mpsc::UnboundedReceiver<SessionUpdate>) -> bool {
        let mut changed = false;
        while let Ok(update) = updates.try_recv() {
            self.apply(update);
            changed = true;
        }
        changed
    }

    pub fn render(&self) -> String {
        let mut out = self.header.clone();
        if !self.thoughts.is_empty() {
            out.push_str("\n\n**Reasoning:**");
            for t in &self.thoughts {
                let _ = write!(out, "\n`[{}]` {}", t.timestamp_label, t.text);
            }
        }
        if let Some(status) = &self.status {
            let _ = write!(out, "\n\n_{}_", status);
        }
        clip(&out, MESSAGE_LIMIT)
    }
}

/// Cut `text` to at most `max` characters, marking the cut with "...".
fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max.saturating_sub(3)).collect();
    clipped.push_str("...");
    clipped
}

pub fn render_result(result: &AuditResult) -> String {
    let mut out = match &result.analysis {
        Analysis::Claim(a) => render_claim(a),
        Analysis::Forecast(a) => render_forecast(a),
        Analysis::Definition(a) => render_concept(a),
    };

    let related = result.related_concepts();
    if !related.is_empty() {
        let _ = write!(out, "\n**Related concepts:** {}\n", related.join(", "));
    }

    if !result.sources.is_empty() {
        out.push_str("\n**Sources:**\n");
        for (i, source) in result.sources.iter().enumerate() {
            let _ = writeln!(out, "{}. [{}](<{}>)", i + 1, source.title, source.url);
        }
    }

    let _ = write!(
        out,
        "\n-# Audited {}",
        result.audited_at.format("%Y-%m-%d %H:%M UTC")
    );
    out
}

fn render_claim(a: &ClaimAnalysis) -> String {
    let mut out = format!(
        "**Claim:** {}\n**Overall:** {}\n\n{}\n",
        a.claim, a.overall_score, a.summary
    );

    for (i, sub) in a.sub_claims.iter().enumerate() {
        let _ = write!(
            out,
            "\n**{}. {}** ({} confidence)\n",
            i + 1,
            sub.title,
            sub.confidence
        );
        push_list(&mut out, "For", &sub.evidence_for);
        push_list(&mut out, "Against", &sub.evidence_against);
    }
    out
}

fn render_forecast(a: &ForecastAnalysis) -> String {
    let mut out = format!(
        "**Forecast:** {}\n**Stated:** {} | **Adjusted:** {} | **Overall:** {}\n\n{}\n",
        a.forecast, a.stated_probability, a.adjusted_probability, a.overall_score, a.summary
    );

    if !a.base_rate_analysis.is_empty() {
        let _ = write!(out, "\n**Base rates:** {}\n", a.base_rate_analysis);
    }
    if !a.reference_classes.is_empty() {
        out.push_str("\n**Reference classes:**\n");
        for rc in &a.reference_classes {
            let _ = writeln!(out, "- **{}** ({}): {}", rc.name, rc.base_rate, rc.relevance);
        }
    }
    if !a.calibration_assessment.is_empty() {
        let _ = write!(out, "\n**Calibration:** {}\n", a.calibration_assessment);
    }
    out
}

fn render_concept(a: &ConceptAnalysis) -> String {
    let mut out = format!("**{}**\n{}\n", a.concept, a.definition);

    if !a.key_debates.is_empty() {
        out.push_str("\n**Key debates:**\n");
        for d in &a.key_debates {
            let _ = writeln!(out, "- **{}**: {}", d.title, d.description);
        }
    }
    if !a.common_misconceptions.is_empty() {
        out.push_str("\n**Common misconceptions:**\n");
        for m in &a.common_misconceptions {
            let _ = writeln!(out, "- _{}_ → {}", m.misconception, m.reality);
        }
    }
    out
}

fn push_list(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}:", label);
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

/// Split text into Discord-safe chunks (max 1990 bytes), preferring line
/// then word boundaries.
pub fn split_chunks(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let mut chunk_len = remaining.len().min(MESSAGE_LIMIT);
        while !remaining.is_char_boundary(chunk_len) {
            chunk_len -= 1;
        }
        let split_at = if chunk_len < remaining.len() {
            remaining[..chunk_len]
                .rfind('\n')
                .or_else(|| remaining[..chunk_len].rfind(' '))
                .map(|i| i + 1)
                .unwrap_or(chunk_len)
        } else {
            chunk_len
        };
        chunks.push(&remaining[..split_at]);
        remaining = &remaining[split_at..];
    }
    chunks
}

/// Uses ctx.say() for all chunks; poise routes follow-ups through the
/// interaction webhook, which needs no Send Messages permission.
pub async fn send_chunked(ctx: &Context<'_>, text: &str) -> Result<(), anyhow::Error> {
    for chunk in split_chunks(text) {
        ctx.say(chunk).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::types::{AuditMode, Confidence, OverallScore, ResolvedSource, SubClaim};

    fn claim_result() -> AuditResult {
        AuditResult {
            analysis: Analysis::Claim(ClaimAnalysis {
                claim: "X will happen by 2030".to_string(),
                sub_claims: vec![SubClaim {
                    title: "X is feasible".to_string(),
                    evidence_for: vec!["Pilots worked".to_string()],
                    evidence_against: vec![],
                    confidence: Confidence::Low,
                }],
                overall_score: OverallScore::Weak,
                summary: "Unlikely.".to_string(),
                related_concepts: vec!["Planning Fallacy".to_string()],
                source_urls: vec!["https://a.example/1".to_string()],
            }),
            sources: vec![ResolvedSource {
                url: "https://a.example/1".to_string(),
                title: "a.example".to_string(),
            }],
            audited_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_progress_log_render() {
        let mut log = ProgressLog::new(&AuditRequest::new("Rates will fall", AuditMode::Claim));
        log.apply(SessionUpdate::Status("Researching with web search...".to_string()));
        log.apply(SessionUpdate::Thought(ThoughtEntry {
            text: "Checking central bank guidance.".to_string(),
            timestamp_label: "0:02",
        }));

        let rendered = log.render();
        assert!(rendered.starts_with("**Auditing claim:** Rates will fall"));
        assert!(rendered.contains("`[0:02]` Checking central bank guidance."));
        assert!(rendered.ends_with("_Researching with web search..._"));
    }

    #[test]
    fn test_progress_log_clips_long_input() {
        let input = "ü".repeat(6000);
        let mut log = ProgressLog::new(&AuditRequest::new(input, AuditMode::Claim));
        log.apply(SessionUpdate::Status("Complete.".to_string()));

        let rendered = log.render();
        assert!(rendered.chars().count() <= MESSAGE_LIMIT);
        assert!(rendered.contains(&format!("{}...", "ü".repeat(HEADER_INPUT_CHARS - 3))));
        assert!(rendered.ends_with("_Complete._"));
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_render_claim_result() {
        let rendered = render_result(&claim_result());
        assert!(rendered.contains("**Overall:** Weak"));
        assert!(rendered.contains("**1. X is feasible** (Low confidence)"));
        assert!(rendered.contains("For:\n- Pilots worked"));
        assert!(!rendered.contains("Against:"));
        assert!(rendered.contains("**Related concepts:** Planning Fallacy"));
        assert!(rendered.contains("1. [a.example](<https://a.example/1>)"));
    }

    #[test]
    fn test_split_chunks_prefers_line_breaks() {
        let line = format!("{}\n", "word ".repeat(100));
        let text = line.repeat(10);
        let chunks = split_chunks(&text);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 1990));
        assert!(chunks[0].ends_with('\n'));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_chunks_multibyte() {
        let text = "é".repeat(1500);
        let chunks = split_chunks(&text);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.len() <= 1990));
    }
}
