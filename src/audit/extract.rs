use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{Analysis, AuditMode, ClaimAnalysis, ConceptAnalysis, ForecastAnalysis};
use crate::error::AuditError;

/// Locate a JSON object in a model response.
///
/// Tried in order: the whole response, the inside of the first fenced code
/// block, then the span from the first `{` to the last `}`.
pub fn parse_json_object(raw: &str) -> Result<Value, AuditError> {
    let strategies: [(&str, fn(&str) -> Option<&str>); 3] = [
        ("direct", whole_response),
        ("fenced", extract_fenced_block),
        ("braces", extract_brace_span),
    ];

    for (name, strategy) in strategies {
        let Some(candidate) = strategy(raw) else {
            continue;
        };
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(candidate) {
            debug!(strategy = name, "Extraction JSON parsed");
            return Ok(value);
        }
    }

    Err(AuditError::malformed(raw))
}

fn whole_response(input: &str) -> Option<&str> {
    Some(input.trim())
}

/// Contents of the first ``` fence, with any language tag on the opening
/// line skipped.
fn extract_fenced_block(input: &str) -> Option<&str> {
    let start = input.find("```")?;
    let after_fence = &input[start + 3..];

    // Skip the rest of the opening fence line (e.g. "json")
    let body_start = after_fence.find('\n').map(|i| i + 1)?;
    let body = &after_fence[body_start..];

    let end = body.find("```").unwrap_or(body.len());
    let inner = body[..end].trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}

fn extract_brace_span(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    if end > start {
        Some(&input[start..=end])
    } else {
        None
    }
}

/// Parse a raw extraction response into the analysis for `mode`.
///
/// Only the structure is checked: required top-level keys must be present.
/// Graded fields outside their closed sets are kept and logged.
pub fn parse_analysis(mode: AuditMode, raw: &str) -> Result<Analysis, AuditError> {
    let value = parse_json_object(raw)?;

    let missing: Vec<&str> = required_keys(mode)
        .iter()
        .copied()
        .filter(|key| value.get(key).is_none())
        .collect();
    if !missing.is_empty() {
        warn!(%mode, ?missing, "Extraction JSON missing expected keys");
        return Err(AuditError::malformed(raw));
    }

    let analysis = match mode {
        AuditMode::Claim => Analysis::Claim(typed::<ClaimAnalysis>(value, raw)?),
        AuditMode::Forecast => Analysis::Forecast(typed::<ForecastAnalysis>(value, raw)?),
        AuditMode::Definition => Analysis::Definition(typed::<ConceptAnalysis>(value, raw)?),
    };

    warn_unrecognized(&analysis);
    Ok(analysis)
}

fn required_keys(mode: AuditMode) -> &'static [&'static str] {
    match mode {
        AuditMode::Claim => &["claim", "sub_claims", "overall_score", "summary"],
        AuditMode::Forecast => &[
            "forecast",
            "stated_probability",
            "adjusted_probability",
            "overall_score",
            "summary",
        ],
        AuditMode::Definition => &["concept", "definition"],
    }
}

fn typed<T: DeserializeOwned>(value: Value, raw: &str) -> Result<T, AuditError> {
    serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, "Extraction JSON has unusable field shapes");
        AuditError::malformed(raw)
    })
}

fn warn_unrecognized(analysis: &Analysis) {
    match analysis {
        Analysis::Claim(a) => {
            if !a.overall_score.is_recognized() {
                warn!(value = %a.overall_score, "Unrecognized overall_score");
            }
            for sub in a.sub_claims.iter().filter(|s| !s.confidence.is_recognized()) {
                warn!(value = %sub.confidence, sub_claim = %sub.title, "Unrecognized confidence");
            }
        }
        Analysis::Forecast(a) if !a.overall_score.is_recognized() => {
            warn!(value = %a.overall_score, "Unrecognized overall_score");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::types::{Confidence, OverallScore};

    const CLAIM_JSON: &str = r#"{
        "claim": "Coffee improves focus",
        "sub_claims": [{
            "title": "Caffeine raises alertness",
            "evidence_for": ["Meta-analysis (2010)"],
            "evidence_against": [],
            "confidence": "High"
        }],
        "overall_score": "Moderate",
        "summary": "Mostly supported for short-term alertness.",
        "related_concepts": ["Tolerance"],
        "source_urls": ["https://example.org/caffeine"]
    }"#;

    #[test]
    fn test_direct_parse() {
        let value = parse_json_object(CLAIM_JSON).unwrap();
        assert_eq!(value["claim"], "Coffee improves focus");
    }

    #[test]
    fn test_fenced_block_parse() {
        let raw = format!("Here is the analysis:\n```json\n{}\n```\nLet me know!", CLAIM_JSON);
        let value = parse_json_object(&raw).unwrap();
        assert_eq!(value["overall_score"], "Moderate");
    }

    #[test]
    fn test_surrounding_prose_parse() {
        let raw = format!("Sure! {} Hope this helps.", CLAIM_JSON);
        let value = parse_json_object(&raw).unwrap();
        assert_eq!(value["summary"], "Mostly supported for short-term alertness.");
    }

    #[test]
    fn test_no_json_is_malformed() {
        let err = parse_json_object("I could not produce an analysis.").unwrap_err();
        match err {
            AuditError::MalformedExtraction { preview } => {
                assert_eq!(preview, "I could not produce an analysis.")
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(parse_json_object("} backwards {").is_err());
        assert!(parse_json_object("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_parse_claim_analysis() {
        let analysis = parse_analysis(AuditMode::Claim, CLAIM_JSON).unwrap();
        let Analysis::Claim(claim) = analysis else {
            panic!("expected claim analysis");
        };
        assert_eq!(claim.overall_score, OverallScore::Moderate);
        assert_eq!(claim.sub_claims[0].confidence, Confidence::High);
        assert_eq!(claim.related_concepts, vec!["Tolerance"]);
    }

    #[test]
    fn test_parse_forecast_analysis() {
        let raw = r#"{
            "forecast": "60% chance of recession by 2026",
            "stated_probability": "60%",
            "adjusted_probability": "35%",
            "base_rate_analysis": "Recessions occur roughly every 6-7 years.",
            "reference_classes": [{"name": "Post-war US recessions", "base_rate": "15%/yr", "relevance": "Same economy"}],
            "calibration_assessment": "Overconfident.",
            "overall_score": "Weak",
            "summary": "The stated figure is high."
        }"#;
        let Analysis::Forecast(forecast) = parse_analysis(AuditMode::Forecast, raw).unwrap() else {
            panic!("expected forecast analysis");
        };
        assert_eq!(forecast.adjusted_probability, "35%");
        assert_eq!(forecast.reference_classes.len(), 1);
        assert!(forecast.source_urls.is_empty());
    }

    #[test]
    fn test_parse_concept_analysis() {
        let raw = r#"```json
{
  "concept": "Moral Hazard",
  "definition": "Risk-taking when costs are borne by others.",
  "key_debates": [{"title": "Insurance", "description": "Does cover increase risk?"}],
  "common_misconceptions": [{"misconception": "Only in finance", "reality": "Everywhere"}],
  "related_concepts": ["Adverse Selection"],
  "source_urls": []
}
```"#;
        let Analysis::Definition(concept) = parse_analysis(AuditMode::Definition, raw).unwrap()
        else {
            panic!("expected concept analysis");
        };
        assert_eq!(concept.concept, "Moral Hazard");
        assert_eq!(concept.common_misconceptions[0].reality, "Everywhere");
    }

    #[test]
    fn test_wrong_schema_is_malformed() {
        let err = parse_analysis(AuditMode::Forecast, CLAIM_JSON).unwrap_err();
        assert!(matches!(err, AuditError::MalformedExtraction { .. }));
    }

    #[test]
    fn test_numeric_probabilities_are_kept_as_text() {
        let raw = r#"{
            "forecast": "70% chance of X by 2030",
            "stated_probability": 0.7,
            "adjusted_probability": 0.55,
            "base_rate_analysis": "Rare.",
            "reference_classes": [{"name": "Similar bets", "base_rate": 0.3, "relevance": "High"}],
            "calibration_assessment": null,
            "overall_score": "Moderate",
            "summary": "Somewhat high."
        }"#;
        let Analysis::Forecast(forecast) = parse_analysis(AuditMode::Forecast, raw).unwrap() else {
            panic!("expected forecast analysis");
        };
        assert_eq!(forecast.stated_probability, "0.7");
        assert_eq!(forecast.adjusted_probability, "0.55");
        assert_eq!(forecast.reference_classes[0].base_rate, "0.3");
        assert_eq!(forecast.calibration_assessment, "");
    }

    #[test]
    fn test_null_lists_become_empty() {
        let raw = r#"{
            "claim": "X will happen by 2030",
            "sub_claims": [{"title": "Trend", "evidence_for": null, "confidence": "Low"}],
            "overall_score": "Weak",
            "summary": "Thin evidence.",
            "related_concepts": null,
            "source_urls": null
        }"#;
        let Analysis::Claim(claim) = parse_analysis(AuditMode::Claim, raw).unwrap() else {
            panic!("expected claim analysis");
        };
        assert!(claim.related_concepts.is_empty());
        assert!(claim.source_urls.is_empty());
        assert!(claim.sub_claims[0].evidence_for.is_empty());
        assert!(claim.sub_claims[0].evidence_against.is_empty());
    }

    #[test]
    fn test_missing_required_key_is_malformed() {
        let raw = r#"{"claim": "x", "overall_score": "Weak", "summary": "s"}"#;
        let err = parse_analysis(AuditMode::Claim, raw).unwrap_err();
        assert!(matches!(err, AuditError::MalformedExtraction { .. }));

        // Present but null still counts as present
        let raw = r#"{"concept": "Entropy", "definition": null}"#;
        assert!(parse_analysis(AuditMode::Definition, raw).is_ok());
    }

    #[test]
    fn test_unrecognized_grade_passes_through() {
        let raw = CLAIM_JSON.replace("\"Moderate\"", "\"Somewhat\"");
        let Analysis::Claim(claim) = parse_analysis(AuditMode::Claim, &raw).unwrap() else {
            panic!("expected claim analysis");
        };
        assert_eq!(claim.overall_score, OverallScore::Unrecognized("Somewhat".to_string()));
    }
}
