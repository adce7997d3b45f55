use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lenient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditMode {
    Claim,
    Forecast,
    Definition,
}

impl fmt::Display for AuditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuditMode::Claim => "claim",
            AuditMode::Forecast => "forecast",
            AuditMode::Definition => "definition",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRequest {
    pub input: String,
    pub mode: AuditMode,
}

impl AuditRequest {
    pub fn new(input: impl Into<String>, mode: AuditMode) -> Self {
        Self {
            input: input.into(),
            mode,
        }
    }
}

/// A citation as returned by the provider: possibly duplicated, possibly a
/// redirect wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub url: String,
    pub title: Option<String>,
}

/// A citation reduced to its destination URL plus a display title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSource {
    pub url: String,
    pub title: String,
}

/// One revealed line of the reasoning log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThoughtEntry {
    pub text: String,
    pub timestamp_label: &'static str,
}

/// Declares a closed string enum that keeps unknown values instead of
/// rejecting them.
macro_rules! graded_enum {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Unrecognized(String),
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                let trimmed = value.trim();
                $(
                    if trimmed.eq_ignore_ascii_case(stringify!($variant)) {
                        return $name::$variant;
                    }
                )+
                $name::Unrecognized(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $($name::$variant => f.write_str(stringify!($variant)),)+
                    $name::Unrecognized(v) => f.write_str(v),
                }
            }
        }

        /// An absent grade.
        impl Default for $name {
            fn default() -> Self {
                $name::Unrecognized(String::new())
            }
        }

        impl $name {
            pub fn is_recognized(&self) -> bool {
                !matches!(self, $name::Unrecognized(_))
            }
        }
    };
}

graded_enum!(OverallScore {
    Strong,
    Moderate,
    Weak,
    Unsupported
});

graded_enum!(Confidence { High, Moderate, Low });

// Extraction output is checked for its required top-level keys before it
// gets here, so every field tolerates absent, null or oddly typed values.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubClaim {
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub evidence_for: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub evidence_against: Vec<String>,
    #[serde(default, deserialize_with = "lenient::grade")]
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimAnalysis {
    #[serde(default, deserialize_with = "lenient::text")]
    pub claim: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub sub_claims: Vec<SubClaim>,
    #[serde(default, deserialize_with = "lenient::grade")]
    pub overall_score: OverallScore,
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub related_concepts: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub source_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceClass {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub base_rate: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub relevance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastAnalysis {
    #[serde(default, deserialize_with = "lenient::text")]
    pub forecast: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub stated_probability: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub adjusted_probability: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub base_rate_analysis: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub reference_classes: Vec<ReferenceClass>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub calibration_assessment: String,
    #[serde(default, deserialize_with = "lenient::grade")]
    pub overall_score: OverallScore,
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub related_concepts: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub source_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDebate {
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Misconception {
    #[serde(default, deserialize_with = "lenient::text")]
    pub misconception: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptAnalysis {
    #[serde(default, deserialize_with = "lenient::text")]
    pub concept: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub definition: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub key_debates: Vec<KeyDebate>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub common_misconceptions: Vec<Misconception>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub related_concepts: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub source_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Analysis {
    Claim(ClaimAnalysis),
    Forecast(ForecastAnalysis),
    Definition(ConceptAnalysis),
}

impl Analysis {
    pub fn mode(&self) -> AuditMode {
        match self {
            Analysis::Claim(_) => AuditMode::Claim,
            Analysis::Forecast(_) => AuditMode::Forecast,
            Analysis::Definition(_) => AuditMode::Definition,
        }
    }

    pub fn related_concepts(&self) -> &[String] {
        match self {
            Analysis::Claim(a) => &a.related_concepts,
            Analysis::Forecast(a) => &a.related_concepts,
            Analysis::Definition(a) => &a.related_concepts,
        }
    }

    pub fn source_urls(&self) -> &[String] {
        match self {
            Analysis::Claim(a) => &a.source_urls,
            Analysis::Forecast(a) => &a.source_urls,
            Analysis::Definition(a) => &a.source_urls,
        }
    }

    pub(crate) fn set_source_urls(&mut self, urls: Vec<String>) {
        match self {
            Analysis::Claim(a) => a.source_urls = urls,
            Analysis::Forecast(a) => a.source_urls = urls,
            Analysis::Definition(a) => a.source_urls = urls,
        }
    }
}

/// The finished, immutable output of one audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditResult {
    pub analysis: Analysis,
    pub sources: Vec<ResolvedSource>,
    pub audited_at: DateTime<Utc>,
}

impl AuditResult {
    pub fn mode(&self) -> AuditMode {
        self.analysis.mode()
    }

    pub fn related_concepts(&self) -> &[String] {
        self.analysis.related_concepts()
    }
}
