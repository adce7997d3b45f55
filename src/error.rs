use thiserror::Error;

/// Marker the provider puts in quota errors, both in HTTP bodies and in
/// errors embedded in a stream.
pub const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// The only failure text an end user ever sees.
pub const USER_FACING_ERROR: &str =
    "The audit service is temporarily unavailable. Please try again.";

/// Characters of raw model output kept for extraction diagnostics.
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("missing GEMINI_API_KEY: set it in the environment or a .env file")]
    MissingCredential,

    #[error("no response received from research step")]
    NoResearchData,

    #[error("failed to parse structured response. Raw: {preview}")]
    MalformedExtraction { preview: String },

    #[error("rate limited by provider: {message}")]
    RateLimited { message: String },

    #[error("provider error{}: {message}", .status.map(|s| format!(" {}", s)).unwrap_or_default())]
    Upstream { status: Option<u16>, message: String },
}

impl AuditError {
    pub fn malformed(raw: &str) -> Self {
        AuditError::MalformedExtraction {
            preview: raw.chars().take(PREVIEW_CHARS).collect(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        AuditError::Upstream {
            status: None,
            message: message.into(),
        }
    }

    /// Classify a provider failure from its HTTP status and error body.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 429 || message.contains(RESOURCE_EXHAUSTED) {
            AuditError::RateLimited { message }
        } else {
            AuditError::Upstream {
                status: Some(status),
                message,
            }
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        match self {
            AuditError::RateLimited { .. } => true,
            AuditError::Upstream { status, message } => {
                *status == Some(429) || message.contains(RESOURCE_EXHAUSTED)
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AuditError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => AuditError::from_status(status.as_u16(), err.to_string()),
            None => AuditError::upstream(err.to_string()),
        }
    }
}
