use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Provider and pipeline settings, passed explicitly into the pipeline.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Absent or empty means every audit fails with `MissingCredential`.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry_delay: Duration::from_millis(3000),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl AuditConfig {
    /// Read settings from the environment (after `.env` has been loaded).
    /// Never fails: a missing key is only reported when an audit runs.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_key = dotenv::var("GEMINI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let model = dotenv::var("GEMINI_MODEL").unwrap_or(defaults.model);
        let base_url = dotenv::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url);
        let retry_delay = dotenv::var("AUDIT_RETRY_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_delay);
        let request_timeout = dotenv::var("AUDIT_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Self {
            api_key,
            model,
            base_url,
            retry_delay,
            request_timeout,
        }
    }
}
