use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::AuditError;

/// One delayed retry on rate limiting, nothing else.
///
/// Calls are user-interactive, so there is no exponential backoff: a
/// rate-limited first attempt waits `delay` and runs once more, and that
/// second outcome is final.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn run<T, F, Fut>(
        &self,
        mut operation: F,
        on_retry: impl FnOnce(&str),
    ) -> Result<T, AuditError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AuditError>>,
    {
        match operation().await {
            Err(err) if err.is_rate_limited() => {
                let secs = self.delay.as_secs_f64();
                warn!(error = %err, delay_ms = self.delay.as_millis() as u64, "Rate limited, retrying once");
                on_retry(&format!("Rate limited, retrying in {}s...", secs));
                tokio::time::sleep(self.delay).await;
                operation().await
            }
            other => other,
        }
    }
}
