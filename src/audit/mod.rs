pub mod extract;
mod lenient;
pub mod prompts;
pub mod research;
pub mod retry;
pub mod sources;
pub mod types;

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::llm::{ClientHandle, GenerateRequest, LlmProvider};

use retry::RetryPolicy;
use types::{AuditMode, AuditRequest, AuditResult};

/// Receives progress from a running audit.
pub trait AuditObserver: Send + Sync {
    fn on_status(&self, status: &str);

    /// Called once per reasoning fragment, in arrival order.
    fn on_thought(&self, fragment: &str);
}

/// Follow-up analyses that can be run on a single claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeeperLens {
    Steelman,
    Crux,
    Historical,
}

impl DeeperLens {
    fn prompt(self) -> &'static str {
        match self {
            DeeperLens::Steelman => prompts::STEELMAN_PROMPT,
            DeeperLens::Crux => prompts::CRUX_PROMPT,
            DeeperLens::Historical => prompts::HISTORICAL_PROMPT,
        }
    }
}

/// Research, then extraction, then source resolution.
pub struct AuditPipeline {
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl AuditPipeline {
    pub fn new(config: AuditConfig) -> Self {
        let retry = RetryPolicy::new(config.retry_delay);
        Self::with_provider(Arc::new(ClientHandle::new(config)), retry)
    }

    pub fn with_provider(provider: Arc<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Run one audit. Either a complete result or an error comes back;
    /// nothing partial escapes.
    pub async fn run(
        &self,
        request: &AuditRequest,
        observer: &dyn AuditObserver,
    ) -> Result<AuditResult, AuditError> {
        info!(mode = %request.mode, input_len = request.input.len(), "Audit started");

        let research = self
            .retry
            .run(
                || research::run_research(self.provider.as_ref(), request, observer),
                |msg| observer.on_status(msg),
            )
            .await?;

        observer.on_status(match request.mode {
            AuditMode::Definition => "Extracting definition...",
            _ => "Extracting structured analysis...",
        });

        let call = GenerateRequest {
            system_instruction: prompts::extraction_prompt(request.mode).to_string(),
            user_message: prompts::extraction_message(&research.answer_text),
            json_output: true,
            ..Default::default()
        };
        let raw = self
            .retry
            .run(|| self.provider.generate(&call), |msg| observer.on_status(msg))
            .await?;

        let mut analysis = extract::parse_analysis(request.mode, &raw)?;
        let sources = sources::resolve_sources(&research.raw_sources, analysis.source_urls());
        analysis.set_source_urls(sources.iter().map(|s| s.url.clone()).collect());

        observer.on_status("Complete.");
        info!(
            mode = %request.mode,
            source_count = sources.len(),
            related = analysis.related_concepts().len(),
            "Audit complete"
        );

        Ok(AuditResult {
            analysis,
            sources,
            audited_at: Utc::now(),
        })
    }

    /// One grounded follow-up call on a claim; the answer text is returned
    /// as written.
    pub async fn go_deeper(&self, lens: DeeperLens, claim: &str) -> Result<String, AuditError> {
        info!(?lens, claim_len = claim.len(), "Follow-up started");

        let call = GenerateRequest {
            system_instruction: lens.prompt().to_string(),
            user_message: format!("Regarding this claim: \"{}\"", claim),
            search: true,
            ..Default::default()
        };
        let text = self.retry.run(|| self.provider.generate(&call), |_| {}).await?;

        if text.trim().is_empty() {
            return Err(AuditError::NoResearchData);
        }
        Ok(text)
    }
}
