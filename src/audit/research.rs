use futures::StreamExt;
use tracing::{debug, info};

use super::prompts;
use super::types::{AuditRequest, GroundingSource};
use super::AuditObserver;
use crate::error::AuditError;
use crate::llm::{GenerateRequest, LlmProvider, StreamPart};

pub const RESEARCH_STATUS: &str = "Researching with web search...";

pub struct ResearchOutput {
    pub answer_text: String,
    /// Citations in arrival order, duplicates included.
    pub raw_sources: Vec<GroundingSource>,
}

/// Stream the grounded research call to completion.
///
/// Reasoning parts go straight to the observer, in arrival order; answer
/// parts and citations are accumulated.
pub async fn run_research(
    provider: &dyn LlmProvider,
    request: &AuditRequest,
    observer: &dyn AuditObserver,
) -> Result<ResearchOutput, AuditError> {
    observer.on_status(RESEARCH_STATUS);

    let call = GenerateRequest {
        system_instruction: prompts::research_prompt(request.mode).to_string(),
        user_message: prompts::research_message(request.mode, &request.input),
        search: true,
        expose_reasoning: true,
        json_output: false,
    };

    let mut stream = provider.stream_generate(&call).await?;

    let mut answer_text = String::new();
    let mut raw_sources = Vec::new();
    let mut chunks = 0usize;
    let mut fragments = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        chunks += 1;

        for part in chunk.parts {
            match part {
                StreamPart::Reasoning(text) => {
                    fragments += 1;
                    observer.on_thought(&text);
                }
                StreamPart::Answer(text) => answer_text.push_str(&text),
            }
        }
        if !chunk.citations.is_empty() {
            debug!(count = chunk.citations.len(), "Grounding citations received");
        }
        raw_sources.extend(chunk.citations);
    }

    info!(
        chunks,
        fragments,
        answer_len = answer_text.len(),
        citations = raw_sources.len(),
        "Research stream complete"
    );

    if answer_text.trim().is_empty() {
        return Err(AuditError::NoResearchData);
    }

    Ok(ResearchOutput {
        answer_text,
        raw_sources,
    })
}
