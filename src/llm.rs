use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::audit::types::GroundingSource;
use crate::config::AuditConfig;
use crate::error::{AuditError, RESOURCE_EXHAUSTED};

pub type ChunkStream = BoxStream<'static, Result<StreamChunk, AuditError>>;

/// One provider call: a system instruction, a single user message, and the
/// capabilities to enable.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub system_instruction: String,
    pub user_message: String,
    /// Ground the answer with live web search.
    pub search: bool,
    /// Emit the model's intermediate reasoning as separate parts.
    pub expose_reasoning: bool,
    /// Ask for a strict JSON response body.
    pub json_output: bool,
}

/// A unit of streamed model output, tagged at the adapter boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    Reasoning(String),
    Answer(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub parts: Vec<StreamPart>,
    pub citations: Vec<GroundingSource>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Open a streaming call. Errors before the first chunk come back here,
    /// errors mid-stream come back as stream items.
    async fn stream_generate(&self, request: &GenerateRequest) -> Result<ChunkStream, AuditError>;

    /// Non-streaming call returning the concatenated answer text.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, AuditError>;
}

/// Lazily-built, memoized handle to the provider.
///
/// The credential is only checked when the first call is made, so the bot can
/// start without it; every call made without a key fails with
/// `MissingCredential`.
pub struct ClientHandle {
    config: AuditConfig,
    client: OnceCell<GeminiClient>,
}

impl ClientHandle {
    pub fn new(config: AuditConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> Result<&GeminiClient, AuditError> {
        self.client
            .get_or_try_init(|| async {
                let client = GeminiClient::new(&self.config)?;
                debug!(model = %self.config.model, "LLM client initialized");
                Ok::<_, AuditError>(client)
            })
            .await
    }
}

#[async_trait]
impl LlmProvider for ClientHandle {
    async fn stream_generate(&self, request: &GenerateRequest) -> Result<ChunkStream, AuditError> {
        self.get().await?.stream_generate(request).await
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, AuditError> {
        self.get().await?.generate(request).await
    }
}

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &AuditConfig) -> Result<Self, AuditError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(AuditError::MissingCredential)?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuditError::upstream(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// `{base}/models/{model}:{method}`
    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.base_url.trim_end_matches('/'),
            self.model,
            method
        )
    }

    async fn post(&self, url: String, body: &Value) -> Result<reqwest::Response, AuditError> {
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(provider_error(Some(status.as_u16()), &text));
        }
        Ok(resp)
    }
}

#[async_trait]
impl LlmProvider for GeminiClient {
    async fn stream_generate(&self, request: &GenerateRequest) -> Result<ChunkStream, AuditError> {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let resp = self.post(url, &request_body(request)).await?;

        let mut decoder = SseDecoder::default();
        let chunks = resp
            .bytes_stream()
            .map(move |bytes| match bytes {
                Ok(bytes) => decoder
                    .push(&bytes)
                    .iter()
                    .map(|payload| parse_payload(payload))
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(AuditError::from(e))],
            })
            .flat_map(stream::iter);

        Ok(chunks.boxed())
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, AuditError> {
        let resp = self
            .post(self.endpoint("generateContent"), &request_body(request))
            .await?;
        let text = resp.text().await?;
        let chunk = parse_payload(&text)?;

        Ok(chunk
            .parts
            .into_iter()
            .filter_map(|part| match part {
                StreamPart::Answer(text) => Some(text),
                StreamPart::Reasoning(_) => None,
            })
            .collect())
    }
}

fn request_body(request: &GenerateRequest) -> Value {
    let mut body = json!({
        "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
        "contents": [{ "role": "user", "parts": [{ "text": request.user_message }] }],
    });

    if request.search {
        body["tools"] = json!([{ "google_search": {} }]);
    }

    let mut generation = serde_json::Map::new();
    if request.expose_reasoning {
        generation.insert("thinkingConfig".to_string(), json!({ "includeThoughts": true }));
    }
    if request.json_output {
        generation.insert("responseMimeType".to_string(), json!("application/json"));
    }
    if !generation.is_empty() {
        body["generationConfig"] = Value::Object(generation);
    }

    body
}

/// Splits an SSE body into `data:` payloads. Bytes are buffered until a full
/// line is available so multi-byte characters split across network chunks
/// decode correctly.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(data) = line.trim_end().strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
        payloads
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl ErrorBody {
    fn into_error(self, http_status: Option<u16>) -> AuditError {
        let message = format!("{} {}", self.status, self.message).trim().to_string();
        match http_status.or(self.code) {
            Some(code) => AuditError::from_status(code, message),
            None if message.contains(RESOURCE_EXHAUSTED) => AuditError::RateLimited { message },
            None => AuditError::upstream(message),
        }
    }
}

impl GenerateResponse {
    /// Convert the provider shape into the pipeline's tagged parts.
    fn into_chunk(self) -> StreamChunk {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return StreamChunk::default();
        };

        let parts = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| {
                let text = part.text.filter(|t| !t.is_empty())?;
                if part.thought {
                    // Blank reasoning has nothing to reveal
                    (!text.trim().is_empty()).then_some(StreamPart::Reasoning(text))
                } else {
                    Some(StreamPart::Answer(text))
                }
            })
            .collect();

        let citations = candidate
            .grounding_metadata
            .map(|g| g.grounding_chunks)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|chunk| {
                let web = chunk.web?;
                let url = web.uri.filter(|u| !u.is_empty())?;
                Some(GroundingSource {
                    url,
                    title: web.title.filter(|t| !t.trim().is_empty()),
                })
            })
            .collect();

        StreamChunk { parts, citations }
    }
}

fn parse_payload(payload: &str) -> Result<StreamChunk, AuditError> {
    let resp: GenerateResponse = serde_json::from_str(payload)
        .map_err(|e| AuditError::upstream(format!("invalid provider payload: {}", e)))?;
    if let Some(err) = resp.error {
        return Err(err.into_error(None));
    }
    Ok(resp.into_chunk())
}

/// Build an error from a non-success HTTP response. The body is either an
/// error envelope or (for streaming endpoints) an array holding one.
fn provider_error(http_status: Option<u16>, body: &str) -> AuditError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok().or_else(|| {
        serde_json::from_str::<Vec<ErrorEnvelope>>(body)
            .ok()
            .and_then(|v| v.into_iter().next())
    });

    match (envelope, http_status) {
        (Some(env), status) => env.error.into_error(status),
        (None, Some(status)) => {
            AuditError::from_status(status, body.chars().take(500).collect::<String>())
        }
        (None, None) => AuditError::upstream(body.chars().take(500).collect::<String>()),
    }
}
