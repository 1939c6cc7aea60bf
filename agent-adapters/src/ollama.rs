//! `Ollama` adapter implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use hyper::body::to_bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Request, Uri};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::http_client::{HyperClient, build_https_client};
use crate::traits::{
    AdapterError, AdapterMetadata, AdapterResult, AdapterStream, InferenceChunk, InferenceRequest,
    MessageRole, ModelAdapter, PromptMessage,
};

/// Configuration for the `Ollama` adapter.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    base_url: String,
    model: String,
    default_temperature: Option<f32>,
    timeout: Duration,
    mock_responses: bool,
}

impl OllamaConfig {
    /// Creates a configuration for the supplied model using default settings.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: "http://127.0.0.1:11434/".to_owned(),
            model: model.into(),
            default_temperature: None,
            timeout: Duration::from_secs(60),
            mock_responses: false,
        }
    }

    /// Overrides the base URL of the local Ollama daemon.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the supplied URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> AdapterResult<Self> {
        let sanitized = sanitize_base_url(base_url.as_ref())?;
        self.base_url = sanitized;
        Ok(self)
    }

    /// Sets the default sampling temperature used when the request does not
    /// provide one explicitly.
    #[must_use]
    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = Some(temperature);
        self
    }

    /// Sets the HTTP timeout for requests to the Ollama daemon.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables mocked responses for offline testing.
    #[must_use]
    pub fn with_mock_responses(mut self, enabled: bool) -> Self {
        self.mock_responses = enabled;
        self
    }
}

/// `Ollama` adapter that calls the local Ollama daemon over HTTP.
pub struct OllamaAdapter {
    client: HyperClient,
    config: OllamaConfig,
    metadata: AdapterMetadata,
    chat_endpoint: Uri,
}

impl std::fmt::Debug for OllamaAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaAdapter")
            .field("model", &self.metadata.model())
            .field("chat_endpoint", &self.chat_endpoint)
            .finish_non_exhaustive()
    }
}

impl OllamaAdapter {
    /// Constructs a new adapter from the supplied configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the chat endpoint cannot be
    /// formed, or [`AdapterError::Transport`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: OllamaConfig) -> AdapterResult<Self> {
        let chat_endpoint = format!("{}api/chat", config.base_url)
            .parse::<Uri>()
            .map_err(|err| AdapterError::configuration(format!("invalid chat endpoint: {err}")))?;

        let client = build_https_client()?;
        let metadata = AdapterMetadata::new("ollama", config.model.clone());

        Ok(Self {
            client,
            config,
            metadata,
            chat_endpoint,
        })
    }

    fn mock_stream(&self, request: &InferenceRequest) -> AdapterStream {
        let fallback = "(no user prompt provided)".to_owned();
        let last_user_message = request
            .messages()
            .iter()
            .rev()
            .find(|message| message.role() == MessageRole::User)
            .map_or(fallback, |message| message.content().to_owned());

        let content = format!(
            "[mocked-ollama:{}] {}",
            self.metadata.model(),
            last_user_message
        );

        Box::pin(stream::once(async move { Ok(InferenceChunk::new(content, true)) }))
    }

    fn to_chat_request(&self, request: &InferenceRequest) -> ChatRequest {
        let messages = request.messages().iter().map(map_prompt_message).collect();

        let temperature = request.temperature().or(self.config.default_temperature);

        let options = if temperature.is_some() || request.max_output_tokens().is_some() {
            Some(ChatOptions {
                temperature,
                max_output_tokens: request.max_output_tokens(),
            })
        } else {
            None
        };

        ChatRequest {
            model: self.config.model.clone(),
            stream: false,
            messages,
            options,
        }
    }
}

#[async_trait]
impl ModelAdapter for OllamaAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn infer(&self, request: InferenceRequest) -> AdapterResult<AdapterStream> {
        if self.config.mock_responses {
            return Ok(self.mock_stream(&request));
        }

        let chat_request = self.to_chat_request(&request);
        let body = serde_json::to_vec(&chat_request).map_err(|err| {
            AdapterError::invalid_request(format!("failed to encode Ollama request: {err}"))
        })?;

        let request = Request::post(self.chat_endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .map_err(|err| {
                AdapterError::transport(format!("failed to build Ollama request: {err}"))
            })?;

        let response = timeout(self.config.timeout, self.client.request(request))
            .await
            .map_err(|_| AdapterError::transport("Ollama request timed out"))?
            .map_err(|err| AdapterError::transport(format!("Ollama request failed: {err}")))?;

        let status = response.status();
        let bytes = to_bytes(response.into_body()).await.map_err(|err| {
            AdapterError::transport(format!("failed to read Ollama response: {err}"))
        })?;

        if !status.is_success() {
            let reason = String::from_utf8_lossy(&bytes).to_string();
            return Err(AdapterError::Response {
                reason: format!("ollama returned {status}: {reason}"),
            });
        }

        let chat_response: ChatResponse =
            serde_json::from_slice(&bytes).map_err(|err| AdapterError::Response {
                reason: format!("failed to decode ollama response: {err}"),
            })?;

        if let Some(error) = chat_response.error {
            return Err(AdapterError::Response { reason: error });
        }

        let content = chat_response
            .message
            .map(|message| message.content)
            .or(chat_response.response)
            .unwrap_or_default();

        Ok(Box::pin(stream::once(async move {
            Ok(InferenceChunk::new(content, true))
        })))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    stream: bool,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "num_predict")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default, rename = "done")]
    _done: bool,
    #[serde(default)]
    error: Option<String>,
}

fn map_prompt_message(message: &PromptMessage) -> ChatMessage {
    match message.role() {
        MessageRole::Tool => ChatMessage {
            role: "user".to_owned(),
            content: format!("[tool output] {}", message.content()),
        },
        role => ChatMessage {
            role: role.to_string(),
            content: message.content().to_owned(),
        },
    }
}

fn sanitize_base_url(input: &str) -> AdapterResult<String> {
    let mut base = input.trim().to_owned();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(AdapterError::configuration(
            "Ollama base URL must start with http:// or https://",
        ));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    base.parse::<Uri>()
        .map_err(|err| AdapterError::configuration(format!("invalid Ollama base URL: {err}")))?;
    Ok(base)
}
