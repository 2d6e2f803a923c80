use crate::error::ChatError;
use crate::models::{ChatConfig, Message, Role};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{stream, Stream, StreamExt};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::pin::Pin;

// Alias for the stream type we'll return
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

// Trait defining the interface for LLM API providers
#[async_trait]
pub trait LLMApiProvider: Send + Sync {
    /// One request, one JSON response; returns the first completion's text.
    async fn send_chat_request(
        &self,
        config: &ChatConfig,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<String, ChatError>;

    // Returns a stream of content deltas.
    async fn send_chat_stream_request(
        &self,
        config: &ChatConfig,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<DeltaStream, ChatError>;
}

// --- Request body ---

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ApiMessage {
    pub role: Role,
    pub content: ApiContent,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ApiContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

impl ApiMessage {
    /// Plain text unless the message carries images, in which case the text
    /// part comes first and each image follows in attachment order.
    pub fn from_message(message: &Message) -> Self {
        let text = message.outgoing_text();
        let images: Vec<ContentPart> = message
            .image_attachments()
            .filter_map(|a| a.data.clone())
            .map(|url| ContentPart::ImageUrl { image_url: ImageUrl { url } })
            .collect();

        let content = if images.is_empty() {
            ApiContent::Text(text)
        } else {
            let mut parts = Vec::with_capacity(images.len() + 1);
            parts.push(ContentPart::Text { text });
            parts.extend(images);
            ApiContent::Parts(parts)
        };

        Self { role: message.role, content }
    }
}

/// Assembles the request body: system prompt, then history, then the prompt.
/// Empty assistant placeholders and error notices are not sent back to the model.
pub fn build_chat_request(
    config: &ChatConfig,
    system_prompt: &str,
    history: &[Message],
    prompt: &Message,
    stream: bool,
) -> ChatRequest {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ApiMessage {
        role: Role::System,
        content: ApiContent::Text(system_prompt.to_string()),
    });
    messages.extend(
        history
            .iter()
            .filter(|m| !(m.role == Role::Assistant && (m.is_error || m.content.is_empty())))
            .map(ApiMessage::from_message),
    );
    messages.push(ApiMessage::from_message(prompt));

    ChatRequest {
        model: config.model.trim().to_string(),
        messages,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        stream,
    }
}

// --- Response bodies ---

#[derive(Deserialize, Debug)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize, Debug)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize, Debug)]
struct CompletionMessage {
    content: Option<String>,
}

// Response structure for STREAMING chunks
#[derive(Deserialize, Debug)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Extracts the reply text from a non-streaming completion body.
pub fn parse_completion(body: &str) -> Result<String, ChatError> {
    let response: CompletionResponse =
        serde_json::from_str(body).map_err(|_| ChatError::MalformedResponse)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or(ChatError::MalformedResponse)
}

/// Interprets one `data:` payload. `None` means the frame carries no text.
pub fn parse_stream_frame(data: &str) -> Option<Result<String, ChatError>> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                let message = error.message.unwrap_or_else(|| "unknown error".to_string());
                return Some(Err(ChatError::Stream(message)));
            }
            chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content)
                .filter(|content| !content.is_empty())
                .map(Ok)
        }
        Err(e) => {
            log::warn!("Skipping unparseable stream frame: {} - Data: {}", e, data);
            None
        }
    }
}

// Appended to every body so a last event without its blank line still dispatches.
const END_OF_BODY: &[u8] = b"\n\n";

/// Turns a chunked SSE body into text deltas. Multi-byte characters split
/// across chunks are reassembled before framing. Every `data:` line is its
/// own payload, even when lines are not separated by blank lines.
pub fn decode_delta_stream<S, B, E>(body: S) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let body = body
        .map(|chunk| chunk.map(|bytes| bytes.as_ref().to_vec()))
        .chain(stream::once(async { Ok(END_OF_BODY.to_vec()) }));
    let deltas = body.eventsource().flat_map(|event_result| {
        let deltas: Vec<Result<String, ChatError>> = match event_result {
            Ok(event) => {
                log::debug!("Received stream event ({} bytes)", event.data.len());
                // Consecutive data lines arrive joined by '\n'.
                event.data.split('\n').filter_map(parse_stream_frame).collect()
            }
            Err(e) => {
                log::error!("Error reading stream event: {}", e);
                vec![Err(ChatError::Transport(e.to_string()))]
            }
        };
        stream::iter(deltas)
    });
    Box::pin(deltas)
}

/// Builds the error for a non-success response from the status code and
/// whatever message the server supplied.
async fn http_error(response: Response) -> ChatError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .filter(|m| !m.trim().is_empty())
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| status.to_string());
    log::error!("Chat completion request failed with status {}: {}", status, message);
    ChatError::Http { status: status.as_u16(), message }
}

// --- OpenAI Compatible Provider Implementation ---

#[derive(Default)]
pub struct OpenAICompatibleProvider {
    client: Client,
}

impl OpenAICompatibleProvider {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    async fn post(
        &self,
        config: &ChatConfig,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<Response, ChatError> {
        let request_url = config.completions_url();
        log::info!(
            "Sending {} request to {} using model: {}",
            if request.stream { "STREAM" } else { "chat" },
            request_url,
            request.model
        );

        let response = self
            .client
            .post(&request_url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl LLMApiProvider for OpenAICompatibleProvider {
    async fn send_chat_request(
        &self,
        config: &ChatConfig,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<String, ChatError> {
        let response = self.post(config, api_key, request).await?;
        let body = response.text().await?;
        parse_completion(&body)
    }

    async fn send_chat_stream_request(
        &self,
        config: &ChatConfig,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<DeltaStream, ChatError> {
        let response = self.post(config, api_key, request).await?;
        Ok(decode_delta_stream(response.bytes_stream()))
    }
}
