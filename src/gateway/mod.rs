//! Inference gateway
//!
//! HTTP client for the generation backend. Model listing and one-shot
//! generation are plain request/response; chat generation is consumed
//! as a newline-delimited JSON stream and surfaced as ordered events.

mod stream;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::chat::ChatMessage;
use crate::{Error, Result};

pub use stream::{LineDecoder, StreamRecord, parse_record};

/// Deadline for every backend request; streaming requests apply it per
/// read as an idle timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// One model known to the backend
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    /// Model identifier (e.g. "llama3.2:latest")
    pub name: String,

    /// On-disk size in bytes
    #[serde(rename = "size")]
    pub size_bytes: u64,

    /// Last modification time
    pub modified_at: DateTime<Utc>,
}

/// Parameters for one streaming chat call
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation history, oldest first
    pub messages: Vec<ChatMessage>,
    /// System prompt prepended to the history
    pub system_prompt: String,
    /// Sampling temperature
    pub temperature: f64,
}

/// Events delivered by a streaming chat call
///
/// Ordering contract: zero or more `Chunk`s in arrival order, at most
/// one `Error`, then exactly one `Complete` on every exit path.
#[derive(Debug)]
pub enum StreamEvent {
    /// One incremental fragment of the reply
    Chunk(String),
    /// The stream failed; `Complete` still follows
    Error(Error),
    /// Finalizer; always the last event of a stream
    Complete,
}

/// Streaming chat seam, so the orchestrator can be driven by a fake
/// backend in tests
#[async_trait]
pub trait ChatStreamer: Send + Sync {
    /// Run one streaming chat call to completion, delivering events
    ///
    /// Firing or dropping `cancel` aborts the call; the finalizer is
    /// still delivered.
    async fn stream_chat(
        &self,
        request: ChatRequest,
        events: mpsc::Sender<StreamEvent>,
        cancel: oneshot::Receiver<()>,
    );
}

#[derive(Serialize)]
struct GenerationOptions {
    temperature: f64,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: GenerationOptions,
}

#[derive(Serialize)]
struct GenerateRequestBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    options: GenerationOptions,
}

#[derive(Deserialize)]
struct GenerateResponseBody {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponseBody {
    models: Vec<ModelEntry>,
}

/// HTTP client for the generation backend
pub struct InferenceClient {
    base_url: String,
    client: reqwest::Client,
}

impl InferenceClient {
    /// Create a client for the given backend base URL
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is not a valid absolute URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let trimmed = base_url.trim_end_matches('/');
        Url::parse(trimmed)
            .map_err(|e| Error::Config(format!("invalid backend URL {trimmed:?}: {e}")))?;

        Ok(Self {
            base_url: trimmed.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// List models available on the backend
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` on network failure, timeout, or a
    /// non-2xx response.
    pub async fn list_models(&self) -> Result<Vec<ModelEntry>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = tokio::time::timeout(REQUEST_TIMEOUT, self.client.get(&url).send())
            .await
            .map_err(|_| Error::Connection(format!("timed out reaching {url}")))?
            .map_err(|e| Error::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Connection(format!(
                "backend returned {}",
                response.status()
            )));
        }

        let tags: TagsResponseBody = response
            .json()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        tracing::debug!(count = tags.models.len(), "listed models");
        Ok(tags.models)
    }

    /// Run one non-streaming generation
    ///
    /// # Errors
    ///
    /// Returns `Error::Backend` on a non-2xx response, `Error::Timeout`
    /// past the deadline, or `Error::Http` on transport failure.
    pub async fn generate_once(
        &self,
        model: &str,
        prompt: &str,
        temperature: f64,
        format_hint: Option<&str>,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequestBody {
            model,
            prompt,
            stream: false,
            format: format_hint,
            options: GenerationOptions { temperature },
        };

        let response = tokio::time::timeout(
            REQUEST_TIMEOUT,
            self.client.post(&url).json(&body).send(),
        )
        .await
        .map_err(|_| Error::Timeout(REQUEST_TIMEOUT))??;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend { status, body });
        }

        let parsed: GenerateResponseBody = response.json().await?;
        Ok(parsed.response)
    }

    /// Drive one streaming chat request, sending chunk events
    ///
    /// Returns once the backend reports `done`, the body ends, or the
    /// receiver goes away.
    async fn drive_stream(
        &self,
        request: &ChatRequest,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<()> {
        let url = format!("{}/api/chat", self.base_url);
        let messages = build_messages(request);
        let body = ChatRequestBody {
            model: &request.model,
            messages: &messages,
            stream: true,
            options: GenerationOptions {
                temperature: request.temperature,
            },
        };

        let response = tokio::time::timeout(
            REQUEST_TIMEOUT,
            self.client.post(&url).json(&body).send(),
        )
        .await
        .map_err(|_| Error::Timeout(REQUEST_TIMEOUT))??;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend { status, body });
        }

        let mut byte_stream = response.bytes_stream();
        let mut decoder = LineDecoder::new();
        let mut saw_line = false;

        loop {
            let next = tokio::time::timeout(REQUEST_TIMEOUT, byte_stream.next())
                .await
                .map_err(|_| Error::Timeout(REQUEST_TIMEOUT))?;

            let Some(item) = next else { break };
            let bytes = item?;

            for line in decoder.push(&bytes) {
                saw_line = true;
                if deliver_line(&line, events).await? {
                    return Ok(());
                }
            }
        }

        if let Some(line) = decoder.finish() {
            saw_line = true;
            deliver_line(&line, events).await?;
        }

        if saw_line {
            Ok(())
        } else {
            Err(Error::Connection("empty response body".to_string()))
        }
    }
}

#[async_trait]
impl ChatStreamer for InferenceClient {
    async fn stream_chat(
        &self,
        request: ChatRequest,
        events: mpsc::Sender<StreamEvent>,
        mut cancel: oneshot::Receiver<()>,
    ) {
        let outcome = tokio::select! {
            res = self.drive_stream(&request, &events) => res,
            _ = &mut cancel => Err(Error::Aborted),
        };

        if let Err(e) = outcome {
            tracing::warn!(error = %e, model = %request.model, "chat stream failed");
            let _ = events.send(StreamEvent::Error(e)).await;
        }

        // Finalizer: exactly once on every exit path.
        let _ = events.send(StreamEvent::Complete).await;
    }
}

/// Prepend the system message to the request history
fn build_messages(request: &ChatRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(ChatMessage::system(request.system_prompt.clone()));
    messages.extend(request.messages.iter().cloned());
    messages
}

/// Parse one stream line and deliver its chunk, if any
///
/// Returns `Ok(true)` on the final record of the stream.
async fn deliver_line(line: &str, events: &mpsc::Sender<StreamEvent>) -> Result<bool> {
    let Some(record) = parse_record(line) else {
        if !line.trim().is_empty() {
            tracing::debug!(line, "skipping malformed stream line");
        }
        return Ok(false);
    };

    if let Some(chunk) = record.chunk() {
        if events
            .send(StreamEvent::Chunk(chunk.to_string()))
            .await
            .is_err()
        {
            // Receiver gone; stop reading the body.
            return Err(Error::Aborted);
        }
    }

    Ok(record.done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "llama3.2".to_string(),
            messages: vec![ChatMessage::user("hello")],
            system_prompt: "be brief".to_string(),
            temperature: 0.7,
        }
    }

    #[test]
    fn system_message_is_prepended() {
        let messages = build_messages(&request());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "be brief");
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(InferenceClient::new("not a url").is_err());
        assert!(InferenceClient::new("http://localhost:11434/").is_ok());
    }

    #[test]
    fn model_entry_deserializes_from_wire_format() {
        let json = r#"{
            "name": "llama3.2:latest",
            "size": 2019393189,
            "modified_at": "2025-06-01T10:30:00.123456789Z"
        }"#;
        let entry: ModelEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.name, "llama3.2:latest");
        assert_eq!(entry.size_bytes, 2_019_393_189);
    }

    #[test]
    fn chat_body_serializes_wire_contract() {
        let req = request();
        let messages = build_messages(&req);
        let body = ChatRequestBody {
            model: &req.model,
            messages: &messages,
            stream: true,
            options: GenerationOptions {
                temperature: req.temperature,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn generate_body_omits_absent_format_hint() {
        let body = GenerateRequestBody {
            model: "llama3.2",
            prompt: "hi",
            stream: false,
            format: None,
            options: GenerationOptions { temperature: 0.2 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("format").is_none());

        let body = GenerateRequestBody {
            format: Some("json"),
            ..body
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["format"], "json");
    }
}
