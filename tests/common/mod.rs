//! Shared test utilities

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use aura_assistant::gateway::{ChatRequest, ChatStreamer, StreamEvent};
use aura_assistant::{Error, Settings};

/// Outcome of one scripted streaming call
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Deliver these chunks, then complete
    Chunks(Vec<&'static str>),
    /// Deliver these chunks, then fail, then complete
    FailAfter(Vec<&'static str>, &'static str),
    /// Deliver nothing until cancelled
    Hang,
}

#[derive(Default)]
struct StreamerInner {
    script: VecDeque<Outcome>,
    requests: Vec<ChatRequest>,
}

/// Chat streaming backend driven by a test script
///
/// Honors the stream contract: chunks in order, at most one error,
/// exactly one completion.
#[derive(Clone, Default)]
pub struct FakeStreamer {
    inner: Arc<Mutex<StreamerInner>>,
}

#[allow(dead_code)]
impl FakeStreamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome for the next streaming call
    pub fn push(&self, outcome: Outcome) {
        self.inner.lock().unwrap().script.push_back(outcome);
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.inner.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl ChatStreamer for FakeStreamer {
    async fn stream_chat(
        &self,
        request: ChatRequest,
        events: mpsc::Sender<StreamEvent>,
        cancel: oneshot::Receiver<()>,
    ) {
        let outcome = {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.push(request);
            inner.script.pop_front().unwrap_or(Outcome::Chunks(Vec::new()))
        };

        match outcome {
            Outcome::Chunks(chunks) => {
                for chunk in chunks {
                    let _ = events.send(StreamEvent::Chunk(chunk.to_string())).await;
                }
            }
            Outcome::FailAfter(chunks, reason) => {
                for chunk in chunks {
                    let _ = events.send(StreamEvent::Chunk(chunk.to_string())).await;
                }
                let _ = events
                    .send(StreamEvent::Error(Error::Connection(reason.to_string())))
                    .await;
            }
            Outcome::Hang => {
                let _ = cancel.await;
                let _ = events.send(StreamEvent::Error(Error::Aborted)).await;
            }
        }

        let _ = events.send(StreamEvent::Complete).await;
    }
}

/// Test settings with a known trigger phrase
#[allow(dead_code)]
#[must_use]
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.set_trigger_phrase("hey assistant");
    settings
}

/// Poll until the condition holds, failing after five virtual seconds
#[allow(dead_code)]
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F, what: &str) {
    let deadline = Duration::from_secs(5);
    let result = tokio::time::timeout(deadline, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}
