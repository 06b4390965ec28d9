//! Console speech backend
//!
//! Stands in for platform speech hardware in the CLI: typed lines are
//! recognition results, and synthesis prints fragments with a playback
//! delay proportional to their length. The orchestration core drives
//! it exactly as it would a real microphone and voice.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::backend::{RecognitionEvent, RecognitionFailure, RecognitionMode, Recognizer, Synthesizer};
use crate::Result;

/// Simulated playback time per word
const PLAYBACK_RATE: Duration = Duration::from_millis(150);

/// Reads recognition "results" from stdin
///
/// Continuous sessions emit one final result per non-empty line until
/// stopped or EOF; one-shot sessions emit a single result and end.
#[derive(Default)]
pub struct ConsoleRecognizer {
    task: Option<JoinHandle<()>>,
}

impl ConsoleRecognizer {
    /// Create a console recognizer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Recognizer for ConsoleRecognizer {
    async fn start(
        &mut self,
        mode: RecognitionMode,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<()> {
        self.stop().await;

        let task = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if events.send(RecognitionEvent::Final(line)).await.is_err() {
                            return;
                        }
                        if mode == RecognitionMode::OneShot {
                            let _ = events.send(RecognitionEvent::End).await;
                            return;
                        }
                    }
                    Ok(None) => {
                        // stdin closed
                        let _ = events.send(RecognitionEvent::End).await;
                        return;
                    }
                    Err(e) => {
                        let _ = events
                            .send(RecognitionEvent::Failed(RecognitionFailure::Other(
                                e.to_string(),
                            )))
                            .await;
                        return;
                    }
                }
            }
        });

        self.task = Some(task);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Recognition backend for voice-off mode (the text REPL)
///
/// Sessions start successfully and never produce results, so standby
/// stays logically active without touching stdin.
#[derive(Default)]
pub struct DisabledRecognizer;

#[async_trait]
impl Recognizer for DisabledRecognizer {
    async fn start(
        &mut self,
        _mode: RecognitionMode,
        _events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<()> {
        Ok(())
    }

    async fn stop(&mut self) {}
}

/// Prints fragments and simulates playback timing
pub struct ConsoleSynthesizer {
    rate: Duration,
}

impl ConsoleSynthesizer {
    /// Create a console synthesizer with the default playback rate
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rate: PLAYBACK_RATE,
        }
    }
}

impl Default for ConsoleSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for ConsoleSynthesizer {
    #[allow(clippy::cast_possible_truncation)]
    async fn speak(&mut self, fragment: &str) -> Result<()> {
        println!("aura> {fragment}");

        let words = fragment.split_whitespace().count().max(1) as u32;
        tokio::time::sleep(self.rate * words).await;
        Ok(())
    }
}
