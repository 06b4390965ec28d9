//! Platform speech primitives
//!
//! Recognition and synthesis are external capabilities (real engines
//! stop after silence, need microphone permission, and finish playback
//! on their own schedule). They sit behind small traits so the engine
//! state machine runs against fakes in tests and against the console
//! backend in the CLI.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;

/// How a recognition session consumes speech
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionMode {
    /// Continuous recognition with interim results, for wake-word
    /// standby
    Continuous,
    /// Single-shot recognition of one full utterance
    OneShot,
}

/// Events emitted by a recognition session
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    /// Interim recognized segment (continuous sessions only)
    Partial(String),
    /// Final recognized text
    Final(String),
    /// The session ended on its own (platform recognizers stop after
    /// silence)
    End,
    /// The session failed
    Failed(RecognitionFailure),
}

/// Ways a recognition session can fail
#[derive(Debug, Clone)]
pub enum RecognitionFailure {
    /// Microphone access denied; terminal until explicitly cleared
    PermissionDenied(String),
    /// Nothing was heard; benign, treated like a natural end
    NoSpeech,
    /// Any other platform failure
    Other(String),
}

/// Speech recognition capability
///
/// One logical session at a time: `start` on an active session first
/// tears the old one down. Events flow into the channel handed to
/// `start`; the engine discards events from superseded sessions.
#[async_trait]
pub trait Recognizer: Send + 'static {
    /// Begin a recognition session
    ///
    /// # Errors
    ///
    /// Returns `Error::Permission` if microphone access is denied, or
    /// `Error::Recognition` for other startup failures.
    async fn start(
        &mut self,
        mode: RecognitionMode,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<()>;

    /// Tear down the active session, if any; idempotent
    async fn stop(&mut self);
}

/// Speech synthesis capability
///
/// `speak` resolves when playback of the fragment finishes, so the
/// engine drives its sentence queue strictly one fragment at a time.
#[async_trait]
pub trait Synthesizer: Send + 'static {
    /// Play one sentence fragment to completion
    ///
    /// # Errors
    ///
    /// Returns `Error::Synthesis` on playback failure; the engine logs
    /// and advances the queue regardless.
    async fn speak(&mut self, fragment: &str) -> Result<()>;
}
