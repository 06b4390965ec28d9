//! Scripted speech backends for tests
//!
//! The recognizer replays whatever events the test injects; the
//! synthesizer records every fragment it is asked to play. Together
//! they let the engine and orchestrator state machines run without
//! audio hardware.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::backend::{RecognitionEvent, RecognitionMode, Recognizer, Synthesizer};
use crate::{Error, Result};

#[derive(Default)]
struct RecognizerInner {
    session: Option<(RecognitionMode, mpsc::Sender<RecognitionEvent>)>,
    started: Vec<RecognitionMode>,
    stops: usize,
    permission_denial: Option<String>,
}

/// Recognition backend driven entirely by a test script
#[derive(Clone, Default)]
pub struct ScriptedRecognizer {
    inner: Arc<Mutex<RecognizerInner>>,
}

/// Test-side control for a [`ScriptedRecognizer`]
#[derive(Clone)]
pub struct RecognizerScript {
    inner: Arc<Mutex<RecognizerInner>>,
}

impl ScriptedRecognizer {
    /// Create a recognizer and its control handle
    #[must_use]
    pub fn new() -> (Self, RecognizerScript) {
        let inner = Arc::new(Mutex::new(RecognizerInner::default()));
        (
            Self {
                inner: Arc::clone(&inner),
            },
            RecognizerScript { inner },
        )
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn start(
        &mut self,
        mode: RecognitionMode,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().expect("recognizer lock");
        if let Some(reason) = &inner.permission_denial {
            return Err(Error::Permission(reason.clone()));
        }
        inner.started.push(mode);
        inner.session = Some((mode, events));
        Ok(())
    }

    async fn stop(&mut self) {
        let mut inner = self.inner.lock().expect("recognizer lock");
        inner.stops += 1;
        inner.session = None;
    }
}

impl RecognizerScript {
    /// Inject an event into the active session
    ///
    /// # Panics
    ///
    /// Panics if no session is active or the engine is gone — both are
    /// test-script mistakes.
    pub async fn emit(&self, event: RecognitionEvent) {
        let sender = {
            let inner = self.inner.lock().expect("recognizer lock");
            inner
                .session
                .as_ref()
                .map(|(_, tx)| tx.clone())
                .expect("no active recognition session")
        };
        sender.send(event).await.expect("engine dropped its session");
    }

    /// Mode of the active session, if any
    #[must_use]
    pub fn active_mode(&self) -> Option<RecognitionMode> {
        self.inner
            .lock()
            .expect("recognizer lock")
            .session
            .as_ref()
            .map(|(mode, _)| *mode)
    }

    /// Every session mode started so far, in order
    #[must_use]
    pub fn started(&self) -> Vec<RecognitionMode> {
        self.inner.lock().expect("recognizer lock").started.clone()
    }

    /// How many times the backend was stopped
    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.inner.lock().expect("recognizer lock").stops
    }

    /// Make every subsequent start fail with a permission denial
    pub fn deny_permission(&self, reason: &str) {
        self.inner.lock().expect("recognizer lock").permission_denial = Some(reason.to_string());
    }

    /// Stop failing starts
    pub fn allow_permission(&self) {
        self.inner.lock().expect("recognizer lock").permission_denial = None;
    }
}

struct SynthesizerInner {
    spoken: Vec<String>,
    delay: Duration,
    fail_containing: Option<String>,
}

/// Synthesis backend that records what it is asked to play
#[derive(Clone)]
pub struct ScriptedSynthesizer {
    inner: Arc<Mutex<SynthesizerInner>>,
}

/// Test-side control for a [`ScriptedSynthesizer`]
#[derive(Clone)]
pub struct SynthesizerScript {
    inner: Arc<Mutex<SynthesizerInner>>,
}

impl ScriptedSynthesizer {
    /// Create a synthesizer and its control handle
    #[must_use]
    pub fn new() -> (Self, SynthesizerScript) {
        let inner = Arc::new(Mutex::new(SynthesizerInner {
            spoken: Vec::new(),
            delay: Duration::ZERO,
            fail_containing: None,
        }));
        (
            Self {
                inner: Arc::clone(&inner),
            },
            SynthesizerScript { inner },
        )
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn speak(&mut self, fragment: &str) -> Result<()> {
        let (delay, fail) = {
            let inner = self.inner.lock().expect("synthesizer lock");
            let fail = inner
                .fail_containing
                .as_ref()
                .is_some_and(|needle| fragment.contains(needle));
            (inner.delay, fail)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.inner
            .lock()
            .expect("synthesizer lock")
            .spoken
            .push(fragment.to_string());

        if fail {
            Err(Error::Synthesis(format!("scripted failure on {fragment:?}")))
        } else {
            Ok(())
        }
    }
}

impl SynthesizerScript {
    /// Every fragment played so far, in playback order
    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.inner.lock().expect("synthesizer lock").spoken.clone()
    }

    /// Simulate playback taking this long per fragment
    pub fn set_delay(&self, delay: Duration) {
        self.inner.lock().expect("synthesizer lock").delay = delay;
    }

    /// Fail playback of any fragment containing the needle
    pub fn fail_when_containing(&self, needle: &str) {
        self.inner.lock().expect("synthesizer lock").fail_containing = Some(needle.to_string());
    }
}
