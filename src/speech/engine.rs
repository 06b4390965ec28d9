//! Speech engine state machine
//!
//! A single actor task owns the authoritative [`SpeechState`], the
//! sentence queue, the sticky permission flag, and the wake-once flag.
//! Recognition backends, playback, and restart timers all feed one
//! internal event channel, so every state mutation happens on one
//! task. Recognition events carry a session generation; events from a
//! superseded session are dropped instead of corrupting the new one.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::backend::{
    RecognitionEvent, RecognitionFailure, RecognitionMode, Recognizer, Synthesizer,
};
use super::segment::split_fragments;
use crate::Error;

/// Base delay before restarting a standby session after a natural end
const RESTART_BASE_DELAY: Duration = Duration::from_millis(250);

/// Cap on the standby restart backoff exponent
const RESTART_MAX_SHIFT: u32 = 5;

/// Authoritative speech engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechState {
    /// No recognition, no playback
    Idle,
    /// Continuous recognition, waiting for the trigger phrase
    Standby,
    /// One-shot recognition, waiting for a full utterance
    Listening,
    /// Sentence queue playback active
    Speaking,
}

/// Events the engine reports to its owner
#[derive(Debug, Clone)]
pub enum SpeechEvent {
    /// The authoritative state changed
    StateChanged(SpeechState),
    /// The trigger phrase was heard; fires at most once per standby
    /// session
    WakeDetected,
    /// A one-shot session produced a final transcript
    Transcript(String),
    /// Microphone access was denied; sticky until cleared
    PermissionDenied(String),
}

/// Commands accepted by the engine
#[derive(Debug)]
enum Command {
    StartStandby,
    StartListening,
    Speak(String),
    Stop,
    ClearQueue,
    ClearPermissionError,
    Query(oneshot::Sender<EngineStatus>),
}

/// Snapshot of engine internals, for the CLI and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus {
    /// Current authoritative state
    pub state: SpeechState,
    /// Fragments waiting behind the one being played
    pub queued: usize,
    /// Whether a permission error is recorded
    pub permission_error: bool,
}

/// Internal event loop input
enum Internal {
    Command(Command),
    Recognition(u64, RecognitionEvent),
    FragmentDone,
    RestartStandby(u64),
}

/// Handle for driving the engine actor
#[derive(Clone)]
pub struct SpeechHandle {
    tx: mpsc::Sender<Internal>,
}

impl SpeechHandle {
    /// Begin continuous wake-word listening
    pub async fn start_standby(&self) {
        self.send(Command::StartStandby).await;
    }

    /// Begin one-shot command capture
    pub async fn start_listening(&self) {
        self.send(Command::StartListening).await;
    }

    /// Queue text for synthesis
    pub async fn speak(&self, text: impl Into<String>) {
        self.send(Command::Speak(text.into())).await;
    }

    /// Tear down any active recognition session
    ///
    /// Pending queued fragments are left to play out.
    pub async fn stop(&self) {
        self.send(Command::Stop).await;
    }

    /// Drop pending fragments; the fragment being played finishes
    pub async fn clear_queue(&self) {
        self.send(Command::ClearQueue).await;
    }

    /// Clear a recorded permission error
    pub async fn clear_permission_error(&self) {
        self.send(Command::ClearPermissionError).await;
    }

    /// Snapshot the engine state
    pub async fn status(&self) -> EngineStatus {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Query(tx)).await;
        rx.await.unwrap_or(EngineStatus {
            state: SpeechState::Idle,
            queued: 0,
            permission_error: false,
        })
    }

    async fn send(&self, command: Command) {
        if self.tx.send(Internal::Command(command)).await.is_err() {
            tracing::warn!("speech engine is gone, command dropped");
        }
    }
}

/// Speech engine actor
pub struct SpeechEngine<R: Recognizer> {
    trigger_phrase: String,
    recognizer: R,
    state: SpeechState,
    queue: VecDeque<String>,
    fragment_in_flight: bool,
    session_mode: Option<RecognitionMode>,
    session_gen: u64,
    wake_fired: bool,
    transcript_sent: bool,
    permission_error: Option<String>,
    restart_attempts: u32,
    internal_tx: mpsc::Sender<Internal>,
    playback_tx: mpsc::Sender<String>,
    events: mpsc::Sender<SpeechEvent>,
}

impl<R: Recognizer + Sync> SpeechEngine<R> {
    /// Spawn the engine actor and its playback task
    ///
    /// Engine events are delivered on `events`; the returned handle is
    /// the only way to drive the engine.
    pub fn spawn<S: Synthesizer>(
        recognizer: R,
        synthesizer: S,
        trigger_phrase: &str,
        events: mpsc::Sender<SpeechEvent>,
    ) -> SpeechHandle {
        let (internal_tx, internal_rx) = mpsc::channel(64);
        let (playback_tx, playback_rx) = mpsc::channel(1);

        tokio::spawn(playback_task(synthesizer, playback_rx, internal_tx.clone()));

        let engine = Self {
            trigger_phrase: trigger_phrase.to_lowercase(),
            recognizer,
            state: SpeechState::Idle,
            queue: VecDeque::new(),
            fragment_in_flight: false,
            session_mode: None,
            session_gen: 0,
            wake_fired: false,
            transcript_sent: false,
            permission_error: None,
            restart_attempts: 0,
            internal_tx: internal_tx.clone(),
            playback_tx,
            events,
        };

        tokio::spawn(engine.run(internal_rx));

        SpeechHandle { tx: internal_tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Internal>) {
        while let Some(event) = rx.recv().await {
            match event {
                Internal::Command(command) => self.on_command(command).await,
                Internal::Recognition(generation, event) if generation == self.session_gen => {
                    self.on_recognition(event).await;
                }
                // Superseded session; its events must not touch state.
                Internal::Recognition(..) => {}
                Internal::FragmentDone => self.on_fragment_done(),
                Internal::RestartStandby(generation) if generation == self.session_gen => {
                    tracing::debug!(attempts = self.restart_attempts, "restarting standby session");
                    self.begin_session(RecognitionMode::Continuous).await;
                }
                Internal::RestartStandby(_) => {}
            }
            self.sync_state().await;
        }
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::StartStandby => {
                if let Some(reason) = &self.permission_error {
                    tracing::debug!(reason, "standby refused: permission error recorded");
                    return;
                }
                self.restart_attempts = 0;
                self.begin_session(RecognitionMode::Continuous).await;
            }
            Command::StartListening => {
                if let Some(reason) = &self.permission_error {
                    tracing::debug!(reason, "listening refused: permission error recorded");
                    return;
                }
                self.begin_session(RecognitionMode::OneShot).await;
            }
            Command::Speak(text) => self.enqueue(&text),
            Command::Stop => self.teardown_session().await,
            Command::ClearQueue => {
                let dropped = self.queue.len();
                self.queue.clear();
                if dropped > 0 {
                    tracing::debug!(dropped, "pending fragments cleared");
                }
            }
            Command::ClearPermissionError => {
                self.permission_error = None;
            }
            Command::Query(reply) => {
                let _ = reply.send(EngineStatus {
                    state: self.state,
                    queued: self.queue.len(),
                    permission_error: self.permission_error.is_some(),
                });
            }
        }
    }

    async fn on_recognition(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Partial(text) | RecognitionEvent::Final(text)
                if self.session_mode == Some(RecognitionMode::Continuous) =>
            {
                self.restart_attempts = 0;
                self.check_trigger(&text).await;
            }
            RecognitionEvent::Final(text)
                if self.session_mode == Some(RecognitionMode::OneShot) =>
            {
                self.restart_attempts = 0;
                let transcript = text.trim();
                if !transcript.is_empty() && !self.transcript_sent {
                    self.transcript_sent = true;
                    self.session_mode = None;
                    self.recognizer.stop().await;
                    tracing::info!(transcript, "command captured");
                    self.emit(SpeechEvent::Transcript(transcript.to_string())).await;
                }
            }
            RecognitionEvent::Partial(_) | RecognitionEvent::Final(_) => {}
            RecognitionEvent::End => self.on_session_end(),
            RecognitionEvent::Failed(failure) => self.on_recognition_failure(failure).await,
        }
    }

    /// Check a recognized segment for the trigger phrase
    ///
    /// Fires the wake event at most once per standby session.
    async fn check_trigger(&mut self, text: &str) {
        if self.wake_fired {
            return;
        }
        if text.to_lowercase().contains(&self.trigger_phrase) {
            self.wake_fired = true;
            tracing::info!(trigger = %self.trigger_phrase, heard = text, "wake phrase detected");
            self.emit(SpeechEvent::WakeDetected).await;
        }
    }

    /// A session ended on its own
    ///
    /// Standby sessions restart automatically while the wake phrase has
    /// not been heard — platform recognizers stop after silence. The
    /// restart is backed off so a platform that ends sessions
    /// immediately cannot spin the engine.
    fn on_session_end(&mut self) {
        match self.session_mode {
            Some(RecognitionMode::Continuous) if !self.wake_fired => {
                self.schedule_restart();
            }
            Some(RecognitionMode::OneShot) if !self.transcript_sent => {
                tracing::debug!("listening ended without a transcript");
                self.session_mode = None;
            }
            _ => {
                self.session_mode = None;
            }
        }
    }

    async fn on_recognition_failure(&mut self, failure: RecognitionFailure) {
        match failure {
            RecognitionFailure::PermissionDenied(reason) => {
                tracing::error!(reason, "microphone permission denied");
                self.permission_error = Some(reason.clone());
                self.session_mode = None;
                self.recognizer.stop().await;
                self.emit(SpeechEvent::PermissionDenied(reason)).await;
            }
            RecognitionFailure::NoSpeech => {
                tracing::debug!("no speech detected");
                self.on_session_end();
            }
            RecognitionFailure::Other(reason) => {
                tracing::warn!(reason, "recognition failed");
                self.session_mode = None;
                self.recognizer.stop().await;
            }
        }
    }

    /// Append fragments to the sentence queue and start playback if
    /// idle
    fn enqueue(&mut self, text: &str) {
        let fragments = split_fragments(text);
        if fragments.is_empty() {
            return;
        }

        tracing::debug!(count = fragments.len(), "fragments enqueued");
        self.queue.extend(fragments);

        if !self.fragment_in_flight {
            self.play_next();
        }
    }

    fn on_fragment_done(&mut self) {
        self.fragment_in_flight = false;
        self.play_next();
    }

    fn play_next(&mut self) {
        if let Some(fragment) = self.queue.pop_front() {
            // Capacity 1 and one fragment in flight at a time, so this
            // never blocks.
            if self.playback_tx.try_send(fragment).is_ok() {
                self.fragment_in_flight = true;
            } else {
                tracing::warn!("playback task is gone, dropping queue");
                self.queue.clear();
            }
        }
    }

    /// Start a fresh recognition session, superseding any active one
    async fn begin_session(&mut self, mode: RecognitionMode) {
        self.teardown_session().await;

        let (tx, mut rx) = mpsc::channel(16);
        let forward = self.internal_tx.clone();
        let generation = self.session_gen;
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if forward
                    .send(Internal::Recognition(generation, event))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        match self.recognizer.start(mode, tx).await {
            Ok(()) => {
                self.session_mode = Some(mode);
                self.wake_fired = false;
                self.transcript_sent = false;
                tracing::debug!(?mode, generation, "recognition session started");
            }
            Err(Error::Permission(reason)) => {
                tracing::error!(reason, "microphone permission denied");
                self.permission_error = Some(reason.clone());
                self.emit(SpeechEvent::PermissionDenied(reason)).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to start recognition");
            }
        }
    }

    /// Stop recognition and invalidate the session generation so a
    /// stale completion event cannot re-trigger restart logic
    async fn teardown_session(&mut self) {
        self.session_gen += 1;
        if self.session_mode.take().is_some() {
            self.recognizer.stop().await;
        }
    }

    fn schedule_restart(&mut self) {
        let shift = self.restart_attempts.min(RESTART_MAX_SHIFT);
        let delay = RESTART_BASE_DELAY * 2u32.pow(shift);
        self.restart_attempts = self.restart_attempts.saturating_add(1);

        tracing::debug!(?delay, attempts = self.restart_attempts, "standby restart scheduled");

        let tx = self.internal_tx.clone();
        let generation = self.session_gen;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::RestartStandby(generation)).await;
        });
    }

    /// Recompute the authoritative state and publish a change
    ///
    /// Playback takes precedence while any fragment is pending; an
    /// active recognition session otherwise determines the state.
    async fn sync_state(&mut self) {
        let next = if self.fragment_in_flight || !self.queue.is_empty() {
            SpeechState::Speaking
        } else {
            match self.session_mode {
                Some(RecognitionMode::Continuous) => SpeechState::Standby,
                Some(RecognitionMode::OneShot) => SpeechState::Listening,
                None => SpeechState::Idle,
            }
        };

        if next != self.state {
            tracing::debug!(from = ?self.state, to = ?next, "speech state changed");
            self.state = next;
            self.emit(SpeechEvent::StateChanged(next)).await;
        }
    }

    async fn emit(&self, event: SpeechEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("speech event receiver is gone");
        }
    }
}

/// Plays fragments one at a time, reporting each completion
///
/// Synthesis errors are logged and treated as completion so the queue
/// always advances.
async fn playback_task<S: Synthesizer>(
    mut synthesizer: S,
    mut rx: mpsc::Receiver<String>,
    done: mpsc::Sender<Internal>,
) {
    while let Some(fragment) = rx.recv().await {
        if let Err(e) = synthesizer.speak(&fragment).await {
            tracing::warn!(error = %e, fragment, "synthesis failed, advancing queue");
        }
        if done.send(Internal::FragmentDone).await.is_err() {
            break;
        }
    }
}
