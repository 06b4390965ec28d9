//! Conversation orchestrator
//!
//! One actor task owns the chat mode, the conversation history, and
//! the in-flight stream bookkeeping, bridging speech engine events to
//! streaming generation. Mode transitions are applied in one place
//! with explicit guards, so the derived mode can never drift from the
//! engine's authoritative speech state.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::avatar::AvatarState;
use crate::chat::ChatMessage;
use crate::config::Settings;
use crate::gateway::{ChatRequest, ChatStreamer, StreamEvent};
use crate::speech::{SpeechEvent, SpeechHandle, SpeechState};
use crate::{Error, Result};

/// Conversation mode, derived from speech state and stream progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// Waiting for the wake phrase
    Standby,
    /// Capturing a voice command
    Listening,
    /// A generation stream is in flight
    Responding,
    /// Playing back the reply
    Speaking,
}

/// Snapshot of the orchestrator for status rendering
#[derive(Debug, Clone)]
pub struct ChatStatus {
    /// Current mode
    pub mode: ChatMode,
    /// Recorded microphone permission error, if any
    pub permission_error: Option<String>,
}

enum Input {
    Stream(u64, StreamEvent),
    Submit(String, oneshot::Sender<Result<()>>),
    Query(oneshot::Sender<ChatStatus>),
    History(oneshot::Sender<Vec<ChatMessage>>),
}

/// Handle for driving the orchestrator actor
#[derive(Clone)]
pub struct ChatHandle {
    tx: mpsc::Sender<Input>,
}

impl ChatHandle {
    /// Submit a typed message, following the same path as a voice
    /// transcript
    ///
    /// # Errors
    ///
    /// Returns `Error::Busy` while a command is being captured or a
    /// response is streaming.
    pub async fn submit_text(&self, text: impl Into<String>) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Input::Submit(text.into(), reply_tx))
            .await
            .map_err(|_| Error::Busy("conversation has shut down".to_string()))?;
        reply_rx
            .await
            .map_err(|_| Error::Busy("conversation has shut down".to_string()))?
    }

    /// Snapshot the current status
    pub async fn status(&self) -> Option<ChatStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(Input::Query(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }

    /// Snapshot the conversation history
    pub async fn history(&self) -> Vec<ChatMessage> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Input::History(reply_tx)).await.is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }
}

/// Conversation orchestrator actor
pub struct ChatOrchestrator {
    settings: Settings,
    inference: Arc<dyn ChatStreamer>,
    speech: SpeechHandle,
    mode: ChatMode,
    history: Vec<ChatMessage>,
    last_speech_state: SpeechState,
    permission_error: Option<String>,
    stream_gen: u64,
    stream_active: bool,
    spoke_during_stream: bool,
    saw_playback_during_stream: bool,
    cancel: Option<oneshot::Sender<()>>,
    internal_tx: mpsc::Sender<Input>,
    avatar: watch::Sender<AvatarState>,
}

impl ChatOrchestrator {
    /// Spawn the orchestrator actor
    ///
    /// Standby listening starts immediately. Returns the driving
    /// handle and the avatar state channel.
    pub fn spawn(
        settings: Settings,
        inference: Arc<dyn ChatStreamer>,
        speech: SpeechHandle,
        speech_events: mpsc::Receiver<SpeechEvent>,
    ) -> (ChatHandle, watch::Receiver<AvatarState>) {
        let (internal_tx, internal_rx) = mpsc::channel(64);
        let (avatar_tx, avatar_rx) = watch::channel(AvatarState::Resting);

        let orchestrator = Self {
            settings,
            inference,
            speech,
            mode: ChatMode::Standby,
            history: Vec::new(),
            last_speech_state: SpeechState::Idle,
            permission_error: None,
            stream_gen: 0,
            stream_active: false,
            spoke_during_stream: false,
            saw_playback_during_stream: false,
            cancel: None,
            internal_tx: internal_tx.clone(),
            avatar: avatar_tx,
        };

        tokio::spawn(orchestrator.run(speech_events, internal_rx));

        (ChatHandle { tx: internal_tx }, avatar_rx)
    }

    async fn run(
        mut self,
        mut speech_events: mpsc::Receiver<SpeechEvent>,
        mut inputs: mpsc::Receiver<Input>,
    ) {
        self.speech.start_standby().await;

        loop {
            tokio::select! {
                event = speech_events.recv() => match event {
                    Some(event) => self.on_speech(event).await,
                    None => break,
                },
                input = inputs.recv() => match input {
                    Some(input) => self.on_input(input).await,
                    None => break,
                },
            }
        }

        tracing::debug!("orchestrator stopped");
    }

    async fn on_input(&mut self, input: Input) {
        match input {
            Input::Stream(generation, event) => {
                // Superseded stream; its events must not touch state.
                if generation == self.stream_gen {
                    self.on_stream(event).await;
                }
            }
            Input::Submit(text, reply) => {
                let _ = reply.send(self.on_submit(text).await);
            }
            Input::Query(reply) => {
                let _ = reply.send(ChatStatus {
                    mode: self.mode,
                    permission_error: self.permission_error.clone(),
                });
            }
            Input::History(reply) => {
                let _ = reply.send(self.history.clone());
            }
        }
    }

    async fn on_speech(&mut self, event: SpeechEvent) {
        match event {
            SpeechEvent::WakeDetected => {
                // Guard: wake only matters while waiting for it.
                if self.mode == ChatMode::Standby {
                    tracing::info!("wake detected, capturing command");
                    self.speech.clear_queue().await;
                    self.set_mode(ChatMode::Listening);
                    self.speech.start_listening().await;
                }
            }
            SpeechEvent::Transcript(text) => {
                if self.mode == ChatMode::Listening {
                    self.speech.stop().await;
                    self.start_response(text).await;
                }
            }
            SpeechEvent::StateChanged(state) => {
                self.last_speech_state = state;
                if state == SpeechState::Speaking && self.stream_active {
                    self.saw_playback_during_stream = true;
                }
                self.sync_mode().await;
            }
            SpeechEvent::PermissionDenied(reason) => {
                tracing::error!(reason, "voice input unavailable");
                self.permission_error = Some(reason);
                if self.mode == ChatMode::Listening {
                    self.set_mode(ChatMode::Standby);
                }
            }
        }
    }

    async fn on_stream(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Chunk(text) => {
                // Text and voice must carry identical content,
                // chunk-for-chunk.
                self.append_to_reply(&text);
                self.say(text).await;
            }
            StreamEvent::Error(e) => {
                let message = format!("Sorry, I hit a problem: {e}");
                tracing::warn!(error = %e, "response stream failed");
                self.replace_reply(&message);
                self.say(message).await;
            }
            StreamEvent::Complete => self.on_stream_complete().await,
        }
    }

    /// Feed text to the speech engine, noting whether it will actually
    /// queue anything
    async fn say(&mut self, text: String) {
        if !crate::speech::split_fragments(&text).is_empty() {
            self.spoke_during_stream = true;
        }
        self.speech.speak(text).await;
    }

    /// The stream finalizer ran; decide where the mode goes
    ///
    /// Playback may not have started yet (the engine processes speak
    /// commands on its own schedule) or may already have finished, so
    /// the decision uses what this stream actually queued, not just
    /// the last observed speech state.
    async fn on_stream_complete(&mut self) {
        self.stream_active = false;
        self.cancel = None;

        if self.mode != ChatMode::Responding {
            return;
        }

        let playback_finished = self.saw_playback_during_stream
            && self.last_speech_state != SpeechState::Speaking;

        if self.spoke_during_stream && !playback_finished {
            self.set_mode(ChatMode::Speaking);
        } else {
            // A silent reply, or playback already drained; don't
            // strand the mode waiting for it.
            self.return_to_standby().await;
        }
    }

    async fn on_submit(&mut self, text: String) -> Result<()> {
        if matches!(self.mode, ChatMode::Listening | ChatMode::Responding) {
            return Err(Error::Busy(format!(
                "cannot submit while {}",
                match self.mode {
                    ChatMode::Listening => "capturing a command",
                    _ => "a response is streaming",
                }
            )));
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        self.speech.stop().await;
        self.speech.clear_queue().await;
        self.start_response(trimmed.to_string()).await;
        Ok(())
    }

    /// Append the user message, install the reply placeholder, and
    /// start streaming
    async fn start_response(&mut self, text: String) {
        self.set_mode(ChatMode::Responding);
        self.spoke_during_stream = false;
        self.saw_playback_during_stream = false;
        self.history.push(ChatMessage::user(text));

        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: self.history.clone(),
            system_prompt: self.settings.system_prompt.clone(),
            temperature: self.settings.temperature(),
        };

        // Placeholder the chunks accumulate into; not part of the
        // request.
        self.history.push(ChatMessage::assistant(""));

        self.begin_stream(request);
    }

    /// Launch a stream task, superseding any in-flight one
    ///
    /// The superseded stream still finalizes, but its events carry a
    /// stale generation and are dropped.
    fn begin_stream(&mut self, request: ChatRequest) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }

        self.stream_gen += 1;
        self.stream_active = true;
        let generation = self.stream_gen;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.cancel = Some(cancel_tx);

        let (event_tx, mut event_rx) = mpsc::channel(32);
        let inference = Arc::clone(&self.inference);
        let forward = self.internal_tx.clone();

        tokio::spawn(async move {
            tokio::join!(
                inference.stream_chat(request, event_tx, cancel_rx),
                async {
                    while let Some(event) = event_rx.recv().await {
                        if forward.send(Input::Stream(generation, event)).await.is_err() {
                            break;
                        }
                    }
                }
            );
        });
    }

    fn append_to_reply(&mut self, text: &str) {
        if let Some(last) = self.history.last_mut() {
            last.content.push_str(text);
        }
    }

    fn replace_reply(&mut self, text: &str) {
        if let Some(last) = self.history.last_mut() {
            last.content = text.to_string();
        }
    }

    /// Apply the mode/speech-state synchronization rules
    ///
    /// Playback pulls the mode to `Speaking`; playback ending releases
    /// it back to `Standby`. The mode never leaves `Responding` here —
    /// that transition belongs to the stream finalizer.
    async fn sync_mode(&mut self) {
        match (self.mode, self.last_speech_state) {
            (ChatMode::Speaking, state) if state != SpeechState::Speaking => {
                self.return_to_standby().await;
            }
            (ChatMode::Standby, SpeechState::Speaking) if !self.stream_active => {
                self.set_mode(ChatMode::Speaking);
            }
            // A one-shot session that ended without a transcript; any
            // transcript was already processed ahead of this event.
            (ChatMode::Listening, SpeechState::Idle) => {
                self.return_to_standby().await;
            }
            // Standby recognition died on a platform error; nudge it
            // back up. A start that fails again emits no state change,
            // so this cannot loop.
            (ChatMode::Standby, SpeechState::Idle) => {
                self.speech.start_standby().await;
            }
            _ => {}
        }
    }

    async fn return_to_standby(&mut self) {
        self.set_mode(ChatMode::Standby);
        self.speech.start_standby().await;
    }

    fn set_mode(&mut self, mode: ChatMode) {
        if mode != self.mode {
            tracing::debug!(from = ?self.mode, to = ?mode, "chat mode changed");
            self.mode = mode;
            self.avatar.send_replace(AvatarState::from(mode));
        }
    }
}
