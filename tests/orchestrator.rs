//! Conversation orchestration tests
//!
//! Full voice-to-reply flows over scripted speech and generation
//! backends: wake, capture, stream, playback, and recovery.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use aura_assistant::avatar::AvatarState;
use aura_assistant::orchestrator::ChatMode;
use aura_assistant::speech::{
    RecognitionEvent, RecognitionMode, RecognizerScript, ScriptedRecognizer, ScriptedSynthesizer,
    SpeechEngine, SynthesizerScript,
};
use aura_assistant::{ChatHandle, ChatOrchestrator, Error, Role};

mod common;
use common::{FakeStreamer, Outcome, test_settings, wait_until};

struct Harness {
    chat: ChatHandle,
    recognizer: RecognizerScript,
    synthesizer: SynthesizerScript,
    streamer: FakeStreamer,
    avatar: watch::Receiver<AvatarState>,
}

fn spawn_chat() -> Harness {
    let (recognizer, recognizer_script) = ScriptedRecognizer::new();
    let (synthesizer, synthesizer_script) = ScriptedSynthesizer::new();
    let (speech_tx, speech_rx) = mpsc::channel(64);

    let settings = test_settings();
    let engine = SpeechEngine::spawn(
        recognizer,
        synthesizer,
        settings.trigger_phrase(),
        speech_tx,
    );

    let streamer = FakeStreamer::new();
    let (chat, avatar) =
        ChatOrchestrator::spawn(settings, Arc::new(streamer.clone()), engine, speech_rx);

    Harness {
        chat,
        recognizer: recognizer_script,
        synthesizer: synthesizer_script,
        streamer,
        avatar,
    }
}

async fn wait_for<F, Fut>(mut condition: F, what: &str)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

impl Harness {
    async fn wait_for_standby(&self) {
        let recognizer = self.recognizer.clone();
        wait_until(
            || recognizer.active_mode() == Some(RecognitionMode::Continuous),
            "standby session",
        )
        .await;
    }

    async fn wait_for_mode(&self, mode: ChatMode) {
        let chat = self.chat.clone();
        wait_for(
            || {
                let chat = chat.clone();
                async move { chat.status().await.is_some_and(|s| s.mode == mode) }
            },
            "chat mode",
        )
        .await;
    }

    /// Wake the assistant and wait for one-shot capture to begin
    async fn wake(&self) {
        self.recognizer
            .emit(RecognitionEvent::Partial("hey assistant".to_string()))
            .await;
        let recognizer = self.recognizer.clone();
        wait_until(
            || recognizer.active_mode() == Some(RecognitionMode::OneShot),
            "one-shot capture",
        )
        .await;
    }
}

#[tokio::test(start_paused = true)]
async fn voice_command_streams_to_text_and_speech() {
    let h = spawn_chat();
    h.streamer.push(Outcome::Chunks(vec!["Hi", " there", "!"]));

    h.wait_for_standby().await;
    h.wake().await;

    h.recognizer
        .emit(RecognitionEvent::Final("hello".to_string()))
        .await;

    let chat = h.chat.clone();
    wait_for(
        || {
            let chat = chat.clone();
            async move {
                let history = chat.history().await;
                history.len() == 2 && history[1].content == "Hi there!"
            }
        },
        "assembled reply",
    )
    .await;

    let history = h.chat.history().await;
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "hello");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "Hi there!");

    // Voice got the same chunks, in the same order.
    let synth = h.synthesizer.clone();
    wait_until(|| synth.spoken().len() == 3, "three fragments spoken").await;
    assert_eq!(h.synthesizer.spoken(), vec!["Hi", "there", "!"]);

    // Queue drained; back to standby listening.
    h.wait_for_mode(ChatMode::Standby).await;
    assert_eq!(
        h.recognizer.started().last(),
        Some(&RecognitionMode::Continuous)
    );
    assert_eq!(*h.avatar.borrow(), AvatarState::Resting);
}

#[tokio::test(start_paused = true)]
async fn stream_error_becomes_a_spoken_assistant_message() {
    let h = spawn_chat();
    h.streamer
        .push(Outcome::FailAfter(vec!["Hi"], "backend fell over"));

    h.wait_for_standby().await;
    h.chat.submit_text("hello").await.unwrap();

    let chat = h.chat.clone();
    wait_for(
        || {
            let chat = chat.clone();
            async move {
                let history = chat.history().await;
                history.len() == 2 && history[1].content.contains("backend fell over")
            }
        },
        "error reply",
    )
    .await;

    // One replacement message, partial chunks gone.
    let history = h.chat.history().await;
    assert_eq!(history.len(), 2);
    assert!(history[1].content.starts_with("Sorry"));
    assert!(!history[1].content.starts_with("Hi"));

    // The error text was spoken too.
    let synth = h.synthesizer.clone();
    wait_until(
        || synth.spoken().iter().any(|f| f.contains("backend fell over")),
        "spoken error",
    )
    .await;

    // The finalizer still ran; conversation recovered to standby.
    h.wait_for_mode(ChatMode::Standby).await;
}

#[tokio::test(start_paused = true)]
async fn submission_is_rejected_while_responding() {
    let h = spawn_chat();
    h.streamer.push(Outcome::Hang);

    h.wait_for_standby().await;
    h.chat.submit_text("first").await.unwrap();
    h.wait_for_mode(ChatMode::Responding).await;

    let err = h.chat.submit_text("second").await.unwrap_err();
    assert!(matches!(err, Error::Busy(_)));
}

#[tokio::test(start_paused = true)]
async fn submission_is_rejected_while_listening() {
    let h = spawn_chat();

    h.wait_for_standby().await;
    h.wake().await;
    h.wait_for_mode(ChatMode::Listening).await;

    let err = h.chat.submit_text("typed mid-capture").await.unwrap_err();
    assert!(matches!(err, Error::Busy(_)));
}

#[tokio::test(start_paused = true)]
async fn silent_reply_still_returns_to_standby() {
    let h = spawn_chat();
    h.streamer.push(Outcome::Chunks(Vec::new()));

    h.wait_for_standby().await;
    h.chat.submit_text("hello").await.unwrap();

    h.wait_for_mode(ChatMode::Standby).await;

    let history = h.chat.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, "");
    assert!(h.synthesizer.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn history_accumulates_across_turns() {
    let h = spawn_chat();
    h.streamer.push(Outcome::Chunks(vec!["Hi there!"]));

    h.wait_for_standby().await;
    h.chat.submit_text("hello").await.unwrap();
    h.wait_for_mode(ChatMode::Standby).await;

    h.streamer.push(Outcome::Chunks(vec!["Still here."]));
    h.chat.submit_text("more").await.unwrap();
    h.wait_for_mode(ChatMode::Standby).await;

    let history = h.chat.history().await;
    assert_eq!(history.len(), 4);
    assert_eq!(history[3].content, "Still here.");

    // The second request carried the full prior exchange, but not the
    // empty reply placeholder.
    let requests = h.streamer.requests();
    assert_eq!(requests.len(), 2);
    let second = &requests[1];
    assert_eq!(second.messages.len(), 3);
    assert_eq!(second.messages[1].role, Role::Assistant);
    assert_eq!(second.messages[1].content, "Hi there!");
    assert_eq!(second.messages[2].content, "more");
}

#[tokio::test(start_paused = true)]
async fn permission_denial_is_surfaced_in_status() {
    let (recognizer, recognizer_script) = ScriptedRecognizer::new();
    recognizer_script.deny_permission("microphone blocked");

    let (synthesizer, _synth_script) = ScriptedSynthesizer::new();
    let (speech_tx, speech_rx) = mpsc::channel(64);

    let settings = test_settings();
    let engine = SpeechEngine::spawn(
        recognizer,
        synthesizer,
        settings.trigger_phrase(),
        speech_tx,
    );

    let streamer = FakeStreamer::new();
    let (chat, _avatar) =
        ChatOrchestrator::spawn(settings, Arc::new(streamer), engine, speech_rx);

    wait_for(
        || {
            let chat = chat.clone();
            async move {
                chat.status()
                    .await
                    .is_some_and(|s| s.permission_error.is_some())
            }
        },
        "surfaced permission error",
    )
    .await;

    // Typed input still works while voice is unavailable.
    assert!(chat.submit_text("hello").await.is_ok());
}
