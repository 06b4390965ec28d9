//! Aura - voice-driven chat client for locally hosted language models
//!
//! This library provides the core functionality of the Aura assistant:
//! - Speech engine (wake-word standby, command capture, sentence-queued
//!   synthesis) behind swappable platform backends
//! - Conversation orchestration between speech and streamed generation
//! - Inference gateway speaking the local backend's HTTP contract
//! - Constrained-output prompting strategies
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      CLI                            │
//! │   voice loop  │  text REPL  │  playground  │ setup  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               Orchestrator + Avatar                 │
//! │   ChatMode  │  history  │  stream bookkeeping       │
//! └──────┬──────────────────────────────┬───────────────┘
//!        │                              │
//! ┌──────▼──────────────┐   ┌───────────▼───────────────┐
//! │    Speech Engine    │   │    Inference Gateway      │
//! │  standby/listen/TTS │   │  /api/tags /chat /generate│
//! └─────────────────────┘   └───────────────────────────┘
//! ```

pub mod avatar;
pub mod chat;
pub mod config;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod prompt;
pub mod setup;
pub mod speech;

pub use avatar::AvatarState;
pub use chat::{ChatMessage, Role};
pub use config::Settings;
pub use error::{Error, Result};
pub use gateway::{ChatRequest, ChatStreamer, InferenceClient, ModelEntry, StreamEvent};
pub use orchestrator::{ChatHandle, ChatMode, ChatOrchestrator, ChatStatus};
pub use speech::{SpeechEngine, SpeechEvent, SpeechHandle, SpeechState};
