//! Speech engine
//!
//! Wake-word standby, one-shot command capture, and sentence-queued
//! synthesis behind a single state machine. Platform speech primitives
//! live behind the backend traits; see `console` for the CLI backend
//! and `scripted` for the test backend.

mod backend;
mod console;
mod engine;
mod scripted;
mod segment;

pub use backend::{RecognitionEvent, RecognitionFailure, RecognitionMode, Recognizer, Synthesizer};
pub use console::{ConsoleRecognizer, ConsoleSynthesizer, DisabledRecognizer};
pub use engine::{EngineStatus, SpeechEngine, SpeechEvent, SpeechHandle, SpeechState};
pub use scripted::{
    RecognizerScript, ScriptedRecognizer, ScriptedSynthesizer, SynthesizerScript,
};
pub use segment::split_fragments;
