//! Avatar visual state
//!
//! The avatar mirrors the conversation mode. The orchestrator owns the
//! mapping and publishes changes on a watch channel; renderers only
//! ever observe.

use crate::orchestrator::ChatMode;

/// Visual state of the assistant avatar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvatarState {
    /// Waiting for the wake phrase
    #[default]
    Resting,
    /// Actively capturing a command
    Attentive,
    /// Waiting on the model
    Thinking,
    /// Playing back a reply
    Talking,
}

impl From<ChatMode> for AvatarState {
    fn from(mode: ChatMode) -> Self {
        match mode {
            ChatMode::Standby => Self::Resting,
            ChatMode::Listening => Self::Attentive,
            ChatMode::Responding => Self::Thinking,
            ChatMode::Speaking => Self::Talking,
        }
    }
}

impl AvatarState {
    /// Status-line label for console rendering
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Resting => "resting",
            Self::Attentive => "listening",
            Self::Thinking => "thinking",
            Self::Talking => "talking",
        }
    }

    /// Status-line glyph for console rendering
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Resting => "(-_-)",
            Self::Attentive => "(o_o)",
            Self::Thinking => "(?_?)",
            Self::Talking => "(^o^)",
        }
    }
}
