//! End-of-utterance scoring over the running conversation.

use serde::{Deserialize, Serialize};

use sotto_foundation::SttError;

/// Turns of context kept for the classifier; history is clipped to twice
/// this (user + assistant pairs).
pub const MAX_HISTORY_TURNS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EouConfig {
    /// Commit the pending user turn at or above this probability.
    pub threshold: f32,
    pub max_context_turns: usize,
}

impl Default for EouConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            max_context_turns: MAX_HISTORY_TURNS,
        }
    }
}

/// The end-of-utterance classifier collaborator.
///
/// A process-global singleton in practice (lazy model init behind its own
/// lock), hence `&self`.
pub trait EouModel: Send + Sync {
    /// Probability in [0, 1] that the trailing user turn is complete.
    fn predict(&self, turns: &[ConversationTurn]) -> Result<f32, SttError>;
}
