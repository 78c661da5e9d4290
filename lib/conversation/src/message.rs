//! Turn types for conversations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skycast_ai::{Content, ModelRole, Part};

/// The author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// User/human message.
    User,
    /// Assistant reply.
    Assistant,
}

impl TurnRole {
    /// Maps the role onto the model's vocabulary.
    #[must_use]
    pub fn model_role(self) -> ModelRole {
        match self {
            Self::User => ModelRole::User,
            Self::Assistant => ModelRole::Model,
        }
    }
}

/// One role-tagged message in a conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who wrote the turn.
    pub role: TurnRole,
    /// Turn text.
    pub content: String,
    /// When the turn was created.
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Creates a new turn.
    #[must_use]
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Creates a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    /// Creates an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    /// Converts the turn into a model content block.
    #[must_use]
    pub fn to_content(&self) -> Content {
        Content {
            role: self.role.model_role(),
            parts: vec![Part::Text(self.content.clone())],
        }
    }
}
