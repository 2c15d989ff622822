//! Core domain types: grounding source text and conversation state.

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

// ---------------------------------------------------------------------------
// SourceText
// ---------------------------------------------------------------------------

/// Plain text extracted from one grounding source (PDF or web page).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceText {
    /// Document handle or normalized URL the text came from.
    pub origin: String,
    /// Extracted text, already bounded by the reader's character limit.
    pub text: String,
}

impl SourceText {
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
        }
    }

    /// No source was supplied.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Result of reading one grounding source.
pub type SourceOutcome = std::result::Result<SourceText, SourceError>;

/// Truncate `text` to at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
}

impl Role {
    /// Capitalized label used when rendering history (`User`, `Assistant`, `System`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::System => "System",
        }
    }
}

/// One role-tagged message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Per-conversation state owned and persisted by the caller.
///
/// Serializes as `{"history":[{"role":"user","content":"..."}]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.history.push(turn);
    }

    /// The most recent `count` turns, oldest first.
    pub fn recent(&self, count: usize) -> &[ConversationTurn] {
        let start = self.history.len().saturating_sub(count);
        &self.history[start..]
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
