//! One conversational turn: answer, then record it in the session.

use std::path::PathBuf;

use tracing::{debug, instrument};

use sourcechat_shared::{ConversationTurn, SessionState};

use crate::orchestrator::Orchestrator;

/// Shown (and recorded) when a turn carries nothing to answer.
pub const EMPTY_REQUEST_PROMPT: &str = "Please enter a question, upload a PDF, or provide a URL.";

/// Greeting displayed when an interactive session starts.
pub const WELCOME_NOTICE: &str = "Ask a question, attach a PDF, or point at a URL.\n\
                                  Answers can be spoken aloud. /clear resets the conversation.";

/// Raw inputs for one turn, as a caller collects them.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub input: String,
    pub document: Option<String>,
    pub url: Option<String>,
    pub speak: bool,
}

/// What the turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    /// Nothing to answer; a prompt-for-input turn was recorded.
    Prompted(String),
    /// The orchestrator answered.
    Answered {
        text: String,
        audio_path: Option<PathBuf>,
    },
}

impl ChatReply {
    pub fn text(&self) -> &str {
        match self {
            Self::Prompted(text) => text,
            Self::Answered { text, .. } => text,
        }
    }
}

/// Run one turn against `session` and append its turns.
///
/// The orchestrator sees the history as it was before this turn.
#[instrument(skip_all, fields(history_len = session.history.len()))]
pub async fn chat_turn(
    orchestrator: &Orchestrator,
    session: &mut SessionState,
    request: ChatRequest,
) -> ChatReply {
    let input = request.input.trim();
    let url = request
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let document = request.document.as_deref().filter(|d| !d.is_empty());

    if input.is_empty() && document.is_none() && url.is_none() {
        debug!("empty request, prompting for input");
        session.push(ConversationTurn::system(EMPTY_REQUEST_PROMPT));
        return ChatReply::Prompted(EMPTY_REQUEST_PROMPT.to_string());
    }

    let answer = orchestrator
        .answer(input, document, url, Some(&*session), request.speak)
        .await;

    if !input.is_empty() {
        session.push(ConversationTurn::user(input));
    } else if let Some(url) = url {
        session.push(ConversationTurn::user(format!("URL provided: {url}")));
    }

    let (text, audio_path) = answer.into_parts();
    session.push(ConversationTurn::assistant(text.clone()));

    ChatReply::Answered { text, audio_path }
}
