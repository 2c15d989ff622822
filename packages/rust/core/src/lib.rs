//! Answer pipeline for SourceChat.
//!
//! This crate ties the document loader and web fetcher to context assembly,
//! the language model, and speech synthesis (e.g. [`Orchestrator::answer`],
//! [`chat_turn`]).

pub mod chat;
pub mod context;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod speech;

pub use chat::{ChatReply, ChatRequest, EMPTY_REQUEST_PROMPT, WELCOME_NOTICE, chat_turn};
pub use context::{Context, ContextBuilder, build_context};
pub use llm::{GeminiClient, LanguageModel, ModelError};
pub use orchestrator::{Answer, Orchestrator};
pub use speech::{GoogleTts, SpeechError, SpeechSynthesizer};
