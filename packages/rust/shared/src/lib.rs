//! Shared types, error model, and configuration for SourceChat.
//!
//! This crate is the foundation depended on by all other SourceChat crates.
//! It provides:
//! - [`SourceChatError`]: the infrastructure error type
//! - [`SourceError`]: typed failure of a single grounding source
//! - Domain types ([`SourceText`], [`ConversationTurn`], [`SessionState`])
//! - Configuration ([`AppConfig`], [`SourcesConfig`], [`AnswerConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnswerConfig, AppConfig, ContextSection, GeminiConfig, MODEL_OVERRIDE_ENV, SourcesConfig,
    SourcesSection, SpeechSection, config_dir, config_file_path, init_config, load_config,
    load_config_from, validate_api_key,
};
pub use error::{Result, SourceChatError, SourceError, SourceErrorKind};
pub use types::{
    ConversationTurn, Role, SessionState, SourceOutcome, SourceText, truncate_chars,
};
