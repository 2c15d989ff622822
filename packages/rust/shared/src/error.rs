//! Error types for SourceChat.
//!
//! Library crates use [`SourceChatError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! [`SourceError`] is the per-source failure carried through the answer
//! pipeline. It never aborts an answer; the context builder simply leaves
//! the failed source out.

use std::path::PathBuf;

/// Top-level error type for SourceChat infrastructure (config, clients, files).
#[derive(Debug, thiserror::Error)]
pub enum SourceChatError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP client error.
    #[error("network error: {0}")]
    Network(String),

    /// Document or payload parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (out-of-range setting, invalid value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SourceChatError>;

impl SourceChatError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// SourceError
// ---------------------------------------------------------------------------

/// Which kind of source produced a [`SourceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// PDF could not be opened or parsed.
    Document,
    /// Web page answered with a non-200 status.
    HttpStatus,
    /// Web page could not be retrieved or decoded.
    Fetch,
}

/// Failure to obtain text from a grounding source.
///
/// `Display` renders the user-facing message; [`SourceError::marker`]
/// wraps it in brackets the way it is shown inline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("Error reading PDF: {0}")]
    Document(String),

    #[error("Error scraping website: HTTP {0}")]
    HttpStatus(u16),

    #[error("Error scraping website: {0}")]
    Fetch(String),
}

impl SourceError {
    pub fn kind(&self) -> SourceErrorKind {
        match self {
            Self::Document(_) => SourceErrorKind::Document,
            Self::HttpStatus(_) => SourceErrorKind::HttpStatus,
            Self::Fetch(_) => SourceErrorKind::Fetch,
        }
    }

    /// Bracketed inline form, e.g. `[Error scraping website: HTTP 404]`.
    pub fn marker(&self) -> String {
        format!("[{self}]")
    }
}
