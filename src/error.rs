use std::error::Error as StdError;

use thiserror::Error;

/// Syscribe's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Syscribe's crate-wide error type.
///
/// This is intentionally decoupled from `anyhow` so downstream libraries aren't forced to
/// adopt `anyhow` in their own public APIs.
#[derive(Debug, Error)]
pub enum Error {
    /// A required external command (ffmpeg, pactl, whisper-cli) is not installed.
    ///
    /// A missing system dependency is not transient; callers should report it and exit
    /// rather than retry.
    #[error("required command not found: {0}. Please install it and try again")]
    MissingDependency(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Whether this error should abort the whole session immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingDependency(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}
