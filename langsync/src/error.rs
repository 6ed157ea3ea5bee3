//! All error types for the langsync crate.
//!
//! Parsers and serializers only ever surface [`Error::Format`]; raw errors from
//! the underlying markup/serialization libraries are flattened into its message.

use std::{fmt::Display, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or structurally invalid input for one specific format.
    ///
    /// Recoverable per file: the orchestrator reports it and moves on.
    #[error("{format} format error: {message}")]
    Format { format: String, message: String },

    /// Unknown format identifier. Fatal configuration error.
    #[error("unsupported format `{0}`")]
    UnsupportedFormat(String),

    #[error("invalid locale code `{0}`")]
    InvalidLocale(String),

    /// Invalid token budgets handed to the chunk planner.
    #[error("chunk planning error: {0}")]
    ChunkPlanning(String),

    /// The persisted lock file could not be decoded.
    #[error("lock file {} is corrupt: {message}", path.display())]
    LockIntegrity { path: PathBuf, message: String },

    /// A tree leaf that is neither a string nor a container.
    #[error("value at `{key}` is a {found}, expected a string")]
    NonStringLeaf { key: String, found: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps any parser/serializer failure into a [`Error::Format`].
    pub fn format(format: impl Display, message: impl Display) -> Self {
        Error::Format {
            format: format.to_string(),
            message: message.to_string(),
        }
    }

    pub fn chunk_planning(message: impl Into<String>) -> Self {
        Error::ChunkPlanning(message.into())
    }

    /// Whether the orchestrator may skip the offending file and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Format { .. } | Error::NonStringLeaf { .. } | Error::LockIntegrity { .. }
        )
    }
}
