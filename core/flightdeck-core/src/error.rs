//! Error types for flightdeck-core operations.

use std::path::PathBuf;

/// All errors that can occur in flightdeck-core operations.
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Atomic write failed: {path}: {source}")]
    AtomicWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeckError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        DeckError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        DeckError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using DeckError.
pub type Result<T> = std::result::Result<T, DeckError>;
