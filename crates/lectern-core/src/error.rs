//! Error types for Lectern.

use thiserror::Error;

/// Core error type, shared by the collaborator traits.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Index error: {0}")]
    Index(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Description error: {0}")]
    Description(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using Lectern's Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
