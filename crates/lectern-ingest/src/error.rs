//! Error types for the ingestion pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The document could not be read or parsed. Fatal for that document only.
    #[error("Extraction error for {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// The captioning collaborator failed for one image.
    #[error("Description error on page {page}: {message}")]
    Description { page: u32, message: String },

    /// Invalid settings. Aborts the pass before anything is touched.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Source root not found: {0}")]
    SourceRootNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(lectern_core::Error),
}

impl IngestError {
    pub fn extraction(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        IngestError::Extraction {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<lectern_core::Error> for IngestError {
    fn from(err: lectern_core::Error) -> Self {
        match err {
            lectern_core::Error::Index(msg) => IngestError::Index(msg),
            lectern_core::Error::Manifest(msg) => IngestError::Manifest(msg),
            lectern_core::Error::Embedding(msg) => IngestError::Embedding(msg),
            other => IngestError::Core(other),
        }
    }
}

impl From<lectern_config::ConfigError> for IngestError {
    fn from(err: lectern_config::ConfigError) -> Self {
        IngestError::Configuration(err.to_string())
    }
}
