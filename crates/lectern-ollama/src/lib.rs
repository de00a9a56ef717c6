//! Lectern Ollama - Ollama integration for embeddings, captions and answers.
//!
//! This crate provides an async client for Ollama's API, adapters that plug
//! it into the ingestion pipeline, and the retrieval-augmented answer flow.

mod adapters;
mod client;
mod error;
pub mod rag;
mod types;

pub use adapters::{OllamaCaptioner, OllamaCompleter, OllamaEmbedder};
pub use client::OllamaClient;
pub use error::{OllamaError, OllamaResult};
pub use rag::{answer, RagResponse, SourceReference};
pub use types::*;
