//! Lectern Core - Core types, collaborator traits and errors for the Lectern study index.

mod error;
mod manifest;
mod traits;
mod types;

pub use error::{Error, Result};
pub use manifest::{Manifest, ManifestEntry};
pub use traits::{Captioner, Completer, Embedder, ManifestStore, VectorIndex};
pub use types::*;
