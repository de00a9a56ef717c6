//! Narrow interfaces to the external collaborators.
//!
//! The ingestion pipeline only talks to embedding models, captioning models,
//! vector stores and manifest storage through these traits, so each can be
//! swapped (or faked in tests) independently.

use crate::error::Result;
use crate::manifest::Manifest;
use crate::types::{ArtifactId, DocumentPath, IndexHit, IndexRecord};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

/// Turns text into a fixed-length vector.
///
/// Implementations must be deterministic for identical text and model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier stored alongside each vector.
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Produces a short natural-language description of an image.
#[async_trait]
pub trait Captioner: Send + Sync {
    async fn caption(&self, image: &[u8], media_type: &str) -> Result<String>;
}

/// Answer synthesis. All failures surface as [`Error::Generation`](crate::Error::Generation).
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str, image: Option<&[u8]>) -> Result<String>;
}

/// Vector store keyed by artifact ID.
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite one record.
    fn upsert(&self, record: &IndexRecord) -> Result<()>;

    /// Delete one record. Deleting a missing ID is not an error.
    fn delete(&self, id: &ArtifactId) -> Result<()>;

    /// Nearest neighbours of `vector`, best first.
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>>;

    /// Every artifact ID currently stored.
    fn ids(&self) -> Result<BTreeSet<ArtifactId>>;

    /// IDs of all records whose metadata names `path` as their source.
    fn ids_for_path(&self, path: &str) -> Result<Vec<ArtifactId>>;

    /// Every stored artifact ID, grouped by source path.
    fn ids_by_path(&self) -> Result<BTreeMap<DocumentPath, BTreeSet<ArtifactId>>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Apply deletions, then upserts, as one batch.
    ///
    /// The default applies them one by one; stores with transactions should
    /// override this so a failed batch leaves nothing behind.
    fn apply(&self, deletes: &[ArtifactId], upserts: &[IndexRecord]) -> Result<()> {
        for id in deletes {
            self.delete(id)?;
        }
        for record in upserts {
            self.upsert(record)?;
        }
        Ok(())
    }
}

/// Durable storage for the [`Manifest`].
pub trait ManifestStore: Send + Sync {
    /// Load the manifest; a store that has never been written yields an empty one.
    fn load(&self) -> Result<Manifest>;

    fn save(&self, manifest: &Manifest) -> Result<()>;
}
