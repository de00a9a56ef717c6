//! The ingestion manifest: what has been indexed, and from which content.

use crate::types::{ArtifactId, DocumentPath, Fingerprint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Current on-disk manifest format.
pub const MANIFEST_VERSION: u32 = 1;

/// Persisted record for one ingested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub fingerprint: Fingerprint,
    pub artifact_ids: Vec<ArtifactId>,
    #[serde(default)]
    pub size_bytes: u64,
    pub ingested_at: DateTime<Utc>,
}

impl ManifestEntry {
    pub fn new(fingerprint: Fingerprint, artifact_ids: Vec<ArtifactId>, size_bytes: u64) -> Self {
        Self {
            fingerprint,
            artifact_ids,
            size_bytes,
            ingested_at: Utc::now(),
        }
    }
}

/// Mapping from document path to its manifest entry.
///
/// Backed by a `BTreeMap` so serialization order never depends on insertion
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    #[serde(default)]
    documents: BTreeMap<DocumentPath, ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION,
            documents: BTreeMap::new(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.documents.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.documents.contains_key(path)
    }

    /// Insert or overwrite the entry for `path`, returning the previous one.
    pub fn insert(&mut self, path: impl Into<DocumentPath>, entry: ManifestEntry) -> Option<ManifestEntry> {
        self.documents.insert(path.into(), entry)
    }

    pub fn remove(&mut self, path: &str) -> Option<ManifestEntry> {
        self.documents.remove(path)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DocumentPath, &ManifestEntry)> {
        self.documents.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &DocumentPath> {
        self.documents.keys()
    }

    /// Union of artifact IDs across every entry.
    pub fn all_artifact_ids(&self) -> BTreeSet<ArtifactId> {
        self.documents
            .values()
            .flat_map(|entry| entry.artifact_ids.iter().cloned())
            .collect()
    }

    pub fn artifact_count(&self) -> usize {
        self.documents.values().map(|e| e.artifact_ids.len()).sum()
    }
}
