//! Core domain types for Lectern.

use serde::{Deserialize, Serialize};

/// Path of a source document relative to the source root.
pub type DocumentPath = String;

/// Number of fingerprint hex characters embedded in artifact IDs.
const FINGERPRINT_PREFIX_LEN: usize = 12;

/// Content digest of a source document (lowercase hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters used to version artifact IDs.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(FINGERPRINT_PREFIX_LEN)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of an artifact in the vector index.
///
/// Derived from the document path, the document fingerprint and the
/// artifact's position, so an unchanged document always yields the same IDs
/// and a changed one never reuses the old ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// ID of the `index`-th text chunk of a document.
    pub fn chunk(path: &str, fingerprint: &Fingerprint, index: u32) -> Self {
        Self(format!("{}:{}:c{}", path, fingerprint.short(), index))
    }

    /// ID of the `image_index`-th image found on `page`.
    pub fn image(path: &str, fingerprint: &Fingerprint, page: u32, image_index: u32) -> Self {
        Self(format!(
            "{}:{}:i{}-{}",
            path,
            fingerprint.short(),
            page,
            image_index
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed range of 1-based page numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn single(page: u32) -> Self {
        Self {
            start: page,
            end: page,
        }
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// What an artifact was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A window of extracted body text.
    Chunk { index: u32 },
    /// A generated description of an embedded image.
    ImageDescription { image_index: u32 },
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Chunk { .. } => "chunk",
            ArtifactKind::ImageDescription { .. } => "image",
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ArtifactKind::ImageDescription { .. })
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata stored next to each vector in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub source_path: DocumentPath,
    pub pages: PageRange,
    pub kind: ArtifactKind,
    pub text: String,
}

/// A unit of retrievable text owned by exactly one source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextArtifact {
    pub id: ArtifactId,
    pub source_path: DocumentPath,
    pub pages: PageRange,
    pub kind: ArtifactKind,
    pub text: String,
}

impl TextArtifact {
    pub fn metadata(&self) -> ArtifactMetadata {
        ArtifactMetadata {
            source_path: self.source_path.clone(),
            pages: self.pages,
            kind: self.kind,
            text: self.text.clone(),
        }
    }
}

/// An embedded artifact ready to be written to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: ArtifactId,
    pub vector: Vec<f32>,
    pub metadata: ArtifactMetadata,
    pub model: String,
}

impl IndexRecord {
    pub fn from_artifact(artifact: &TextArtifact, vector: Vec<f32>, model: impl Into<String>) -> Self {
        Self {
            id: artifact.id.clone(),
            vector,
            metadata: artifact.metadata(),
            model: model.into(),
        }
    }
}

/// A ranked match returned by a nearest-neighbour query.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub id: ArtifactId,
    pub metadata: ArtifactMetadata,
    /// Cosine similarity (-1.0 to 1.0).
    pub score: f32,
}

/// A document that could not be processed during a pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedDocument {
    pub path: DocumentPath,
    pub error: String,
}

/// Outcome counts of one synchronization pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassSummary {
    /// Documents ingested for the first time.
    pub inserted: usize,
    /// Documents whose content changed and were replaced.
    pub updated: usize,
    /// Documents removed from the source root.
    pub deleted: usize,
    /// Unchanged documents whose artifacts were missing from the index and were rewritten.
    pub repaired: usize,
    /// Documents skipped because their fingerprint was unchanged.
    pub unchanged: usize,
    pub failed: Vec<FailedDocument>,
    pub artifacts_written: usize,
    pub artifacts_removed: usize,
    pub images_described: usize,
    pub images_failed: usize,
}

impl PassSummary {
    /// Documents whose new content reached the index.
    pub fn succeeded(&self) -> usize {
        self.inserted + self.updated + self.repaired
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Whether the pass changed the index at all.
    pub fn has_changes(&self) -> bool {
        self.inserted + self.updated + self.repaired + self.deleted > 0
    }

    pub fn record_failure(&mut self, path: impl Into<String>, error: impl std::fmt::Display) {
        self.failed.push(FailedDocument {
            path: path.into(),
            error: error.to_string(),
        });
    }
}
