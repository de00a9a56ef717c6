//! Lectern Ingest - incremental ingestion of course documents.
//!
//! This crate provides:
//! - Content fingerprints for change detection
//! - Document extraction (PDF text and figures, plain text)
//! - Overlapping chunking with page attribution
//! - Figure descriptions through a captioning model
//! - Reconciliation of the source folder against the manifest
//! - The synchronizer that keeps the vector index consistent

mod chunker;
mod describer;
mod discovery;
mod error;
mod extractors;
mod fingerprint;
mod reconcile;
mod synchronizer;

pub use chunker::{ChunkWindow, Chunker};
pub use describer::ImageDescriber;
pub use discovery::{discover, SourceFile, SourceFilter};
pub use error::{IngestError, IngestResult};
pub use extractors::{
    DocumentExtractor, ExtractedDocument, ExtractedImage, ExtractedPage, ExtractorRegistry,
    ImageFilter, PdfExtractor, TextExtractor,
};
pub use fingerprint::{fingerprint, fingerprint_file};
pub use reconcile::{reconcile, SyncPlan};
pub use synchronizer::{SyncContext, SyncSettings, Synchronizer};
