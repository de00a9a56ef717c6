//! Document extractors: one source file in, page text and figures out.

mod pdf;
mod text;

pub use pdf::PdfExtractor;
pub use text::TextExtractor;

use crate::error::IngestResult;
use lectern_config::ImageConfig;
use std::path::Path;

/// Text of one page. Page numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub number: u32,
    pub text: String,
}

/// An embedded image worth describing.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub page: u32,
    /// Position among the images of its page.
    pub index: u32,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub media_type: &'static str,
}

/// Everything extracted from one document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    /// Non-empty pages in increasing page order.
    pub pages: Vec<ExtractedPage>,
    pub images: Vec<ExtractedImage>,
}

impl ExtractedDocument {
    /// Append a page, skipping it when its text is blank.
    pub fn push_page(&mut self, number: u32, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        debug_assert!(self.pages.last().map_or(true, |p| p.number < number));
        self.pages.push(ExtractedPage { number, text });
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.images.is_empty()
    }
}

/// Size limits below which embedded images are ignored.
#[derive(Debug, Clone, Copy)]
pub struct ImageFilter {
    pub enabled: bool,
    pub min_bytes: usize,
    pub min_dimension: u32,
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::from(&ImageConfig::default())
    }
}

impl From<&ImageConfig> for ImageFilter {
    fn from(config: &ImageConfig) -> Self {
        Self {
            enabled: config.enabled,
            min_bytes: config.min_bytes,
            min_dimension: config.min_dimension,
        }
    }
}

impl ImageFilter {
    pub fn accepts(&self, byte_len: usize, width: u32, height: u32) -> bool {
        byte_len >= self.min_bytes && width >= self.min_dimension && height >= self.min_dimension
    }
}

/// Trait for document extractors.
pub trait DocumentExtractor: Send + Sync {
    /// Extract pages and images from the raw bytes of the file at `path`.
    fn extract(&self, path: &Path, bytes: &[u8]) -> IngestResult<ExtractedDocument>;

    /// Get the supported file extensions.
    fn extensions(&self) -> &[&str];

    /// Check if this extractor supports the given extension.
    fn supports(&self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

/// Picks an extractor by file extension.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn DocumentExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// PDF and plain-text extractors with the given image limits.
    pub fn with_defaults(filter: ImageFilter) -> Self {
        Self::new()
            .with(PdfExtractor::new(filter))
            .with(TextExtractor::new())
    }

    pub fn with(mut self, extractor: impl DocumentExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    /// The extractor handling `path`, if any.
    pub fn for_path(&self, path: &Path) -> Option<&dyn DocumentExtractor> {
        let extension = path.extension().and_then(|e| e.to_str())?;
        self.extractors
            .iter()
            .find(|e| e.supports(extension))
            .map(|e| e.as_ref())
    }

    pub fn extract(&self, path: &Path, bytes: &[u8]) -> IngestResult<ExtractedDocument> {
        match self.for_path(path) {
            Some(extractor) => extractor.extract(path, bytes),
            None => Err(crate::error::IngestError::extraction(
                path,
                "no extractor for this file type",
            )),
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults(ImageFilter::default())
    }
}
