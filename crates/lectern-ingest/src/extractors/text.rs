//! Plain text and markdown extractor.

use super::{DocumentExtractor, ExtractedDocument};
use crate::error::{IngestError, IngestResult};
use std::path::Path;

/// Page separator in plain text exports.
const FORM_FEED: char = '\x0C';

/// Extractor for plain text files. Form feeds separate pages.
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentExtractor for TextExtractor {
    fn extract(&self, path: &Path, bytes: &[u8]) -> IngestResult<ExtractedDocument> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| IngestError::extraction(path, format!("not valid UTF-8: {}", e)))?;

        let mut doc = ExtractedDocument::default();
        for (i, page) in content.split(FORM_FEED).enumerate() {
            doc.push_page(i as u32 + 1, page.trim_end());
        }
        Ok(doc)
    }

    fn extensions(&self) -> &[&str] {
        &["txt", "md", "markdown"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_feed_pages() {
        let doc = TextExtractor::new()
            .extract(Path::new("notes.txt"), b"first page\x0C\x0Cthird page\n")
            .unwrap();

        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[0].number, 1);
        assert_eq!(doc.pages[1].number, 3);
        assert_eq!(doc.pages[1].text, "third page");
        assert!(doc.images.is_empty());
    }

    #[test]
    fn test_invalid_utf8() {
        let err = TextExtractor::new()
            .extract(Path::new("notes.txt"), &[0xff, 0xfe, 0x00])
            .unwrap_err();
        assert!(matches!(err, IngestError::Extraction { .. }));
    }

    #[test]
    fn test_extensions() {
        let extractor = TextExtractor::new();
        assert!(extractor.supports("MD"));
        assert!(extractor.supports("txt"));
        assert!(!extractor.supports("pdf"));
    }
}
