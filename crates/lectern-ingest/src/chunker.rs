//! Fixed-size overlapping text windows with page attribution.
//!
//! Page texts are joined with a blank line into one string. A window covers
//! `window_size` characters and the next window starts `window_size - overlap`
//! characters later. Each window records the closed range of pages its span
//! touches; the separator between two pages belongs to the earlier page.

use crate::error::{IngestError, IngestResult};
use crate::extractors::ExtractedPage;
use lectern_config::ChunkingConfig;
use lectern_core::PageRange;

const PAGE_SEPARATOR: &str = "\n\n";

/// One window of the concatenated document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkWindow {
    /// Position of the window in the document, from zero.
    pub index: u32,
    pub text: String,
    pub pages: PageRange,
    /// Character offsets `[start, end)` into the joined text.
    pub start: usize,
    pub end: usize,
}

/// Splits extracted pages into overlapping windows.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    window_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker, rejecting `overlap >= window_size`.
    pub fn new(window_size: usize, overlap: usize) -> IngestResult<Self> {
        if window_size == 0 || overlap >= window_size {
            return Err(IngestError::Configuration(format!(
                "chunk overlap ({}) must be smaller than window size ({})",
                overlap, window_size
            )));
        }
        Ok(Self {
            window_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> IngestResult<Self> {
        Self::new(config.window_size, config.overlap)
    }

    /// Chunk the pages of one document. Empty input gives no windows.
    pub fn chunk(&self, pages: &[ExtractedPage]) -> Vec<ChunkWindow> {
        let (chars, page_of) = join_pages(pages);
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.window_size - self.overlap;
        let mut windows = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.window_size).min(chars.len());
            windows.push(ChunkWindow {
                index: windows.len() as u32,
                text: chars[start..end].iter().collect(),
                pages: PageRange::new(page_of[start], page_of[end - 1]),
                start,
                end,
            });

            if end == chars.len() {
                break;
            }
            start += step;
        }

        windows
    }
}

impl Default for Chunker {
    fn default() -> Self {
        let config = ChunkingConfig::default();
        Self {
            window_size: config.window_size,
            overlap: config.overlap,
        }
    }
}

/// Join page texts and map every character to its page number.
fn join_pages(pages: &[ExtractedPage]) -> (Vec<char>, Vec<u32>) {
    let mut chars = Vec::new();
    let mut page_of = Vec::new();

    for (i, page) in pages.iter().enumerate() {
        let before = chars.len();
        chars.extend(page.text.chars());
        if i + 1 < pages.len() {
            chars.extend(PAGE_SEPARATOR.chars());
        }
        page_of.resize(page_of.len() + (chars.len() - before), page.number);
    }

    (chars, page_of)
}
