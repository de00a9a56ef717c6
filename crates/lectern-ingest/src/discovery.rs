//! Finding source documents under the source root.

use crate::error::{IngestError, IngestResult};
use glob::Pattern;
use lectern_core::DocumentPath;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// A document found under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the root, `/`-separated. The document's identity.
    pub path: DocumentPath,
    pub absolute: PathBuf,
}

/// Which files under the root count as source documents.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    extensions: Vec<String>,
    ignore_patterns: Vec<Pattern>,
}

impl SourceFilter {
    /// Build a filter. An invalid glob is a configuration error.
    pub fn new(extensions: &[String], ignore_patterns: &[String]) -> IngestResult<Self> {
        let ignore_patterns = ignore_patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    IngestError::Configuration(format!("invalid ignore pattern {:?}: {}", p, e))
                })
            })
            .collect::<IngestResult<Vec<_>>>()?;

        Ok(Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            ignore_patterns,
        })
    }

    fn should_ignore(&self, path: &Path) -> bool {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };

        // Ignore hidden files
        if filename.starts_with('.') {
            return true;
        }

        self.ignore_patterns.iter().any(|p| p.matches(filename))
    }

    fn has_wanted_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|want| want.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().map_or(false, |n| n.starts_with('.'))
}

/// Scan `root` for source documents, sorted by relative path.
pub fn discover(root: &Path, filter: &SourceFilter) -> IngestResult<Vec<SourceFile>> {
    if !root.is_dir() {
        return Err(IngestError::SourceRootNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden_dir(e))
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }
        if filter.should_ignore(path) || !filter.has_wanted_extension(path) {
            continue;
        }

        if let Some(relative) = relative_path(root, path) {
            files.push(SourceFile {
                path: relative,
                absolute: path.to_path_buf(),
            });
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn relative_path(root: &Path, path: &Path) -> Option<DocumentPath> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}
