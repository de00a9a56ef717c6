//! JSON file storage for the ingestion manifest.

use lectern_core::{Error, Manifest, ManifestStore, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Keeps the manifest as pretty-printed JSON on disk.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the old manifest, so a crash never leaves a half-written file.
#[derive(Debug, Clone)]
pub struct JsonManifestStore {
    path: PathBuf,
}

impl JsonManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(&self, contents: &[u8]) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ManifestStore for JsonManifestStore {
    fn load(&self) -> Result<Manifest> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No manifest yet, starting empty");
            return Ok(Manifest::new());
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Manifest(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::Manifest(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn save(&self, manifest: &Manifest) -> Result<()> {
        let mut contents = serde_json::to_vec_pretty(manifest)?;
        contents.push(b'\n');
        self.write_atomic(&contents).map_err(|e| {
            Error::Manifest(format!("failed to write {}: {}", self.path.display(), e))
        })?;
        debug!(path = %self.path.display(), documents = manifest.len(), "Saved manifest");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::{ArtifactId, Fingerprint, ManifestEntry};

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonManifestStore::new(dir.path().join("manifest.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonManifestStore::new(dir.path().join("data").join("manifest.json"));

        let mut manifest = Manifest::new();
        manifest.insert(
            "week1/intro.pdf",
            ManifestEntry::new(
                Fingerprint::from_hex("abc123"),
                vec![ArtifactId::new("week1/intro.pdf:abc123:c0")],
                42,
            ),
        );
        store.save(&manifest).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_corrupt_file_is_manifest_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonManifestStore::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
    }
}
