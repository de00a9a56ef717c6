//! Application paths management.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Manages all application paths following platform conventions.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    pub index_file: PathBuf,
    pub manifest_file: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    /// Create paths using platform-specific directories.
    pub fn new() -> Option<Self> {
        let proj_dirs = ProjectDirs::from("com", "lectern", "lectern")?;

        let config_dir = proj_dirs.config_dir().to_path_buf();
        let data_dir = proj_dirs.data_dir().to_path_buf();

        Some(Self::with_dirs(config_dir, data_dir))
    }

    /// Build the path set from explicit config and data directories.
    pub fn with_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_file: config_dir.join("config.toml"),
            index_file: data_dir.join("index.db"),
            manifest_file: data_dir.join("manifest.json"),
            log_dir: data_dir.join("logs"),
            config_dir,
            data_dir,
        }
    }

    /// Point the data files at `data_dir`, keeping the config location.
    pub fn with_data_dir(&self, data_dir: &Path) -> Self {
        Self::with_dirs(self.config_dir.clone(), data_dir.to_path_buf())
    }

    /// Create all necessary directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }

    /// Check if lectern has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.config_file.exists() && self.index_file.exists()
    }
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_paths_creation() {
        let paths = AppPaths::new();
        assert!(paths.is_some());

        let paths = paths.unwrap();
        assert!(paths.config_file.to_string_lossy().contains("config.toml"));
        assert!(paths.index_file.to_string_lossy().contains("index.db"));
        assert!(paths.manifest_file.to_string_lossy().contains("manifest.json"));
    }

    #[test]
    fn test_with_data_dir() {
        let paths = AppPaths::with_dirs(PathBuf::from("/cfg"), PathBuf::from("/data"));
        let moved = paths.with_data_dir(Path::new("/elsewhere"));

        assert_eq!(moved.config_file, PathBuf::from("/cfg/config.toml"));
        assert_eq!(moved.index_file, PathBuf::from("/elsewhere/index.db"));
        assert_eq!(moved.manifest_file, PathBuf::from("/elsewhere/manifest.json"));
    }

    #[test]
    fn test_expand_plain_path() {
        assert_eq!(expand_path("/tmp/notes"), PathBuf::from("/tmp/notes"));
    }
}
