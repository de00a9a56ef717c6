//! Configuration structures and loading.

use crate::error::{ConfigError, ConfigResult};
use crate::paths::{expand_path, AppPaths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub images: ImageConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> ConfigResult<Self> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields the defaults. The result is validated.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        debug!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> ConfigResult<()> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&paths.config_file)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let contents = self.to_toml()?;
        write_file(path, &contents)
    }

    /// Create a default config file with comments.
    pub fn create_default_file(path: &Path) -> ConfigResult<()> {
        write_file(path, &Self::default_config_string())
    }

    /// Check settings that would otherwise fail deep inside a pass.
    pub fn validate(&self) -> ConfigResult<()> {
        self.chunking.validate()?;

        if self.ingest.workers == 0 {
            return Err(ConfigError::Invalid("ingest.workers must be > 0".into()));
        }
        if self.images.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "images.max_concurrent must be > 0".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be > 0".into()));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_similarity) {
            return Err(ConfigError::Invalid(
                "retrieval.min_similarity must be in [-1.0, 1.0]".into(),
            ));
        }
        if self.sources.extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "sources.extensions must list at least one extension".into(),
            ));
        }
        Ok(())
    }

    /// Resolve application paths, honouring `general.data_dir`.
    pub fn paths(&self) -> ConfigResult<AppPaths> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Ok(match &self.general.data_dir {
            Some(dir) => paths.with_data_dir(&expand_path(dir)),
            None => paths,
        })
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# Lectern Configuration
# Ask questions about your course PDFs

[general]
# Data directory for the vector index and manifest
# data_dir = "~/.local/share/lectern"

[sources]
# Folder holding the course materials
root = "~/StudyPDFs"

# File extensions treated as source documents
extensions = ["pdf"]

# File name patterns to ignore
ignore_patterns = ["*.tmp", "~$*", ".DS_Store"]

[chunking]
# Characters per chunk
window_size = 1000

# Characters shared by consecutive chunks (must be < window_size)
overlap = 200

[images]
# Extract embedded figures and index a generated description of each
enabled = true

# Ignore images smaller than this many bytes
min_bytes = 10000

# Ignore images narrower or shorter than this many pixels
min_dimension = 100

# Downscale images larger than this before captioning
max_bytes = 4500000

# Concurrent captioning requests
max_concurrent = 4

[ingest]
# Documents processed concurrently
workers = 2

[ollama]
# Ollama server address
host = "http://localhost:11434"

# Model for answering questions
model = "gpt-oss:20b"

# Model for generating embeddings
embedding_model = "nomic-embed-text"

# Vision model for describing figures
vision_model = "llava"

# Request timeout in seconds
timeout_seconds = 120

[retrieval]
# Passages retrieved per question
top_k = 5

# Minimum cosine similarity for a passage to be used
min_similarity = 0.0
"#
        .to_string()
    }
}

fn write_file(path: &Path, contents: &str) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::write(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| ConfigError::write(path, e))
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub data_dir: Option<String>,
}

/// Where source documents are discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub root: String,
    pub extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            root: "~/StudyPDFs".to_string(),
            extensions: vec!["pdf".to_string()],
            ignore_patterns: vec![
                "*.tmp".to_string(),
                "~$*".to_string(),
                ".DS_Store".to_string(),
            ],
        }
    }
}

impl SourcesConfig {
    /// The source root with `~` expanded.
    pub fn root_path(&self) -> PathBuf {
        expand_path(&self.root)
    }
}

/// Text chunking parameters, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub window_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.window_size == 0 {
            return Err(ConfigError::Invalid(
                "chunking.window_size must be > 0".into(),
            ));
        }
        if self.overlap >= self.window_size {
            return Err(ConfigError::Invalid(format!(
                "chunking.overlap ({}) must be smaller than chunking.window_size ({})",
                self.overlap, self.window_size
            )));
        }
        Ok(())
    }
}

/// Image extraction and captioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub enabled: bool,
    pub min_bytes: usize,
    pub min_dimension: u32,
    pub max_bytes: usize,
    pub max_concurrent: usize,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_bytes: 10_000,
            min_dimension: 100,
            max_bytes: 4_500_000,
            max_concurrent: 4,
        }
    }
}

/// Ingestion pass settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub workers: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { workers: 2 }
    }
}

/// Ollama LLM settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub embedding_model: String,
    pub vision_model: String,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "gpt-oss:20b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            vision_model: "llava".to_string(),
            timeout_seconds: 120,
        }
    }
}

/// Question answering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub min_similarity: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_similarity: 0.0,
        }
    }
}
