//! CLI command implementations.

pub mod ask;
pub mod config;
pub mod ingest;
pub mod init;
pub mod search;
pub mod status;

use anyhow::{Context, Result};
use colored::Colorize;
use lectern_config::{AppPaths, Config};
use lectern_core::{Embedder, IndexHit, VectorIndex};
use lectern_db::{JsonManifestStore, SqliteIndex};
use lectern_ollama::rag::relevant_hits;
use lectern_ollama::{OllamaClient, OllamaEmbedder};
use tracing::debug;

/// Get the application paths, honouring `general.data_dir` if the config sets one.
pub fn get_paths() -> Result<AppPaths> {
    let paths = AppPaths::new().context("Failed to determine application directories")?;
    let config = Config::load_from(&paths.config_file).context("Failed to load configuration")?;
    config.paths().context("Failed to resolve data directory")
}

/// Load configuration and the paths it resolves to.
pub fn load() -> Result<(Config, AppPaths)> {
    let paths = AppPaths::new().context("Failed to determine application directories")?;
    let config = Config::load_from(&paths.config_file).context("Failed to load configuration")?;
    let paths = config.paths().context("Failed to resolve data directory")?;
    debug!(data_dir = %paths.data_dir.display(), "Resolved paths");
    Ok((config, paths))
}

/// Open the vector index, ensuring lectern is initialized.
pub fn get_index(paths: &AppPaths) -> Result<SqliteIndex> {
    if !paths.is_initialized() {
        anyhow::bail!("Lectern is not initialized. Run 'lectern init' first.");
    }

    SqliteIndex::open(&paths.index_file).context("Failed to open index")
}

pub fn manifest_store(paths: &AppPaths) -> JsonManifestStore {
    JsonManifestStore::new(&paths.manifest_file)
}

/// Create an Ollama client and check that the server answers.
pub async fn connect_ollama(config: &Config) -> Result<OllamaClient> {
    let client =
        OllamaClient::from_config(&config.ollama).context("Failed to create Ollama client")?;

    if !client.is_available().await {
        anyhow::bail!(
            "Ollama is not running at {}. Start it with 'ollama serve'.",
            client.host()
        );
    }

    let embedding_model = &config.ollama.embedding_model;
    if let Ok(false) = client.has_model(embedding_model).await {
        anyhow::bail!(
            "Embedding model '{}' is not installed. Run 'ollama pull {}'.",
            embedding_model,
            embedding_model
        );
    }

    Ok(client)
}

/// Embed `query` and return the `k` closest artifacts above the similarity floor.
pub async fn retrieve(
    client: &OllamaClient,
    index: &SqliteIndex,
    config: &Config,
    query: &str,
    k: usize,
) -> Result<Vec<IndexHit>> {
    let embedder = OllamaEmbedder::new(client.clone(), &config.ollama.embedding_model);
    let vector = embedder
        .embed(query)
        .await
        .context("Failed to embed question")?;

    let hits = index.query(&vector, k).context("Failed to search index")?;
    let hits = relevant_hits(hits, config.retrieval.min_similarity);
    debug!(k, hits = hits.len(), "Retrieved passages");
    Ok(hits)
}

/// Print retrieved passages, numbered like the prompt's sources.
pub fn print_hits(hits: &[IndexHit]) {
    for (i, hit) in hits.iter().enumerate() {
        let kind = if hit.metadata.kind.is_image() {
            " figure".magenta().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} {} {}{} {}",
            format!("[{}]", i + 1).cyan(),
            hit.metadata.source_path.white().bold(),
            format!("p. {}", hit.metadata.pages).dimmed(),
            kind,
            format!("({:.0}%)", hit.score * 100.0).dimmed()
        );
        println!("      {}", preview(&hit.metadata.text, 200).dimmed());
    }
}

/// First `max_chars` characters of `text` on one line.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        format!("{}...", flat.chars().take(max_chars).collect::<String>())
    }
}

/// Format a file size in human-readable form.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
