//! Initialize Lectern.

use super::get_paths;
use anyhow::{Context, Result};
use colored::Colorize;
use lectern_config::{AppPaths, Config};
use lectern_core::{Manifest, ManifestStore};
use lectern_db::{JsonManifestStore, SqliteIndex};

pub fn run() -> Result<()> {
    let paths = get_paths()?;

    if paths.is_initialized() {
        println!("{} Lectern is already initialized.", "Note:".yellow().bold());
        println!("  Config: {}", paths.config_file.display());
        println!("  Index: {}", paths.index_file.display());
        return Ok(());
    }

    println!("{}", "Initializing Lectern...".cyan().bold());
    initialize(&paths)?;

    println!("  {} Created config: {}", "✓".green(), paths.config_file.display());
    println!("  {} Created index: {}", "✓".green(), paths.index_file.display());
    println!("  {} Created manifest: {}", "✓".green(), paths.manifest_file.display());

    let config = Config::load_from(&paths.config_file).context("Failed to load configuration")?;

    println!();
    println!("{}", "Lectern initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!(
        "  1. Put your PDFs in {} (or set sources.root in the config)",
        config.sources.root.cyan()
    );
    println!("  2. Pull the models: {}", format!(
        "ollama pull {} && ollama pull {} && ollama pull {}",
        config.ollama.embedding_model, config.ollama.vision_model, config.ollama.model
    ).cyan());
    println!("  3. Build the index: {}", "lectern ingest".cyan());
    println!("  4. Ask away: {}", "lectern ask \"What is a treemap?\"".cyan());

    Ok(())
}

/// Create directories, a commented config (unless one exists), the index and an empty manifest.
fn initialize(paths: &AppPaths) -> Result<()> {
    paths.ensure_dirs().context("Failed to create directories")?;

    if !paths.config_file.exists() {
        Config::create_default_file(&paths.config_file).context("Failed to create config file")?;
    }

    SqliteIndex::open(&paths.index_file).context("Failed to initialize index")?;

    let store = JsonManifestStore::new(&paths.manifest_file);
    if !paths.manifest_file.exists() {
        store
            .save(&Manifest::new())
            .context("Failed to create manifest")?;
    }

    Ok(())
}
