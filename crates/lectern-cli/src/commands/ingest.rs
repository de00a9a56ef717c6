//! Ingest command - synchronize the index with the source folder.

use super::{connect_ollama, get_index, load, manifest_store};
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use lectern_core::PassSummary;
use lectern_ingest::{ImageDescriber, SyncContext, SyncPlan, SyncSettings, Synchronizer};
use lectern_ollama::{OllamaCaptioner, OllamaEmbedder};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Flags of the `ingest` command.
pub struct IngestOptions {
    pub root: Option<PathBuf>,
    pub no_images: bool,
    pub dry_run: bool,
    pub rebuild: bool,
}

pub fn run(options: IngestOptions) -> Result<()> {
    let (mut config, paths) = load()?;
    if options.no_images {
        config.images.enabled = false;
    }

    let mut settings = SyncSettings::from_config(&config).context("Invalid configuration")?;
    if let Some(root) = options.root {
        settings.root = root;
    }

    let index = Arc::new(get_index(&paths)?);
    let ctx = SyncContext::load(Arc::new(manifest_store(&paths)))
        .context("Failed to load manifest")?;

    let rt = Runtime::new().context("Failed to create async runtime")?;

    println!("{} {}", "Scanning:".cyan(), settings.root.display());

    if options.dry_run {
        // Planning needs no models, so don't require Ollama.
        let client = lectern_ollama::OllamaClient::from_config(&config.ollama)
            .context("Failed to create Ollama client")?;
        let embedder = Arc::new(OllamaEmbedder::new(client, &config.ollama.embedding_model));
        let synchronizer = Synchronizer::new(settings, embedder, index);

        let plan = rt
            .block_on(synchronizer.plan_pass(&ctx))
            .context("Failed to scan source folder")?;
        print_plan(&plan);
        println!("\n{}", "Dry run - the index was not changed.".cyan());
        return Ok(());
    }

    let client = rt.block_on(connect_ollama(&config))?;
    let embedder = Arc::new(OllamaEmbedder::new(
        client.clone(),
        &config.ollama.embedding_model,
    ));
    let mut synchronizer = Synchronizer::new(settings, embedder, index);
    if config.images.enabled {
        let captioner = Arc::new(OllamaCaptioner::new(client, &config.ollama.vision_model));
        synchronizer = synchronizer.with_describer(ImageDescriber::new(captioner, &config.images));
    }

    if options.rebuild {
        let cleared = rt
            .block_on(synchronizer.reset(&ctx))
            .context("Failed to clear the index")?;
        println!("{} {} artifacts", "Cleared:".yellow(), cleared);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Synchronizing index (extracting, describing figures, embedding)...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = rt.block_on(synchronizer.run_pass(&ctx));
    pb.finish_and_clear();

    let summary = result.context("Ingestion pass aborted")?;
    print_summary(&summary);

    if !summary.is_clean() {
        anyhow::bail!(
            "{} document{} failed to ingest",
            summary.failed_count(),
            if summary.failed_count() == 1 { "" } else { "s" }
        );
    }

    Ok(())
}

fn print_plan(plan: &SyncPlan) {
    if plan.is_noop() {
        println!(
            "{} ({} unchanged)",
            "Index is up to date.".green(),
            plan.unchanged.len()
        );
        return;
    }

    for path in &plan.insert {
        println!("  {} {}", "+".green(), path);
    }
    for path in &plan.replace {
        println!("  {} {}", "~".yellow(), path);
    }
    for path in &plan.repair {
        println!("  {} {} {}", "~".yellow(), path, "(repair)".dimmed());
    }
    for path in &plan.remove {
        println!("  {} {}", "-".red(), path);
    }
    println!();
    println!(
        "Would add {}, update {}, remove {}; {} unchanged",
        plan.insert.len().to_string().green(),
        (plan.replace.len() + plan.repair.len()).to_string().yellow(),
        plan.remove.len().to_string().red(),
        plan.unchanged.len()
    );
}

fn print_summary(summary: &PassSummary) {
    println!("{}", "Ingestion complete".green().bold());
    println!("{}", "─".repeat(50));
    println!("  {:<12} {}", "Added:", summary.inserted);
    println!("  {:<12} {}", "Updated:", summary.updated);
    if summary.repaired > 0 {
        println!("  {:<12} {}", "Repaired:", summary.repaired);
    }
    println!("  {:<12} {}", "Removed:", summary.deleted);
    println!("  {:<12} {}", "Unchanged:", summary.unchanged);
    println!(
        "  {:<12} {} written, {} removed",
        "Artifacts:", summary.artifacts_written, summary.artifacts_removed
    );
    if summary.images_described > 0 || summary.images_failed > 0 {
        println!(
            "  {:<12} {} described{}",
            "Figures:",
            summary.images_described,
            if summary.images_failed > 0 {
                format!(", {} failed", summary.images_failed).yellow().to_string()
            } else {
                String::new()
            }
        );
    }

    if !summary.failed.is_empty() {
        println!();
        println!("{}", "Failed".red().bold());
        for failure in &summary.failed {
            println!("  {} {}: {}", "✗".red(), failure.path, failure.error);
        }
    }
}
