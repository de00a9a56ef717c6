//! Status command - compare the manifest with the index.

use super::{format_size, get_index, load, manifest_store};
use anyhow::{Context, Result};
use colored::Colorize;
use lectern_core::{Manifest, ManifestStore, VectorIndex};
use lectern_db::SqliteIndex;
use std::collections::BTreeSet;

/// Disagreement between the manifest and the index.
#[derive(Debug, Default, PartialEq)]
struct Coverage {
    /// Listed in the manifest but absent from the index.
    missing: usize,
    /// In the index but owned by no manifest entry.
    orphaned: usize,
}

impl Coverage {
    fn is_consistent(&self) -> bool {
        self.missing == 0 && self.orphaned == 0
    }
}

/// What to tell the user when the index needs attention.
fn advice(coverage: &Coverage, stale_model: bool, intact: bool) -> Option<&'static str> {
    if !intact {
        Some("Delete the index file, run 'lectern init', then 'lectern ingest --rebuild'.")
    } else if stale_model {
        Some("Run 'lectern ingest --rebuild' to re-embed every document with the configured model.")
    } else if !coverage.is_consistent() {
        Some("Run 'lectern ingest' to repair.")
    } else {
        None
    }
}

fn coverage(manifest: &Manifest, index: &SqliteIndex) -> Result<Coverage> {
    let expected = manifest.all_artifact_ids();
    let stored: BTreeSet<_> = index.ids()?;

    Ok(Coverage {
        missing: expected.difference(&stored).count(),
        orphaned: stored.difference(&expected).count(),
    })
}

pub fn run() -> Result<()> {
    let (config, paths) = load()?;
    let index = get_index(&paths)?;
    let manifest = manifest_store(&paths)
        .load()
        .context("Failed to load manifest")?;
    let stats = index.get_stats()?;

    println!("{}", "Lectern Status".cyan().bold());
    println!("{}", "─".repeat(50));

    println!();
    println!("{}", "Sources".white().bold());
    println!("  Root: {}", config.sources.root_path().display());
    println!(
        "  Documents: {} ({} artifacts recorded)",
        manifest.len(),
        manifest.artifact_count()
    );
    if let Some(latest) = manifest.iter().map(|(_, e)| e.ingested_at).max() {
        println!("  Last ingested: {}", latest.format("%Y-%m-%d %H:%M"));
    }

    println!();
    println!("{}", "Index".white().bold());
    println!("  Artifacts: {}", stats.artifacts);
    println!("    {} Text chunks: {}", "•".dimmed(), stats.chunks);
    println!(
        "    {} Figure descriptions: {}",
        "•".dimmed(),
        stats.image_descriptions
    );
    if !stats.models.is_empty() {
        println!("  Embedding models: {}", stats.models.join(", "));
    }
    let stale_model = stats.models.len() > 1
        || stats.models.iter().any(|m| m != &config.ollama.embedding_model);
    if stale_model {
        println!(
            "  {} Index was built with a different embedding model than '{}'.",
            "!".yellow().bold(),
            config.ollama.embedding_model
        );
    }
    if let Ok(size) = SqliteIndex::file_size(&paths.index_file) {
        println!("  Size: {}", format_size(size));
    }
    let intact = index.integrity_check().context("Failed to check index integrity")?;
    println!(
        "  Integrity: {}",
        if intact { "ok".green() } else { "FAILED".red() }
    );

    println!();
    let coverage = coverage(&manifest, &index)?;
    if coverage.is_consistent() {
        println!("{} Manifest and index agree", "✓".green());
    } else {
        println!("{} Manifest and index disagree", "✗".red());
        if coverage.missing > 0 {
            println!("  {} artifacts listed in the manifest are missing", coverage.missing);
        }
        if coverage.orphaned > 0 {
            println!("  {} artifacts in the index belong to no document", coverage.orphaned);
        }
    }
    if let Some(hint) = advice(&coverage, stale_model, intact) {
        println!("  {}", hint);
    }

    Ok(())
}
