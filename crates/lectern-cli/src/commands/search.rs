//! Search command - list the passages closest to a query.

use super::{connect_ollama, get_index, load, print_hits, retrieve};
use anyhow::{Context, Result};
use colored::Colorize;
use lectern_ollama::rag::sources_for;
use tokio::runtime::Runtime;

pub fn run(query: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let (config, paths) = load()?;
    let index = get_index(&paths)?;
    let k = top_k.unwrap_or(config.retrieval.top_k).max(1);

    let rt = Runtime::new().context("Failed to create async runtime")?;
    let hits = rt.block_on(async {
        let client = connect_ollama(&config).await?;
        retrieve(&client, &index, &config, query, k).await
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sources_for(&hits))?);
        return Ok(());
    }

    println!("{} \"{}\"", "Searching for:".cyan().bold(), query);
    println!("{}", "─".repeat(70));

    if hits.is_empty() {
        println!();
        println!("{}", "No results found.".dimmed());
        println!();
        println!("Tips:");
        println!("  • Try different wording");
        println!("  • Run 'lectern ingest' if you added material");
        return Ok(());
    }

    println!();
    println!(
        "Found {} passage{}",
        hits.len().to_string().green(),
        if hits.len() == 1 { "" } else { "s" }
    );
    println!();
    print_hits(&hits);

    Ok(())
}
