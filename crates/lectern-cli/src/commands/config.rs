//! Configuration commands.

use super::get_paths;
use anyhow::{Context, Result};
use colored::Colorize;
use lectern_config::{AppPaths, Config};

pub fn show() -> Result<()> {
    let base = AppPaths::new().context("Failed to determine application directories")?;
    let config = Config::load_from(&base.config_file).context("Failed to load configuration")?;

    println!("{}", "Current Configuration".cyan().bold());
    println!("{}", "─".repeat(50));
    if !base.config_file.exists() {
        println!(
            "{}",
            "# No config file yet; showing defaults. Run 'lectern init' to create one.".dimmed()
        );
    }
    println!("{}", config.to_toml().context("Failed to render configuration")?);

    Ok(())
}

pub fn path() -> Result<()> {
    let paths = get_paths()?;

    println!("{}", paths.config_file.display());
    println!("{} {}", "index:".dimmed(), paths.index_file.display());
    println!("{} {}", "manifest:".dimmed(), paths.manifest_file.display());

    Ok(())
}
