//! Lectern CLI - Ask questions about your course PDFs

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Lectern - Ask questions about your course PDFs
#[derive(Parser)]
#[command(name = "lectern")]
#[command(version)]
#[command(about = "Index your course PDFs and ask questions with cited answers", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Lectern (create config, index and manifest)
    Init,

    /// Synchronize the index with the source folder
    Ingest {
        /// Source folder (default: sources.root from config)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Skip figure extraction and captioning
        #[arg(long)]
        no_images: bool,

        /// Show what would change without touching the index
        #[arg(long)]
        dry_run: bool,

        /// Clear the index and manifest first, re-ingesting every document
        #[arg(long, conflicts_with = "dry_run")]
        rebuild: bool,
    },

    /// Ask a question about the indexed material
    Ask {
        /// Your question (omit with --interactive)
        question: Option<String>,

        /// Number of passages to retrieve (default: retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Model to use for the answer (default: ollama.model)
        #[arg(short, long)]
        model: Option<String>,

        /// Show the retrieved passages before the answer
        #[arg(long)]
        sources: bool,

        /// Ask several questions in a row
        #[arg(short, long)]
        interactive: bool,

        /// Print the whole answer at once instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },

    /// List the passages most similar to a query
    Search {
        /// Search query
        query: String,

        /// Number of passages to show (default: retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show index and manifest status
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Print the config file location
    Path,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lectern=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lectern=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Ingest {
            root,
            no_images,
            dry_run,
            rebuild,
        } => commands::ingest::run(commands::ingest::IngestOptions {
            root,
            no_images,
            dry_run,
            rebuild,
        }),
        Commands::Ask {
            question,
            top_k,
            model,
            sources,
            interactive,
            no_stream,
        } => commands::ask::run(commands::ask::AskOptions {
            question,
            top_k,
            model,
            show_sources: sources,
            interactive,
            stream: !no_stream,
        }),
        Commands::Search { query, top_k, json } => commands::search::run(&query, top_k, json),
        Commands::Status => commands::status::run(),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::show(),
            ConfigCommands::Path => commands::config::path(),
        },
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
