//! Ask command - answer questions from the indexed course material.

use super::{connect_ollama, get_index, load, print_hits, retrieve};
use anyhow::{Context, Result};
use colored::Colorize;
use lectern_config::{AppPaths, Config};
use lectern_db::SqliteIndex;
use lectern_ollama::rag::{self, build_system_prompt, NO_CONTEXT_ANSWER};
use lectern_ollama::{OllamaClient, OllamaCompleter, SourceReference};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, Write};
use tokio::runtime::Runtime;

const ANSWER_TEMPERATURE: f32 = 0.3;

pub struct AskOptions {
    pub question: Option<String>,
    pub top_k: Option<usize>,
    pub model: Option<String>,
    pub show_sources: bool,
    pub interactive: bool,
    pub stream: bool,
}

/// Everything needed to answer one question.
struct Session<'a> {
    rt: &'a Runtime,
    client: OllamaClient,
    index: SqliteIndex,
    config: Config,
    model: String,
    top_k: usize,
    show_sources: bool,
    stream: bool,
}

pub fn run(options: AskOptions) -> Result<()> {
    let (config, paths) = load()?;

    if options.question.is_none() && !options.interactive {
        anyhow::bail!("Give a question, or use --interactive. Example: lectern ask \"What is a treemap?\"");
    }

    let index = get_index(&paths)?;
    if index.count_artifacts()? == 0 {
        anyhow::bail!("The index is empty. Run 'lectern ingest' first.");
    }

    let rt = Runtime::new().context("Failed to create async runtime")?;
    let client = rt.block_on(connect_ollama(&config))?;

    let session = Session {
        rt: &rt,
        client,
        index,
        model: options.model.unwrap_or_else(|| config.ollama.model.clone()),
        top_k: options.top_k.unwrap_or(config.retrieval.top_k).max(1),
        show_sources: options.show_sources,
        stream: options.stream,
        config,
    };

    if let Some(question) = options.question {
        session.ask(&question)?;
    }

    if options.interactive {
        interactive(&session, &paths)?;
    }

    Ok(())
}

impl Session<'_> {
    fn ask(&self, question: &str) -> Result<()> {
        println!("{} {}", "Question:".cyan().bold(), question);
        println!("{}", "─".repeat(70));

        let hits = self.rt.block_on(retrieve(
            &self.client,
            &self.index,
            &self.config,
            question,
            self.top_k,
        ))?;

        if hits.is_empty() {
            println!();
            println!("{} {}", "Note:".yellow(), NO_CONTEXT_ANSWER);
            println!();
            println!("Suggestions:");
            println!("  • Try rephrasing your question");
            println!("  • Check that the material has been ingested ('lectern status')");
            println!("  • Lower retrieval.min_similarity in the config");
            return Ok(());
        }

        if self.show_sources {
            println!();
            println!("{}", "Retrieved passages:".cyan().bold());
            print_hits(&hits);
        }
        println!();

        let sources = if self.stream {
            let (mut rx, sources) = self
                .rt
                .block_on(self.client.rag_query_stream(
                    question,
                    &hits,
                    &self.model,
                    ANSWER_TEMPERATURE,
                ))
                .context("Failed to generate answer")?;

            print!("{} ", "Answer:".green().bold());
            io::stdout().flush()?;

            self.rt.block_on(async {
                while let Some(chunk) = rx.recv().await {
                    print!("{}", chunk);
                    io::stdout().flush().ok();
                }
            });
            println!();
            sources
        } else {
            let completer = OllamaCompleter::new(self.client.clone(), &self.model)
                .with_system(build_system_prompt())
                .with_temperature(ANSWER_TEMPERATURE);
            let response = self
                .rt
                .block_on(rag::answer(&completer, question, &hits))
                .context("Failed to generate answer")?;

            println!("{}", "Answer:".green().bold());
            println!();
            println!("{}", response.answer);
            response.sources
        };

        println!();
        print_source_list(&sources);
        Ok(())
    }
}

fn print_source_list(sources: &[SourceReference]) {
    println!("{}", "─".repeat(70));
    println!("{}", "Sources:".cyan().bold());
    for (i, source) in sources.iter().enumerate() {
        println!(
            "  {}. {} {} {}",
            i + 1,
            source.source_path.white(),
            format!("p. {}", source.pages).dimmed(),
            format!("(similarity: {:.0}%)", source.score * 100.0).dimmed()
        );
    }
}

/// Question loop with line editing and history.
fn interactive(session: &Session<'_>, paths: &AppPaths) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let history_path = paths.data_dir.join("ask_history");
    let _ = rl.load_history(&history_path);

    println!();
    println!(
        "{} Type 'quit' or 'exit' to stop.",
        "Interactive mode.".cyan().bold()
    );

    loop {
        match rl.readline(&format!("\n{} ", "?".green().bold())) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if matches!(line.to_lowercase().as_str(), "quit" | "exit" | "q") {
                    break;
                }
                let _ = rl.add_history_entry(line);

                if let Err(e) = session.ask(line) {
                    eprintln!("{} {:#}", "Error:".red().bold(), e);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    println!("Goodbye!");
    let _ = rl.save_history(&history_path);
    Ok(())
}
