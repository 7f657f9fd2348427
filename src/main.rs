//! ollama-translate - Source Comment Translation
//!
//! Command-line host for the translator: reads source files, drives the
//! orchestrator and prints the translated comment blocks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ollama_translate::backend::BackendFactory;
use ollama_translate::cli::{Args, Commands};
use ollama_translate::comment::{aggregate, CommentRange};
use ollama_translate::config::Config;
use ollama_translate::error::TranslateError;
use ollama_translate::model::ModelState;
use ollama_translate::orchestrator::Orchestrator;
use ollama_translate::render::{render_annotated, render_summary};

/// Configuration file looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "ollama-translate.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let config_path = args.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    // Commands that write the file may create it
    let must_exist = args.config.is_some()
        && !matches!(args.command, Commands::Init { .. } | Commands::Enable | Commands::Disable);
    let stored = load_config(&config_path, must_exist)?;
    let config = stored.clone().with_overrides(
        args.overrides.language.clone(),
        args.overrides.model.clone(),
        args.overrides.address.clone(),
    );

    match args.command {
        Commands::Blocks { input, json } => {
            let document = read_document(&input).await?;
            let blocks = aggregate(&document);

            if json {
                println!("{}", serde_json::to_string_pretty(&blocks)?);
            } else if blocks.is_empty() {
                println!("No comment blocks found.");
            } else {
                println!("{:<10} {:<8} {}", "Lines", "Column", "Text");
                println!("{}", "-".repeat(60));
                for block in &blocks {
                    println!(
                        "{:<10} {:<8} {}",
                        format!("{}-{}", block.range.start_line + 1, block.range.end_line + 1),
                        block.range.start_column,
                        block.text.replace('\n', " / ")
                    );
                }
            }
        }
        Commands::Annotate { input, json, summary, no_wait } => {
            let document = read_document(&input).await?;
            let orchestrator = start_orchestrator(config)?;

            if !no_wait {
                wait_for_model(&orchestrator).await;
            }

            let outcome = orchestrator
                .update_decorations_until(&document, tokio::signal::ctrl_c())
                .await
                .map_err(|e| anyhow!("Annotation failed: {}", e))?;

            if !outcome.skipped.is_empty() {
                warn!(
                    "{} comment block(s) were not translated: {}",
                    outcome.skipped.len(),
                    orchestrator.status_message()
                );
            }

            let translations = orchestrator.decorations().current();
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if summary {
                println!("{}", render_summary(&translations));
            } else {
                println!("{}", render_annotated(&document, &translations));
            }
        }
        Commands::Translate { text, input, line } => {
            let (text, range) = select_text(text, input, line).await?;
            let orchestrator = start_orchestrator(config)?;

            if let ModelState::Failed { .. } = wait_for_model(&orchestrator).await {
                return Err(anyhow!("{}", orchestrator.status_message()));
            }

            let translation = tokio::select! {
                result = orchestrator.translate_range(&text, range) => result,
                _ = tokio::signal::ctrl_c() => {
                    orchestrator.abort();
                    Err(TranslateError::Aborted)
                }
            }
            .map_err(|e| anyhow!("Translation failed: {}", e))?;

            println!("{}", translation.text);
        }
        Commands::Status => {
            let orchestrator = start_orchestrator(config)?;
            orchestrator.lifecycle().wait_settled().await;
            println!("{}", orchestrator.status_message());
        }
        Commands::Pull => {
            let orchestrator = start_orchestrator(config)?;
            match wait_for_model(&orchestrator).await {
                ModelState::Ready => println!("{}", orchestrator.status_message()),
                _ => return Err(anyhow!("{}", orchestrator.status_message())),
            }
        }
        Commands::Enable => {
            set_enabled(stored, &config_path, true)?;
        }
        Commands::Disable => {
            set_enabled(stored, &config_path, false)?;
        }
        Commands::Init { force } => {
            if config_path.exists() && !force {
                return Err(anyhow!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                ));
            }
            Config::default().save_to_file(&config_path)?;
            println!("Wrote default configuration to {}", config_path.display());
        }
    }

    Ok(())
}

/// Load the configuration file, falling back to defaults when it is missing
/// and not required
fn load_config(path: &Path, must_exist: bool) -> Result<Config> {
    if path.exists() {
        info!("Loading configuration from {}", path.display());
        return Ok(Config::from_file(path)?);
    }

    if must_exist {
        return Err(TranslateError::FileNotFound(path.display().to_string()).into());
    }

    Ok(Config::default())
}

fn set_enabled(mut config: Config, path: &Path, enabled: bool) -> Result<()> {
    config.enabled = enabled;
    config.save_to_file(path)?;
    println!(
        "Annotations {} in {}",
        if enabled { "enabled" } else { "disabled" },
        path.display()
    );
    Ok(())
}

fn start_orchestrator(config: Config) -> Result<Orchestrator> {
    info!("Using model '{}' for {} translations", config.model, config.language);
    let backend = BackendFactory::create_backend(&config)?;
    Ok(Orchestrator::start(config, backend))
}

async fn read_document(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(TranslateError::FileNotFound(path.display().to_string()).into());
    }
    Ok(tokio::fs::read_to_string(path).await?)
}

/// Resolve what `translate` should work on: explicit text, the comment block
/// around a line of a file, or standard input
async fn select_text(
    text: Option<String>,
    input: Option<PathBuf>,
    line: Option<usize>,
) -> Result<(String, CommentRange)> {
    if let Some(text) = text {
        let range = CommentRange::line(0, text.chars().count());
        return Ok((text, range));
    }

    if let Some(input) = input {
        let line = line.ok_or_else(|| anyhow!("--line is required with --input"))?;
        let document = read_document(&input).await?;
        let index = line.saturating_sub(1);

        return aggregate(&document)
            .into_iter()
            .find(|block| block.range.start_line <= index && index <= block.range.end_line)
            .map(|block| (block.text, block.range))
            .ok_or_else(|| anyhow!("No comment block at line {} of {}", line, input.display()));
    }

    use tokio::io::AsyncReadExt;
    let mut text = String::new();
    tokio::io::stdin().read_to_string(&mut text).await?;
    let text = text.trim_end_matches('\n').to_string();
    let range = CommentRange::line(0, text.chars().count());
    Ok((text, range))
}

/// Show a spinner until the model is ready or has failed. Ctrl-C aborts.
async fn wait_for_model(orchestrator: &Orchestrator) -> ModelState {
    let mut states = orchestrator.lifecycle().subscribe();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));

    loop {
        let state = states.borrow_and_update().clone();
        spinner.set_message(orchestrator.status_message());

        if state.is_settled() {
            spinner.finish_and_clear();
            info!("{}", orchestrator.status_message());
            return state;
        }

        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    spinner.finish_and_clear();
                    return orchestrator.state();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, aborting model check");
                orchestrator.abort();
            }
        }
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".ollama-translate").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "ollama-translate.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console output goes to stderr so results on stdout stay clean
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
