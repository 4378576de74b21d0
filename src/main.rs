//! Trilingo - Persian, English and German translation on a local LLM
//!
//! Command-line front-end: loads a model through Ollama, translates text,
//! runs an interactive chat and manages the model cache registry.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trilingo::chat::{ChatSession, REPLY_FAILED_MESSAGE, WELCOME_MESSAGE};
use trilingo::cli::{Args, CacheAction, Commands, SettingsAction};
use trilingo::config::Config;
use trilingo::detect::LanguageIdentifier;
use trilingo::error::TrilingoError;
use trilingo::inference::{InferenceProvider, OllamaProvider};
use trilingo::loader::{LoadOutcome, LoadStatus, ModelLoader, StatusSender};
use trilingo::messaging::{MessageRouter, StaticSelection};
use trilingo::registry::{ModelCacheRegistry, Settings, SettingsStore};
use trilingo::store::{CacheStatusStore, JsonFileStore};
use trilingo::translate::{TranslationOrchestrator, TranslationReport};

const TRANSLATION_FAILED: &str = "❌ Translation failed. Please try again.";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Init only writes the config file; it must not create the data directory
    if let Commands::Init { output, force } = &args.command {
        Config::write_default(output, *force)?;
        println!("Wrote default configuration to {}", output.display());
        return Ok(());
    }

    let config = load_config(args.config.as_deref())?;
    setup_logging(args.verbose, &config.storage.log_dir())?;
    info!("Starting Trilingo");

    let store: Arc<dyn CacheStatusStore> = Arc::new(JsonFileStore::new(config.storage.store_path()));
    let settings = SettingsStore::new(store.clone(), config.engine.default_model.clone());
    settings.ensure_defaults().await?;
    let registry = ModelCacheRegistry::new(store.clone());

    match args.command {
        Commands::Init { .. } => {}
        Commands::Models => {
            let provider = OllamaProvider::new(&config.engine)?;
            let cached = registry.cached_models().await?;
            let default_model = settings.get_settings().await?.default_model;

            println!("\nAvailable Models:");
            println!("{:<30} {:<10} {:<10}", "Model", "Default", "On server");
            println!("{}", "-".repeat(50));
            for model in &config.engine.models {
                let label = ModelCacheRegistry::label(model, model, &cached);
                let is_default = if *model == default_model { "*" } else { "" };
                let on_server = match provider.check_availability(model).await {
                    Ok(()) => "yes",
                    Err(e) => {
                        debug!("{}", e);
                        "no"
                    }
                };
                println!("{:<30} {:<10} {:<10}", label, is_default, on_server);
            }
        }
        Commands::Cache { action } => match action {
            CacheAction::List => {
                let records = registry.records().await?;
                if records.is_empty() {
                    println!("No cached models found.");
                } else {
                    println!("\nCached Models:");
                    println!("{:<30} {:<25}", "Model", "Loaded");
                    println!("{}", "-".repeat(55));
                    for record in records {
                        let loaded = DateTime::<Utc>::from_timestamp_millis(record.timestamp)
                            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                            .unwrap_or_else(|| "unknown".to_string());
                        println!("{:<30} {:<25}", record.model_id, loaded);
                    }
                }
            }
            CacheAction::Clear => {
                let count = registry.clear().await?;
                println!("🗑️ Cache cleared successfully ({} models)", count);
            }
        },
        Commands::Settings { action } => match action {
            SettingsAction::Show => {
                let current = settings.get_settings().await?;
                println!("{}", serde_json::to_string_pretty(&current)?);
            }
            SettingsAction::Set { default_model } => {
                settings.save_settings(&Settings { default_model }).await?;
                println!("Settings saved");
            }
        },
        Commands::Message { request, selection } => {
            let router = MessageRouter::new(
                settings.clone(),
                Arc::new(StaticSelection(selection.unwrap_or_default())),
            );
            println!("{}", router.handle_json(&request).await?);
        }
        Commands::Detect { text, no_ai, model } => {
            let identifier = LanguageIdentifier::new(config.detection.clone());
            let result = if no_ai {
                identifier.detect(&text, None).await
            } else {
                let provider: Arc<dyn InferenceProvider> = Arc::new(OllamaProvider::new(&config.engine)?);
                let model = resolve_model(model, &settings).await?;
                let loader = ModelLoader::new(provider.clone(), registry.clone());
                load_with_progress(&model, |tx| loader.load(&model, Some(tx))).await?;
                identifier.detect(&text, Some(provider.as_ref())).await
            };
            println!("{} ({})", result.language.display(), result.method);
        }
        Commands::Load { model } => {
            let provider: Arc<dyn InferenceProvider> = Arc::new(OllamaProvider::new(&config.engine)?);
            let model = resolve_model(model, &settings).await?;
            let loader = ModelLoader::new(provider, registry.clone());
            let outcome = load_with_progress(&model, |tx| loader.load(&model, Some(tx))).await?;
            println!("✅ {} ready! (cached for future use)", outcome.model);
        }
        Commands::Translate { text, model, json } => {
            let provider: Arc<dyn InferenceProvider> = Arc::new(OllamaProvider::new(&config.engine)?);
            let model = resolve_model(model, &settings).await?;
            let loader = ModelLoader::new(provider.clone(), registry.clone());
            let orchestrator = TranslationOrchestrator::new(
                provider,
                loader,
                config.detection.clone(),
                config.translation.clone(),
            );

            let loaded = load_with_progress(&model, |tx| async {
                orchestrator
                    .load_model(&model, Some(tx))
                    .await
                    .and_then(|outcome| {
                        outcome.ok_or_else(|| {
                            TrilingoError::ModelLoad("Another operation is in flight".to_string())
                        })
                    })
            })
            .await?;
            info!("Using model {}", loaded.model);

            match text {
                Some(text) => {
                    if let Err(e) = translate_and_print(&orchestrator, &text, json).await {
                        eprintln!("{}", TRANSLATION_FAILED);
                        return Err(e.into());
                    }
                }
                None => {
                    eprintln!("Enter text in Persian (فارسی), English, or German (Deutsch). Ctrl-D to quit.");
                    let mut lines = BufReader::new(tokio::io::stdin()).lines();
                    while let Some(line) = lines.next_line().await? {
                        if translate_and_print(&orchestrator, &line, json).await.is_err() {
                            eprintln!("{}", TRANSLATION_FAILED);
                        }
                    }
                }
            }
        }
        Commands::Chat { model } => {
            let provider: Arc<dyn InferenceProvider> = Arc::new(OllamaProvider::new(&config.engine)?);
            let model = resolve_model(model, &settings).await?;
            let loader = ModelLoader::new(provider.clone(), registry.clone());

            if let Err(e) = load_with_progress(&model, |tx| loader.load(&model, Some(tx))).await {
                println!(
                    "Sorry, I couldn't load the model. Error: {}. Please try again or select a different model.",
                    e
                );
                return Err(e.into());
            }

            let mut session = ChatSession::new(provider, config.chat.clone());
            println!("{}", WELCOME_MESSAGE);

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                if matches!(line.trim(), "exit" | "quit") {
                    break;
                }
                match session.send(&line).await {
                    Ok(Some(reply)) => println!("\n{}\n", reply),
                    Ok(None) => {}
                    Err(e) => {
                        info!("Error generating response: {}", e);
                        println!("{}", REPLY_FAILED_MESSAGE);
                    }
                }
            }
        }
    }

    info!("Trilingo finished");
    Ok(())
}

/// `--config`, then ./trilingo.toml, then built-in defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => {
            if Path::new("trilingo.toml").exists() {
                Config::from_file("trilingo.toml")?
            } else {
                Config::default()
            }
        }
    };
    Ok(config)
}

async fn resolve_model(model: Option<String>, settings: &SettingsStore) -> trilingo::error::Result<String> {
    match model {
        Some(model) => Ok(model),
        None => Ok(settings.get_settings().await?.default_model),
    }
}

/// Run a model load while rendering its progress as a bar
async fn load_with_progress<F, Fut>(model: &str, load: F) -> trilingo::error::Result<LoadOutcome>
where
    F: FnOnce(StatusSender) -> Fut,
    Fut: std::future::Future<Output = trilingo::error::Result<LoadOutcome>>,
{
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    bar.set_message(format!("Initializing engine for {}...", model));

    let (tx, rx) = mpsc::unbounded_channel::<LoadStatus>();
    let renderer = render_progress(bar.clone(), rx);

    let result = load(tx).await;
    // Sender is gone once the load future completes, so the renderer drains and exits
    let _ = renderer.await;

    match &result {
        Ok(_) => bar.finish_with_message(format!("{} ready", model)),
        Err(e) => bar.abandon_with_message(format!("❌ Error: {}", e)),
    }
    result
}

fn render_progress(bar: ProgressBar, mut rx: mpsc::UnboundedReceiver<LoadStatus>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(status) = rx.recv().await {
            bar.set_position(status.percent as u64);
            bar.set_message(status.message());
        }
    })
}

async fn translate_and_print(
    orchestrator: &TranslationOrchestrator,
    text: &str,
    json: bool,
) -> trilingo::error::Result<()> {
    let Some(report) = orchestrator.translate(text).await? else {
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &TranslationReport) {
    println!(
        "\nDetected: {} ({})",
        report.detection.language.display(),
        report.detection.method
    );
    for result in &report.results {
        println!("\n{}", result.target_language.display());
        if result.translation_text.is_empty() {
            println!("  Translation error");
        } else {
            println!("  {}", result.translation_text);
        }
        if let Some(example) = &result.example_sentence {
            println!("  Example: {}", example);
        }
    }
    println!();
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool, log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(log_dir, "trilingo.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console output goes to stderr so stdout stays clean for results
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
        .with_ansi(false);

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    subscriber.try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("trilingo.log").display());

    Ok(())
}
