use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect whether text is Persian, English or German
    Detect {
        /// Text to classify
        text: String,

        /// Skip the model and use character and word heuristics only
        #[arg(long)]
        no_ai: bool,

        /// Model to load for AI-assisted detection
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Translate text into the two other supported languages
    Translate {
        /// Text to translate; reads lines from stdin when omitted
        text: Option<String>,

        /// Model to load (defaults to the saved default model)
        #[arg(short, long)]
        model: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Chat with the model interactively
    Chat {
        /// Model to load (defaults to the saved default model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Download and load a model, marking it as cached
    Load {
        /// Model to load (defaults to the saved default model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List available models and their cache status
    Models,

    /// Manage the model cache registry
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Handle one JSON message (getSettings, saveSettings, getSelectedText, translatePage)
    Message {
        /// Request JSON, e.g. '{"action":"getSettings"}'
        request: String,

        /// Text reported as the current selection
        #[arg(long)]
        selection: Option<String>,
    },

    /// Write a default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "trilingo.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// List models recorded as cached
    List,

    /// Forget all cached models
    Clear,
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print current settings
    Show,

    /// Update settings
    Set {
        /// Model used when none is given on the command line
        #[arg(long)]
        default_model: String,
    },
}
