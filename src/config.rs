use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, TrilingoError};

// Defaults for sections that older config files may not carry
fn default_history_limit() -> usize {
    20
}

fn default_context_messages() -> usize {
    10
}

fn default_ai_assisted() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub detection: DetectionConfig,
    pub translation: TranslationConfig,
    pub chat: ChatConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// Request timeout in seconds (model pulls can be slow)
    pub timeout_secs: u64,
    /// Model used when no default has been saved in settings
    pub default_model: String,
    /// Models offered by `trilingo models`
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Ask the model for the language when the character checks are inconclusive
    #[serde(default = "default_ai_assisted")]
    pub ai_assisted: bool,
    /// Sampling temperature for the detection prompt
    pub temperature: f32,
    /// Output token cap for the one-word answer
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Nucleus sampling threshold
    pub top_p: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    /// Maximum number of messages kept in the conversation log
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Number of most recent messages sent with each request
    #[serde(default = "default_context_messages")]
    pub context_messages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding storage.json and logs
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("storage.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("log")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                endpoint: "http://localhost:11434".to_string(),
                timeout_secs: 300,
                default_model: "llama3.2:1b".to_string(),
                models: vec![
                    "llama3.2:1b".to_string(),
                    "llama3.2:3b".to_string(),
                    "qwen2.5:1.5b".to_string(),
                    "gemma2:2b".to_string(),
                ],
            },
            detection: DetectionConfig {
                ai_assisted: true,
                temperature: 0.0,
                max_tokens: 10,
            },
            translation: TranslationConfig {
                temperature: 0.1,
                max_tokens: 200,
                top_p: 0.8,
            },
            chat: ChatConfig {
                temperature: 0.8,
                max_tokens: 1024,
                top_p: 0.9,
                history_limit: default_history_limit(),
                context_messages: default_context_messages(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from(".trilingo"),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TrilingoError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| TrilingoError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TrilingoError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TrilingoError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Write the built-in defaults to `path`. Touches nothing but that file.
    pub fn write_default<P: AsRef<Path>>(path: P, force: bool) -> Result<()> {
        let path = path.as_ref();
        if path.exists() && !force {
            return Err(TrilingoError::Config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        Self::default().save_to_file(path)
    }
}
