// Inference engine boundary
//
// Everything that talks to a model goes through `InferenceProvider`:
// - ollama: HTTP client for a local Ollama server
//
// Tests substitute `MockInferenceProvider` or small hand-written fakes.

pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;

pub use ollama::OllamaProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Sampling parameters passed along with every completion request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Nucleus sampling threshold; `None` leaves the engine default
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub params: GenerationParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatCompletion {
    pub choices: Vec<Choice>,
}

impl ChatCompletion {
    /// Wrap a single assistant reply
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice { message: ChatMessage::assistant(text) }],
        }
    }

    /// Text of the first candidate, the only one trilingo ever reads
    pub fn first_text(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Progress event emitted while a model is loading
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProgress {
    /// Completed fraction in 0.0..=1.0
    pub fraction: f32,
    pub text: String,
}

pub type ProgressSender = UnboundedSender<LoadProgress>;

/// External chat-completion engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Load (or reload) a model, streaming progress to `progress` when given
    async fn load_model(&self, model: &str, progress: Option<ProgressSender>) -> Result<()>;

    /// Run a chat completion against the loaded model
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion>;
}
