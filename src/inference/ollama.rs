use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{Result, TrilingoError};
use super::{ChatCompletion, ChatMessage, ChatRequest, Choice, InferenceProvider, LoadProgress, ProgressSender};

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// One line of the NDJSON stream returned by `/api/pull`
#[derive(Debug, Deserialize)]
struct PullStatus {
    #[serde(default)]
    status: String,
    total: Option<u64>,
    completed: Option<u64>,
    error: Option<String>,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Inference provider backed by a local Ollama server
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    /// Whole-request bound for show/generate/chat; idle bound between pull chunks
    timeout: Duration,
    active_model: RwLock<Option<String>>,
}

impl OllamaProvider {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        // No client-wide timeout: a pull streams for as long as the download takes
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("trilingo/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            active_model: RwLock::new(None),
        })
    }

    pub async fn active_model(&self) -> Option<String> {
        self.active_model.read().await.clone()
    }

    /// Check that the server is reachable and knows the model
    pub async fn check_availability(&self, model: &str) -> Result<()> {
        let url = format!("{}/api/show", self.endpoint);

        let response = self.client
            .post(&url)
            .timeout(self.timeout)
            .json(&json!({ "name": model }))
            .send()
            .await
            .map_err(|e| TrilingoError::ModelLoad(format!("Failed to connect to Ollama: {}", e)))?;

        if response.status().is_success() {
            info!("Ollama model '{}' is available", model);
            Ok(())
        } else {
            Err(TrilingoError::ModelLoad(format!(
                "Ollama model '{}' not found. Load it first: trilingo load --model {}",
                model, model
            )))
        }
    }

    async fn pull(&self, model: &str, progress: Option<&ProgressSender>) -> Result<()> {
        let url = format!("{}/api/pull", self.endpoint);
        debug!("Pulling model {} from {}", model, url);

        let mut response = self.client
            .post(&url)
            .json(&json!({ "name": model, "stream": true }))
            .send()
            .await
            .map_err(|e| TrilingoError::ModelLoad(format!("Failed to connect to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TrilingoError::ModelLoad(format!(
                "Ollama pull failed {}: {}", status, error_text
            )));
        }

        let mut buffer: Vec<u8> = Vec::new();
        loop {
            let next = tokio::time::timeout(self.timeout, response.chunk())
                .await
                .map_err(|_| TrilingoError::ModelLoad(format!(
                    "Pull of {} stalled: no progress for {}s", model, self.timeout.as_secs()
                )))?;
            let Some(chunk) = next? else {
                break;
            };
            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                handle_pull_line(&String::from_utf8_lossy(&line), progress)?;
            }
        }
        if !buffer.is_empty() {
            handle_pull_line(&String::from_utf8_lossy(&buffer), progress)?;
        }

        Ok(())
    }

    /// Load the model into memory so the first completion is not cold
    async fn warm(&self, model: &str) -> Result<()> {
        let url = format!("{}/api/generate", self.endpoint);

        let response = self.client
            .post(&url)
            .timeout(self.timeout)
            .json(&json!({ "model": model, "stream": false }))
            .send()
            .await
            .map_err(|e| TrilingoError::ModelLoad(format!("Failed to warm model: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TrilingoError::ModelLoad(format!(
                "Ollama could not load {} ({}): {}", model, status, error_text
            )));
        }

        Ok(())
    }
}

fn handle_pull_line(line: &str, progress: Option<&ProgressSender>) -> Result<()> {
    if let Some(event) = parse_pull_line(line)? {
        if let Some(tx) = progress {
            // Receiver may have gone away; loading continues regardless
            let _ = tx.send(event);
        }
    }
    Ok(())
}

/// Turn one NDJSON line from `/api/pull` into a progress event
fn parse_pull_line(line: &str) -> Result<Option<LoadProgress>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let status: PullStatus = serde_json::from_str(line)?;
    if let Some(error) = status.error {
        return Err(TrilingoError::ModelLoad(error));
    }

    let fraction = match (status.completed, status.total) {
        (Some(completed), Some(total)) if total > 0 => (completed as f32 / total as f32).min(1.0),
        _ if status.status == "success" => 1.0,
        _ => 0.0,
    };

    Ok(Some(LoadProgress { fraction, text: status.status }))
}

#[async_trait]
impl InferenceProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn load_model(&self, model: &str, progress: Option<ProgressSender>) -> Result<()> {
        info!("Loading model {} via Ollama", model);
        self.pull(model, progress.as_ref()).await?;
        self.warm(model).await?;

        *self.active_model.write().await = Some(model.to_string());
        info!("Model {} ready", model);
        Ok(())
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let model = self.active_model().await
            .ok_or_else(|| TrilingoError::Inference("No model loaded".to_string()))?;

        let body = OllamaChatRequest {
            model: &model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.params.temperature,
                num_predict: request.params.max_tokens,
                top_p: request.params.top_p,
            },
        };

        let url = format!("{}/api/chat", self.endpoint);
        debug!("Sending chat request to: {}", url);

        let response = self.client
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| TrilingoError::Inference(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TrilingoError::Inference(format!(
                "Ollama API error {}: {}", status, error_text
            )));
        }

        let chat: OllamaChatResponse = response.json().await
            .map_err(|e| TrilingoError::Inference(format!("Failed to parse response: {}", e)))?;

        debug!("Raw Ollama response: {}", chat.message.content);

        Ok(ChatCompletion {
            choices: vec![Choice { message: chat.message }],
        })
    }
}
