use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::error::{Result, TrilingoError};
use crate::inference::{ChatMessage, ChatRequest, GenerationParams, InferenceProvider};

pub const WELCOME_MESSAGE: &str = "🎉 Great! I'm now ready to chat. What would you like to talk about?";

pub const REPLY_FAILED_MESSAGE: &str =
    "Sorry, I encountered an error generating a response. Please try again.";

/// Free-form conversation with a bounded, append-only history.
///
/// The history opens with the welcome message, and failed replies leave the
/// apology in place of the answer, so both are part of later context.
pub struct ChatSession {
    provider: Arc<dyn InferenceProvider>,
    config: ChatConfig,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(provider: Arc<dyn InferenceProvider>, config: ChatConfig) -> Self {
        let mut session = Self {
            provider,
            config,
            history: Vec::new(),
        };
        session.push(ChatMessage::assistant(WELCOME_MESSAGE));
        session
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Append a message, dropping the oldest entries past the limit
    pub fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
        if self.history.len() > self.config.history_limit {
            let excess = self.history.len() - self.config.history_limit;
            self.history.drain(..excess);
        }
    }

    /// Most recent messages sent to the engine as context
    fn context(&self) -> Vec<ChatMessage> {
        let start = self.history.len().saturating_sub(self.config.context_messages);
        self.history[start..].to_vec()
    }

    /// Send a user message and return the assistant's reply. Blank input is ignored.
    pub async fn send(&mut self, text: &str) -> Result<Option<String>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        self.push(ChatMessage::user(text));

        let request = ChatRequest {
            messages: self.context(),
            params: GenerationParams {
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
                top_p: Some(self.config.top_p),
            },
        };
        debug!("Sending chat with {} context messages", request.messages.len());

        match self.reply(&request).await {
            Ok(reply) => {
                self.push(ChatMessage::assistant(reply.clone()));
                info!("Chat reply received ({} chars)", reply.chars().count());
                Ok(Some(reply))
            }
            Err(e) => {
                self.push(ChatMessage::assistant(REPLY_FAILED_MESSAGE));
                Err(e)
            }
        }
    }

    async fn reply(&self, request: &ChatRequest) -> Result<String> {
        let completion = self.provider.complete(request).await?;
        completion
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| TrilingoError::Inference("Engine returned no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::inference::{ChatCompletion, MockInferenceProvider, Role};

    #[test]
    fn test_history_drops_oldest_past_limit() {
        let provider = Arc::new(MockInferenceProvider::new());
        let mut session = ChatSession::new(provider, Config::default().chat);

        for i in 0..25 {
            session.push(ChatMessage::user(format!("message {}", i)));
        }

        assert_eq!(session.history().len(), 20);
        assert_eq!(session.history()[0].content, "message 5");
        assert_eq!(session.history()[19].content, "message 24");
    }

    #[tokio::test]
    async fn test_send_uses_last_ten_messages_and_chat_params() {
        let mut provider = MockInferenceProvider::new();
        provider
            .expect_complete()
            .withf(|req| {
                req.messages.len() == 10
                    && req.messages.last().is_some_and(|m| m.role == Role::User && m.content == "latest")
                    && req.params.max_tokens == 1024
                    && req.params.top_p == Some(0.9)
            })
            .times(1)
            .returning(|_| Ok(ChatCompletion::from_text("Hi there")));

        let mut session = ChatSession::new(Arc::new(provider), Config::default().chat);
        for i in 0..12 {
            session.push(ChatMessage::user(format!("old {}", i)));
        }

        let reply = session.send("  latest ").await.unwrap();
        assert_eq!(reply.as_deref(), Some("Hi there"));
        assert_eq!(session.history().last().unwrap().role, Role::Assistant);
        assert_eq!(session.history().len(), 15);
    }

    #[test]
    fn test_new_session_opens_with_welcome() {
        let session = ChatSession::new(Arc::new(MockInferenceProvider::new()), Config::default().chat);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].role, Role::Assistant);
        assert_eq!(session.history()[0].content, WELCOME_MESSAGE);
    }

    #[tokio::test]
    async fn test_send_failure_records_apology_for_later_context() {
        let mut provider = MockInferenceProvider::new();
        let mut seq = mockall::Sequence::new();
        provider
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(TrilingoError::Inference("timeout".to_string())));
        provider
            .expect_complete()
            .withf(|req| {
                let contents: Vec<&str> = req.messages.iter().map(|m| m.content.as_str()).collect();
                contents == [WELCOME_MESSAGE, "hello", REPLY_FAILED_MESSAGE, "again"]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ChatCompletion::from_text("Hi")));

        let mut session = ChatSession::new(Arc::new(provider), Config::default().chat);
        assert!(session.send("hello").await.is_err());
        assert_eq!(session.history().len(), 3);
        assert_eq!(session.history()[1].content, "hello");
        assert_eq!(session.history()[2].content, REPLY_FAILED_MESSAGE);

        assert_eq!(session.send("again").await.unwrap().as_deref(), Some("Hi"));
    }

    #[tokio::test]
    async fn test_blank_message_is_ignored() {
        let mut provider = MockInferenceProvider::new();
        provider.expect_complete().never();

        let mut session = ChatSession::new(Arc::new(provider), Config::default().chat);
        assert_eq!(session.send("  ").await.unwrap(), None);
        assert_eq!(session.history().len(), 1);
    }
}
