//! Request/response protocol between the front-end contexts.
//!
//! Requests are JSON objects tagged by `action`, e.g. `{"action":"getSettings"}`.

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TrilingoError};
use crate::registry::{Settings, SettingsStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetSettings,
    SaveSettings { settings: Settings },
    GetSelectedText,
    TranslatePage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Settings(Settings),
    SelectedText { text: String },
    Ack { success: bool },
}

/// Source of the user's current text selection
pub trait SelectionSource: Send + Sync {
    fn selected_text(&self) -> String;
}

/// Selection fixed up front, e.g. passed on the command line
#[derive(Debug, Clone, Default)]
pub struct StaticSelection(pub String);

impl SelectionSource for StaticSelection {
    fn selected_text(&self) -> String {
        self.0.clone()
    }
}

pub struct MessageRouter {
    settings: SettingsStore,
    selection: Arc<dyn SelectionSource>,
}

impl MessageRouter {
    pub fn new(settings: SettingsStore, selection: Arc<dyn SelectionSource>) -> Self {
        Self { settings, selection }
    }

    pub async fn handle(&self, request: Request) -> Result<Response> {
        debug!("Handling message {:?}", request);
        match request {
            Request::GetSettings => Ok(Response::Settings(self.settings.get_settings().await?)),
            Request::SaveSettings { settings } => {
                self.settings.save_settings(&settings).await?;
                Ok(Response::Ack { success: true })
            }
            Request::GetSelectedText => Ok(Response::SelectedText {
                text: self.selection.selected_text().trim().to_string(),
            }),
            Request::TranslatePage => {
                info!("Page translation requested");
                Ok(Response::Ack { success: true })
            }
        }
    }

    /// Parse a raw JSON request, dispatch it and serialize the response
    pub async fn handle_json(&self, raw: &str) -> Result<String> {
        let request: Request = serde_json::from_str(raw)
            .map_err(|e| TrilingoError::Messaging(format!("Invalid request: {}", e)))?;
        let response = self.handle(request).await?;
        Ok(serde_json::to_string(&response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn router(selection: &str) -> MessageRouter {
        let settings = SettingsStore::new(Arc::new(MemoryStore::new()), "llama3.2:1b");
        MessageRouter::new(settings, Arc::new(StaticSelection(selection.to_string())))
    }

    #[tokio::test]
    async fn test_settings_round_trip_through_messages() {
        let router = router("");

        let response = router.handle_json(r#"{"action":"getSettings"}"#).await.unwrap();
        assert_eq!(response, r#"{"defaultModel":"llama3.2:1b"}"#);

        let response = router
            .handle_json(r#"{"action":"saveSettings","settings":{"defaultModel":"gemma2:2b"}}"#)
            .await
            .unwrap();
        assert_eq!(response, r#"{"success":true}"#);

        let response = router.handle(Request::GetSettings).await.unwrap();
        assert_eq!(response, Response::Settings(Settings { default_model: "gemma2:2b".to_string() }));
    }

    #[tokio::test]
    async fn test_selected_text_is_trimmed() {
        let router = router("  Guten Tag \n");
        let response = router.handle(Request::GetSelectedText).await.unwrap();
        assert_eq!(response, Response::SelectedText { text: "Guten Tag".to_string() });
    }

    #[tokio::test]
    async fn test_translate_page_acknowledges() {
        let response = router("").handle_json(r#"{"action":"translatePage"}"#).await.unwrap();
        assert_eq!(response, r#"{"success":true}"#);
    }

    #[tokio::test]
    async fn test_unknown_action_is_messaging_error() {
        let err = router("").handle_json(r#"{"action":"reboot"}"#).await.unwrap_err();
        assert!(matches!(err, TrilingoError::Messaging(_)));
    }
}
