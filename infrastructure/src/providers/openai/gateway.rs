//! Chat-completions gateway and session

use super::client::{HttpError, OpenAiClient};
use super::types::{ChatMessage, ChatRequest, ChatResponse, ModelList, ResponseFormat};
use async_trait::async_trait;
use sensemaker_application::{GatewayError, LlmGateway, LlmSession};
use sensemaker_domain::Model;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Generation settings shared by every session of a gateway
#[derive(Debug, Clone, Copy)]
pub struct ChatSettings {
    pub max_tokens: Option<u32>,
    pub temperature: f32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: 0.0,
        }
    }
}

/// [`LlmGateway`] backed by an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiGateway {
    client: OpenAiClient,
    settings: ChatSettings,
}

impl OpenAiGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Option<Duration>,
        settings: ChatSettings,
    ) -> Result<Self, GatewayError> {
        let client = OpenAiClient::new(base_url, api_key, timeout)?;
        info!(base_url = %client.url(""), "OpenAI-compatible gateway initialized");
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    async fn create_session_with_system_prompt(
        &self,
        model: &Model,
        system_prompt: &str,
    ) -> Result<Box<dyn LlmSession>, GatewayError> {
        Ok(Box::new(OpenAiSession::new(
            self.client.clone(),
            model.clone(),
            system_prompt,
            self.settings,
        )))
    }

    async fn available_models(&self) -> Result<Vec<Model>, GatewayError> {
        let list: ModelList = self.client.get_json("models").await?;
        Ok(list
            .data
            .into_iter()
            .map(|entry| Model::from(entry.id.as_str()))
            .collect())
    }
}

/// One conversation with the model.
///
/// The API is stateless, so the full history (system prompt included) is
/// resent on every call.
pub struct OpenAiSession {
    client: OpenAiClient,
    model: Model,
    settings: ChatSettings,
    messages: Mutex<Vec<ChatMessage>>,
}

impl OpenAiSession {
    pub fn new(
        client: OpenAiClient,
        model: Model,
        system_prompt: &str,
        settings: ChatSettings,
    ) -> Self {
        let mut messages = Vec::new();
        if !system_prompt.is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        Self {
            client,
            model,
            settings,
            messages: Mutex::new(messages),
        }
    }

    async fn complete(&self, content: &str, json_mode: bool) -> Result<String, GatewayError> {
        let mut messages = self.messages.lock().await;
        messages.push(ChatMessage::user(content));

        let request = ChatRequest {
            model: self.model.as_str(),
            messages: &messages,
            temperature: self.settings.temperature.clamp(0.0, 2.0),
            max_tokens: self.settings.max_tokens.filter(|t| *t > 0),
            response_format: json_mode.then(ResponseFormat::json_object),
        };

        debug!(
            model = %self.model,
            messages = messages.len(),
            json_mode,
            "Calling chat completions"
        );

        let result: Result<ChatResponse, HttpError> =
            self.client.post_json("chat/completions", &request).await;
        let text = match result.map_err(GatewayError::from).and_then(ChatResponse::into_text) {
            Ok(text) => text,
            Err(e) => {
                // keep history consistent for a retry on the same session
                messages.pop();
                return Err(e);
            }
        };

        messages.push(ChatMessage::assistant(text.clone()));
        Ok(text)
    }
}

#[async_trait]
impl LlmSession for OpenAiSession {
    fn model(&self) -> &Model {
        &self.model
    }

    async fn send(&self, content: &str) -> Result<String, GatewayError> {
        self.complete(content, false).await
    }

    async fn send_json(&self, content: &str) -> Result<String, GatewayError> {
        self.complete(content, self.model.supports_json_mode()).await
    }
}
