// SPDX-License-Identifier: MIT

//! xAI chat-completions client (OpenAI-compatible API).

use crate::error::AppError;
use crate::models::Role;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// One message in a chat-completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Language-model seam, mockable in tests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send an ordered message list; returns one assistant content string.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AppError>;
}

/// Client for the xAI chat-completions endpoint.
#[derive(Clone)]
pub struct XaiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl XaiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, "https://api.x.ai/v1")
    }

    /// Override the API base URL (tests point this at a local mock).
    pub fn with_base_url(api_key: String, model: String, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("failed building HTTP client"),
            base_url: base_url.into(),
            api_key,
            model,
        }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[async_trait]
impl ChatModel for XaiClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        let request = self.http.post(&url).bearer_auth(&self.api_key).json(&body);

        let response = super::send_with_retry(request)
            .await
            .map_err(|e| AppError::Model(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Model(format!("HTTP {}: {}", status, text)));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Model(format!("JSON parse error: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Model("empty choices in completion".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_serializes_role_lowercase() {
        let msg = ChatMessage {
            role: Role::System,
            content: "be helpful".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "be helpful");
    }
}
