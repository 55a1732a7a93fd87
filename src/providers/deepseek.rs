use super::sanitize::sanitize_api_error;
use super::traits::ChatModel;
use crate::config::{Config, SamplingConfig};
use crate::error::ProviderError;
use crate::sessions::Turn;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Adapter for the DeepSeek chat-completions endpoint (and anything else
/// speaking the same wire format).
pub struct DeepSeekProvider {
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    /// Pre-computed chat completions URL.
    cached_chat_url: String,
    model: String,
    sampling: SamplingConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl DeepSeekProvider {
    pub fn new(config: &Config) -> Self {
        Self::from_parts(
            config.api_key.as_deref(),
            &config.base_url,
            &config.model,
            config.sampling,
        )
    }

    pub fn from_parts(
        api_key: Option<&str>,
        base_url: &str,
        model: &str,
        sampling: SamplingConfig,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            cached_chat_url: format!("{base_url}/chat/completions"),
            model: model.to_string(),
            sampling,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn build_request<'a>(&'a self, messages: &'a [Turn], max_tokens: u32) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|turn| WireMessage {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
            max_tokens,
            temperature: self.sampling.temperature,
            top_p: self.sampling.top_p,
            frequency_penalty: self.sampling.frequency_penalty,
            presence_penalty: self.sampling.presence_penalty,
        }
    }
}

#[async_trait]
impl ChatModel for DeepSeekProvider {
    fn has_credentials(&self) -> bool {
        self.cached_auth_header.is_some()
    }

    async fn generate(&self, messages: &[Turn], max_tokens: u32) -> Result<String, ProviderError> {
        let auth_header = self
            .cached_auth_header
            .as_ref()
            .ok_or(ProviderError::MissingCredentials)?;

        let request = self.build_request(messages, max_tokens);
        let response = self
            .client
            .post(&self.cached_chat_url)
            .header("Authorization", auth_header)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "upstream chat response");

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read upstream error body>".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: sanitize_api_error(&body),
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ProviderError::EmptyContent);
        }
        Ok(content)
    }
}
