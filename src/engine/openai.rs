// OpenAI-compatible text engine
//
// Works against any server exposing `/v1/models` and `/v1/chat/completions`
// (llama.cpp server, vLLM, Ollama's compat layer, ...). Loading a model means
// confirming the server is reachable and actually serves the identifier.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::types::{
    ChatMessage, CompletionChoice, ProgressHook, TextCompletion, TextGenerationParams,
};
use super::{TextEngine, TextEngineLoader};
use crate::config::BackendConfig;

/// Connection details shared by the loader and every engine it builds
#[derive(Clone)]
struct Endpoint {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl Endpoint {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }
}

/// Loader for OpenAI-compatible backends
pub struct OpenAiTextLoader {
    endpoint: Endpoint,
}

impl OpenAiTextLoader {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            endpoint: Endpoint {
                client,
                base_url,
                api_key,
            },
        })
    }

    /// Build a loader from the `[backend]` config section.
    /// Returns `None` when no base URL is configured.
    pub fn from_config(config: &BackendConfig) -> Result<Option<Self>> {
        let Some(base_url) = &config.base_url else {
            return Ok(None);
        };

        let loader = Self::new(
            base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Some(loader))
    }

    pub fn base_url(&self) -> &str {
        &self.endpoint.base_url
    }
}

#[async_trait]
impl TextEngineLoader for OpenAiTextLoader {
    async fn load(&self, model_id: &str, progress: ProgressHook) -> Result<Arc<dyn TextEngine>> {
        progress(0);

        let url = self.endpoint.url("/v1/models");
        tracing::debug!("Checking {} for model {}", url, model_id);

        let response = self
            .endpoint
            .authorize(self.endpoint.client.get(&url))
            .send()
            .await
            .with_context(|| format!("Failed to reach text backend at {}", self.endpoint.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Model listing failed\n\nStatus: {}\nBody: {}", status, body);
        }
        progress(50);

        let listing: ModelList = response
            .json()
            .await
            .context("Failed to parse model listing")?;

        // Some servers serve a single model and return an empty listing
        if !listing.data.is_empty() && !listing.data.iter().any(|m| m.id == model_id) {
            bail!(
                "Model '{}' is not served by {} (available: {})",
                model_id,
                self.endpoint.base_url,
                listing
                    .data
                    .iter()
                    .map(|m| m.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        progress(100);

        Ok(Arc::new(OpenAiTextEngine {
            endpoint: self.endpoint.clone(),
            model: model_id.to_string(),
        }))
    }
}

/// Text engine bound to one model on an OpenAI-compatible server
pub struct OpenAiTextEngine {
    endpoint: Endpoint,
    model: String,
}

#[async_trait]
impl TextEngine for OpenAiTextEngine {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &TextGenerationParams,
    ) -> Result<TextCompletion> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };
        let url = self.endpoint.url("/v1/chat/completions");

        let response = self
            .endpoint
            .authorize(self.endpoint.client.post(&url))
            .json(&request)
            .send()
            .await
            .context("Failed to send chat completion request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Chat completion failed\n\nStatus: {}\nBody: {}", status, body);
        }

        let reply: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        Ok(TextCompletion {
            choices: reply
                .choices
                .into_iter()
                .map(|choice| CompletionChoice {
                    content: choice.message.and_then(|m| m.content),
                })
                .collect(),
        })
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// Wire types

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_trims_trailing_slash() {
        let loader =
            OpenAiTextLoader::new("http://localhost:8080/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(loader.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_from_config_without_base_url() {
        let config = BackendConfig::default();
        assert!(OpenAiTextLoader::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_chat_request_shape() {
        let messages = [ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "m",
            messages: &messages,
            temperature: 0.7,
            max_tokens: 500,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_tolerates_missing_message() {
        let reply: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"index":0,"finish_reason":"stop"}]}"#).unwrap();
        assert_eq!(reply.choices.len(), 1);
        assert!(reply.choices[0].message.is_none());
    }
}
