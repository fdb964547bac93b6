//! Ollama backend
//!
//! Talks to a local Ollama daemon over its non-streaming generate endpoint.

use super::{InvokeError, ModelInvoker};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OllamaInvoker {
    client: Client,
    base_url: String,
}

impl OllamaInvoker {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Model names known to the daemon
    pub async fn list_models(&self) -> Result<Vec<String>, InvokeError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| InvokeError::network(format!("failed to reach Ollama: {e}")))?;

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| InvokeError::api(format!("failed to parse tags response: {e}")))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl ModelInvoker for OllamaInvoker {
    async fn invoke(&self, model_id: &str, prompt: &str) -> Result<String, InvokeError> {
        let request = GenerateRequest {
            model: model_id,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InvokeError::network(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    InvokeError::network(format!("connection failed: {e}"))
                } else {
                    InvokeError::network(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InvokeError::network(format!("failed to read response: {e}")))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(InvokeError::model_not_found(format!(
                "model {model_id} not found: {body}"
            )));
        }
        if !status.is_success() {
            return Err(InvokeError::api(format!("HTTP {status}: {body}")));
        }

        let generated: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| InvokeError::api(format!("failed to parse response: {e} - body: {body}")))?;

        if generated.response.trim().is_empty() {
            return Err(InvokeError::empty_response(format!(
                "model {model_id} returned an empty completion"
            )));
        }

        Ok(generated.response)
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}
