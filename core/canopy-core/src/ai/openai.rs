//! OpenAI Responses API client.

use super::{AiClient, AiRequest, AiResponse};
use crate::config::AiConfig;
use crate::error::{CanopyError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const ERROR_BODY_PREVIEW_CHARS: usize = 200;

pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    /// Builds a client when an API key is present in the environment.
    ///
    /// `Ok(None)` means AI is simply not configured; callers skip synthesis.
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key() else {
            tracing::info!(env = %config.api_key_env, "No AI API key set; AI summaries disabled");
            return Ok(None);
        };
        Self::new(api_key, &config.base_url, &config.model).map(Some)
    }

    pub fn new(api_key: String, base_url: &str, model: &str) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| CanopyError::AiTransport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn request_body(&self, request: &AiRequest) -> Value {
        json!({
            "model": self.model,
            "instructions": request.instructions,
            "input": request.input,
            "max_output_tokens": request.max_output_tokens,
            "reasoning": { "effort": request.reasoning_effort.as_str() },
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": request.output_schema.name,
                    "schema": request.output_schema.schema,
                    "strict": true
                }
            }
        })
    }
}

#[async_trait]
impl AiClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &AiRequest) -> Result<AiResponse> {
        let url = format!("{}/responses", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| CanopyError::AiTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (preview, _) = crate::text::truncate_chars(&body, ERROR_BODY_PREVIEW_CHARS);
            return Err(CanopyError::AiTransport(format!("HTTP {}: {}", status, preview)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CanopyError::AiMalformed(format!("undecodable response body: {}", e)))?;
        Ok(AiResponse::new(body))
    }
}
