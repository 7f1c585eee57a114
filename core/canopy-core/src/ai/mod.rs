//! Text-generation endpoint abstraction.
//!
//! The pipeline only ever needs "send instructions + input, constrained to a
//! JSON schema, get text back". [`AiClient`] is that seam; [`OpenAiClient`]
//! is the production implementation and tests script their own.

mod extract;
mod openai;

pub use extract::{extract_text, RESPONSE_MATCHERS};
pub use openai::OpenAiClient;

use crate::config::ReasoningEffort;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Named JSON schema the model output must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiRequest {
    pub instructions: String,
    pub input: String,
    pub output_schema: OutputSchema,
    pub max_output_tokens: u32,
    pub reasoning_effort: ReasoningEffort,
}

/// Raw decoded response body. Use [`AiResponse::text`] to pull out the
/// payload regardless of which response shape the endpoint used.
#[derive(Debug, Clone, PartialEq)]
pub struct AiResponse {
    pub body: Value,
}

impl AiResponse {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    pub fn text(&self) -> Option<String> {
        extract_text(&self.body)
    }
}

#[async_trait]
pub trait AiClient: Send + Sync {
    /// Identifier of the model answering requests; part of cache keys.
    fn model(&self) -> &str;

    /// Performs one request. No retries happen at this layer.
    async fn complete(&self, request: &AiRequest) -> Result<AiResponse>;
}
