//! Diff → one-line AI status.
//!
//! Builds a bounded prompt, asks the endpoint for `{emoji, description}` and
//! retries transport and validation failures up to the attempt budget.
//! Callers turn the terminal errors into fallback summaries.

use crate::ai::{AiClient, AiRequest, OutputSchema};
use crate::config::{CanopyConfig, ReasoningEffort};
use crate::error::{CanopyError, Result};
use crate::patterns::RE_JSON_OBJECT;
use crate::text::truncate_chars;
use crate::types::AiStatus;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const STATUS_INSTRUCTIONS: &str = "You summarize in-progress work in a git working copy for a dashboard. \
Given a diff (and sometimes a short project description), reply with JSON \
{\"emoji\": <one emoji>, \"description\": <what is being worked on, at most 10 words>}. \
Describe the intent of the change, not the files touched.";

/// Tag used in fingerprints when no AI client is configured.
pub const NO_MODEL_TAG: &str = "none";

#[derive(Debug, Clone, PartialEq)]
pub struct SynthSettings {
    pub diff_chars: usize,
    pub context_chars: usize,
    pub max_output_tokens: u32,
    pub reasoning_effort: ReasoningEffort,
    pub max_attempts: u32,
}

impl SynthSettings {
    pub fn from_config(config: &CanopyConfig) -> Self {
        Self {
            diff_chars: config.limits.diff_chars,
            context_chars: config.limits.context_chars,
            max_output_tokens: config.ai.max_output_tokens,
            reasoning_effort: config.ai.reasoning_effort,
            max_attempts: config.ai.max_attempts.max(1),
        }
    }
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self::from_config(&CanopyConfig::default())
    }
}

#[derive(Debug, Deserialize)]
struct StatusAnswer {
    #[serde(default)]
    emoji: String,
    #[serde(default)]
    description: String,
}

#[derive(Clone)]
pub struct SummarySynthesizer {
    ai: Option<Arc<dyn AiClient>>,
    settings: SynthSettings,
}

impl SummarySynthesizer {
    pub fn new(ai: Option<Arc<dyn AiClient>>, settings: SynthSettings) -> Self {
        Self { ai, settings }
    }

    pub fn is_configured(&self) -> bool {
        self.ai.is_some()
    }

    pub fn settings(&self) -> &SynthSettings {
        &self.settings
    }

    /// Model identifier folded into cache fingerprints.
    pub fn model_tag(&self) -> &str {
        self.ai.as_deref().map_or(NO_MODEL_TAG, |ai| ai.model())
    }

    /// Produces a status for `diff`.
    ///
    /// Errors: [`CanopyError::AiUnconfigured`] without touching the retry
    /// budget when no client exists, [`CanopyError::AiExhausted`] once every
    /// attempt failed with a retryable error, or the first terminal error.
    pub async fn synthesize(&self, diff: &str, context: Option<&str>) -> Result<AiStatus> {
        let Some(ai) = self.ai.as_ref() else {
            return Err(CanopyError::AiUnconfigured);
        };

        let request = self.build_request(diff, context);
        let max_attempts = self.settings.max_attempts;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.attempt(ai.as_ref(), &request).await {
                Ok(status) => {
                    tracing::debug!(attempt, emoji = %status.emoji, "AI status synthesized");
                    return Ok(status);
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(attempt, max_attempts, error = %err, "AI status attempt failed");
                    last_error = err.to_string();
                }
                Err(err) => return Err(err),
            }
        }

        Err(CanopyError::AiExhausted {
            attempts: max_attempts,
            last_error,
        })
    }

    async fn attempt(&self, ai: &dyn AiClient, request: &AiRequest) -> Result<AiStatus> {
        let response = ai.complete(request).await?;
        let text = response
            .text()
            .ok_or_else(|| CanopyError::AiMalformed("response carried no text".to_string()))?;
        parse_status(&text)
    }

    fn build_request(&self, diff: &str, context: Option<&str>) -> AiRequest {
        let (diff, diff_cut) = truncate_chars(diff, self.settings.diff_chars);
        let mut input = String::new();
        if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
            let (context, _) = truncate_chars(context, self.settings.context_chars);
            input.push_str("Project context:\n");
            input.push_str(&context);
            input.push_str("\n\n");
        }
        input.push_str("Diff:\n");
        input.push_str(&diff);
        if diff_cut {
            input.push_str("\n[diff truncated]");
        }

        AiRequest {
            instructions: STATUS_INSTRUCTIONS.to_string(),
            input,
            output_schema: status_schema(),
            max_output_tokens: self.settings.max_output_tokens,
            reasoning_effort: self.settings.reasoning_effort,
        }
    }
}

/// Validates model output. Length is never a rejection reason.
fn parse_status(text: &str) -> Result<AiStatus> {
    let answer = serde_json::from_str::<StatusAnswer>(text.trim())
        .or_else(|first_err| {
            RE_JSON_OBJECT
                .find(text)
                .and_then(|m| serde_json::from_str::<StatusAnswer>(m.as_str()).ok())
                .ok_or(first_err)
        })
        .map_err(|e| CanopyError::AiMalformed(format!("status is not valid JSON: {}", e)))?;

    let emoji = answer.emoji.trim();
    let description = answer.description.trim();
    if emoji.is_empty() || description.is_empty() {
        return Err(CanopyError::AiMalformed(
            "status is missing emoji or description".to_string(),
        ));
    }
    Ok(AiStatus {
        emoji: emoji.to_string(),
        description: description.to_string(),
    })
}

fn status_schema() -> OutputSchema {
    OutputSchema {
        name: "worktree_status".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "emoji": { "type": "string" },
                "description": { "type": "string" }
            },
            "required": ["emoji", "description"],
            "additionalProperties": false
        }),
    }
}
