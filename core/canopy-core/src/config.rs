//! Runtime configuration loaded from `~/.canopy/config.toml`.
//!
//! Every section is optional; a missing file yields the defaults below.
//! AI credentials are never stored here, only the name of the environment
//! variable that holds them.

use crate::error::{CanopyError, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_MODEL: &str = "gpt-5-nano";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct CanopyConfig {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub mood: MoodConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    #[default]
    Minimal,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub max_output_tokens: u32,
    pub reasoning_effort: ReasoningEffort,
    pub max_attempts: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            max_output_tokens: 64,
            reasoning_effort: ReasoningEffort::Minimal,
            max_attempts: 3,
        }
    }
}

impl AiConfig {
    /// Reads the API key from the configured environment variable.
    /// Empty values count as absent.
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub base_branch: Option<String>,
    pub max_concurrent: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            base_branch: None,
            max_concurrent: crate::enrich::DEFAULT_MAX_CONCURRENT,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TriggerConfig {
    pub debounce_with_status_ms: u64,
    pub debounce_without_status_ms: u64,
    /// The AI runs only for diffs longer than this many characters.
    pub min_diff_chars: usize,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            debounce_with_status_ms: 60_000,
            debounce_without_status_ms: 2_000,
            min_diff_chars: crate::analysis::DEFAULT_MIN_DIFF_CHARS,
        }
    }
}

impl TriggerConfig {
    pub fn debounce_with_status(&self) -> Duration {
        Duration::from_millis(self.debounce_with_status_ms)
    }

    pub fn debounce_without_status(&self) -> Duration {
        Duration::from_millis(self.debounce_without_status_ms)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MoodConfig {
    pub active_ms: i64,
    pub cooldown_ms: i64,
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            active_ms: 30_000,
            cooldown_ms: 90_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Diff characters sent to the model.
    pub diff_chars: usize,
    /// Project-context characters sent to the model.
    pub context_chars: usize,
    /// Diff characters retained by the collector.
    pub collected_diff_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            diff_chars: 2_000,
            context_chars: 500,
            collected_diff_chars: 20_000,
        }
    }
}

/// Loads the config file, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<CanopyConfig> {
    if !path.exists() {
        return Ok(CanopyConfig::default());
    }

    let content = fs_err::read_to_string(path).map_err(|e| CanopyError::Io {
        context: format!("reading config {}", path.display()),
        source: e,
    })?;
    toml::from_str::<CanopyConfig>(&content).map_err(|e| CanopyError::ConfigMalformed {
        path: path.to_path_buf(),
        details: e.to_string(),
    })
}
