//! Error types for canopy-core operations.
//!
//! Most of these never reach the dashboard: the enrichment pipeline converts
//! them into deterministic fallback summaries. They exist so each layer can
//! say precisely what went wrong and so the retry loop can classify failures.

use std::path::PathBuf;

/// All errors that can occur in canopy-core operations.
#[derive(Debug, thiserror::Error)]
pub enum CanopyError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Version Control Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Version control unavailable at {root}: {details}")]
    SourceUnavailable { root: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // AI Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("AI service is not configured (no API key)")]
    AiUnconfigured,

    #[error("AI request failed: {0}")]
    AiTransport(String),

    #[error("AI returned malformed output: {0}")]
    AiMalformed(String),

    #[error("AI analysis failed after {attempts} attempts: {last_error}")]
    AiExhausted { attempts: u32, last_error: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CanopyError {
    /// Whether another attempt at the same AI request could plausibly succeed.
    ///
    /// Schema violations are retried like transport failures: the model is
    /// non-deterministic and a second sample is usually well-formed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CanopyError::AiTransport(_) | CanopyError::AiMalformed(_))
    }
}

/// Convenience type alias for Results using CanopyError.
pub type Result<T> = std::result::Result<T, CanopyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_malformed_are_retryable() {
        assert!(CanopyError::AiTransport("timeout".into()).is_retryable());
        assert!(CanopyError::AiMalformed("not json".into()).is_retryable());
    }

    #[test]
    fn configuration_states_are_not_retryable() {
        assert!(!CanopyError::AiUnconfigured.is_retryable());
        assert!(!CanopyError::AiExhausted {
            attempts: 3,
            last_error: "boom".into()
        }
        .is_retryable());
        assert!(!CanopyError::SourceUnavailable {
            root: PathBuf::from("/tmp/repo"),
            details: "not a git repository".into()
        }
        .is_retryable());
    }
}
