//! Storage configuration and path management for canopy.
//!
//! Every file canopy writes lives under one root (default `~/.canopy/`).
//! Tests use `StorageConfig::with_root(temp_dir)` for isolation.

use crate::error::{CanopyError, Result};
use std::path::{Path, PathBuf};

/// Central configuration for all canopy storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all canopy data (default: ~/.canopy)
    root: PathBuf,
}

impl StorageConfig {
    /// Resolves the default root under the user's home directory.
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(CanopyError::HomeDirNotFound)?;
        Ok(Self {
            root: home.join(".canopy"),
        })
    }

    /// Creates a StorageConfig with a custom root directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to config.toml (runtime configuration).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Path to status-cache.json (AI status keyed by worktree path).
    pub fn status_cache_file(&self) -> PathBuf {
        self.root.join("status-cache.json")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directories
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to logs/ directory (rolling tracing output).
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Ensures the root directory and standard subdirectories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.logs_dir()] {
            fs_err::create_dir_all(&dir).map_err(|e| CanopyError::Io {
                context: format!("creating {}", dir.display()),
                source: e,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_hang_off_root() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/canopy"));
        assert_eq!(config.root(), Path::new("/tmp/canopy"));
        assert_eq!(
            config.config_file(),
            PathBuf::from("/tmp/canopy/config.toml")
        );
        assert_eq!(
            config.status_cache_file(),
            PathBuf::from("/tmp/canopy/status-cache.json")
        );
        assert_eq!(config.logs_dir(), PathBuf::from("/tmp/canopy/logs"));
    }

    #[test]
    fn test_ensure_dirs_creates_tree() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig::with_root(temp.path().join("nested").join(".canopy"));

        config.ensure_dirs().unwrap();

        assert!(config.root().is_dir());
        assert!(config.logs_dir().is_dir());
    }

    #[test]
    fn test_ensure_dirs_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig::with_root(temp.path().to_path_buf());

        config.ensure_dirs().unwrap();
        config.ensure_dirs().unwrap();
    }
}
