//! Gate configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! head_branch = "master"
//! oracle_timeout_ms = 10000
//! action_timeout_ms = 300000
//! fork_registry = ".open-authoring.json"
//! ```

use crate::error::ConfigError;
use crate::types::{HeadBranch, DEFAULT_HEAD_BRANCH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Branch the fork must carry
    pub head_branch: String,
    /// Budget for each session/fork oracle query
    pub oracle_timeout_ms: u64,
    /// Budget for each authenticate/create-fork action (includes user
    /// interaction in the external flow)
    pub action_timeout_ms: u64,
    /// Where a file-backed fork registry lives, if any
    pub fork_registry: Option<PathBuf>,
}

impl GateConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With head branch
    #[inline]
    #[must_use]
    pub fn with_head_branch(mut self, branch: impl Into<String>) -> Self {
        self.head_branch = branch.into();
        self
    }

    /// With oracle timeout
    #[inline]
    #[must_use]
    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout_ms = duration_ms(timeout);
        self
    }

    /// With action timeout
    #[inline]
    #[must_use]
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout_ms = duration_ms(timeout);
        self
    }

    /// With file-backed fork registry
    #[inline]
    #[must_use]
    pub fn with_fork_registry(mut self, path: impl Into<PathBuf>) -> Self {
        self.fork_registry = Some(path.into());
        self
    }

    /// Head branch as a typed name
    #[inline]
    #[must_use]
    pub fn head_branch(&self) -> HeadBranch {
        HeadBranch::new(self.head_branch.clone())
    }

    /// Oracle timeout
    #[inline]
    #[must_use]
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    /// Action timeout
    #[inline]
    #[must_use]
    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// - `ConfigError::Parse` on malformed TOML or unknown keys
    /// - `ConfigError::Invalid` if validation fails
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// Same as [`GateConfig::from_toml_str`], plus `ConfigError::Io`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check field values
    ///
    /// # Errors
    /// `ConfigError::Invalid` for an empty head branch or a zero timeout
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.head_branch.trim().is_empty() {
            return Err(ConfigError::Invalid("head_branch must not be empty".into()));
        }
        if self.oracle_timeout_ms == 0 {
            return Err(ConfigError::Invalid("oracle_timeout_ms must be > 0".into()));
        }
        if self.action_timeout_ms == 0 {
            return Err(ConfigError::Invalid("action_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            head_branch: DEFAULT_HEAD_BRANCH.to_string(),
            oracle_timeout_ms: 10_000,
            action_timeout_ms: 300_000,
            fork_registry: None,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_toml_is_default() {
        let config = GateConfig::from_toml_str("").unwrap();
        assert_eq!(config, GateConfig::default());
    }

    #[test]
    fn partial_toml() {
        let config = GateConfig::from_toml_str(
            r#"
            head_branch = "main"
            fork_registry = "/tmp/fork.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.head_branch().as_str(), "main");
        assert_eq!(config.fork_registry, Some(PathBuf::from("/tmp/fork.json")));
        assert_eq!(config.oracle_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn unknown_key_rejected() {
        let err = GateConfig::from_toml_str("retries = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = GateConfig::from_toml_str("oracle_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn builder() {
        let config = GateConfig::new()
            .with_head_branch("content")
            .with_oracle_timeout(Duration::from_millis(250))
            .with_action_timeout(Duration::from_secs(1));
        assert_eq!(config.oracle_timeout_ms, 250);
        assert_eq!(config.action_timeout_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file() {
        let err = GateConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
