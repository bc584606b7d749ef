//! Session configuration, loadable from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables for one [`ExecutionSession`][crate::ExecutionSession].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Name this session announces itself as in logs and status records.
    pub node_name: String,
    /// Upper bound, in milliseconds, on how long the executor-facing thread
    /// waits for an acknowledgement before escalating.
    pub handoff_timeout_ms: u64,
    /// Where the action archive snapshot lives.
    pub archive_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            node_name: "taskbridge".to_string(),
            handoff_timeout_ms: 2_000,
            archive_path: PathBuf::from("action_archive.json"),
        }
    }
}

impl SessionConfig {
    /// Parse a TOML config file.  Missing fields take their defaults;
    /// unknown fields are rejected as misspellings.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&raw)?;
        debug!(path = %path.as_ref().display(), ?config, "config loaded");
        Ok(config)
    }

    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn file_with(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_usable() {
        let config = SessionConfig::default();
        assert_eq!(config.handoff_timeout(), Duration::from_secs(2));
        assert_eq!(config.archive_path, PathBuf::from("action_archive.json"));
        assert_eq!(config.node_name, "taskbridge");
    }

    #[test]
    fn empty_file_yields_defaults() {
        let file = file_with("");
        let config = SessionConfig::load(file.path()).unwrap();
        assert_eq!(config.handoff_timeout_ms, 2_000);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let file = file_with("handoff_timeout_ms = 500\n");
        let config = SessionConfig::load(file.path()).unwrap();
        assert_eq!(config.handoff_timeout(), Duration::from_millis(500));
        assert_eq!(config.node_name, "taskbridge");
    }

    #[test]
    fn full_file_parses() {
        let file = file_with(
            r#"
            node_name = "peg_in_hole"
            handoff_timeout_ms = 1500
            archive_path = "/var/lib/taskbridge/archive.json"
            "#,
        );
        let config = SessionConfig::load(file.path()).unwrap();
        assert_eq!(config.node_name, "peg_in_hole");
        assert_eq!(config.handoff_timeout_ms, 1_500);
        assert_eq!(
            config.archive_path,
            PathBuf::from("/var/lib/taskbridge/archive.json")
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let file = file_with("handof_timeout_ms = 500\n");
        let err = SessionConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SessionConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
