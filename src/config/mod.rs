//! Client configuration
//!
//! Loaded from a TOML file (default `calcbox.toml` in the working directory)
//! with built-in defaults for every field, so a missing file is not an error
//! for the CLI.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default service address
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:11000";

/// Default delay between status polls, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default per-request timeout, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Client configuration (calcbox.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the calculation service
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Delay between consecutive status polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Optional bound on status polls per operation; absent = unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_polls: Option<u32>,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_polls: None,
        }
    }
}

impl ClientConfig {
    /// Parse from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load from a file if it exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::Invalid("server_url must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be at least 1".into(),
            ));
        }
        if let Some(0) = self.max_polls {
            return Err(ConfigError::Invalid("max_polls must be at least 1".into()));
        }
        Ok(())
    }

    /// Poll cadence as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.max_polls.is_none());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = ClientConfig::from_toml("server_url = \"http://box:9000\"").unwrap();
        assert_eq!(config.server_url, "http://box:9000");
        // Unspecified fields fall back to defaults
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_parse_full_toml() {
        let text = r#"
server_url = "http://10.0.0.5:11000"
poll_interval_ms = 250
request_timeout_secs = 5
max_polls = 120
"#;
        let config = ClientConfig::from_toml(text).unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.max_polls, Some(120));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ClientConfig::from_toml("serverurl = \"oops\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = ClientConfig::from_toml("poll_interval_ms = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_server_url_rejected() {
        let result = ClientConfig::from_toml("server_url = \"  \"");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load_or_default(&dir.path().join("calcbox.toml")).unwrap();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calcbox.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "poll_interval_ms = 50").unwrap();

        let config = ClientConfig::load_or_default(&path).unwrap();
        assert_eq!(config.poll_interval_ms, 50);
    }
}
