//! CLI configuration.
//!
//! Read from `folio-upload.toml` in the working directory, or from the path
//! given with `--config`. Command-line flags override file values.

use std::path::Path;

use folio_uploader::UploaderConfig;
use serde::{Deserialize, Serialize};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "folio-upload.toml";

/// Upload CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub upload: UploaderConfig,
}

/// Journal server connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL of the upload API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".into()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from the default file if present.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_uploader::ResumePolicy;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.endpoint.base_url, "http://localhost:8080/api");
        assert_eq!(config.endpoint.timeout_secs, 30);
        assert!(config.endpoint.api_key.is_none());
        assert_eq!(config.upload, UploaderConfig::default());
    }

    #[test]
    fn config_partial_toml() {
        let toml_str = r#"
            [endpoint]
            base_url = "https://journal.example/api"
            api_key = "secret"

            [upload]
            max_concurrent_chunks = 5
            resume_policy = "verify"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.endpoint.base_url, "https://journal.example/api");
        assert_eq!(config.endpoint.api_key.as_deref(), Some("secret"));
        assert_eq!(config.endpoint.timeout_secs, 30);
        assert_eq!(config.upload.max_concurrent_chunks, 5);
        assert_eq!(config.upload.resume_policy, ResumePolicy::Verify);
        assert_eq!(config.upload.max_retries, 3);
    }

    #[test]
    fn config_roundtrip_toml() {
        let mut config = Config::default();
        config.endpoint.api_key = Some("k".into());
        config.upload.chunk_size = 1024 * 1024;
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[endpoint]\ntimeout_secs = 5\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.endpoint.timeout_secs, 5);
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
