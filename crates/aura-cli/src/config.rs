//! Configuration file support

use aura_chat::{DEFAULT_API_URL, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the aura client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL
    pub api_url: Option<String>,
    /// Bearer token (alternative to `aura --login`)
    pub token: Option<String>,
    /// Retry settings for queries that fail before the answer starts
    pub retry: RetrySettings,
}

/// Retry configuration as written in the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("auramind")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("AURAMIND_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default path
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            api_url: Some(DEFAULT_API_URL.to_string()),
            token: None,
            retry: RetrySettings::default(),
        };
        default_config.save_to(&path)?;
        Ok(path)
    }

    /// Backend URL: env, then config, then the default
    pub fn api_url(&self) -> String {
        std::env::var("AURAMIND_API_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Token configured outside the credential store: env, then config
    pub fn token(&self) -> Option<String> {
        std::env::var("AURAMIND_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
            .or_else(|| self.token.clone())
    }

    /// Retry policy with unset fields taken from the defaults
    pub fn retry_config(&self) -> RetryConfig {
        let mut config = RetryConfig::default();
        if let Some(max_retries) = self.retry.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(ms) = self.retry.initial_delay_ms {
            config.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.retry.max_delay_ms {
            config.max_delay = Duration::from_millis(ms);
        }
        config
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# AuraMind client configuration
# Place at ~/.config/auramind/config.toml (Linux), ~/Library/Application Support/auramind/config.toml (Mac)

# Backend address (AURAMIND_API_URL overrides)
api_url = "http://localhost:8000"

# Bearer token (optional - prefer `aura --login <email>`, or AURAMIND_TOKEN)
# token = "eyJ..."

# Retries for queries that fail before the answer starts streaming
[retry]
# max_retries = 2
# initial_delay_ms = 500
# max_delay_ms = 10000
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            api_url = "https://aura.example.com"
            token = "jwt"

            [retry]
            max_retries = 5
            initial_delay_ms = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.api_url.as_deref(), Some("https://aura.example.com"));
        assert_eq!(config.token.as_deref(), Some("jwt"));

        let retry = config.retry_config();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.initial_delay, Duration::from_millis(100));
        assert_eq!(retry.max_delay, RetryConfig::default().max_delay);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.api_url.is_none());
        assert_eq!(config.retry_config().max_retries, RetryConfig::default().max_retries);
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.api_url.as_deref(), Some(DEFAULT_API_URL));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            api_url: Some("http://10.0.0.2:8000".into()),
            token: None,
            retry: RetrySettings {
                max_retries: Some(0),
                ..Default::default()
            },
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.api_url.as_deref(), Some("http://10.0.0.2:8000"));
        assert_eq!(loaded.retry_config().max_retries, 0);
    }

    #[test]
    fn test_missing_or_broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from(&dir.path().join("absent.toml")).api_url.is_none());

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "api_url = [").unwrap();
        assert!(Config::load_from(&broken).api_url.is_none());
    }
}
