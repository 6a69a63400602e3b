//! PushRelay configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::MAX_PAGE_SIZE;

/// Main PushRelay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event feed being watched
    pub source: SourceConfig,

    /// Where notifications are sent
    pub webhook: WebhookConfig,

    /// Timer and network timeouts
    pub poll: PollConfig,

    /// Watermark storage
    pub storage: StorageConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the request timeout is non-zero, that the secrets are
    /// present in the environment and that the repository looks like
    /// `owner/name`. Call this early in startup to fail
    /// fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.poll.timeout_ms == 0 {
            return Err(eyre::eyre!("Invalid poll.timeout-ms 0: every request would time out"));
        }
        if std::env::var(&self.source.token_env).is_err() {
            return Err(eyre::eyre!(
                "Feed access token not found. Set the {} environment variable.",
                self.source.token_env
            ));
        }
        if std::env::var(&self.webhook.url_env).is_err() {
            return Err(eyre::eyre!(
                "Webhook URL not found. Set the {} environment variable.",
                self.webhook.url_env
            ));
        }
        if self.source.owner_and_name().is_none() {
            return Err(eyre::eyre!(
                "Invalid repository '{}': expected owner/name",
                self.source.repository
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Secrets usually live in .env next to the deployment
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for path in Self::default_paths() {
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed: the full load reports them once logging exists.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => Self::default_paths().into_iter().find(|p| p.exists())?,
        };
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".pushrelay.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("pushrelay").join("pushrelay.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Event feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// API base URL
    #[serde(rename = "api-base-url")]
    pub api_base_url: String,

    /// Repository to watch, as owner/name
    pub repository: String,

    /// Only pushes to this ref are relayed
    #[serde(rename = "target-ref")]
    pub target_ref: String,

    /// Events requested per poll (at most 100)
    #[serde(rename = "per-page")]
    pub per_page: u32,

    /// Environment variable containing the access token
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Base for the browser links placed in notifications
    #[serde(rename = "html-base-url")]
    pub html_base_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            repository: "discord/discord-api-docs".to_string(),
            target_ref: "refs/heads/main".to_string(),
            per_page: MAX_PAGE_SIZE,
            token_env: "GITHUB_TOKEN".to_string(),
            html_base_url: "https://github.com".to_string(),
        }
    }
}

impl SourceConfig {
    /// Full URL of the repository event feed
    pub fn events_url(&self) -> String {
        format!(
            "{}/repos/{}/events",
            self.api_base_url.trim_end_matches('/'),
            self.repository
        )
    }

    /// Page size actually requested
    pub fn page_size(&self) -> u32 {
        self.per_page.clamp(1, MAX_PAGE_SIZE)
    }

    /// Read the access token from the environment
    pub fn token(&self) -> Result<String> {
        std::env::var(&self.token_env).context(format!("{} is not set", self.token_env))
    }

    /// Split the repository into owner and name
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        match self.repository.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Some((owner, name)),
            _ => None,
        }
    }
}

/// Webhook destination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Environment variable containing the webhook URL
    #[serde(rename = "url-env")]
    pub url_env: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url_env: "WEBHOOK_URL".to_string(),
        }
    }
}

impl WebhookConfig {
    /// Read the webhook URL from the environment
    pub fn url(&self) -> Result<String> {
        std::env::var(&self.url_env).context(format!("{} is not set", self.url_env))
    }
}

/// Timer and timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between cycle starts
    #[serde(rename = "interval-secs")]
    pub interval_secs: u64,

    /// Per-request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            timeout_ms: 30_000,
        }
    }
}

impl PollConfig {
    /// Get the poll interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Get the request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file holding the watermark
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/pushrelay on Linux)
        let path = dirs::data_dir()
            .map(|d| d.join("pushrelay"))
            .unwrap_or_else(|| PathBuf::from(".pushrelay"))
            .join("watermark.db");

        Self { path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.source.target_ref, "refs/heads/main");
        assert_eq!(config.source.per_page, 100);
        assert_eq!(config.poll.interval_secs, 60);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_events_url() {
        let config = SourceConfig {
            api_base_url: "https://api.example.com/".to_string(),
            repository: "octo/widgets".to_string(),
            ..Default::default()
        };

        assert_eq!(config.events_url(), "https://api.example.com/repos/octo/widgets/events");
    }

    #[test]
    fn test_page_size_is_clamped() {
        let mut config = SourceConfig {
            per_page: 500,
            ..Default::default()
        };
        assert_eq!(config.page_size(), 100);

        config.per_page = 0;
        assert_eq!(config.page_size(), 1);
    }

    #[test]
    fn test_owner_and_name() {
        let mut config = SourceConfig::default();
        assert_eq!(config.owner_and_name(), Some(("discord", "discord-api-docs")));

        config.repository = "no-slash".to_string();
        assert_eq!(config.owner_and_name(), None);

        config.repository = "a/b/c".to_string();
        assert_eq!(config.owner_and_name(), None);

        config.repository = "/name".to_string();
        assert_eq!(config.owner_and_name(), None);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
source:
  api-base-url: https://ghe.example.com/api/v3
  repository: octo/widgets
  target-ref: refs/heads/release
  token-env: MY_TOKEN

webhook:
  url-env: MY_HOOK

poll:
  interval-secs: 120
  timeout-ms: 5000

storage:
  path: /var/lib/pushrelay/state.db

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.source.repository, "octo/widgets");
        assert_eq!(config.source.target_ref, "refs/heads/release");
        assert_eq!(config.source.token_env, "MY_TOKEN");
        assert_eq!(config.webhook.url_env, "MY_HOOK");
        assert_eq!(config.poll.interval(), Duration::from_secs(120));
        assert_eq!(config.poll.timeout(), Duration::from_millis(5000));
        assert_eq!(config.storage.path, PathBuf::from("/var/lib/pushrelay/state.db"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
source:
  repository: octo/widgets
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.source.repository, "octo/widgets");

        // Defaults for unspecified
        assert_eq!(config.source.target_ref, "refs/heads/main");
        assert_eq!(config.source.token_env, "GITHUB_TOKEN");
        assert_eq!(config.webhook.url_env, "WEBHOOK_URL");
        assert_eq!(config.poll.interval_secs, 60);
    }

    #[test]
    fn test_load_from_explicit_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("relay.yml");
        fs::write(&path, "source:\n  target-ref: refs/heads/dev\nlog-level: warn\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.source.target_ref, "refs/heads/dev");
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/pushrelay.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert!(Config::load_log_level(Some(&path)).is_none());
    }

    #[test]
    #[serial]
    fn test_validate_requires_secrets() {
        let config = Config {
            source: SourceConfig {
                token_env: "PUSHRELAY_TEST_TOKEN".to_string(),
                ..Default::default()
            },
            webhook: WebhookConfig {
                url_env: "PUSHRELAY_TEST_HOOK".to_string(),
            },
            ..Default::default()
        };

        // SAFETY: serialized with every other test touching these variables
        unsafe {
            std::env::remove_var("PUSHRELAY_TEST_TOKEN");
            std::env::remove_var("PUSHRELAY_TEST_HOOK");
        }
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("PUSHRELAY_TEST_TOKEN"));

        unsafe {
            std::env::set_var("PUSHRELAY_TEST_TOKEN", "t0ken");
        }
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("PUSHRELAY_TEST_HOOK"));

        unsafe {
            std::env::set_var("PUSHRELAY_TEST_HOOK", "https://chat.example.com/hook");
        }
        assert!(config.validate().is_ok());
        assert_eq!(config.source.token().unwrap(), "t0ken");
        assert_eq!(config.webhook.url().unwrap(), "https://chat.example.com/hook");

        unsafe {
            std::env::remove_var("PUSHRELAY_TEST_TOKEN");
            std::env::remove_var("PUSHRELAY_TEST_HOOK");
        }
    }

    #[test]
    #[serial]
    fn test_validate_rejects_bad_repository() {
        let config = Config {
            source: SourceConfig {
                repository: "widgets".to_string(),
                token_env: "PUSHRELAY_TEST_TOKEN".to_string(),
                ..Default::default()
            },
            webhook: WebhookConfig {
                url_env: "PUSHRELAY_TEST_HOOK".to_string(),
            },
            ..Default::default()
        };

        unsafe {
            std::env::set_var("PUSHRELAY_TEST_TOKEN", "t0ken");
            std::env::set_var("PUSHRELAY_TEST_HOOK", "https://chat.example.com/hook");
        }
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("owner/name"));

        unsafe {
            std::env::remove_var("PUSHRELAY_TEST_TOKEN");
            std::env::remove_var("PUSHRELAY_TEST_HOOK");
        }
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = Config {
            poll: PollConfig {
                timeout_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeout-ms"));
    }
}
