//! Client settings loaded from a TOML file with environment overrides.
//!
//! ```toml
//! api_url = "https://desk.example.com/api"
//! request_timeout_secs = 30
//! cache_ttl_secs = 300
//!
//! [retry]
//! max_retries = 1
//! base_delay_ms = 500
//!
//! [notifications]
//! retention_minutes = 30
//! max_count = 100
//! ```
//!
//! `TRADEDESK_API_URL` and `TRADEDESK_TOKEN` override the file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;

pub const ENV_API_URL: &str = "TRADEDESK_API_URL";
pub const ENV_TOKEN: &str = "TRADEDESK_TOKEN";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Most read retries a settings file may ask for.
pub const MAX_RETRIES: u32 = 10;
/// Longest base backoff a settings file may ask for.
pub const MAX_BASE_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub retention_minutes: u64,
    pub max_count: usize,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            retention_minutes: 30,
            max_count: 100,
        }
    }
}

impl NotificationSettings {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_minutes * 60)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub api_url: String,
    /// Bearer token. Usually supplied through the environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub request_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub search_debounce_ms: u64,
    pub retry: RetrySettings,
    pub notifications: NotificationSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api".to_string(),
            token: None,
            request_timeout_secs: 30,
            cache_ttl_secs: 300,
            search_debounce_ms: 300,
            retry: RetrySettings::default(),
            notifications: NotificationSettings::default(),
        }
    }
}

impl ClientSettings {
    /// Load from `path` (defaults when `None`), apply environment overrides,
    /// then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `TRADEDESK_*` overrides from `lookup`. Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_blank(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(token) = non_blank(ENV_TOKEN) {
            self.token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let url = self.api_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SettingsError::Invalid {
                field: "api_url",
                reason: format!("'{}' is not an http(s) URL", self.api_url),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                field: "request_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.cache_ttl_secs == 0 {
            return Err(SettingsError::Invalid {
                field: "cache_ttl_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.retry.max_retries > MAX_RETRIES {
            return Err(SettingsError::Invalid {
                field: "retry.max_retries",
                reason: format!("must be at most {MAX_RETRIES}"),
            });
        }
        if self.retry.base_delay_ms > MAX_BASE_DELAY_MS {
            return Err(SettingsError::Invalid {
                field: "retry.base_delay_ms",
                reason: format!("must be at most {MAX_BASE_DELAY_MS}"),
            });
        }
        if self.notifications.max_count == 0 {
            return Err(SettingsError::Invalid {
                field: "notifications.max_count",
                reason: "must be at least 1".into(),
            });
        }
        if self.notifications.retention_minutes == 0 {
            return Err(SettingsError::Invalid {
                field: "notifications.retention_minutes",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
        }
    }
}
