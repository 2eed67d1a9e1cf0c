//! Configuration types for signal-source.

use std::env;
use std::time::Duration;

use crate::error::SourceError;

/// Default path of the trusted senders list, relative to the base URL.
pub const DEFAULT_TRUSTED_PATH: &str = "trusted-senders";

/// Default path of the scammers list, relative to the base URL.
pub const DEFAULT_SCAMMERS_PATH: &str = "scammers";

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for fetching signal sets from the remote authority.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base URL of the authority (e.g., "https://signals.example.org/api").
    pub base_url: String,
    /// Path of the trusted senders list under `base_url`.
    pub trusted_path: String,
    /// Path of the scammers list under `base_url`.
    pub scammers_path: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl SourceConfig {
    /// Create a configuration with default paths.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            trusted_path: DEFAULT_TRUSTED_PATH.to_string(),
            scammers_path: DEFAULT_SCAMMERS_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `SIGNAL_SOURCE_URL` - Base URL of the authority
    ///
    /// Optional:
    /// - `SIGNAL_SOURCE_TRUSTED_PATH` (default: trusted-senders)
    /// - `SIGNAL_SOURCE_SCAMMERS_PATH` (default: scammers)
    /// - `SIGNAL_SOURCE_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, SourceError> {
        let base_url = env::var("SIGNAL_SOURCE_URL")
            .map_err(|_| SourceError::Config("SIGNAL_SOURCE_URL not set".to_string()))?;

        let mut config = Self::new(base_url);

        if let Ok(path) = env::var("SIGNAL_SOURCE_TRUSTED_PATH") {
            config.trusted_path = path;
        }
        if let Ok(path) = env::var("SIGNAL_SOURCE_SCAMMERS_PATH") {
            config.scammers_path = path;
        }
        if let Some(secs) = env::var("SIGNAL_SOURCE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Override the trusted senders path.
    pub fn with_trusted_path(mut self, path: impl Into<String>) -> Self {
        self.trusted_path = path.into();
        self
    }

    /// Override the scammers path.
    pub fn with_scammers_path(mut self, path: impl Into<String>) -> Self {
        self.scammers_path = path.into();
        self
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL of the trusted senders list.
    pub fn trusted_url(&self) -> String {
        self.join(&self.trusted_path)
    }

    /// Full URL of the scammers list.
    pub fn scammers_url(&self) -> String {
        self.join(&self.scammers_path)
    }

    fn join(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
