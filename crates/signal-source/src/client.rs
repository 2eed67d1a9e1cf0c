//! HTTP client for the signal authority.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::error::SourceError;

/// The two raw (non-normalized) identifier lists served by the authority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalSets {
    pub trusted: HashSet<String>,
    pub scammers: HashSet<String>,
}

/// Source of authoritative signal sets.
///
/// Abstracted so reconciliation can run against the HTTP authority or an
/// in-process fake.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Fetch both sets. Fails as a whole if either list is unavailable.
    async fn fetch_signal_sets(&self) -> Result<SignalSets, SourceError>;
}

/// [`SignalSource`] backed by two GET endpoints returning JSON string arrays.
#[derive(Clone)]
pub struct HttpSignalSource {
    http: Client,
    config: SourceConfig,
}

impl HttpSignalSource {
    /// Build a client for the configured authority.
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(SourceError::Config(format!(
                "base URL must be http(s): {}",
                config.base_url
            )));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(SourceError::Http)?;

        Ok(Self { http, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Fetch one identifier list.
    async fn fetch_list(&self, url: &str) -> Result<HashSet<String>, SourceError> {
        debug!("Fetching signal list: {}", url);

        let response = self.http.get(url).send().await.map_err(SourceError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(SourceError::Http)?;
        let list: Vec<String> = serde_json::from_slice(&body).map_err(|e| SourceError::Decode {
            url: url.to_string(),
            source: e,
        })?;

        Ok(list.into_iter().collect())
    }
}

#[async_trait]
impl SignalSource for HttpSignalSource {
    async fn fetch_signal_sets(&self) -> Result<SignalSets, SourceError> {
        let trusted_url = self.config.trusted_url();
        let scammers_url = self.config.scammers_url();

        // Independent requests; the first failure fails the pair.
        let (trusted, scammers) = tokio::try_join!(
            self.fetch_list(&trusted_url),
            self.fetch_list(&scammers_url)
        )?;

        info!(
            trusted = trusted.len(),
            scammers = scammers.len(),
            "Fetched signal sets from {}",
            self.config.base_url
        );

        Ok(SignalSets { trusted, scammers })
    }
}

impl std::fmt::Debug for HttpSignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSignalSource")
            .field("config", &self.config)
            .finish()
    }
}
