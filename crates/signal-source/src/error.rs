//! Error types for signal-source.

use thiserror::Error;

/// Errors that can occur when fetching signal sets.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The authority answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The body was not a JSON array of strings.
    #[error("invalid signal list from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
