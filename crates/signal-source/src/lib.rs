//! Remote signal authority client.
//!
//! This crate fetches the authoritative trusted-sender and scammer lists
//! that seed the offline trust store. Both lists are requested in parallel
//! and a sync only succeeds when both arrive.
//!
//! # Example
//!
//! ```no_run
//! use signal_source::{HttpSignalSource, SignalSource, SourceConfig};
//!
//! # async fn example() -> Result<(), signal_source::SourceError> {
//! let config = SourceConfig::new("https://signals.example.org/api")
//!     .with_scammers_path("reported");
//! let source = HttpSignalSource::new(config)?;
//!
//! let sets = source.fetch_signal_sets().await?;
//! println!("{} trusted, {} scammers", sets.trusted.len(), sets.scammers.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::{HttpSignalSource, SignalSets, SignalSource};
pub use config::{SourceConfig, DEFAULT_SCAMMERS_PATH, DEFAULT_TRUSTED_PATH};
pub use error::SourceError;

/// Re-export async_trait for implementors of [`SignalSource`].
pub use async_trait::async_trait;

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
