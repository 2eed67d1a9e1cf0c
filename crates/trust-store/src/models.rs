//! Trust store models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One of the two disjoint signal sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSet {
    /// Senders known to be legitimate.
    Trusted,
    /// Senders reported as scammers.
    Scammer,
}

impl SignalSet {
    pub const ALL: [SignalSet; 2] = [SignalSet::Trusted, SignalSet::Scammer];

    /// Backing table for the set.
    pub(crate) fn table(self) -> &'static str {
        match self {
            SignalSet::Trusted => "trusted_identifiers",
            SignalSet::Scammer => "scam_identifiers",
        }
    }
}

impl fmt::Display for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalSet::Trusted => f.write_str("trusted"),
            SignalSet::Scammer => f.write_str("scammer"),
        }
    }
}

impl FromStr for SignalSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trusted" => Ok(SignalSet::Trusted),
            "scammer" | "scammers" | "scam" => Ok(SignalSet::Scammer),
            other => Err(format!("unknown signal set: {}", other)),
        }
    }
}

/// A stored canonical identifier belonging to one signal set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SignalRecord {
    /// Canonical identifier (see [`crate::normalize`]).
    pub identifier: String,
    /// Insertion timestamp.
    pub created_at: String,
}

/// Process-wide sync bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Epoch millis of the last committed reconciliation, if any.
    pub last_successful_sync_at: Option<u64>,
}

impl SyncMetadata {
    /// True until the first reconciliation commits.
    pub fn never_synced(&self) -> bool {
        self.last_successful_sync_at.is_none()
    }
}

/// Row counts written by one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileCounts {
    pub trusted: u64,
    pub scammers: u64,
}
