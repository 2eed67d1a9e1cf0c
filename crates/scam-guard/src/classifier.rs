//! Inbound message classification.
//!
//! A message is checked against a narrow mobile-money template heuristic
//! and its sender against the trust store. Classification only reads local
//! state, so it works offline and never waits on the network.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use trust_store::{normalize, CanonicalIdentifier, SignalSet, TrustStore};

use crate::bus::NotificationBus;
use crate::error::{GuardError, Result};
use crate::inbox::InboundMessage;

/// Warning for a message that is malformed or not from a trusted sender.
pub const FORMAT_OR_SOURCE_MISMATCH: &str = "format or source mismatch";

/// Warning for a message from a reported scammer.
pub const REPORTED_SCAMMER: &str = "sender reported as scammer";

/// Default currency markers.
pub const DEFAULT_CURRENCY_MARKERS: &[&str] = &["RWF", "FRW"];

/// Default provider / transaction keywords.
pub const DEFAULT_PROVIDER_KEYWORDS: &[&str] = &["MTN", "MoMo", "Mobile Money", "Airtel Money"];

const TRANSACTION_REFERENCE: &str = r"(?i)\b(?:txn\s*id|transaction\s*id|financial\s+transaction\s+id|ref(?:erence)?)\s*[:#.]?\s*[a-z0-9]{4,}";

const TRANSFER_VERB: &str =
    r"(?i)\b(?:received|sent|transferred|deposited|withdrawn|withdrew|paid|payment\s+of)\b";

/// Build an escaped alternation, letting spaces inside a keyword match any
/// run of whitespace.
fn alternation(words: &[String], what: &str) -> Result<String> {
    let escaped: Vec<String> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(|w| regex::escape(w).replace(' ', r"\s+"))
        .collect();

    if escaped.is_empty() {
        return Err(GuardError::Config(format!("no {} configured", what)));
    }

    Ok(escaped.join("|"))
}

/// Compiled format heuristic.
#[derive(Debug, Clone)]
pub struct FormatRules {
    currency: Regex,
    provider: Regex,
    amount: Regex,
    reference: Regex,
    transfer: Regex,
}

impl FormatRules {
    /// Compile rules for the given currency markers and provider keywords.
    pub fn new(currency_markers: &[String], provider_keywords: &[String]) -> Result<Self> {
        let currencies = alternation(currency_markers, "currency markers")?;
        let providers = alternation(provider_keywords, "provider keywords")?;

        Ok(Self {
            // Markers often touch the amount ("3,000RWF"), so no word boundary.
            currency: Regex::new(&format!(r"(?i)(?:^|[^a-z])(?:{})(?:[^a-z]|$)", currencies))?,
            provider: Regex::new(&format!(r"(?i)\b(?:{})\b", providers))?,
            amount: Regex::new(&format!(
                r"(?i)\b(?:{c})\s*\d[\d,.]*|\d[\d,.]*\s*(?:{c})\b",
                c = currencies
            ))?,
            reference: Regex::new(TRANSACTION_REFERENCE)?,
            transfer: Regex::new(TRANSFER_VERB)?,
        })
    }

    /// Rules for the default mobile-money template family.
    pub fn default_rules() -> Result<Self> {
        let currencies: Vec<String> = DEFAULT_CURRENCY_MARKERS.iter().map(|s| s.to_string()).collect();
        let providers: Vec<String> = DEFAULT_PROVIDER_KEYWORDS.iter().map(|s| s.to_string()).collect();
        Self::new(&currencies, &providers)
    }

    /// True when the body has a currency marker, a provider keyword, and
    /// at least one of an amount, a transaction reference or a transfer verb.
    pub fn is_format_valid(&self, body: &str) -> bool {
        self.currency.is_match(body)
            && self.provider.is_match(body)
            && (self.amount.is_match(body)
                || self.reference.is_match(body)
                || self.transfer.is_match(body))
    }
}

/// Result of checking one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    pub is_format_valid: bool,
    pub is_trusted_sender: bool,
    pub is_known_scammer: bool,
}

impl ClassificationOutcome {
    /// Warnings for this outcome. The two checks are independent and may
    /// both fire.
    pub fn warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if !self.is_format_valid || !self.is_trusted_sender {
            warnings.push(FORMAT_OR_SOURCE_MISMATCH);
        }
        if self.is_known_scammer {
            warnings.push(REPORTED_SCAMMER);
        }
        warnings
    }
}

/// Full classification of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub sender: CanonicalIdentifier,
    pub outcome: ClassificationOutcome,
    pub warnings: Vec<&'static str>,
    /// The trust store has never synced (or could not be read), so the
    /// membership flags carry no information.
    pub degraded: bool,
}

/// Classifies inbound messages and emits warnings on the bus.
#[derive(Debug, Clone)]
pub struct MessageClassifier {
    store: TrustStore,
    bus: NotificationBus,
    rules: Arc<FormatRules>,
}

impl MessageClassifier {
    pub fn new(store: TrustStore, bus: NotificationBus, rules: FormatRules) -> Self {
        Self {
            store,
            bus,
            rules: Arc::new(rules),
        }
    }

    /// Classifier with the default format rules.
    pub fn with_default_rules(store: TrustStore, bus: NotificationBus) -> Result<Self> {
        Ok(Self::new(store, bus, FormatRules::default_rules()?))
    }

    pub fn rules(&self) -> &FormatRules {
        &self.rules
    }

    /// Classify one message and emit its warnings.
    ///
    /// Never fails: trust store errors degrade to "unknown sender".
    pub async fn classify(&self, message: &InboundMessage) -> Classification {
        let sender = normalize(&message.sender);

        let outcome = ClassificationOutcome {
            is_format_valid: self.rules.is_format_valid(&message.body),
            is_trusted_sender: self.store.contains(SignalSet::Trusted, &sender).await,
            is_known_scammer: self.store.contains(SignalSet::Scammer, &sender).await,
        };

        let degraded = !matches!(self.store.last_sync_time().await, Ok(Some(_)));
        if degraded {
            debug!(sender = %sender, "Classifying without a completed sync");
        }

        let warnings = outcome.warnings();
        for warning in &warnings {
            self.bus.emit(warning);
        }

        debug!(
            sender = %sender,
            format_valid = outcome.is_format_valid,
            trusted = outcome.is_trusted_sender,
            scammer = outcome.is_known_scammer,
            warnings = warnings.len(),
            "Classified message"
        );

        Classification {
            sender,
            outcome,
            warnings,
            degraded,
        }
    }
}
