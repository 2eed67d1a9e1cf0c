//! Sender identifier normalization.
//!
//! Every identifier that is stored or compared goes through [`normalize`].
//! Two raw identifiers refer to the same sender if and only if their
//! canonical forms are equal.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Length of a national significant number in the target region.
pub const CANONICAL_LEN: usize = 9;

/// A normalized sender identifier: the trailing [`CANONICAL_LEN`] digits of
/// the raw value, or all of its digits when there are fewer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalIdentifier(String);

impl CanonicalIdentifier {
    /// Borrow the canonical digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier has the full national length.
    pub fn is_complete(&self) -> bool {
        self.0.len() == CANONICAL_LEN
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalize a raw sender identifier.
///
/// Strips every non-digit character and keeps the trailing
/// [`CANONICAL_LEN`] digits. Total over all inputs: short or empty input
/// yields a shorter canonical form rather than an error.
///
/// ```
/// use trust_store::normalize;
///
/// assert_eq!(normalize("+250 784 310 609").as_str(), "784310609");
/// assert_eq!(normalize("0784310609"), normalize("784310609"));
/// ```
pub fn normalize(raw: &str) -> CanonicalIdentifier {
    let digits: Vec<char> = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(CANONICAL_LEN);
    CanonicalIdentifier(digits[start..].iter().collect())
}

impl From<&str> for CanonicalIdentifier {
    fn from(raw: &str) -> Self {
        normalize(raw)
    }
}

impl From<String> for CanonicalIdentifier {
    fn from(raw: String) -> Self {
        normalize(&raw)
    }
}
