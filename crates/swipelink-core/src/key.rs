//! Mapping keys.
//!
//! A [`MappingKey`] names one variant of one exchange. Its text form is
//! `"<exchange>:<variant>"` with both parts made of ASCII digits only; any
//! other shape is rejected with [`SyncError::MalformedKey`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SyncError;
use crate::ids::ExchangeId;

/// Composite `(exchange, variant)` key of the mapping store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MappingKey {
    /// Exchange the variant belongs to.
    pub exchange: ExchangeId,
    /// Zero-based variant index within the exchange.
    pub variant: usize,
}

impl MappingKey {
    /// Build a key from its parts.
    #[must_use]
    pub const fn new(exchange: ExchangeId, variant: usize) -> Self {
        Self { exchange, variant }
    }

    /// Whether this key belongs to `exchange`.
    #[must_use]
    pub fn is_for(&self, exchange: ExchangeId) -> bool {
        self.exchange == exchange
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.variant)
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl FromStr for MappingKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SyncError::MalformedKey(s.to_owned());
        let (exchange, variant) = s.split_once(':').ok_or_else(malformed)?;
        if !all_digits(exchange) || !all_digits(variant) {
            return Err(malformed());
        }
        let exchange = exchange.parse::<u64>().map_err(|_| malformed())?;
        let variant = variant.parse::<usize>().map_err(|_| malformed())?;
        Ok(Self::new(ExchangeId::new(exchange), variant))
    }
}

impl TryFrom<String> for MappingKey {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MappingKey> for String {
    fn from(key: MappingKey) -> Self {
        key.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
