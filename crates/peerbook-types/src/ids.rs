//! Offer identifiers.
//!
//! Offer IDs use UUIDv7 so that listings sort by creation time without an
//! extra index.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique offer identifier. Immutable for the offer's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OfferId(pub Uuid);

impl OfferId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for OfferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OfferId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_id_uniqueness() {
        let a = OfferId::new();
        let b = OfferId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn offer_id_ordering_follows_creation() {
        let a = OfferId::new();
        let b = OfferId::new();
        assert!(a < b);
    }

    #[test]
    fn offer_id_parses_its_display_form() {
        let id = OfferId::new();
        let parsed: OfferId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-an-offer-id".parse::<OfferId>().is_err());
    }
}
