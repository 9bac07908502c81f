//! Collaborators the node talks to but does not own.
//!
//! - [`OrderBook`]: the shared, eventually-consistent offer book
//! - [`MarketPriceFeed`]: live market prices for market-based offers
//! - [`OfferSigner`]: signs the payload published for an offer

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use peerbook_types::{Offer, OfferId, PeerbookError, Result};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::signer::SignedOfferPayload;

/// Failure reported by the order book.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookError {
    #[error("order book unreachable: {0}")]
    Unreachable(String),
    #[error("order book rejected offer: {0}")]
    Rejected(String),
}

/// Failure reported by a signer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot sign offer: {0}")]
pub struct SignerError(pub String);

/// Shared offer book - outbound port.
#[async_trait]
pub trait OrderBook: Send + Sync {
    /// Withdraw an offer's entry. Removing an absent entry succeeds.
    async fn remove_from_book(&self, offer_id: OfferId) -> std::result::Result<(), BookError>;

    /// Publish a signed offer.
    async fn add_to_book(&self, payload: SignedOfferPayload) -> std::result::Result<(), BookError>;
}

/// Market price source - outbound port.
pub trait MarketPriceFeed: Send + Sync {
    /// # Errors
    /// `PriceUnavailable` when the feed has no price for the currency.
    fn current_market_price(&self, currency_code: &str) -> Result<Decimal>;
}

/// Offer payload signer - outbound port.
pub trait OfferSigner: Send + Sync {
    /// # Errors
    /// Returns a [`SignerError`] when the signing key is unusable.
    fn sign(&self, offer: &Offer) -> std::result::Result<SignedOfferPayload, SignerError>;
}

/// Price feed backed by an in-memory table.
#[derive(Debug, Default)]
pub struct StaticPriceFeed {
    prices: RwLock<HashMap<String, Decimal>>,
}

impl StaticPriceFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, currency_code: impl Into<String>, price: Decimal) {
        self.prices.write().insert(currency_code.into(), price);
    }

    pub fn clear_price(&self, currency_code: &str) {
        self.prices.write().remove(currency_code);
    }
}

impl MarketPriceFeed for StaticPriceFeed {
    fn current_market_price(&self, currency_code: &str) -> Result<Decimal> {
        self.prices
            .read()
            .get(currency_code)
            .copied()
            .ok_or_else(|| PeerbookError::PriceUnavailable {
                currency_code: currency_code.to_string(),
            })
    }
}
