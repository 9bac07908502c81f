//! Request and response shapes of the offer RPCs other than edit.

use chrono::Utc;
use peerbook_edit::validator::{
    self, MARKET_PRICING_ON_FIXED_ASSET, NEGATIVE_TRIGGER_PRICE, TRIGGER_PRICE_ON_FIXED_OFFER,
};
use peerbook_types::{
    ActivationState, AssetClass, Direction, Offer, OfferId, OfferTerms, PeerbookError, Price,
    PriceMode, Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An offer as returned to callers: the stored snapshot plus the price a
/// taker would see now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferSnapshot {
    #[serde(flatten)]
    pub offer: Offer,
    /// `None` for a market-based offer while no market price is known.
    pub effective_price: Option<Decimal>,
}

/// Selection for `list_offers`. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfferFilter {
    pub direction: Option<Direction>,
    pub currency_code: Option<String>,
}

impl OfferFilter {
    #[must_use]
    pub fn matches(&self, offer: &Offer) -> bool {
        self.direction.is_none_or(|d| d == offer.terms.direction)
            && self
                .currency_code
                .as_deref()
                .is_none_or(|c| c.eq_ignore_ascii_case(&offer.terms.currency_code))
    }
}

/// Wire form of a create-offer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOffer {
    pub direction: Direction,
    pub currency_code: String,
    pub asset_class: AssetClass,
    pub amount: u64,
    pub min_amount: u64,
    pub tx_fee: u64,
    pub maker_fee: u64,
    pub payment_account_id: String,
    pub buyer_security_deposit: u64,
    pub seller_security_deposit: u64,
    pub use_market_based_price: bool,
    /// Fixed price as a decimal string. Ignored for market-based offers.
    pub price: String,
    /// Margin in percent. Ignored for fixed-price offers.
    pub market_price_margin: Decimal,
    /// Trigger price in fixed-point units; 0 for none.
    pub trigger_price: i64,
}

impl NewOffer {
    /// Check the request and build the offer it describes, inactive.
    ///
    /// Pricing rules match those applied to edits.
    ///
    /// # Errors
    /// `InvalidArgument` for bad amounts, prices or a negative trigger;
    /// `IllegalState` for pricing the offer's mode or asset class forbids.
    pub fn into_offer(self, offer_id: OfferId) -> Result<Offer> {
        let invalid = |reason: &str| PeerbookError::invalid_argument(offer_id, reason);
        let illegal = |reason: &str| PeerbookError::illegal_state(offer_id, reason);

        if self.currency_code.trim().is_empty() {
            return Err(invalid("currency code is required"));
        }
        if self.amount == 0 || self.min_amount == 0 {
            return Err(invalid("amount and minimum amount must be positive"));
        }
        if self.min_amount > self.amount {
            return Err(invalid("minimum amount cannot exceed amount"));
        }
        if self.trigger_price < 0 {
            return Err(invalid(NEGATIVE_TRIGGER_PRICE));
        }
        if self.trigger_price > 0 && !self.use_market_based_price {
            return Err(illegal(TRIGGER_PRICE_ON_FIXED_OFFER));
        }
        if self.asset_class == AssetClass::NonConvertible && self.use_market_based_price {
            return Err(illegal(MARKET_PRICING_ON_FIXED_ASSET));
        }

        let price_mode = if self.use_market_based_price {
            PriceMode::MarketBased
        } else {
            PriceMode::Fixed
        };
        let mut offer = Offer {
            id: offer_id,
            terms: OfferTerms {
                direction: self.direction,
                currency_code: self.currency_code.trim().to_ascii_uppercase(),
                asset_class: self.asset_class,
                amount: self.amount,
                min_amount: self.min_amount,
                tx_fee: self.tx_fee,
                maker_fee: self.maker_fee,
                payment_account_id: self.payment_account_id,
                created_at: Utc::now(),
                buyer_security_deposit: self.buyer_security_deposit,
                seller_security_deposit: self.seller_security_deposit,
            },
            price_mode,
            fixed_price: Price::ZERO,
            market_price_margin: Decimal::ZERO,
            trigger_price: Price::ZERO,
            activation: ActivationState::Inactive,
        };
        match price_mode {
            PriceMode::Fixed => {
                offer.fixed_price = validator::parse_fixed_price(&offer, self.price.trim())?;
            }
            PriceMode::MarketBased => {
                offer.market_price_margin = self.market_price_margin;
                offer.trigger_price = Price(self.trigger_price);
            }
        }
        offer.check_invariants()?;
        Ok(offer)
    }
}
