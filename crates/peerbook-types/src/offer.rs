//! Offer model for the PeerBook node.
//!
//! An [`Offer`] splits into two halves: the [`OfferTerms`], which are fixed
//! when the offer is created and never change, and the pricing/activation
//! fields, which change only through the validated edit pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{OfferId, PeerbookError, Result, constants};

/// Which side of the trade the offer maker takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// How the offer's price is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceMode {
    /// Absolute price set by the maker.
    Fixed,
    /// Live market price adjusted by a percentage margin.
    MarketBased,
}

impl std::fmt::Display for PriceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed => write!(f, "FIXED"),
            Self::MarketBased => write!(f, "MARKET_BASED"),
        }
    }
}

/// Whether the offer is published on the shared book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationState {
    Active,
    Inactive,
}

impl ActivationState {
    #[must_use]
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl std::fmt::Display for ActivationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Inactive => write!(f, "INACTIVE"),
        }
    }
}

/// What the offer's counter-asset is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetClass {
    /// Fiat currency with a live market price feed.
    Fiat,
    /// Asset without a live market price feed. Always FIXED priced.
    NonConvertible,
}

impl AssetClass {
    /// Number of decimal places in this asset class's fixed-point prices.
    #[must_use]
    pub fn price_precision(self) -> u32 {
        match self {
            Self::Fiat => constants::FIAT_PRICE_PRECISION,
            Self::NonConvertible => constants::NON_CONVERTIBLE_PRICE_PRECISION,
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fiat => write!(f, "FIAT"),
            Self::NonConvertible => write!(f, "NON_CONVERTIBLE"),
        }
    }
}

/// Fixed-point price. The number of implied decimal places depends on the
/// offer's [`AssetClass`]; zero means "unset".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct Price(pub i64);

impl Price {
    pub const ZERO: Self = Self(0);

    /// Scale a decimal value to `precision` implied decimal places,
    /// rounding half away from zero. Returns `None` if it overflows `i64`.
    #[must_use]
    pub fn from_decimal(value: Decimal, precision: u32) -> Option<Self> {
        let factor = Decimal::from(10_i64.checked_pow(precision)?);
        value
            .checked_mul(factor)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Self)
    }

    #[must_use]
    pub fn to_decimal(self, precision: u32) -> Decimal {
        Decimal::new(self.0, precision)
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The immutable half of an offer. No edit may change any of these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferTerms {
    pub direction: Direction,
    /// Counter currency code (e.g., "EUR", "BSQ").
    pub currency_code: String,
    pub asset_class: AssetClass,
    /// Traded amount in base units (satoshis).
    pub amount: u64,
    pub min_amount: u64,
    pub tx_fee: u64,
    pub maker_fee: u64,
    pub payment_account_id: String,
    pub created_at: DateTime<Utc>,
    pub buyer_security_deposit: u64,
    pub seller_security_deposit: u64,
}

impl OfferTerms {
    /// The security deposit the maker posts, selected by direction.
    #[must_use]
    pub fn maker_security_deposit(&self) -> u64 {
        match self.direction {
            Direction::Buy => self.buyer_security_deposit,
            Direction::Sell => self.seller_security_deposit,
        }
    }
}

/// One offer owned by this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub terms: OfferTerms,
    pub price_mode: PriceMode,
    /// Authoritative only in [`PriceMode::Fixed`].
    pub fixed_price: Price,
    /// Percentage margin over the market price. Authoritative only in
    /// [`PriceMode::MarketBased`].
    pub market_price_margin: Decimal,
    /// Deactivation threshold; zero means no trigger.
    pub trigger_price: Price,
    pub activation: ActivationState,
}

impl Offer {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.activation.is_active()
    }

    #[must_use]
    pub fn is_market_based(&self) -> bool {
        self.price_mode == PriceMode::MarketBased
    }

    #[must_use]
    pub fn is_non_convertible(&self) -> bool {
        self.terms.asset_class == AssetClass::NonConvertible
    }

    #[must_use]
    pub fn price_precision(&self) -> u32 {
        self.terms.asset_class.price_precision()
    }

    /// The price a taker would see right now.
    ///
    /// Fixed offers ignore `market_price`. Market-based offers return `None`
    /// when no market price is available. Sellers add the margin, buyers
    /// subtract it.
    #[must_use]
    pub fn effective_price(&self, market_price: Option<Decimal>) -> Option<Decimal> {
        let precision = self.price_precision();
        match self.price_mode {
            PriceMode::Fixed => Some(self.fixed_price.to_decimal(precision)),
            PriceMode::MarketBased => {
                let market = market_price?;
                let margin = self.market_price_margin / Decimal::ONE_HUNDRED;
                let factor = match self.terms.direction {
                    Direction::Sell => Decimal::ONE + margin,
                    Direction::Buy => Decimal::ONE - margin,
                };
                market.checked_mul(factor).map(|p| p.round_dp(precision))
            }
        }
    }

    /// Check the pricing invariants that must hold for every stored offer.
    ///
    /// # Errors
    /// Returns [`PeerbookError::InvariantViolation`] describing the first
    /// broken invariant.
    pub fn check_invariants(&self) -> Result<()> {
        if self.trigger_price.is_positive() && !self.is_market_based() {
            return Err(PeerbookError::InvariantViolation(format!(
                "offer {} has trigger price {} but is not market based",
                self.id, self.trigger_price
            )));
        }
        if self.trigger_price.0 < 0 {
            return Err(PeerbookError::InvariantViolation(format!(
                "offer {} has a negative trigger price",
                self.id
            )));
        }
        if self.is_non_convertible() && (self.is_market_based() || !self.trigger_price.is_zero())
        {
            return Err(PeerbookError::InvariantViolation(format!(
                "non-convertible asset offer {} must be fixed priced without trigger",
                self.id
            )));
        }
        Ok(())
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Offer {
    fn dummy_terms(direction: Direction, currency_code: &str, asset_class: AssetClass) -> OfferTerms {
        OfferTerms {
            direction,
            currency_code: currency_code.to_string(),
            asset_class,
            amount: 10_000_000,
            min_amount: 10_000_000,
            tx_fee: 5_000,
            maker_fee: 15_000,
            payment_account_id: format!("acct-{}", currency_code.to_lowercase()),
            created_at: Utc::now(),
            buyer_security_deposit: 1_500_000,
            seller_security_deposit: 1_500_000,
        }
    }

    /// An ACTIVE fiat offer priced at `price` (4 implied decimals).
    pub fn dummy_fixed(direction: Direction, currency_code: &str, price: Price) -> Self {
        Self {
            id: OfferId::new(),
            terms: Self::dummy_terms(direction, currency_code, AssetClass::Fiat),
            price_mode: PriceMode::Fixed,
            fixed_price: price,
            market_price_margin: Decimal::ZERO,
            trigger_price: Price::ZERO,
            activation: ActivationState::Active,
        }
    }

    /// An ACTIVE market-based fiat offer.
    pub fn dummy_market(
        direction: Direction,
        currency_code: &str,
        margin: Decimal,
        trigger_price: Price,
    ) -> Self {
        Self {
            id: OfferId::new(),
            terms: Self::dummy_terms(direction, currency_code, AssetClass::Fiat),
            price_mode: PriceMode::MarketBased,
            fixed_price: Price::ZERO,
            market_price_margin: margin,
            trigger_price,
            activation: ActivationState::Active,
        }
    }

    /// An ACTIVE non-convertible asset offer priced at `price` (8 implied decimals).
    pub fn dummy_non_convertible(direction: Direction, currency_code: &str, price: Price) -> Self {
        Self {
            id: OfferId::new(),
            terms: Self::dummy_terms(direction, currency_code, AssetClass::NonConvertible),
            price_mode: PriceMode::Fixed,
            fixed_price: price,
            market_price_margin: Decimal::ZERO,
            trigger_price: Price::ZERO,
            activation: ActivationState::Active,
        }
    }
}
