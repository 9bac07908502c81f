//! Edit requests, typed edits, and validated edit plans.
//!
//! Edits enter the node in their wire form, [`EditOfferRequest`], which carries
//! every editable field plus an [`EditType`] selector. The request is converted
//! exactly once into an [`OfferEdit`]: a closed tagged type whose variants
//! hold only the fields the selector names. Fields the selector does not name
//! are dropped at that point.
//!
//! ```text
//! EditOfferRequest ──edit()──▶ OfferEdit ──validate()──▶ EditPlan ──apply()──▶ Offer
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ActivationState, OfferId, Price, PriceMode};

/// Selector naming which fields an edit request intends to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditType {
    ActivationStateOnly,
    FixedPriceOnly,
    FixedPriceAndActivationState,
    MktPriceMarginOnly,
    MktPriceMarginAndActivationState,
    TriggerPriceOnly,
    TriggerPriceAndActivationState,
    MktPriceMarginAndTriggerPrice,
    MktPriceMarginAndTriggerPriceAndActivationState,
}

impl std::fmt::Display for EditType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ActivationStateOnly => "ACTIVATION_STATE_ONLY",
            Self::FixedPriceOnly => "FIXED_PRICE_ONLY",
            Self::FixedPriceAndActivationState => "FIXED_PRICE_AND_ACTIVATION_STATE",
            Self::MktPriceMarginOnly => "MKT_PRICE_MARGIN_ONLY",
            Self::MktPriceMarginAndActivationState => "MKT_PRICE_MARGIN_AND_ACTIVATION_STATE",
            Self::TriggerPriceOnly => "TRIGGER_PRICE_ONLY",
            Self::TriggerPriceAndActivationState => "TRIGGER_PRICE_AND_ACTIVATION_STATE",
            Self::MktPriceMarginAndTriggerPrice => "MKT_PRICE_MARGIN_AND_TRIGGER_PRICE",
            Self::MktPriceMarginAndTriggerPriceAndActivationState => {
                "MKT_PRICE_MARGIN_AND_TRIGGER_PRICE_AND_ACTIVATION_STATE"
            }
        };
        f.write_str(name)
    }
}

/// Wire form of an edit request, as received at the RPC boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOfferRequest {
    pub id: OfferId,
    /// New fixed price as a decimal string. Ignored unless the selector names it.
    pub price: String,
    pub use_market_based_price: bool,
    /// New margin in percent. Ignored unless the selector names it.
    pub market_price_margin: Decimal,
    /// New trigger price in the offer's fixed-point units; 0 clears it.
    pub trigger_price: i64,
    pub activation: ActivationState,
    pub edit_type: EditType,
}

impl EditOfferRequest {
    /// Resolve the selector into the typed edit it authorizes.
    #[must_use]
    pub fn edit(&self) -> OfferEdit {
        let price = || self.price.trim().to_string();
        let use_market_based_price = self.use_market_based_price;
        let margin = self.market_price_margin;
        let trigger_price = self.trigger_price;
        let activation = self.activation;
        match self.edit_type {
            EditType::ActivationStateOnly => OfferEdit::ActivationStateOnly { activation },
            EditType::FixedPriceOnly => OfferEdit::FixedPriceOnly {
                price: price(),
                use_market_based_price,
            },
            EditType::FixedPriceAndActivationState => OfferEdit::FixedPriceAndActivationState {
                price: price(),
                use_market_based_price,
                activation,
            },
            EditType::MktPriceMarginOnly => OfferEdit::MktPriceMarginOnly { margin },
            EditType::MktPriceMarginAndActivationState => {
                OfferEdit::MktPriceMarginAndActivationState { margin, activation }
            }
            EditType::TriggerPriceOnly => OfferEdit::TriggerPriceOnly { trigger_price },
            EditType::TriggerPriceAndActivationState => OfferEdit::TriggerPriceAndActivationState {
                trigger_price,
                activation,
            },
            EditType::MktPriceMarginAndTriggerPrice => OfferEdit::MktPriceMarginAndTriggerPrice {
                margin,
                trigger_price,
            },
            EditType::MktPriceMarginAndTriggerPriceAndActivationState => {
                OfferEdit::MktPriceMarginAndTriggerPriceAndActivationState {
                    margin,
                    trigger_price,
                    activation,
                }
            }
        }
    }
}

/// A typed edit. Each variant carries exactly the fields it may touch.
///
/// Fixed-price variants move the offer to FIXED pricing unless
/// `use_market_based_price` is set. Margin variants move it to MARKET_BASED.
/// Trigger-only variants keep the current price mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "editType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferEdit {
    ActivationStateOnly {
        activation: ActivationState,
    },
    FixedPriceOnly {
        price: String,
        use_market_based_price: bool,
    },
    FixedPriceAndActivationState {
        price: String,
        use_market_based_price: bool,
        activation: ActivationState,
    },
    MktPriceMarginOnly {
        margin: Decimal,
    },
    MktPriceMarginAndActivationState {
        margin: Decimal,
        activation: ActivationState,
    },
    TriggerPriceOnly {
        trigger_price: i64,
    },
    TriggerPriceAndActivationState {
        trigger_price: i64,
        activation: ActivationState,
    },
    MktPriceMarginAndTriggerPrice {
        margin: Decimal,
        trigger_price: i64,
    },
    MktPriceMarginAndTriggerPriceAndActivationState {
        margin: Decimal,
        trigger_price: i64,
        activation: ActivationState,
    },
}

impl OfferEdit {
    #[must_use]
    pub fn edit_type(&self) -> EditType {
        match self {
            Self::ActivationStateOnly { .. } => EditType::ActivationStateOnly,
            Self::FixedPriceOnly { .. } => EditType::FixedPriceOnly,
            Self::FixedPriceAndActivationState { .. } => EditType::FixedPriceAndActivationState,
            Self::MktPriceMarginOnly { .. } => EditType::MktPriceMarginOnly,
            Self::MktPriceMarginAndActivationState { .. } => {
                EditType::MktPriceMarginAndActivationState
            }
            Self::TriggerPriceOnly { .. } => EditType::TriggerPriceOnly,
            Self::TriggerPriceAndActivationState { .. } => EditType::TriggerPriceAndActivationState,
            Self::MktPriceMarginAndTriggerPrice { .. } => EditType::MktPriceMarginAndTriggerPrice,
            Self::MktPriceMarginAndTriggerPriceAndActivationState { .. } => {
                EditType::MktPriceMarginAndTriggerPriceAndActivationState
            }
        }
    }

    /// The requested fixed price and the `use_market_based_price` flag sent with it.
    #[must_use]
    pub fn fixed_price(&self) -> Option<(&str, bool)> {
        match self {
            Self::FixedPriceOnly {
                price,
                use_market_based_price,
            }
            | Self::FixedPriceAndActivationState {
                price,
                use_market_based_price,
                ..
            } => Some((price.as_str(), *use_market_based_price)),
            _ => None,
        }
    }

    #[must_use]
    pub fn margin(&self) -> Option<Decimal> {
        match self {
            Self::MktPriceMarginOnly { margin }
            | Self::MktPriceMarginAndActivationState { margin, .. }
            | Self::MktPriceMarginAndTriggerPrice { margin, .. }
            | Self::MktPriceMarginAndTriggerPriceAndActivationState { margin, .. } => Some(*margin),
            _ => None,
        }
    }

    #[must_use]
    pub fn trigger_price(&self) -> Option<i64> {
        match self {
            Self::TriggerPriceOnly { trigger_price }
            | Self::TriggerPriceAndActivationState { trigger_price, .. }
            | Self::MktPriceMarginAndTriggerPrice { trigger_price, .. }
            | Self::MktPriceMarginAndTriggerPriceAndActivationState { trigger_price, .. } => {
                Some(*trigger_price)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn activation(&self) -> Option<ActivationState> {
        match self {
            Self::ActivationStateOnly { activation }
            | Self::FixedPriceAndActivationState { activation, .. }
            | Self::MktPriceMarginAndActivationState { activation, .. }
            | Self::TriggerPriceAndActivationState { activation, .. }
            | Self::MktPriceMarginAndTriggerPriceAndActivationState { activation, .. } => {
                Some(*activation)
            }
            _ => None,
        }
    }

    /// Price mode the offer ends up in if this edit is applied to an offer
    /// currently in `current` mode.
    #[must_use]
    pub fn resulting_price_mode(&self, current: PriceMode) -> PriceMode {
        if let Some((_, use_market_based_price)) = self.fixed_price() {
            if use_market_based_price {
                current
            } else {
                PriceMode::Fixed
            }
        } else if self.margin().is_some() {
            PriceMode::MarketBased
        } else {
            current
        }
    }
}

/// A validated edit, ready to be applied. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditPlan {
    pub edit_type: EditType,
    pub price_mode: Option<PriceMode>,
    pub fixed_price: Option<Price>,
    pub market_price_margin: Option<Decimal>,
    pub trigger_price: Option<Price>,
    pub activation: Option<ActivationState>,
}

impl EditPlan {
    /// A plan that changes nothing.
    #[must_use]
    pub fn empty(edit_type: EditType) -> Self {
        Self {
            edit_type,
            price_mode: None,
            fixed_price: None,
            market_price_margin: None,
            trigger_price: None,
            activation: None,
        }
    }

    /// Whether any pricing field (mode, price, margin, trigger) is touched.
    #[must_use]
    pub fn touches_pricing(&self) -> bool {
        self.price_mode.is_some()
            || self.fixed_price.is_some()
            || self.market_price_margin.is_some()
            || self.trigger_price.is_some()
    }

    #[must_use]
    pub fn is_activation_only(&self) -> bool {
        self.activation.is_some() && !self.touches_pricing()
    }
}
