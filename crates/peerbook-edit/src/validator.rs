//! Edit validator: decides whether a typed edit is legal for an offer.
//!
//! Rules are checked in a fixed order and the first failing rule wins:
//!
//! 1. A negative trigger price is an invalid argument.
//! 2. A trigger price on an offer that stays FIXED is illegal.
//! 3. A fixed price on a MARKET_BASED offer that stays MARKET_BASED is illegal.
//! 4. Margin or trigger price on a non-convertible asset offer is illegal.
//! 5. Otherwise the edit's fields are parsed and scaled into an [`EditPlan`].

use std::str::FromStr;

use peerbook_types::{EditPlan, Offer, OfferEdit, PeerbookError, Price, PriceMode, Result};
use rust_decimal::Decimal;

pub const NEGATIVE_TRIGGER_PRICE: &str = "cannot set trigger price to a negative value";
/// Also the answer for a trigger-only edit on a non-convertible offer: the
/// fixed-price rule is checked before the asset rule, so callers see this
/// message rather than [`MARKET_PRICING_ON_FIXED_ASSET`]. Both are `ILLEGAL_STATE`.
pub const TRIGGER_PRICE_ON_FIXED_OFFER: &str = "cannot set a trigger price in a fixed price offer";
pub const FIXED_PRICE_ON_MARKET_OFFER: &str =
    "cannot set fixed price in a market-price-margin based offer";
pub const MARKET_PRICING_ON_FIXED_ASSET: &str =
    "cannot set market price margin or trigger price on a fixed price asset offer";

/// Validate `edit` against the current snapshot of the offer.
///
/// # Errors
/// - `InvalidArgument` for a negative trigger price or an unusable fixed price
/// - `IllegalState` when the edit conflicts with the offer's price mode or asset class
pub fn validate(current: &Offer, edit: &OfferEdit) -> Result<EditPlan> {
    let id = current.id;
    let resulting_mode = edit.resulting_price_mode(current.price_mode);

    if edit.trigger_price().is_some_and(|t| t < 0) {
        return Err(PeerbookError::invalid_argument(id, NEGATIVE_TRIGGER_PRICE));
    }

    if edit.trigger_price().is_some() && resulting_mode == PriceMode::Fixed {
        return Err(PeerbookError::illegal_state(id, TRIGGER_PRICE_ON_FIXED_OFFER));
    }

    if edit.fixed_price().is_some()
        && current.is_market_based()
        && resulting_mode == PriceMode::MarketBased
    {
        return Err(PeerbookError::illegal_state(id, FIXED_PRICE_ON_MARKET_OFFER));
    }

    if current.is_non_convertible() && (edit.margin().is_some() || edit.trigger_price().is_some())
    {
        return Err(PeerbookError::illegal_state(id, MARKET_PRICING_ON_FIXED_ASSET));
    }

    let mut plan = EditPlan::empty(edit.edit_type());
    plan.price_mode = (resulting_mode != current.price_mode).then_some(resulting_mode);
    if let Some((raw, _)) = edit.fixed_price() {
        plan.fixed_price = Some(parse_fixed_price(current, raw)?);
    }
    plan.market_price_margin = edit.margin();
    plan.trigger_price = edit.trigger_price().map(Price);
    plan.activation = edit.activation();
    Ok(plan)
}

/// Parse a decimal price string and scale it to the offer's precision.
///
/// # Errors
/// `InvalidArgument` if the string is not a decimal, is not positive at the
/// offer's precision, or does not fit.
pub fn parse_fixed_price(current: &Offer, raw: &str) -> Result<Price> {
    let id = current.id;
    let value = Decimal::from_str(raw)
        .map_err(|_| PeerbookError::invalid_argument(id, format!("cannot parse fixed price '{raw}'")))?;
    if value <= Decimal::ZERO {
        return Err(PeerbookError::invalid_argument(
            id,
            "cannot set fixed price to a non-positive value",
        ));
    }
    let price = Price::from_decimal(value, current.price_precision()).ok_or_else(|| {
        PeerbookError::invalid_argument(id, format!("fixed price '{raw}' is out of range"))
    })?;
    // A positive value below the precision's smallest step rounds to zero.
    if !price.is_positive() {
        return Err(PeerbookError::invalid_argument(
            id,
            "cannot set fixed price to a non-positive value",
        ));
    }
    Ok(price)
}
