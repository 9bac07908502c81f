//! Offer mutator: applies a validated [`EditPlan`] to an offer snapshot.
//!
//! The mutator never modifies its input. It returns a new snapshot equal to
//! the input except for the fields named in the plan, plus the fields a price
//! mode switch makes stale:
//!
//! - entering MARKET_BASED clears the fixed price
//! - entering FIXED clears the margin and the trigger price
//!
//! Before returning, the new snapshot is checked against the old one. If the
//! identity or any immutable term differs, or a pricing invariant is broken,
//! the mutator fails with [`PeerbookError::InvariantViolation`]. That is a
//! bug in engine code, never a user error.

use peerbook_types::{EditPlan, Offer, OfferTerms, PeerbookError, Price, PriceMode, Result};
use rust_decimal::Decimal;

/// Apply `plan` to `current`, producing the edited snapshot.
///
/// # Errors
/// Returns `InvariantViolation` if the result would change immutable state
/// or break a pricing invariant.
pub fn apply(current: &Offer, plan: &EditPlan) -> Result<Offer> {
    let mut next = current.clone();

    if let Some(mode) = plan.price_mode {
        next.price_mode = mode;
    }
    if let Some(price) = plan.fixed_price {
        next.fixed_price = price;
    }
    if let Some(margin) = plan.market_price_margin {
        next.market_price_margin = margin;
    }
    if let Some(trigger) = plan.trigger_price {
        next.trigger_price = trigger;
    }
    if let Some(activation) = plan.activation {
        next.activation = activation;
    }

    match (current.price_mode, next.price_mode) {
        (PriceMode::Fixed, PriceMode::MarketBased) => {
            next.fixed_price = Price::ZERO;
        }
        (PriceMode::MarketBased, PriceMode::Fixed) => {
            next.market_price_margin = Decimal::ZERO;
            next.trigger_price = Price::ZERO;
        }
        _ => {}
    }

    ensure_immutables_preserved(current, &next)?;
    next.check_invariants()?;

    tracing::debug!(
        offer = %next.id,
        edit_type = %plan.edit_type,
        price_mode = %next.price_mode,
        activation = %next.activation,
        "Edit plan applied to snapshot"
    );
    Ok(next)
}

fn ensure_immutables_preserved(before: &Offer, after: &Offer) -> Result<()> {
    if before.id != after.id {
        return Err(PeerbookError::InvariantViolation(format!(
            "offer id changed from {} to {}",
            before.id, after.id
        )));
    }
    let changed = changed_terms(&before.terms, &after.terms);
    if !changed.is_empty() {
        tracing::error!(offer = %before.id, fields = ?changed, "Edit changed immutable offer terms");
        return Err(PeerbookError::InvariantViolation(format!(
            "immutable terms of offer {} changed: {}",
            before.id,
            changed.join(", ")
        )));
    }
    Ok(())
}

/// Names of the immutable fields that differ between two term sets.
#[must_use]
pub fn changed_terms(before: &OfferTerms, after: &OfferTerms) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if before.direction != after.direction {
        changed.push("direction");
    }
    if before.currency_code != after.currency_code {
        changed.push("currency_code");
    }
    if before.asset_class != after.asset_class {
        changed.push("asset_class");
    }
    if before.amount != after.amount {
        changed.push("amount");
    }
    if before.min_amount != after.min_amount {
        changed.push("min_amount");
    }
    if before.tx_fee != after.tx_fee {
        changed.push("tx_fee");
    }
    if before.maker_fee != after.maker_fee {
        changed.push("maker_fee");
    }
    if before.payment_account_id != after.payment_account_id {
        changed.push("payment_account_id");
    }
    if before.created_at != after.created_at {
        changed.push("created_at");
    }
    if before.maker_security_deposit() != after.maker_security_deposit() {
        changed.push("maker_security_deposit");
    }
    if before.buyer_security_deposit != after.buyer_security_deposit
        || before.seller_security_deposit != after.seller_security_deposit
    {
        changed.push("security_deposits");
    }
    changed
}
