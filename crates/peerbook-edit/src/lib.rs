//! # peerbook-edit
//!
//! Pure edit pipeline for a node's own offers: no I/O, no locks, no clocks.
//!
//! ```text
//! OfferEdit ──validate()──▶ EditPlan ──apply()──▶ Offer
//! ```
//!
//! 1. **Validator**: checks a typed edit against the offer's current price
//!    mode and asset class and produces an [`EditPlan`](peerbook_types::EditPlan)
//! 2. **Mutator**: applies a plan to a snapshot, clears fields made stale by
//!    a price mode switch, and refuses to return an offer whose immutable
//!    terms changed
//!
//! Both steps are deterministic: the same offer and edit always produce the
//! same plan or the same rejection.

pub mod mutator;
pub mod validator;

pub use mutator::apply;
pub use validator::validate;
