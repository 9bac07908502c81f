//! # peerbook-types
//!
//! Shared types, errors, and configuration for the **PeerBook** offer engine.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OfferId`]
//! - **Offer model**: [`Offer`], [`OfferTerms`], [`Direction`], [`PriceMode`],
//!   [`ActivationState`], [`AssetClass`], [`Price`]
//! - **Edit model**: [`EditType`], [`EditOfferRequest`], [`OfferEdit`], [`EditPlan`]
//! - **Admission model**: [`Operation`], [`AdmissionClass`], [`RateMeterConfig`], [`WindowUnit`]
//! - **Configuration**: [`NodeConfig`]
//! - **Errors**: [`PeerbookError`] with `PB_ERR_` codes, [`ErrorCategory`], [`RpcError`]
//! - **Constants**: precisions, default quotas, file names

pub mod config;
pub mod constants;
pub mod edit;
pub mod error;
pub mod ids;
pub mod offer;
pub mod operation;

// Re-export all primary types at crate root for ergonomic imports:
//   use peerbook_types::{Offer, OfferEdit, PeerbookError, ...};

pub use config::*;
pub use edit::*;
pub use error::*;
pub use ids::*;
pub use offer::*;
pub use operation::*;

// Constants are accessed via `peerbook_types::constants::FOO`
// (not re-exported to avoid name collisions).
