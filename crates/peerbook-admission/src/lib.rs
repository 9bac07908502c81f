//! # peerbook-admission
//!
//! Admission control for the node's RPC surface. Every call is metered
//! against its operation's quota before any business logic runs.
//!
//! - [`CallRateMeter`]: sliding-window call counter for one operation
//! - [`AdmissionPolicy`]: the fixed operation to quota table, defaults plus
//!   overrides merged once at load time
//! - [`AdmissionGate`]: one meter per operation, each behind its own mutex
//!
//! Decisions depend only on the operation and the clock. They never look
//! at offers or callers.

pub mod gate;
pub mod meter;
pub mod policy;

pub use gate::AdmissionGate;
pub use meter::CallRateMeter;
pub use policy::{AdmissionPolicy, load_admission_overrides, parse_admission_overrides};
