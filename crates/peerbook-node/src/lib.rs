//! # peerbook-node
//!
//! The stateful half of a PeerBook node: offer storage, book publication,
//! and the RPC entry point.
//!
//! ```text
//! RequestDispatcher ─▶ AdmissionGate
//!        │
//!        ▼
//! RepublishCoordinator ─▶ OfferStore (+ OfferLocks)
//!        │
//!        ▼
//! BookPublisher task ─▶ OrderBook
//!        │
//!        ▼
//!   RetryJournal
//! ```
//!
//! - [`OfferStore`]: authoritative local snapshots, written under per-offer locks
//! - [`RepublishCoordinator`]: commits edits, placements and cancellations
//!   and queues the matching book work
//! - [`BookPublisher`]: one task that applies book jobs in order and records
//!   retry intents on failure
//! - [`RequestDispatcher`]: admission, lookup, dispatch, error mapping

pub mod dispatcher;
pub mod journal;
pub mod locks;
pub mod ports;
pub mod publisher;
pub mod republish;
pub mod requests;
pub mod signer;
pub mod store;

pub use dispatcher::{Collaborators, RequestDispatcher};
pub use journal::{InMemoryRetryJournal, JsonFileRetryJournal, RetryIntent, RetryJournal};
pub use locks::{OfferGuard, OfferLocks};
pub use ports::{BookError, MarketPriceFeed, OfferSigner, OrderBook, SignerError, StaticPriceFeed};
pub use publisher::{BookPublisher, BookSlot, RepublishTicket};
pub use republish::{
    BookImpact, EditReceipt, PLACEMENT_SUPERSEDED, PendingOffer, RepublishCoordinator,
    RetryReport, classify, retry_task,
};
pub use requests::{NewOffer, OfferFilter, OfferSnapshot};
pub use signer::{Ed25519OfferSigner, SignedOfferPayload, offer_signing_payload};
pub use store::OfferStore;
