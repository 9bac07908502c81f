//! Shared fixtures for node integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use peerbook_admission::{AdmissionGate, AdmissionPolicy};
use peerbook_node::*;
use peerbook_types::*;
use rust_decimal::Decimal;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookCall {
    Remove(OfferId),
    Add(OfferId),
}

/// Order book double that records calls and fails on request.
#[derive(Default)]
pub struct RecordingOrderBook {
    calls: Mutex<Vec<BookCall>>,
    added: Mutex<Vec<SignedOfferPayload>>,
    fail_removals: AtomicUsize,
    fail_additions: AtomicUsize,
    latency: Mutex<Option<Duration>>,
}

impl RecordingOrderBook {
    pub fn calls(&self) -> Vec<BookCall> {
        self.calls.lock().clone()
    }

    pub fn added(&self) -> Vec<SignedOfferPayload> {
        self.added.lock().clone()
    }

    pub fn fail_next_removals(&self, n: usize) {
        self.fail_removals.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_additions(&self, n: usize) {
        self.fail_additions.store(n, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn wait(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl OrderBook for RecordingOrderBook {
    async fn remove_from_book(&self, offer_id: OfferId) -> std::result::Result<(), BookError> {
        self.wait().await;
        self.calls.lock().push(BookCall::Remove(offer_id));
        if Self::take_failure(&self.fail_removals) {
            return Err(BookError::Unreachable("peer 10.0.0.7 timed out".into()));
        }
        Ok(())
    }

    async fn add_to_book(&self, payload: SignedOfferPayload) -> std::result::Result<(), BookError> {
        self.wait().await;
        self.calls.lock().push(BookCall::Add(payload.offer_id()));
        if Self::take_failure(&self.fail_additions) {
            return Err(BookError::Rejected("stale payload".into()));
        }
        self.added.lock().push(payload);
        Ok(())
    }
}

/// Signer whose key is unusable.
pub struct BrokenSigner;

impl OfferSigner for BrokenSigner {
    fn sign(&self, _offer: &Offer) -> std::result::Result<SignedOfferPayload, SignerError> {
        Err(SignerError("hardware key not present".into()))
    }
}

/// Quota large enough that admission never interferes.
pub fn generous_policy() -> AdmissionPolicy {
    let overrides: HashMap<Operation, RateMeterConfig> = Operation::ALL
        .into_iter()
        .map(|op| (op, RateMeterConfig::new(10_000, WindowUnit::Seconds)))
        .collect();
    AdmissionPolicy::from_overrides(&overrides)
}

pub struct Harness {
    pub dispatcher: Arc<RequestDispatcher>,
    pub book: Arc<RecordingOrderBook>,
    pub feed: Arc<StaticPriceFeed>,
    pub journal: Arc<InMemoryRetryJournal>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(&generous_policy(), Arc::new(Ed25519OfferSigner::from_seed([42u8; 32])))
    }

    pub fn with_policy(policy: &AdmissionPolicy) -> Self {
        Self::build(policy, Arc::new(Ed25519OfferSigner::from_seed([42u8; 32])))
    }

    pub fn with_signer(signer: Arc<dyn OfferSigner>) -> Self {
        Self::build(&generous_policy(), signer)
    }

    fn build(policy: &AdmissionPolicy, signer: Arc<dyn OfferSigner>) -> Self {
        init_tracing();
        let book = Arc::new(RecordingOrderBook::default());
        let feed = Arc::new(StaticPriceFeed::new());
        let journal = Arc::new(InMemoryRetryJournal::new());
        let (publisher, _worker) = BookPublisher::spawn(book.clone(), journal.clone(), 64);
        let coordinator = RepublishCoordinator::new(
            Arc::new(OfferStore::new()),
            signer,
            publisher,
            journal.clone(),
        );
        let dispatcher = RequestDispatcher::new(AdmissionGate::new(policy), coordinator, feed.clone());
        Self {
            dispatcher: Arc::new(dispatcher),
            book,
            feed,
            journal,
        }
    }

    /// Store an offer as if it had been placed and published earlier.
    pub fn seed(&self, offer: &Offer) {
        self.dispatcher.store().insert(offer.clone()).unwrap();
    }

    pub fn stored(&self, offer_id: OfferId) -> Offer {
        self.dispatcher.store().get(offer_id).unwrap()
    }
}

pub fn edit_request(offer_id: OfferId, edit_type: EditType) -> EditOfferRequest {
    EditOfferRequest {
        id: offer_id,
        price: String::new(),
        use_market_based_price: false,
        market_price_margin: Decimal::ZERO,
        trigger_price: 0,
        activation: ActivationState::Active,
        edit_type,
    }
}

pub fn new_fixed_offer(currency_code: &str, price: &str) -> NewOffer {
    NewOffer {
        direction: Direction::Sell,
        currency_code: currency_code.into(),
        asset_class: AssetClass::Fiat,
        amount: 10_000_000,
        min_amount: 1_000_000,
        tx_fee: 5_000,
        maker_fee: 1_000,
        payment_account_id: "sepa-main".into(),
        buyer_security_deposit: 1_500_000,
        seller_security_deposit: 1_500_000,
        use_market_based_price: false,
        price: price.into(),
        market_price_margin: Decimal::ZERO,
        trigger_price: 0,
    }
}
