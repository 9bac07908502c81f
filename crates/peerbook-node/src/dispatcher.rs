//! Request dispatcher: the node's RPC entry point.
//!
//! Every call passes admission first, then the offer lookup, then the
//! operation itself. Errors leave as [`RpcError`]: expected outcomes keep
//! their message, operational and internal faults are logged in full here
//! and reduced to a safe summary for the caller.

use std::sync::Arc;
use std::time::Duration;

use peerbook_admission::{AdmissionGate, AdmissionPolicy};
use peerbook_types::{
    EditOfferRequest, NodeConfig, Offer, OfferId, Operation, PeerbookError, Result, RpcError,
    constants,
};
use tokio::task::JoinHandle;

use crate::journal::{JsonFileRetryJournal, RetryJournal};
use crate::ports::{MarketPriceFeed, OfferSigner, OrderBook};
use crate::publisher::BookPublisher;
use crate::republish::{self, EditReceipt, PendingOffer, RepublishCoordinator, RetryReport};
use crate::requests::{NewOffer, OfferFilter, OfferSnapshot};
use crate::store::OfferStore;

/// External services a node is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub book: Arc<dyn OrderBook>,
    pub signer: Arc<dyn OfferSigner>,
    pub price_feed: Arc<dyn MarketPriceFeed>,
}

pub struct RequestDispatcher {
    gate: AdmissionGate,
    coordinator: RepublishCoordinator,
    price_feed: Arc<dyn MarketPriceFeed>,
    /// Background reconciliation, aborted on drop.
    retry_task: Option<JoinHandle<()>>,
}

impl RequestDispatcher {
    #[must_use]
    pub fn new(
        gate: AdmissionGate,
        coordinator: RepublishCoordinator,
        price_feed: Arc<dyn MarketPriceFeed>,
    ) -> Self {
        Self {
            gate,
            coordinator,
            price_feed,
            retry_task: None,
        }
    }

    /// Reconcile recorded retry intents every `every` in the background
    /// until the dispatcher is dropped. Replaces a previously started task.
    pub fn start_retry_task(&mut self, every: Duration) {
        if let Some(previous) = self.retry_task.take() {
            previous.abort();
        }
        let task = tokio::spawn(republish::retry_task(self.coordinator.clone(), every));
        self.retry_task = Some(task);
    }

    /// Build a node from its configuration: load admission overrides, open
    /// the retry journal, start the book publisher, reconcile any intents
    /// left by a previous run, and start the background reconciliation.
    ///
    /// Returns the dispatcher and the publisher task handle.
    ///
    /// # Errors
    /// Configuration or journal loading errors.
    pub async fn start(
        config: &NodeConfig,
        collaborators: Collaborators,
    ) -> Result<(Self, JoinHandle<()>)> {
        let policy = AdmissionPolicy::from_config(config)?;
        let journal: Arc<dyn RetryJournal> =
            Arc::new(JsonFileRetryJournal::open(config.retry_journal_path())?);
        let (publisher, worker) = BookPublisher::spawn(
            collaborators.book,
            Arc::clone(&journal),
            constants::BOOK_QUEUE_CAPACITY,
        );
        let coordinator = RepublishCoordinator::new(
            Arc::new(OfferStore::new()),
            collaborators.signer,
            publisher,
            journal,
        );
        let mut dispatcher = Self::new(
            AdmissionGate::new(&policy),
            coordinator,
            collaborators.price_feed,
        );
        let recovered = dispatcher.coordinator.retry_pending().await;
        if let Some(every) = config.retry_interval() {
            dispatcher.start_retry_task(every);
        }
        tracing::info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            data_dir = %config.data_dir.display(),
            reconciled = recovered.reconciled,
            "Node started"
        );
        Ok((dispatcher, worker))
    }

    #[must_use]
    pub fn coordinator(&self) -> &RepublishCoordinator {
        &self.coordinator
    }

    #[must_use]
    pub fn store(&self) -> &Arc<OfferStore> {
        self.coordinator.store()
    }

    /// Edit one of the node's offers.
    ///
    /// # Errors
    /// See [`RepublishCoordinator::apply_edit`], plus `RESOURCE_EXHAUSTED`.
    pub async fn edit_offer(&self, request: EditOfferRequest) -> std::result::Result<EditReceipt, RpcError> {
        let op = Operation::EditOffer;
        self.admit(op)?;
        let offer_id = request.id;
        self.lookup(op, offer_id)?;
        let edit = request.edit();
        self.coordinator
            .apply_edit(offer_id, &edit)
            .await
            .map_err(|e| reject(op, e))
    }

    /// # Errors
    /// `NOT_FOUND` or `RESOURCE_EXHAUSTED`.
    pub fn get_offer(&self, offer_id: OfferId) -> std::result::Result<OfferSnapshot, RpcError> {
        let op = Operation::GetOffer;
        self.admit(op)?;
        let offer = self.lookup(op, offer_id)?;
        Ok(self.snapshot(offer))
    }

    /// The node's offers matching `filter`, oldest first.
    ///
    /// # Errors
    /// `RESOURCE_EXHAUSTED`.
    pub fn list_offers(&self, filter: &OfferFilter) -> std::result::Result<Vec<OfferSnapshot>, RpcError> {
        self.admit(Operation::ListOffers)?;
        Ok(self
            .store()
            .list()
            .into_iter()
            .filter(|offer| filter.matches(offer))
            .map(|offer| self.snapshot(offer))
            .collect())
    }

    /// Create and publish a new offer. Await the returned [`PendingOffer`]
    /// for the active snapshot.
    ///
    /// # Errors
    /// Validation errors of [`NewOffer::into_offer`], `RESOURCE_EXHAUSTED`,
    /// or an operational failure if publication can't be queued.
    pub async fn create_offer(&self, request: NewOffer) -> std::result::Result<PendingOffer, RpcError> {
        let op = Operation::CreateOffer;
        self.admit(op)?;
        let offer = request
            .into_offer(OfferId::new())
            .map_err(|e| reject(op, e))?;
        self.coordinator.place(offer).await.map_err(|e| reject(op, e))
    }

    /// Cancel an offer. The book withdrawal proceeds in the background.
    ///
    /// # Errors
    /// `NOT_FOUND`, `RESOURCE_EXHAUSTED`, or an operational failure if the
    /// withdrawal can't be queued.
    pub async fn cancel_offer(&self, offer_id: OfferId) -> std::result::Result<(), RpcError> {
        let op = Operation::CancelOffer;
        self.admit(op)?;
        self.lookup(op, offer_id)?;
        let _ticket = self
            .coordinator
            .cancel(offer_id)
            .await
            .map_err(|e| reject(op, e))?;
        Ok(())
    }

    /// Reconcile recorded retry intents with the book.
    pub async fn retry_pending(&self) -> RetryReport {
        self.coordinator.retry_pending().await
    }

    /// Wait for every queued book job to finish.
    pub async fn flush(&self) {
        self.coordinator.publisher().flush().await;
    }

    fn admit(&self, op: Operation) -> std::result::Result<(), RpcError> {
        self.gate.admit(op).map_err(|e| reject(op, e))
    }

    fn lookup(&self, op: Operation, offer_id: OfferId) -> std::result::Result<Offer, RpcError> {
        self.store().get(offer_id).map_err(|e| reject(op, e))
    }

    fn snapshot(&self, offer: Offer) -> OfferSnapshot {
        let market_price = if offer.is_market_based() {
            self.price_feed
                .current_market_price(&offer.terms.currency_code)
                .ok()
        } else {
            None
        };
        OfferSnapshot {
            effective_price: offer.effective_price(market_price),
            offer,
        }
    }
}

impl Drop for RequestDispatcher {
    fn drop(&mut self) {
        if let Some(task) = self.retry_task.take() {
            task.abort();
        }
    }
}

fn reject(op: Operation, err: PeerbookError) -> RpcError {
    if err.is_user_facing() {
        tracing::debug!(operation = %op, code = err.code(), error = %err, "Request refused");
    } else {
        tracing::error!(operation = %op, code = err.code(), error = %err, "Request failed");
    }
    RpcError::from(err)
}
