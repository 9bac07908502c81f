//! Republish coordinator: commits offer changes and keeps the book in step.
//!
//! An edit runs in two phases:
//!
//! 1. Under the offer's lock: validate, mutate, sign, reserve a book queue
//!    slot, commit, enqueue. Nothing in this phase awaits, so a caller that
//!    goes away mid-request either changed nothing or changed everything.
//! 2. On the publisher task: remove the old book entry if there is one, then
//!    add the new one if the offer is active.
//!
//! The local commit is the durability point. The caller gets a
//! [`RepublishTicket`] it may await to learn whether phase 2 succeeded.
//!
//! A new offer is stored inactive and marked as placing while its first
//! addition is in flight. Edits and cancellations of a placing offer don't
//! wait for the book. They queue a removal behind the addition, and the
//! placement only activates the offer if nothing changed it meanwhile.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use peerbook_types::{
    ActivationState, EditPlan, Offer, OfferEdit, OfferId, PeerbookError, Result,
};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use crate::journal::RetryJournal;
use crate::locks::OfferGuard;
use crate::ports::OfferSigner;
use crate::publisher::{BookPublisher, RepublishTicket};
use crate::signer::SignedOfferPayload;
use crate::store::OfferStore;

/// What an edit plan means for the offer's book entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookImpact {
    /// The published payload changes: remove, then re-add if active.
    Republish,
    /// Only local bookkeeping changes.
    LocalOnly,
}

/// Every field an edit can touch today is part of the signed payload.
#[must_use]
pub fn classify(plan: &EditPlan) -> BookImpact {
    if plan.touches_pricing() || plan.activation.is_some() {
        BookImpact::Republish
    } else {
        BookImpact::LocalOnly
    }
}

/// Result of a committed edit.
#[derive(Debug)]
pub struct EditReceipt {
    /// The offer as committed.
    pub offer: Offer,
    pub plan: EditPlan,
    pub ticket: RepublishTicket,
}

/// Outcome of a [`RepublishCoordinator::retry_pending`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub reconciled: usize,
    pub failed: usize,
}

/// Resolves to the active snapshot of a newly placed offer once the book
/// accepted it.
#[derive(Debug)]
pub struct PendingOffer {
    offer_id: OfferId,
    rx: oneshot::Receiver<Result<Offer>>,
}

impl PendingOffer {
    #[must_use]
    pub fn offer_id(&self) -> OfferId {
        self.offer_id
    }
}

impl Future for PendingOffer {
    type Output = Result<Offer>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let offer_id = self.offer_id;
        Pin::new(&mut self.rx).poll(cx).map(|outcome| {
            outcome.unwrap_or_else(|_| {
                Err(PeerbookError::BookUpdateFailed {
                    offer_id,
                    reason: "offer placement was abandoned".into(),
                })
            })
        })
    }
}

/// Reason a placement resolves with when the offer changed before the book
/// accepted it.
pub const PLACEMENT_SUPERSEDED: &str = "offer changed while its placement was in flight";

/// Cheap to clone. Clones share the store, journal and publisher.
#[derive(Clone)]
pub struct RepublishCoordinator {
    store: Arc<OfferStore>,
    signer: Arc<dyn OfferSigner>,
    publisher: BookPublisher,
    journal: Arc<dyn RetryJournal>,
    /// Offers whose first book addition has not settled yet.
    placing: Arc<Mutex<HashSet<OfferId>>>,
}

impl RepublishCoordinator {
    #[must_use]
    pub fn new(
        store: Arc<OfferStore>,
        signer: Arc<dyn OfferSigner>,
        publisher: BookPublisher,
        journal: Arc<dyn RetryJournal>,
    ) -> Self {
        Self {
            store,
            signer,
            publisher,
            journal,
            placing: Arc::default(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<OfferStore> {
        &self.store
    }

    #[must_use]
    pub fn publisher(&self) -> &BookPublisher {
        &self.publisher
    }

    #[must_use]
    pub fn journal(&self) -> &Arc<dyn RetryJournal> {
        &self.journal
    }

    /// Whether the offer's first book addition is still in flight.
    #[must_use]
    pub fn is_placing(&self, offer_id: OfferId) -> bool {
        self.placing.lock().contains(&offer_id)
    }

    /// Whether the book may hold an entry for `offer`.
    fn may_be_listed(&self, offer: &Offer) -> bool {
        offer.is_active() || self.is_placing(offer.id) || self.journal.contains(offer.id)
    }

    /// Validate and commit `edit` against the offer's current snapshot, then
    /// queue the book update.
    ///
    /// # Errors
    /// - `OfferNotFound` if the offer is gone
    /// - `InvalidArgument` / `IllegalState` if the edit is rejected
    /// - `SigningFailed` / `BookUpdateFailed` if the change can't be
    ///   published; nothing is committed in that case
    pub async fn apply_edit(&self, offer_id: OfferId, edit: &OfferEdit) -> Result<EditReceipt> {
        let guard = self.store.lock(offer_id).await;
        // No await points from here on.
        let current = self.store.get(offer_id)?;
        let plan = peerbook_edit::validate(&current, edit).inspect_err(|e| {
            tracing::warn!(offer = %offer_id, edit_type = %edit.edit_type(), error = %e, "Edit rejected");
        })?;
        let next = peerbook_edit::apply(&current, &plan)?;
        tracing::debug!(offer = %offer_id, plan = ?plan, "Edit plan built");

        let ticket = match classify(&plan) {
            BookImpact::LocalOnly => {
                self.store.commit(&guard, next.clone())?;
                RepublishTicket::settled(offer_id)
            }
            BookImpact::Republish => self.commit_and_republish(&guard, &current, next.clone())?,
        };
        tracing::info!(
            offer = %offer_id,
            edit_type = %plan.edit_type,
            price_mode = %next.price_mode,
            activation = %next.activation,
            "Offer edit committed"
        );
        Ok(EditReceipt {
            offer: next,
            plan,
            ticket,
        })
    }

    fn commit_and_republish(
        &self,
        guard: &OfferGuard,
        before: &Offer,
        after: Offer,
    ) -> Result<RepublishTicket> {
        let offer_id = after.id;
        let remove = self.may_be_listed(before);
        let add = if after.is_active() {
            Some(self.sign(&after)?)
        } else {
            None
        };
        if !remove && add.is_none() {
            self.store.commit(guard, after)?;
            return Ok(RepublishTicket::settled(offer_id));
        }
        let slot = self.publisher.try_reserve(offer_id)?;
        self.store.commit(guard, after)?;
        Ok(slot.republish(remove, add))
    }

    /// Insert a new offer inactive and queue its publication. The returned
    /// future activates it locally once the book accepts it.
    ///
    /// The offer's lock is released as soon as the addition is queued.
    /// If the offer is edited or canceled before the book answers, the
    /// placement resolves to `IllegalState` or `OfferNotFound` and the later
    /// change stands.
    ///
    /// # Errors
    /// `DuplicateOffer`, `SigningFailed` or `BookUpdateFailed`; nothing is
    /// stored in those cases.
    pub async fn place(&self, offer: Offer) -> Result<PendingOffer> {
        let offer_id = offer.id;
        let mut active = offer;
        active.activation = ActivationState::Active;
        let mut placed = active.clone();
        placed.activation = ActivationState::Inactive;

        let ticket = {
            let _guard = self.store.lock(offer_id).await;
            let payload = self.sign(&active)?;
            let slot = self.publisher.try_reserve(offer_id)?;
            self.store.insert(placed.clone())?;
            self.placing.lock().insert(offer_id);
            slot.republish(false, Some(payload))
        };
        tracing::info!(offer = %offer_id, currency = %active.terms.currency_code, "Offer placed");

        let (tx, rx) = oneshot::channel();
        let store = Arc::clone(&self.store);
        let placing = Arc::clone(&self.placing);
        tokio::spawn(async move {
            let published = ticket.await;
            let guard = store.lock(offer_id).await;
            placing.lock().remove(&offer_id);
            let outcome = published.and_then(|()| activate_placed(&store, &guard, &placed, active));
            drop(guard);
            match &outcome {
                Ok(_) => tracing::info!(offer = %offer_id, "Offer activated"),
                Err(e) => tracing::warn!(offer = %offer_id, error = %e, "Offer placement failed"),
            }
            let _ = tx.send(outcome);
        });
        Ok(PendingOffer { offer_id, rx })
    }

    /// Remove an offer locally and queue its withdrawal from the book.
    ///
    /// # Errors
    /// `OfferNotFound` if the offer is gone, `BookUpdateFailed` if the
    /// withdrawal can't be queued; the offer is kept in that case.
    pub async fn cancel(&self, offer_id: OfferId) -> Result<RepublishTicket> {
        let guard = self.store.lock(offer_id).await;
        let current = self.store.get(offer_id)?;
        let ticket = if self.may_be_listed(&current) {
            let slot = self.publisher.try_reserve(offer_id)?;
            self.store.remove(&guard)?;
            slot.republish(true, None)
        } else {
            self.store.remove(&guard)?;
            RepublishTicket::settled(offer_id)
        };
        tracing::info!(offer = %offer_id, "Offer canceled");
        Ok(ticket)
    }

    /// Bring the book in line with local state for every recorded retry
    /// intent. Active offers are removed and re-added with a fresh
    /// signature. Inactive or unknown offers are removed.
    pub async fn retry_pending(&self) -> RetryReport {
        let mut report = RetryReport::default();
        let mut tickets = Vec::new();
        for intent in self.journal.pending() {
            let offer_id = intent.offer_id;
            // Wait for queue room before taking the lock so edits to this
            // offer never queue up behind a full book queue.
            let slot = match self.publisher.reserve(offer_id).await {
                Ok(slot) => slot,
                Err(e) => {
                    tracing::warn!(offer = %offer_id, error = %e, "Cannot queue reconciliation");
                    report.failed += 1;
                    continue;
                }
            };
            let _guard = self.store.lock(offer_id).await;
            if !self.journal.contains(offer_id) {
                // Settled by a newer book job while we waited.
                continue;
            }
            let add = match self.store.get(offer_id) {
                Ok(offer) if offer.is_active() => match self.sign(&offer) {
                    Ok(payload) => Some(payload),
                    Err(_) => {
                        report.failed += 1;
                        continue;
                    }
                },
                _ => None,
            };
            tickets.push(slot.republish(true, add));
        }
        for ticket in tickets {
            match ticket.await {
                Ok(()) => report.reconciled += 1,
                Err(_) => report.failed += 1,
            }
        }
        if report != RetryReport::default() {
            tracing::info!(
                reconciled = report.reconciled,
                failed = report.failed,
                "Retry pass finished"
            );
        }
        report
    }

    fn sign(&self, offer: &Offer) -> Result<SignedOfferPayload> {
        self.signer.sign(offer).map_err(|e| {
            tracing::error!(offer = %offer.id, error = %e, "Offer signing failed");
            PeerbookError::SigningFailed {
                offer_id: offer.id,
                reason: e.to_string(),
            }
        })
    }
}

fn activate_placed(
    store: &OfferStore,
    guard: &OfferGuard,
    placed: &Offer,
    active: Offer,
) -> Result<Offer> {
    let current = store.get(active.id)?;
    if current != *placed {
        return Err(PeerbookError::illegal_state(active.id, PLACEMENT_SUPERSEDED));
    }
    store.commit(guard, active.clone())?;
    Ok(active)
}

/// Run [`RepublishCoordinator::retry_pending`] every `every` while intents
/// are recorded. Runs until the task is aborted.
pub async fn retry_task(coordinator: RepublishCoordinator, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if coordinator.journal.pending().is_empty() {
            continue;
        }
        let report = coordinator.retry_pending().await;
        tracing::debug!(
            reconciled = report.reconciled,
            failed = report.failed,
            "Periodic reconciliation ran"
        );
    }
}
