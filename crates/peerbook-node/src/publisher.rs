//! Book publisher: the single task that talks to the order book.
//!
//! Jobs are executed one at a time in queue order. Within a job the removal
//! always runs before the addition, and a failed removal skips the
//! addition. Since edits to one offer enqueue while holding that offer's
//! lock, the book sees each offer's changes in commit order.
//!
//! A failed job records a [`RetryIntent`] and resolves its ticket to
//! `BookUpdateFailed`. A job that completes clears any intent for its offer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use peerbook_types::{OfferId, PeerbookError, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::journal::{RetryIntent, RetryJournal};
use crate::ports::{BookError, OrderBook};
use crate::signer::SignedOfferPayload;

#[derive(Debug)]
enum BookJob {
    Republish {
        offer_id: OfferId,
        remove: bool,
        add: Option<SignedOfferPayload>,
        done: oneshot::Sender<Result<()>>,
    },
    Flush(oneshot::Sender<()>),
}

/// Handle to the publisher task. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BookPublisher {
    tx: mpsc::Sender<BookJob>,
}

impl BookPublisher {
    /// Start the publisher task. It runs until every handle is dropped.
    #[must_use]
    pub fn spawn(
        book: Arc<dyn OrderBook>,
        journal: Arc<dyn RetryJournal>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run(rx, book, journal));
        (Self { tx }, worker)
    }

    /// Reserve a queue slot without waiting.
    ///
    /// # Errors
    /// `BookUpdateFailed` when the queue is full or the publisher stopped.
    pub fn try_reserve(&self, offer_id: OfferId) -> Result<BookSlot> {
        match self.tx.clone().try_reserve_owned() {
            Ok(permit) => Ok(BookSlot { permit, offer_id }),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(offer = %offer_id, "Book queue is full");
                Err(book_update_failed(offer_id, "book queue is full"))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(book_update_failed(offer_id, "book publisher stopped"))
            }
        }
    }

    /// Reserve a queue slot, waiting for room if the queue is full.
    ///
    /// # Errors
    /// `BookUpdateFailed` when the publisher stopped.
    pub async fn reserve(&self, offer_id: OfferId) -> Result<BookSlot> {
        let permit = self
            .tx
            .clone()
            .reserve_owned()
            .await
            .map_err(|_| book_update_failed(offer_id, "book publisher stopped"))?;
        Ok(BookSlot { permit, offer_id })
    }

    /// Wait until every job queued before this call has finished.
    pub async fn flush(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(BookJob::Flush(done)).await.is_ok() {
            let _ = rx.await;
        }
    }
}

/// A reserved place in the book queue. Sending on it cannot fail.
#[derive(Debug)]
pub struct BookSlot {
    permit: mpsc::OwnedPermit<BookJob>,
    offer_id: OfferId,
}

impl BookSlot {
    /// Queue a removal (if `remove`) followed by an addition (if `add`).
    #[must_use]
    pub fn republish(self, remove: bool, add: Option<SignedOfferPayload>) -> RepublishTicket {
        let (done, rx) = oneshot::channel();
        tracing::debug!(
            offer = %self.offer_id,
            remove,
            add = add.is_some(),
            "Book job queued"
        );
        self.permit.send(BookJob::Republish {
            offer_id: self.offer_id,
            remove,
            add,
            done,
        });
        RepublishTicket {
            offer_id: self.offer_id,
            rx,
        }
    }
}

/// Resolves once the book reflects a committed change, or to
/// `BookUpdateFailed` if it could not be brought up to date.
///
/// Dropping the ticket does not cancel the book work.
#[derive(Debug)]
pub struct RepublishTicket {
    offer_id: OfferId,
    rx: oneshot::Receiver<Result<()>>,
}

impl RepublishTicket {
    /// A ticket for a change that needs no book work.
    #[must_use]
    pub fn settled(offer_id: OfferId) -> Self {
        let (done, rx) = oneshot::channel();
        let _ = done.send(Ok(()));
        Self { offer_id, rx }
    }

    #[must_use]
    pub fn offer_id(&self) -> OfferId {
        self.offer_id
    }
}

impl Future for RepublishTicket {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let offer_id = self.offer_id;
        Pin::new(&mut self.rx).poll(cx).map(|outcome| {
            outcome.unwrap_or_else(|_| Err(book_update_failed(offer_id, "book publisher stopped")))
        })
    }
}

fn book_update_failed(offer_id: OfferId, reason: impl Into<String>) -> PeerbookError {
    PeerbookError::BookUpdateFailed {
        offer_id,
        reason: reason.into(),
    }
}

async fn run(
    mut rx: mpsc::Receiver<BookJob>,
    book: Arc<dyn OrderBook>,
    journal: Arc<dyn RetryJournal>,
) {
    while let Some(job) = rx.recv().await {
        match job {
            BookJob::Flush(done) => {
                let _ = done.send(());
            }
            BookJob::Republish {
                offer_id,
                remove,
                add,
                done,
            } => {
                let outcome = process(book.as_ref(), journal.as_ref(), offer_id, remove, add).await;
                let _ = done.send(outcome);
            }
        }
    }
    tracing::debug!("Book publisher stopped");
}

async fn process(
    book: &dyn OrderBook,
    journal: &dyn RetryJournal,
    offer_id: OfferId,
    remove: bool,
    add: Option<SignedOfferPayload>,
) -> Result<()> {
    // An earlier failure may have left a stale entry on the book.
    let remove = remove || journal.contains(offer_id);
    if remove {
        book.remove_from_book(offer_id)
            .await
            .map_err(|e| record_failure(journal, offer_id, "removal", &e))?;
        tracing::info!(offer = %offer_id, "Offer removed from book");
    }
    if let Some(payload) = add {
        let digest = payload.digest.clone();
        book.add_to_book(payload)
            .await
            .map_err(|e| record_failure(journal, offer_id, "addition", &e))?;
        tracing::info!(offer = %offer_id, digest = %digest, "Offer added to book");
    }
    if let Err(e) = journal.clear(offer_id) {
        tracing::error!(offer = %offer_id, error = %e, "Failed to clear retry intent");
    }
    Ok(())
}

fn record_failure(
    journal: &dyn RetryJournal,
    offer_id: OfferId,
    step: &str,
    err: &BookError,
) -> PeerbookError {
    let reason = format!("{step} failed: {err}");
    tracing::warn!(offer = %offer_id, reason = %reason, "Book update failed, recording retry intent");
    if let Err(e) = journal.record(RetryIntent::new(offer_id, reason.clone())) {
        tracing::error!(offer = %offer_id, error = %e, "Failed to record retry intent");
    }
    book_update_failed(offer_id, reason)
}
