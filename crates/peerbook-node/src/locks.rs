//! Per-offer lock registry.
//!
//! Edits to the same offer run one at a time. Edits to different offers
//! never wait on each other. The registry holds an entry only while some
//! task holds or waits for that offer's lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use peerbook_types::OfferId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug)]
struct Entry {
    lock: Arc<AsyncMutex<()>>,
    /// Holders plus waiters.
    refs: usize,
}

#[derive(Debug, Default)]
struct Registry {
    entries: Mutex<HashMap<OfferId, Entry>>,
}

/// Keyed registry of async mutexes, one per offer in use.
#[derive(Debug, Clone, Default)]
pub struct OfferLocks {
    inner: Arc<Registry>,
}

impl OfferLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `offer_id`.
    ///
    /// Dropping the returned future before it resolves gives up the place in
    /// line and leaves the registry as if the call never happened.
    pub async fn lock(&self, offer_id: OfferId) -> OfferGuard {
        let lease = self.lease(offer_id);
        let guard = Arc::clone(&lease.lock).lock_owned().await;
        OfferGuard {
            _guard: guard,
            lease,
        }
    }

    /// Number of offers with a holder or waiter.
    #[must_use]
    pub fn active(&self) -> usize {
        self.inner.entries.lock().len()
    }

    fn lease(&self, offer_id: OfferId) -> Lease {
        let mut entries = self.inner.entries.lock();
        let entry = entries.entry(offer_id).or_insert_with(|| Entry {
            lock: Arc::new(AsyncMutex::new(())),
            refs: 0,
        });
        entry.refs += 1;
        Lease {
            offer_id,
            lock: Arc::clone(&entry.lock),
            registry: Arc::clone(&self.inner),
        }
    }
}

/// A counted reference to a registry entry. Released on drop.
#[derive(Debug)]
struct Lease {
    offer_id: OfferId,
    lock: Arc<AsyncMutex<()>>,
    registry: Arc<Registry>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut entries = self.registry.entries.lock();
        if let Some(entry) = entries.get_mut(&self.offer_id) {
            entry.refs -= 1;
            if entry.refs == 0 {
                entries.remove(&self.offer_id);
            }
        }
    }
}

/// Exclusive access to one offer. Released on drop.
#[derive(Debug)]
pub struct OfferGuard {
    // Field order matters: the mutex guard is released before the lease.
    _guard: OwnedMutexGuard<()>,
    lease: Lease,
}

impl OfferGuard {
    #[must_use]
    pub fn offer_id(&self) -> OfferId {
        self.lease.offer_id
    }
}
