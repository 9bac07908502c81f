//! Local offer store.
//!
//! Holds the authoritative snapshot of every offer this node owns. Reads
//! are lock-free with respect to edits: they see the last committed
//! snapshot. Writes to an existing offer require that offer's
//! [`OfferGuard`].

use std::collections::HashMap;

use parking_lot::RwLock;
use peerbook_types::{Offer, OfferId, PeerbookError, Result};

use crate::locks::{OfferGuard, OfferLocks};

#[derive(Debug, Default)]
pub struct OfferStore {
    offers: RwLock<HashMap<OfferId, Offer>>,
    locks: OfferLocks,
}

impl OfferStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to `offer_id`.
    pub async fn lock(&self, offer_id: OfferId) -> OfferGuard {
        self.locks.lock(offer_id).await
    }

    /// # Errors
    /// `OfferNotFound` if no offer has this id.
    pub fn get(&self, offer_id: OfferId) -> Result<Offer> {
        self.offers
            .read()
            .get(&offer_id)
            .cloned()
            .ok_or(PeerbookError::OfferNotFound(offer_id))
    }

    #[must_use]
    pub fn contains(&self, offer_id: OfferId) -> bool {
        self.offers.read().contains_key(&offer_id)
    }

    /// All offers, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<Offer> {
        let mut offers: Vec<Offer> = self.offers.read().values().cloned().collect();
        offers.sort_by(|a, b| {
            a.terms
                .created_at
                .cmp(&b.terms.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        offers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offers.read().is_empty()
    }

    /// Add a new offer.
    ///
    /// # Errors
    /// `DuplicateOffer` if the id is taken, `InvariantViolation` if the offer
    /// breaks a pricing invariant.
    pub fn insert(&self, offer: Offer) -> Result<()> {
        offer.check_invariants()?;
        let mut offers = self.offers.write();
        if offers.contains_key(&offer.id) {
            return Err(PeerbookError::DuplicateOffer(offer.id));
        }
        offers.insert(offer.id, offer);
        Ok(())
    }

    /// Replace an existing offer's snapshot.
    ///
    /// # Errors
    /// `Internal` if `guard` belongs to another offer, `OfferNotFound` if the
    /// offer is gone.
    pub fn commit(&self, guard: &OfferGuard, offer: Offer) -> Result<()> {
        Self::check_guard(guard, offer.id)?;
        let mut offers = self.offers.write();
        let slot = offers
            .get_mut(&offer.id)
            .ok_or(PeerbookError::OfferNotFound(offer.id))?;
        *slot = offer;
        Ok(())
    }

    /// Remove an offer, returning its last snapshot.
    ///
    /// # Errors
    /// `OfferNotFound` if the offer is gone.
    pub fn remove(&self, guard: &OfferGuard) -> Result<Offer> {
        let offer_id = guard.offer_id();
        self.offers
            .write()
            .remove(&offer_id)
            .ok_or(PeerbookError::OfferNotFound(offer_id))
    }

    fn check_guard(guard: &OfferGuard, offer_id: OfferId) -> Result<()> {
        if guard.offer_id() == offer_id {
            Ok(())
        } else {
            Err(PeerbookError::Internal(format!(
                "write to offer {offer_id} under the lock of offer {}",
                guard.offer_id()
            )))
        }
    }
}
