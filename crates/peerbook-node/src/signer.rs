//! Offer signing.
//!
//! Every offer sent to the book carries an ed25519 signature over a
//! canonical byte encoding of its snapshot. The payload's SHA-256 digest
//! doubles as a fingerprint for logs.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use peerbook_types::{Offer, OfferId, constants};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ports::{OfferSigner, SignerError};

/// Canonical bytes signed for an offer snapshot.
///
/// Format: `domain || id(16) || direction || currency || asset_class ||
/// amount || min_amount || tx_fee || maker_fee || payment_account ||
/// created_at_ms || maker_deposit || price_mode || fixed_price || margin ||
/// trigger_price || activation`. Strings are length-prefixed, integers are
/// little-endian.
#[must_use]
pub fn offer_signing_payload(offer: &Offer) -> Vec<u8> {
    let terms = &offer.terms;
    let mut payload = Vec::with_capacity(192);
    payload.extend_from_slice(constants::OFFER_SIGNING_DOMAIN);
    payload.extend_from_slice(offer.id.as_bytes());
    push_str(&mut payload, &terms.direction.to_string());
    push_str(&mut payload, &terms.currency_code);
    push_str(&mut payload, &terms.asset_class.to_string());
    payload.extend_from_slice(&terms.amount.to_le_bytes());
    payload.extend_from_slice(&terms.min_amount.to_le_bytes());
    payload.extend_from_slice(&terms.tx_fee.to_le_bytes());
    payload.extend_from_slice(&terms.maker_fee.to_le_bytes());
    push_str(&mut payload, &terms.payment_account_id);
    payload.extend_from_slice(&terms.created_at.timestamp_millis().to_le_bytes());
    payload.extend_from_slice(&terms.maker_security_deposit().to_le_bytes());
    push_str(&mut payload, &offer.price_mode.to_string());
    payload.extend_from_slice(&offer.fixed_price.0.to_le_bytes());
    push_str(&mut payload, &offer.market_price_margin.normalize().to_string());
    payload.extend_from_slice(&offer.trigger_price.0.to_le_bytes());
    push_str(&mut payload, &offer.activation.to_string());
    payload
}

fn push_str(payload: &mut Vec<u8>, value: &str) {
    let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
    payload.extend_from_slice(&len.to_le_bytes());
    payload.extend_from_slice(value.as_bytes());
}

/// An offer snapshot plus the signature the book verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOfferPayload {
    pub offer: Offer,
    /// Hex SHA-256 of the canonical payload.
    pub digest: String,
    /// Hex ed25519 signature over the canonical payload.
    pub signature: String,
    /// Hex ed25519 verifying key of the signer.
    pub public_key: String,
}

impl SignedOfferPayload {
    #[must_use]
    pub fn offer_id(&self) -> OfferId {
        self.offer.id
    }

    /// Check the digest and signature against the embedded snapshot.
    #[must_use]
    pub fn verify(&self) -> bool {
        let payload = offer_signing_payload(&self.offer);
        if hex::encode(Sha256::digest(&payload)) != self.digest {
            return false;
        }
        let Some(key) = hex::decode(&self.public_key)
            .ok()
            .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
            .and_then(|bytes| VerifyingKey::from_bytes(&bytes).ok())
        else {
            return false;
        };
        let Some(signature) = hex::decode(&self.signature)
            .ok()
            .and_then(|bytes| <[u8; 64]>::try_from(bytes).ok())
            .map(|bytes| Signature::from_bytes(&bytes))
        else {
            return false;
        };
        key.verify(&payload, &signature).is_ok()
    }
}

/// Signs offers with the node's ed25519 key.
pub struct Ed25519OfferSigner {
    signing_key: SigningKey,
}

impl Ed25519OfferSigner {
    /// Generate a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Hex verifying key.
    #[must_use]
    pub fn public_key(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }
}

impl std::fmt::Debug for Ed25519OfferSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519OfferSigner")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl OfferSigner for Ed25519OfferSigner {
    fn sign(&self, offer: &Offer) -> Result<SignedOfferPayload, SignerError> {
        offer
            .check_invariants()
            .map_err(|e| SignerError(e.to_string()))?;
        let payload = offer_signing_payload(offer);
        let signature = self.signing_key.sign(&payload);
        Ok(SignedOfferPayload {
            offer: offer.clone(),
            digest: hex::encode(Sha256::digest(&payload)),
            signature: hex::encode(signature.to_bytes()),
            public_key: self.public_key(),
        })
    }
}
