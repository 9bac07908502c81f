//! Error types for the PeerBook offer engine.
//!
//! Every error renders as `"<CATEGORY>: <reason> (offer '<id>')"` (the offer
//! suffix only where an offer is involved). Clients match on these strings,
//! so the wording of validation errors is part of the API.
//!
//! Each variant also has a stable `PB_ERR_` code for log grepping:
//! - 1xx: Validation errors
//! - 2xx: Lookup errors
//! - 3xx: Admission errors
//! - 4xx: Book / operational errors
//! - 9xx: Internal, configuration, and I/O errors

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{OfferId, Operation, RateMeterConfig};

/// Caller-facing classification of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    InvalidArgument,
    IllegalState,
    NotFound,
    ResourceExhausted,
    OperationalFailure,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::IllegalState => "ILLEGAL_STATE",
            Self::NotFound => "NOT_FOUND",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::OperationalFailure => "OPERATIONAL_FAILURE",
            Self::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

/// Central error enum for all PeerBook operations.
#[derive(Debug, Error)]
pub enum PeerbookError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// A request field is malformed or out of range.
    #[error("INVALID_ARGUMENT: {reason} (offer '{offer_id}')")]
    InvalidArgument { offer_id: OfferId, reason: String },

    /// The request is well formed but conflicts with the offer's mode or asset class.
    #[error("ILLEGAL_STATE: {reason} (offer '{offer_id}')")]
    IllegalState { offer_id: OfferId, reason: String },

    // =================================================================
    // Lookup Errors (2xx)
    // =================================================================
    /// No offer with this ID is known to the node.
    #[error("NOT_FOUND: offer not found (offer '{0}')")]
    OfferNotFound(OfferId),

    /// An offer with this ID already exists.
    #[error("ILLEGAL_STATE: offer already exists (offer '{0}')")]
    DuplicateOffer(OfferId),

    // =================================================================
    // Admission Errors (3xx)
    // =================================================================
    /// The operation's admission quota is used up for the current window.
    #[error(
        "RESOURCE_EXHAUSTED: the maximum allowed number of {operation} calls ({quota}) has been exceeded"
    )]
    ResourceExhausted {
        operation: Operation,
        quota: RateMeterConfig,
    },

    // =================================================================
    // Book / Operational Errors (4xx)
    // =================================================================
    /// Removing or adding the book entry failed.
    #[error("OPERATIONAL_FAILURE: offer book update failed: {reason} (offer '{offer_id}')")]
    BookUpdateFailed { offer_id: OfferId, reason: String },

    /// The offer payload could not be signed.
    #[error("OPERATIONAL_FAILURE: offer signing failed: {reason} (offer '{offer_id}')")]
    SigningFailed { offer_id: OfferId, reason: String },

    /// The market price feed has no price for this currency.
    #[error("OPERATIONAL_FAILURE: market price unavailable for {currency_code}")]
    PriceUnavailable { currency_code: String },

    // =================================================================
    // Internal (9xx)
    // =================================================================
    /// An offer invariant was broken by engine code.
    #[error("INTERNAL: invariant violation: {0}")]
    InvariantViolation(String),

    /// Unrecoverable internal error.
    #[error("INTERNAL: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("INTERNAL: serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, bad override, etc.).
    #[error("INTERNAL: configuration error: {0}")]
    Configuration(String),

    /// I/O error (disk).
    #[error("INTERNAL: I/O error: {0}")]
    Io(String),
}

impl PeerbookError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument { .. } => ErrorCategory::InvalidArgument,
            Self::IllegalState { .. } | Self::DuplicateOffer(_) => ErrorCategory::IllegalState,
            Self::OfferNotFound(_) => ErrorCategory::NotFound,
            Self::ResourceExhausted { .. } => ErrorCategory::ResourceExhausted,
            Self::BookUpdateFailed { .. }
            | Self::SigningFailed { .. }
            | Self::PriceUnavailable { .. } => ErrorCategory::OperationalFailure,
            Self::InvariantViolation(_)
            | Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Stable numeric code for log correlation.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "PB_ERR_100",
            Self::IllegalState { .. } => "PB_ERR_101",
            Self::OfferNotFound(_) => "PB_ERR_200",
            Self::DuplicateOffer(_) => "PB_ERR_201",
            Self::ResourceExhausted { .. } => "PB_ERR_300",
            Self::BookUpdateFailed { .. } => "PB_ERR_400",
            Self::SigningFailed { .. } => "PB_ERR_401",
            Self::PriceUnavailable { .. } => "PB_ERR_402",
            Self::InvariantViolation(_) => "PB_ERR_900",
            Self::Internal(_) => "PB_ERR_901",
            Self::Serialization(_) => "PB_ERR_902",
            Self::Configuration(_) => "PB_ERR_903",
            Self::Io(_) => "PB_ERR_904",
        }
    }

    /// Whether the error is an expected, user-facing outcome whose message
    /// may be returned verbatim.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::InvalidArgument
                | ErrorCategory::IllegalState
                | ErrorCategory::NotFound
                | ErrorCategory::ResourceExhausted
        ) || matches!(self, Self::PriceUnavailable { .. })
    }

    #[must_use]
    pub fn invalid_argument(offer_id: OfferId, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            offer_id,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn illegal_state(offer_id: OfferId, reason: impl Into<String>) -> Self {
        Self::IllegalState {
            offer_id,
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, PeerbookError>;

// Conversion from std::io::Error
impl From<std::io::Error> for PeerbookError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PeerbookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Structured error returned across the RPC boundary.
///
/// Expected outcomes keep their full message. Operational and internal
/// faults are reduced to their category and a safe summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
}

impl From<&PeerbookError> for RpcError {
    fn from(err: &PeerbookError) -> Self {
        let message = if err.is_user_facing() {
            err.to_string()
        } else {
            match err {
                PeerbookError::BookUpdateFailed { offer_id, .. } => format!(
                    "OPERATIONAL_FAILURE: offer book update failed; republish will be retried (offer '{offer_id}')"
                ),
                PeerbookError::SigningFailed { offer_id, .. } => format!(
                    "OPERATIONAL_FAILURE: offer could not be signed; no changes were applied (offer '{offer_id}')"
                ),
                _ => "INTERNAL: internal error".to_string(),
            }
        };
        Self {
            category: err.category(),
            code: err.code().to_string(),
            message,
        }
    }
}

impl From<PeerbookError> for RpcError {
    fn from(err: PeerbookError) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RpcError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WindowUnit;

    #[test]
    fn validation_message_format() {
        let id = OfferId::new();
        let err = PeerbookError::invalid_argument(id, "cannot set trigger price to a negative value");
        assert_eq!(
            err.to_string(),
            format!("INVALID_ARGUMENT: cannot set trigger price to a negative value (offer '{id}')")
        );
        assert_eq!(err.category(), ErrorCategory::InvalidArgument);
        assert_eq!(err.code(), "PB_ERR_100");
    }

    #[test]
    fn resource_exhausted_message() {
        let err = PeerbookError::ResourceExhausted {
            operation: Operation::EditOffer,
            quota: RateMeterConfig::new(1, WindowUnit::Minutes),
        };
        assert_eq!(
            err.to_string(),
            "RESOURCE_EXHAUSTED: the maximum allowed number of EditOffer calls (1/minute) has been exceeded"
        );
    }

    #[test]
    fn messages_start_with_category() {
        let id = OfferId::new();
        let errors = vec![
            PeerbookError::illegal_state(id, "x"),
            PeerbookError::OfferNotFound(id),
            PeerbookError::DuplicateOffer(id),
            PeerbookError::BookUpdateFailed {
                offer_id: id,
                reason: "peer timeout".into(),
            },
            PeerbookError::InvariantViolation("terms changed".into()),
            PeerbookError::Io("disk".into()),
        ];
        for err in errors {
            let msg = err.to_string();
            assert!(
                msg.starts_with(&err.category().to_string()),
                "message {msg} does not start with {}",
                err.category()
            );
            assert!(err.code().starts_with("PB_ERR_"));
        }
    }

    #[test]
    fn rpc_error_keeps_user_facing_detail() {
        let id = OfferId::new();
        let err = PeerbookError::illegal_state(id, "cannot set a trigger price in a fixed price offer");
        let rpc = RpcError::from(&err);
        assert_eq!(rpc.category, ErrorCategory::IllegalState);
        assert_eq!(rpc.message, err.to_string());
    }

    #[test]
    fn rpc_error_hides_internal_detail() {
        let rpc = RpcError::from(PeerbookError::InvariantViolation(
            "offer terms changed: amount 1 -> 2".into(),
        ));
        assert_eq!(rpc.category, ErrorCategory::Internal);
        assert_eq!(rpc.message, "INTERNAL: internal error");
        assert_eq!(rpc.code, "PB_ERR_900");
    }

    #[test]
    fn rpc_error_summarizes_book_failures() {
        let id = OfferId::new();
        let rpc = RpcError::from(PeerbookError::BookUpdateFailed {
            offer_id: id,
            reason: "connection reset by 10.0.0.7".into(),
        });
        assert_eq!(rpc.category, ErrorCategory::OperationalFailure);
        assert!(!rpc.message.contains("10.0.0.7"));
        assert!(rpc.message.contains(&id.to_string()));
    }
}
