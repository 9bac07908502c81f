//! Operation names and admission quotas.
//!
//! Every RPC the node exposes is an [`Operation`]. Each operation belongs to
//! an [`AdmissionClass`] that determines its default quota, and each quota is
//! a [`RateMeterConfig`]: a call count per [`WindowUnit`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

/// An RPC the node exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Operation {
    GetOffer,
    ListOffers,
    CreateOffer,
    EditOffer,
    CancelOffer,
}

impl Operation {
    pub const ALL: [Self; 5] = [
        Self::GetOffer,
        Self::ListOffers,
        Self::CreateOffer,
        Self::EditOffer,
        Self::CancelOffer,
    ];

    /// Short method name (e.g., `EditOffer`).
    #[must_use]
    pub fn method_name(self) -> &'static str {
        match self {
            Self::GetOffer => "GetOffer",
            Self::ListOffers => "ListOffers",
            Self::CreateOffer => "CreateOffer",
            Self::EditOffer => "EditOffer",
            Self::CancelOffer => "CancelOffer",
        }
    }

    /// Fully-qualified name used as the key in admission override files
    /// (e.g., `peerbook.Offers/EditOffer`).
    #[must_use]
    pub fn full_name(self) -> String {
        format!("{}{}", constants::OPERATION_SERVICE_PREFIX, self.method_name())
    }

    /// Look an operation up by its fully-qualified name.
    #[must_use]
    pub fn from_full_name(name: &str) -> Option<Self> {
        let method = name.strip_prefix(constants::OPERATION_SERVICE_PREFIX)?;
        Self::ALL.into_iter().find(|op| op.method_name() == method)
    }

    #[must_use]
    pub fn class(self) -> AdmissionClass {
        match self {
            Self::GetOffer | Self::ListOffers => AdmissionClass::Read,
            Self::CreateOffer | Self::EditOffer | Self::CancelOffer => AdmissionClass::Mutating,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// Admission class of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdmissionClass {
    /// Read-only calls. Default 1 call per second.
    Read,
    /// Calls that change offers. Default 1 call per minute.
    Mutating,
}

impl AdmissionClass {
    #[must_use]
    pub fn default_quota(self) -> RateMeterConfig {
        match self {
            Self::Read => RateMeterConfig::new(
                constants::DEFAULT_READ_CALLS_PER_WINDOW,
                WindowUnit::Seconds,
            ),
            Self::Mutating => RateMeterConfig::new(
                constants::DEFAULT_MUTATING_CALLS_PER_WINDOW,
                WindowUnit::Minutes,
            ),
        }
    }
}

/// Length of an admission window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl WindowUnit {
    #[must_use]
    pub fn duration(self) -> Duration {
        match self {
            Self::Seconds => Duration::from_secs(1),
            Self::Minutes => Duration::from_secs(60),
            Self::Hours => Duration::from_secs(60 * 60),
            Self::Days => Duration::from_secs(24 * 60 * 60),
        }
    }

    fn singular(self) -> &'static str {
        match self {
            Self::Seconds => "second",
            Self::Minutes => "minute",
            Self::Hours => "hour",
            Self::Days => "day",
        }
    }
}

/// Quota for one operation: `count` calls per `window_unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateMeterConfig {
    pub count: u32,
    pub window_unit: WindowUnit,
}

impl RateMeterConfig {
    #[must_use]
    pub fn new(count: u32, window_unit: WindowUnit) -> Self {
        Self { count, window_unit }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window_unit.duration()
    }
}

impl fmt::Display for RateMeterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.count, self.window_unit.singular())
    }
}
