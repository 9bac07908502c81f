//! Admission policy: the quota assigned to each operation.
//!
//! Defaults come from the operation's [`AdmissionClass`](peerbook_types::AdmissionClass).
//! A deployment may replace the default table with a JSON file keyed by
//! fully-qualified operation name:
//!
//! ```json
//! {
//!   "peerbook.Offers/EditOffer": { "count": 5, "windowUnit": "MINUTES" },
//!   "peerbook.Offers/GetOffer":  { "count": 20, "windowUnit": "SECONDS" }
//! }
//! ```
//!
//! When the file is present its entries are the whole table. Operations it
//! does not name are not metered. The table is built once and meters never
//! consult the file again.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use peerbook_types::{NodeConfig, Operation, PeerbookError, RateMeterConfig, Result};

/// Read and parse an admission overrides file.
///
/// # Errors
/// `Io` if the file can't be read, `Configuration` if its content is not a
/// valid overrides map.
pub fn load_admission_overrides(path: &Path) -> Result<HashMap<Operation, RateMeterConfig>> {
    let raw = std::fs::read_to_string(path)?;
    let overrides = parse_admission_overrides(&raw)?;
    tracing::info!(
        path = %path.display(),
        count = overrides.len(),
        "Loaded admission overrides"
    );
    Ok(overrides)
}

/// Parse the JSON form of an admission overrides map.
///
/// Names that don't match any operation are skipped with a warning so that a
/// config written for a newer node still loads.
///
/// # Errors
/// `Configuration` for malformed JSON, a malformed entry, or a zero count.
pub fn parse_admission_overrides(raw: &str) -> Result<HashMap<Operation, RateMeterConfig>> {
    let entries: BTreeMap<String, serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| PeerbookError::Configuration(format!("invalid admission overrides: {e}")))?;

    let mut overrides = HashMap::with_capacity(entries.len());
    for (name, value) in entries {
        let Some(operation) = Operation::from_full_name(&name) else {
            tracing::warn!(name = %name, "Ignoring admission override for unknown operation");
            continue;
        };
        let quota: RateMeterConfig = serde_json::from_value(value).map_err(|e| {
            PeerbookError::Configuration(format!("invalid admission override for {name}: {e}"))
        })?;
        if quota.count == 0 {
            return Err(PeerbookError::Configuration(format!(
                "admission override for {name} must allow at least one call"
            )));
        }
        overrides.insert(operation, quota);
    }
    Ok(overrides)
}

/// Quota table. An operation without an entry is not metered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionPolicy {
    quotas: BTreeMap<Operation, RateMeterConfig>,
}

impl AdmissionPolicy {
    /// Class defaults for every operation.
    #[must_use]
    pub fn defaults() -> Self {
        let quotas = Operation::ALL
            .into_iter()
            .map(|op| (op, op.class().default_quota()))
            .collect();
        Self { quotas }
    }

    /// A table holding exactly the operations named in `overrides`.
    #[must_use]
    pub fn from_overrides(overrides: &HashMap<Operation, RateMeterConfig>) -> Self {
        let quotas: BTreeMap<_, _> = overrides.iter().map(|(op, quota)| (*op, *quota)).collect();
        for op in Operation::ALL {
            if !quotas.contains_key(&op) {
                tracing::warn!(operation = %op, "Operation not metered by admission overrides");
            }
        }
        Self { quotas }
    }

    /// Build the policy for a node, reading its overrides file if one is configured.
    ///
    /// # Errors
    /// Propagates override loading errors.
    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        match config.admission_overrides_path() {
            Some(path) => Ok(Self::from_overrides(&load_admission_overrides(&path)?)),
            None => Ok(Self::defaults()),
        }
    }

    /// Quota for `operation`, or `None` if it is not metered.
    #[must_use]
    pub fn quota(&self, operation: Operation) -> Option<RateMeterConfig> {
        self.quotas.get(&operation).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Operation, RateMeterConfig)> + '_ {
        self.quotas.iter().map(|(op, quota)| (*op, *quota))
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::defaults()
    }
}
