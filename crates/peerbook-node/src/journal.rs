//! Retry journal: offers whose book entry must be reconciled.
//!
//! An intent is written when the local store has moved ahead of the book,
//! for example when a removal or addition failed after the edit was
//! committed. Intents are keyed by offer id, so recording twice keeps one
//! entry (the newest). They are cleared once the book matches local state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use peerbook_types::{OfferId, PeerbookError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryIntent {
    pub offer_id: OfferId,
    pub recorded_at: DateTime<Utc>,
    pub reason: String,
}

impl RetryIntent {
    #[must_use]
    pub fn new(offer_id: OfferId, reason: impl Into<String>) -> Self {
        Self {
            offer_id,
            recorded_at: Utc::now(),
            reason: reason.into(),
        }
    }
}

pub trait RetryJournal: Send + Sync {
    /// Record or replace the intent for `intent.offer_id`.
    ///
    /// # Errors
    /// Storage failures.
    fn record(&self, intent: RetryIntent) -> Result<()>;

    /// Drop the intent for `offer_id`, if any.
    ///
    /// # Errors
    /// Storage failures.
    fn clear(&self, offer_id: OfferId) -> Result<()>;

    fn contains(&self, offer_id: OfferId) -> bool;

    /// All intents, oldest first.
    fn pending(&self) -> Vec<RetryIntent>;
}

fn oldest_first(intents: &BTreeMap<OfferId, RetryIntent>) -> Vec<RetryIntent> {
    let mut pending: Vec<RetryIntent> = intents.values().cloned().collect();
    pending.sort_by_key(|i| i.recorded_at);
    pending
}

/// Journal kept in memory only. Intents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryRetryJournal {
    intents: Mutex<BTreeMap<OfferId, RetryIntent>>,
}

impl InMemoryRetryJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RetryJournal for InMemoryRetryJournal {
    fn record(&self, intent: RetryIntent) -> Result<()> {
        self.intents.lock().insert(intent.offer_id, intent);
        Ok(())
    }

    fn clear(&self, offer_id: OfferId) -> Result<()> {
        self.intents.lock().remove(&offer_id);
        Ok(())
    }

    fn contains(&self, offer_id: OfferId) -> bool {
        self.intents.lock().contains_key(&offer_id)
    }

    fn pending(&self) -> Vec<RetryIntent> {
        oldest_first(&self.intents.lock())
    }
}

/// Journal persisted as a JSON array, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileRetryJournal {
    path: PathBuf,
    intents: Mutex<BTreeMap<OfferId, RetryIntent>>,
}

impl JsonFileRetryJournal {
    /// Open the journal at `path`, loading any intents already there.
    ///
    /// # Errors
    /// `Io` if the file exists but can't be read, `Serialization` if it is
    /// not a journal.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let intents = if path.exists() {
            let raw = std::fs::read(&path)?;
            let list: Vec<RetryIntent> = serde_json::from_slice(&raw).map_err(|e| {
                PeerbookError::Serialization(format!(
                    "invalid retry journal {}: {e}",
                    path.display()
                ))
            })?;
            list.into_iter().map(|i| (i.offer_id, i)).collect()
        } else {
            BTreeMap::new()
        };
        if !intents.is_empty() {
            tracing::info!(
                path = %path.display(),
                pending = intents.len(),
                "Loaded retry journal"
            );
        }
        Ok(Self {
            path,
            intents: Mutex::new(intents),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, intents: &BTreeMap<OfferId, RetryIntent>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let bytes = serde_json::to_vec_pretty(&oldest_first(intents))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl RetryJournal for JsonFileRetryJournal {
    fn record(&self, intent: RetryIntent) -> Result<()> {
        let mut intents = self.intents.lock();
        intents.insert(intent.offer_id, intent);
        self.persist(&intents)
    }

    fn clear(&self, offer_id: OfferId) -> Result<()> {
        let mut intents = self.intents.lock();
        if intents.remove(&offer_id).is_some() {
            self.persist(&intents)?;
        }
        Ok(())
    }

    fn contains(&self, offer_id: OfferId) -> bool {
        self.intents.lock().contains_key(&offer_id)
    }

    fn pending(&self) -> Vec<RetryIntent> {
        oldest_first(&self.intents.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_idempotent_by_offer() {
        let journal = InMemoryRetryJournal::new();
        let id = OfferId::new();
        journal.record(RetryIntent::new(id, "first")).unwrap();
        journal.record(RetryIntent::new(id, "second")).unwrap();
        let pending = journal.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].reason, "second");
        assert!(journal.contains(id));

        journal.clear(id).unwrap();
        assert!(!journal.contains(id));
        assert!(journal.pending().is_empty());
    }

    #[test]
    fn file_journal_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("republish_intents.json");
        let (a, b) = (OfferId::new(), OfferId::new());
        {
            let journal = JsonFileRetryJournal::open(&path).unwrap();
            journal.record(RetryIntent::new(a, "peer timeout")).unwrap();
            journal.record(RetryIntent::new(b, "peer timeout")).unwrap();
            journal.clear(a).unwrap();
        }
        let reopened = JsonFileRetryJournal::open(&path).unwrap();
        assert!(!reopened.contains(a));
        assert!(reopened.contains(b));
        assert_eq!(reopened.pending()[0].reason, "peer timeout");
    }

    #[test]
    fn file_journal_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/republish_intents.json");
        let journal = JsonFileRetryJournal::open(&path).unwrap();
        journal.record(RetryIntent::new(OfferId::new(), "x")).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn corrupt_journal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("republish_intents.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonFileRetryJournal::open(&path).unwrap_err();
        assert!(matches!(err, PeerbookError::Serialization(_)));
    }
}
