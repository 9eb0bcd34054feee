//! Claim record store.
//!
//! Holds the session's records in memory and mirrors them, as one JSON
//! array under a fixed key, into a [`KeyValueStorage`]. Every mutation
//! rewrites the whole snapshot. Storage failures never reach the caller:
//! reads fall back to an empty set and writes are logged, leaving memory
//! ahead of storage until the next successful write.

use crate::config::STORAGE_KEY;
use crate::db::KeyValueStorage;
use crate::models::{ClaimPatch, ClaimRecord, ClaimStatus};

pub struct ClaimStore {
    storage: Box<dyn KeyValueStorage>,
    key: String,
    records: Vec<ClaimRecord>,
    /// False while the last write failed.
    synced: bool,
}

impl ClaimStore {
    /// Store over `storage` using the default snapshot key, loaded.
    pub fn open(storage: Box<dyn KeyValueStorage>) -> Self {
        Self::open_with_key(storage, STORAGE_KEY)
    }

    pub fn open_with_key(storage: Box<dyn KeyValueStorage>, key: &str) -> Self {
        let mut store = Self {
            storage,
            key: key.to_string(),
            records: Vec::new(),
            synced: true,
        };
        store.records = store.load();
        store
    }

    /// Read the persisted snapshot. Never fails: missing, unreadable, or
    /// corrupt data yields an empty set.
    pub fn load(&self) -> Vec<ClaimRecord> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to read claim history");
                return Vec::new();
            }
        };

        let mut records: Vec<ClaimRecord> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to parse claim history");
                return Vec::new();
            }
        };

        let mut repaired = 0;
        for record in records.iter_mut() {
            if record.repair() {
                repaired += 1;
            }
        }
        if repaired > 0 {
            tracing::warn!(repaired, "Repaired claim records with inconsistent status");
        }
        tracing::debug!(count = records.len(), "Loaded claim history");
        records
    }

    /// Add records at the end, in order.
    pub fn append(&mut self, records: Vec<ClaimRecord>) {
        self.records.extend(records);
        self.persist();
    }

    /// Shallow-merge `patch` into the record with `id`. Returns false, and
    /// writes nothing, when no record matches.
    pub fn update(&mut self, id: &str, patch: ClaimPatch) -> bool {
        let Some(record) = self.records.iter_mut().find(|r| r.id() == id) else {
            tracing::debug!(%id, "Update for unknown record ignored");
            return false;
        };
        record.apply(patch);
        self.persist();
        true
    }

    /// Drop all records and remove the snapshot key.
    pub fn clear(&mut self) {
        self.records.clear();
        match self.storage.remove(&self.key) {
            Ok(()) => self.synced = true,
            Err(e) => {
                self.synced = false;
                tracing::warn!(key = %self.key, error = %e, "Failed to clear claim history");
            }
        }
    }

    pub fn records(&self) -> &[ClaimRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&ClaimRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn by_status(&self, status: ClaimStatus) -> Vec<&ClaimRecord> {
        self.records.iter().filter(|r| r.status() == status).collect()
    }

    pub fn flagged(&self) -> Vec<&ClaimRecord> {
        self.records.iter().filter(|r| r.is_flagged()).collect()
    }

    pub fn approved(&self) -> Vec<&ClaimRecord> {
        self.records.iter().filter(|r| r.is_approved()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the last write reached storage.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Overwrite the snapshot with the current set, documents stripped.
    fn persist(&mut self) {
        let snapshot: Vec<ClaimRecord> = self.records.iter().map(ClaimRecord::detached).collect();
        let json = match serde_json::to_string(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                self.synced = false;
                tracing::error!(error = %e, "Failed to serialize claim history");
                return;
            }
        };

        match self.storage.set(&self.key, &json) {
            Ok(()) => self.synced = true,
            Err(e) => {
                self.synced = false;
                tracing::warn!(
                    key = %self.key,
                    bytes = json.len(),
                    error = %e,
                    "Failed to persist claim history"
                );
            }
        }
    }
}
