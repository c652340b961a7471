//! In-memory registration index.
//!
//! Maps `<eventId>_<userId>` to the images generated for that pair so lookups
//! do not depend on directory iteration order. Rebuilt from the store at
//! startup; the files stay the source of truth.

use crate::models::QrCodeRecord;
use crate::services::storage::{pair_key, QrFileName, QrStore, StoredQr};
use dashmap::DashMap;
use service_core::error::AppError;

#[derive(Debug, Default)]
pub struct RegistrationIndex {
    entries: DashMap<String, Vec<QrCodeRecord>>,
}

impl RegistrationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from every image currently in `store`.
    pub async fn prime(store: &dyn QrStore) -> Result<Self, AppError> {
        let index = Self::new();
        for stored in store.list().await? {
            index.insert_stored(&stored);
        }

        tracing::info!(
            pairs = index.entries.len(),
            records = index.len(),
            "Registration index primed"
        );

        Ok(index)
    }

    /// Add a record. A registration id already present for the pair is ignored.
    pub fn insert(&self, record: QrCodeRecord) {
        let mut records = self.entries.entry(record.pair_key.clone()).or_default();
        if records
            .iter()
            .any(|existing| existing.registration_id == record.registration_id)
        {
            return;
        }
        records.push(record);
    }

    pub fn insert_stored(&self, stored: &StoredQr) {
        self.insert(QrCodeRecord::recovered(
            stored.file_name.pair_key().to_string(),
            stored.file_name.registration_id().to_string(),
            stored.file_name.as_str().to_string(),
            stored.modified,
        ));
    }

    /// Most recently created record for the pair.
    pub fn latest(&self, event_id: &str, user_id: &str) -> Option<QrCodeRecord> {
        self.entries
            .get(&pair_key(event_id, user_id))
            .and_then(|records| records.iter().max_by_key(|r| r.created_at).cloned())
    }

    pub fn contains(&self, file_name: &QrFileName) -> bool {
        self.entries
            .get(file_name.pair_key())
            .map(|records| {
                records
                    .iter()
                    .any(|r| r.registration_id == file_name.registration_id())
            })
            .unwrap_or(false)
    }

    /// Total number of records across all pairs.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
