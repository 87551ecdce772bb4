//! Mock catalog store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::catalog::{CanonicalEntry, CatalogError, CatalogStore, EntryKey, SourceRef};

/// Mock implementation of the CatalogStore trait.
///
/// Provides controllable behavior for testing:
/// - Inspect what was written
/// - Simulate an unavailable store for reads and/or writes
/// - Count upsert calls
/// - Stall the next upsert to reorder concurrent writes
#[derive(Debug, Default)]
pub struct MockCatalogStore {
    /// Entries written so far.
    entries: Arc<RwLock<HashMap<EntryKey, CanonicalEntry>>>,
    /// When set, every upsert fails with `Unavailable`.
    fail_upserts: Arc<RwLock<bool>>,
    /// When set, every lookup fails with `Unavailable`.
    fail_finds: Arc<RwLock<bool>>,
    /// Number of upsert calls, including failed ones.
    upsert_calls: Arc<RwLock<usize>>,
    /// Delay applied to the next upsert only.
    next_upsert_delay: Arc<RwLock<Option<Duration>>>,
}

impl MockCatalogStore {
    /// Create a new, empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make upserts fail (or succeed again).
    pub async fn fail_upserts(&self, fail: bool) {
        *self.fail_upserts.write().await = fail;
    }

    /// Make lookups fail (or succeed again).
    pub async fn fail_finds(&self, fail: bool) {
        *self.fail_finds.write().await = fail;
    }

    /// Hold the next upsert for `delay` before it is written.
    pub async fn delay_next_upsert(&self, delay: Duration) {
        *self.next_upsert_delay.write().await = Some(delay);
    }

    /// Entry as last written, if any.
    pub async fn stored(&self, key: &EntryKey) -> Option<CanonicalEntry> {
        self.entries.read().await.get(key).cloned()
    }

    /// Number of entries written.
    pub async fn stored_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Number of upsert calls so far.
    pub async fn upsert_calls(&self) -> usize {
        *self.upsert_calls.read().await
    }

    /// Seed an entry without counting it as an upsert.
    pub async fn seed(&self, entry: CanonicalEntry) {
        self.entries.write().await.insert(entry.key.clone(), entry);
    }
}

#[async_trait]
impl CatalogStore for MockCatalogStore {
    async fn find_entry(&self, key: &EntryKey) -> Result<Option<CanonicalEntry>, CatalogError> {
        if *self.fail_finds.read().await {
            return Err(CatalogError::Unavailable("mock store is down".to_string()));
        }
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn upsert_entry(&self, entry: &CanonicalEntry) -> Result<(), CatalogError> {
        *self.upsert_calls.write().await += 1;
        if *self.fail_upserts.read().await {
            return Err(CatalogError::Unavailable("mock store is down".to_string()));
        }
        let delay = self.next_upsert_delay.write().await.take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.entries
            .write()
            .await
            .insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn find_by_source(
        &self,
        source_ref: &SourceRef,
    ) -> Result<Option<EntryKey>, CatalogError> {
        if *self.fail_finds.read().await {
            return Err(CatalogError::Unavailable("mock store is down".to_string()));
        }
        Ok(self
            .entries
            .read()
            .await
            .values()
            .filter(|entry| entry.contains(source_ref))
            .max_by_key(|entry| entry.updated_at)
            .map(|entry| entry.key.clone()))
    }

    async fn list_entries(&self, limit: usize) -> Result<Vec<CanonicalEntry>, CatalogError> {
        if *self.fail_finds.read().await {
            return Err(CatalogError::Unavailable("mock store is down".to_string()));
        }
        let mut all: Vec<CanonicalEntry> = self.entries.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all.truncate(limit);
        Ok(all)
    }
}
