//! In-process catalog store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CanonicalEntry, CatalogError, CatalogStore, EntryKey, SourceRef};

#[derive(Default)]
struct Tables {
    entries: HashMap<EntryKey, CanonicalEntry>,
    sources: HashMap<SourceRef, EntryKey>,
}

/// Catalog store that keeps entries in a map. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryCatalogStore {
    tables: RwLock<Tables>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.entries.is_empty()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn find_entry(&self, key: &EntryKey) -> Result<Option<CanonicalEntry>, CatalogError> {
        Ok(self.tables.read().await.entries.get(key).cloned())
    }

    async fn upsert_entry(&self, entry: &CanonicalEntry) -> Result<(), CatalogError> {
        let mut tables = self.tables.write().await;
        tables.sources.retain(|_, owner| owner != &entry.key);
        for variant in &entry.variants {
            tables
                .sources
                .insert(variant.source_ref.clone(), entry.key.clone());
        }
        tables.entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn find_by_source(
        &self,
        source_ref: &SourceRef,
    ) -> Result<Option<EntryKey>, CatalogError> {
        Ok(self.tables.read().await.sources.get(source_ref).cloned())
    }

    async fn list_entries(&self, limit: usize) -> Result<Vec<CanonicalEntry>, CatalogError> {
        let tables = self.tables.read().await;
        let mut all: Vec<CanonicalEntry> = tables.entries.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all.truncate(limit);
        Ok(all)
    }
}
