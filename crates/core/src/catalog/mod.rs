//! Canonical catalog - merged media entries and the store that persists them.
//!
//! Producers emit [`RawCatalogRecord`]s; the normalizer folds them into
//! [`CanonicalEntry`]s which are written through a [`CatalogStore`].

mod hints;
mod memory;
mod sqlite;
mod types;

pub use hints::{normalize_language, parse_resolution, HintKey, QualityHints};
pub use memory::MemoryCatalogStore;
pub use sqlite::SqliteCatalogStore;
pub use types::*;

use async_trait::async_trait;

/// Persistent storage for canonical entries.
///
/// Writes are whole-entry upserts keyed by [`EntryKey`]. Every upsert also
/// records which entry owns each of its variants, so a variant can be traced
/// back to its entry after a restart.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Look up a persisted entry. `Ok(None)` when the key is unknown.
    async fn find_entry(&self, key: &EntryKey) -> Result<Option<CanonicalEntry>, CatalogError>;

    /// Insert or replace an entry.
    async fn upsert_entry(&self, entry: &CanonicalEntry) -> Result<(), CatalogError>;

    /// Key of the persisted entry that last claimed a variant.
    async fn find_by_source(
        &self,
        source_ref: &SourceRef,
    ) -> Result<Option<EntryKey>, CatalogError>;

    /// List persisted entries, most recently updated first.
    async fn list_entries(&self, limit: usize) -> Result<Vec<CanonicalEntry>, CatalogError>;
}
