//! SQLite-backed catalog store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{CanonicalEntry, CatalogError, CatalogStore, EntryKey, SourceRef};

/// SQLite-backed catalog store.
///
/// Entries are stored as one row each: a few indexed columns for listing plus
/// the full entry as a JSON body. `variant_sources` maps every variant to the
/// entry that last claimed it.
pub struct SqliteCatalogStore {
    conn: Mutex<Connection>,
}

impl SqliteCatalogStore {
    /// Open a store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS canonical_entries (
                entry_key TEXT PRIMARY KEY,
                media_kind TEXT NOT NULL,
                title TEXT NOT NULL,
                year INTEGER,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_canonical_entries_updated ON canonical_entries(updated_at);
            CREATE INDEX IF NOT EXISTS idx_canonical_entries_title ON canonical_entries(title);

            CREATE TABLE IF NOT EXISTS variant_sources (
                source_ref TEXT PRIMARY KEY,
                entry_key TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_variant_sources_entry ON variant_sources(entry_key);
            "#,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Unavailable("connection lock poisoned".to_string()))
    }

    fn decode(body: &str) -> Result<CanonicalEntry, CatalogError> {
        serde_json::from_str(body).map_err(|e| CatalogError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn find_entry(&self, key: &EntryKey) -> Result<Option<CanonicalEntry>, CatalogError> {
        let conn = self.conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM canonical_entries WHERE entry_key = ?",
                params![key.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        body.as_deref().map(Self::decode).transpose()
    }

    async fn upsert_entry(&self, entry: &CanonicalEntry) -> Result<(), CatalogError> {
        let body =
            serde_json::to_string(entry).map_err(|e| CatalogError::Serialization(e.to_string()))?;
        let updated_at: DateTime<Utc> = entry.updated_at;

        let entry_key = entry.key.to_string();
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO canonical_entries (entry_key, media_kind, title, year, body, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(entry_key) DO UPDATE SET
                media_kind = excluded.media_kind,
                title = excluded.title,
                year = excluded.year,
                body = excluded.body,
                updated_at = excluded.updated_at",
            params![
                &entry_key,
                entry.media_kind.as_str(),
                &entry.title,
                entry.year,
                &body,
                updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        tx.execute(
            "DELETE FROM variant_sources WHERE entry_key = ?",
            params![&entry_key],
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;
        for variant in &entry.variants {
            tx.execute(
                "INSERT INTO variant_sources (source_ref, entry_key) VALUES (?, ?)
                 ON CONFLICT(source_ref) DO UPDATE SET entry_key = excluded.entry_key",
                params![variant.source_ref.to_string(), &entry_key],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        }

        tx.commit()
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_by_source(
        &self,
        source_ref: &SourceRef,
    ) -> Result<Option<EntryKey>, CatalogError> {
        let conn = self.conn()?;
        let key: Option<String> = conn
            .query_row(
                "SELECT entry_key FROM variant_sources WHERE source_ref = ?",
                params![source_ref.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        key.map(|k| k.parse().map_err(CatalogError::Serialization))
            .transpose()
    }

    async fn list_entries(&self, limit: usize) -> Result<Vec<CanonicalEntry>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT body FROM canonical_entries ORDER BY updated_at DESC LIMIT ?")
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let body = row.map_err(|e| CatalogError::Database(e.to_string()))?;
            entries.push(Self::decode(&body)?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{HintKey, MediaKind, QualityHints, RawCatalogRecord, SourceKind, Variant};
    use crate::identity::strip_noise;

    fn create_test_store() -> SqliteCatalogStore {
        SqliteCatalogStore::in_memory().unwrap()
    }

    fn create_test_entry(key: &str, title: &str) -> CanonicalEntry {
        let record = RawCatalogRecord::new(SourceKind::Chat, "100", title)
            .with_year(1999)
            .with_hints(QualityHints::new().with(HintKey::Container, "mkv"));
        let signals = strip_noise(title);
        let mut entry =
            CanonicalEntry::new(key.parse().unwrap(), &record, &signals, MediaKind::Movie);
        entry.upsert_variant(Variant::from_record(&record, &signals));
        entry
    }

    #[tokio::test]
    async fn test_find_missing_returns_none() {
        let store = create_test_store();
        let key: EntryKey = "movie:nothing:2000".parse().unwrap();
        assert!(store.find_entry(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let store = create_test_store();
        let entry = create_test_entry("movie:the-matrix:1999", "The Matrix");

        store.upsert_entry(&entry).await.unwrap();
        let found = store.find_entry(&entry.key).await.unwrap().unwrap();

        assert_eq!(found, entry);
        assert_eq!(
            found.variants[0].hints.get(HintKey::Container),
            Some("mkv")
        );
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_row() {
        let store = create_test_store();
        let mut entry = create_test_entry("movie:the-matrix:1999", "The Matrix");
        store.upsert_entry(&entry).await.unwrap();

        entry.title = "The Matrix (Remastered)".to_string();
        store.upsert_entry(&entry).await.unwrap();

        let all = store.list_entries(10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "The Matrix (Remastered)");
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let store = create_test_store();
        for (key, title) in [
            ("movie:heat:1995", "Heat"),
            ("movie:alien:1979", "Alien"),
            ("movie:ran:1985", "Ran"),
        ] {
            store
                .upsert_entry(&create_test_entry(key, title))
                .await
                .unwrap();
        }

        assert_eq!(store.list_entries(2).await.unwrap().len(), 2);
        assert_eq!(store.list_entries(10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_find_by_source_follows_latest_owner() {
        let store = create_test_store();
        let source_ref: SourceRef = "chat:100".parse().unwrap();
        let mut old = create_test_entry("movie:heaat:1999", "Heaat");
        let moved = create_test_entry("movie:heat:1999", "Heat");

        store.upsert_entry(&old).await.unwrap();
        assert_eq!(
            store.find_by_source(&source_ref).await.unwrap(),
            Some(old.key.clone())
        );

        store.upsert_entry(&moved).await.unwrap();
        old.remove_variant(&source_ref);
        store.upsert_entry(&old).await.unwrap();

        assert_eq!(
            store.find_by_source(&source_ref).await.unwrap(),
            Some(moved.key.clone())
        );
        assert!(store
            .find_by_source(&"iptv:vod/9".parse().unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        let entry = create_test_entry("movie:heat:1995", "Heat");

        {
            let store = SqliteCatalogStore::new(&path).unwrap();
            store.upsert_entry(&entry).await.unwrap();
        }

        let reopened = SqliteCatalogStore::new(&path).unwrap();
        let found = reopened.find_entry(&entry.key).await.unwrap();
        assert_eq!(found.map(|e| e.title), Some("Heat".to_string()));
    }
}
