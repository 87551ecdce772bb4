//! Normalizer - folds raw producer records into canonical entries.
//!
//! Every entry lives behind its own async mutex, so concurrent batches from
//! different producers only serialize when they touch the same title. Store
//! writes happen outside the entry locks; a failed write leaves the entry
//! dirty and it is retried on the next flush. Writes for one key go through a
//! per-key writer lock, so the store always ends with the newest snapshot.

mod types;

pub use types::*;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use futures::{Stream, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::{
    CanonicalEntry, CatalogError, CatalogStore, EntryKey, RawCatalogRecord, SourceKind, SourceRef,
    Variant,
};
use crate::config::NormalizerConfig;
use crate::health::VariantHealthLedger;
use crate::identity::{identify, Identity};
use crate::metrics;
use crate::ranking::{rank, PlaybackPreferences};

type EntryHandle = Arc<Mutex<CanonicalEntry>>;
type WriterLock = Arc<Mutex<()>>;

/// Groups raw records into canonical entries and keeps them ranked and stored.
pub struct Normalizer {
    entries: DashMap<EntryKey, EntryHandle>,
    by_source: DashMap<SourceRef, EntryKey>,
    dirty: DashSet<EntryKey>,
    writers: DashMap<EntryKey, WriterLock>,
    store: Arc<dyn CatalogStore>,
    health: Arc<VariantHealthLedger>,
    prefs: PlaybackPreferences,
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        health: Arc<VariantHealthLedger>,
        prefs: PlaybackPreferences,
        config: NormalizerConfig,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            by_source: DashMap::new(),
            dirty: DashSet::new(),
            writers: DashMap::new(),
            store,
            health,
            prefs,
            config,
        }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Ingest a batch of records and flush touched entries to the store.
    ///
    /// Malformed records are dropped and counted; they never abort the batch.
    pub async fn ingest(&self, batch: Vec<RawCatalogRecord>) -> IngestSummary {
        let mut summary = IngestSummary::default();

        for record in batch {
            if let Err(rejection) = validate(&record) {
                warn!(reason = rejection.reason(), "Dropping malformed record: {}", rejection);
                metrics::RECORDS_REJECTED
                    .with_label_values(&[rejection.reason()])
                    .inc();
                summary.records_rejected += 1;
                continue;
            }

            for key in self.ingest_record(&record).await {
                summary.touch(&key);
            }
            metrics::RECORDS_INGESTED
                .with_label_values(&[record.source_kind.as_str()])
                .inc();
            summary.records_accepted += 1;
        }

        let flush = self.flush().await;
        summary.store_failures = flush.failed;

        info!(
            accepted = summary.records_accepted,
            rejected = summary.records_rejected,
            touched = summary.entries_touched,
            store_failures = summary.store_failures,
            "Ingested batch"
        );
        summary
    }

    /// Merge one valid record. Returns the keys of every entry it changed.
    async fn ingest_record(&self, record: &RawCatalogRecord) -> Vec<EntryKey> {
        let identity = identify(record);
        let key = EntryKey::for_record(identity.key.clone(), record);
        let source_ref = record.source_ref();
        let variant = Variant::from_record(record, &identity.signals);
        let mut touched = Vec::with_capacity(2);

        // A source ref belongs to exactly one entry; move it if the key changed.
        let previous = self.owner_of(&source_ref).await.filter(|old| old != &key);
        if let Some(old_key) = previous {
            if self.detach(&old_key, &source_ref).await {
                debug!(%source_ref, from = %old_key, to = %key, "Variant moved between entries");
                touched.push(old_key);
            }
        }

        let handle = self.entry_handle(&key, record, &identity).await;
        {
            let mut entry = handle.lock().await;
            entry.absorb_metadata(record, &identity.signals);
            entry.upsert_variant(variant);
            entry.variants = rank(&entry.variants, &self.prefs, self.health.as_ref());
        }

        self.by_source.insert(source_ref, key.clone());
        self.dirty.insert(key.clone());
        touched.push(key);
        touched
    }

    /// Entry holding a variant, asking the store when this process has not seen it.
    async fn owner_of(&self, source_ref: &SourceRef) -> Option<EntryKey> {
        if let Some(key) = self.by_source.get(source_ref).map(|k| k.value().clone()) {
            return Some(key);
        }
        match self.store.find_by_source(source_ref).await {
            Ok(key) => key,
            Err(e) => {
                warn!(%source_ref, error = %e, "Store lookup by source failed");
                None
            }
        }
    }

    /// Entry from memory, or hydrated from the store on first sight.
    async fn load(&self, key: &EntryKey) -> Option<EntryHandle> {
        if let Some(handle) = self.entries.get(key).map(|e| Arc::clone(e.value())) {
            return Some(handle);
        }

        let stored = match self.store.find_entry(key).await {
            Ok(stored) => stored?,
            Err(e) => {
                warn!(%key, error = %e, "Store lookup failed");
                return None;
            }
        };
        for variant in &stored.variants {
            self.by_source
                .entry(variant.source_ref.clone())
                .or_insert_with(|| key.clone());
        }
        debug!(%key, variants = stored.variants.len(), "Hydrated entry from store");

        let handle = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(stored)));
        Some(Arc::clone(handle.value()))
    }

    /// Find or create the entry for a key.
    async fn entry_handle(
        &self,
        key: &EntryKey,
        record: &RawCatalogRecord,
        identity: &Identity,
    ) -> EntryHandle {
        if let Some(handle) = self.load(key).await {
            return handle;
        }

        let handle = self.entries.entry(key.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(CanonicalEntry::new(
                key.clone(),
                record,
                &identity.signals,
                identity.media_kind,
            )))
        });
        Arc::clone(handle.value())
    }

    /// Remove a variant from an entry. Returns true if it was there.
    async fn detach(&self, key: &EntryKey, source_ref: &SourceRef) -> bool {
        let Some(handle) = self.load(key).await else {
            return false;
        };
        let mut entry = handle.lock().await;
        if entry.remove_variant(source_ref).is_none() {
            return false;
        }
        entry.variants = rank(&entry.variants, &self.prefs, self.health.as_ref());
        drop(entry);
        self.dirty.insert(key.clone());
        true
    }

    fn writer(&self, key: &EntryKey) -> WriterLock {
        Arc::clone(self.writers.entry(key.clone()).or_default().value())
    }

    /// Write every dirty entry to the store.
    ///
    /// Entries are snapshotted under their lock and written without it. The
    /// key's writer lock is held from snapshot to upsert.
    pub async fn flush(&self) -> FlushReport {
        let keys: Vec<EntryKey> = self.dirty.iter().map(|k| k.key().clone()).collect();
        let mut report = FlushReport::default();

        for key in keys {
            let writer = self.writer(&key);
            let _writing = writer.lock().await;
            if self.dirty.remove(&key).is_none() {
                continue;
            }
            let Some(handle) = self.entries.get(&key).map(|e| Arc::clone(e.value())) else {
                continue;
            };
            let snapshot = handle.lock().await.clone();

            match self.store.upsert_entry(&snapshot).await {
                Ok(()) => report.written += 1,
                Err(e) => {
                    warn!(%key, error = %e, "Failed to upsert entry, will retry next cycle");
                    metrics::STORE_UPSERT_FAILURES.inc();
                    self.dirty.insert(key);
                    report.failed += 1;
                }
            }
        }

        metrics::FLUSH_SIZE
            .with_label_values(&[])
            .observe(report.written as f64);
        report
    }

    /// Consume a producer stream in batches.
    ///
    /// Everything ingested before a `Cancelled` or `Error` is kept. Only a
    /// `Completed` pass retires variants of `kind` that it did not see.
    pub async fn ingest_stream<S>(&self, kind: SourceKind, mut events: S) -> StreamReport
    where
        S: Stream<Item = ProducerEvent> + Unpin + Send,
    {
        let batch_size = self.config.batch_size.max(1);
        let mut batch = Vec::with_capacity(batch_size);
        let mut seen = HashSet::new();
        let mut summary = IngestSummary::default();
        let mut termination = None;

        while let Some(event) = events.next().await {
            match event {
                ProducerEvent::Record(record) => {
                    if record.source_kind == kind {
                        seen.insert(record.source_ref());
                    }
                    batch.push(record);
                    if batch.len() >= batch_size {
                        summary.merge(self.ingest(std::mem::take(&mut batch)).await);
                    }
                }
                ProducerEvent::Completed => {
                    termination = Some(StreamTermination::Completed);
                    break;
                }
                ProducerEvent::Cancelled => {
                    termination = Some(StreamTermination::Cancelled);
                    break;
                }
                ProducerEvent::Error(reason) => {
                    warn!(source_kind = %kind, %reason, "Producer reported an error, keeping partial pass");
                    termination = Some(StreamTermination::Error(reason));
                    break;
                }
            }
        }

        if !batch.is_empty() {
            summary.merge(self.ingest(batch).await);
        }

        let termination = termination.unwrap_or_else(|| {
            warn!(source_kind = %kind, "Producer stream ended without a terminal signal");
            StreamTermination::Error("stream ended without a terminal signal".to_string())
        });

        let retired = if termination == StreamTermination::Completed {
            self.retire_unseen(kind, &seen).await
        } else {
            0
        };

        info!(
            source_kind = %kind,
            ?termination,
            accepted = summary.records_accepted,
            rejected = summary.records_rejected,
            retired,
            "Producer pass finished"
        );
        StreamReport {
            source_kind: kind,
            summary,
            termination,
            retired,
        }
    }

    /// Mark variants of `kind` not in `seen` as unavailable. Returns how many changed.
    pub async fn retire_unseen(&self, kind: SourceKind, seen: &HashSet<SourceRef>) -> usize {
        let mut by_entry: HashMap<EntryKey, Vec<SourceRef>> = HashMap::new();
        for item in self.by_source.iter() {
            let source_ref = item.key();
            if source_ref.kind == kind && !seen.contains(source_ref) {
                by_entry
                    .entry(item.value().clone())
                    .or_default()
                    .push(source_ref.clone());
            }
        }

        let mut retired = 0;
        for (key, refs) in by_entry {
            let Some(handle) = self.entries.get(&key).map(|e| Arc::clone(e.value())) else {
                continue;
            };
            let mut entry = handle.lock().await;
            let mut changed = false;
            for variant in entry.variants.iter_mut() {
                if variant.available && refs.contains(&variant.source_ref) {
                    variant.available = false;
                    changed = true;
                    retired += 1;
                }
            }
            if changed {
                entry.updated_at = chrono::Utc::now();
                entry.variants = rank(&entry.variants, &self.prefs, self.health.as_ref());
                drop(entry);
                self.dirty.insert(key);
            }
        }

        if retired > 0 {
            info!(source_kind = %kind, retired, "Retired variants missing from completed pass");
            self.flush().await;
        }
        retired
    }

    /// Current state of an entry, reading through to the store if not in memory.
    pub async fn entry(&self, key: &EntryKey) -> Result<Option<CanonicalEntry>, CatalogError> {
        if let Some(handle) = self.entries.get(key).map(|e| Arc::clone(e.value())) {
            return Ok(Some(handle.lock().await.clone()));
        }
        self.store.find_entry(key).await
    }

    /// Entries known in memory or in the store, most recently updated first.
    pub async fn list_entries(&self, limit: usize) -> Result<Vec<CanonicalEntry>, CatalogError> {
        let handles: Vec<EntryHandle> = self.entries.iter().map(|e| Arc::clone(e.value())).collect();
        let mut merged = BTreeMap::new();
        for handle in handles {
            let entry = handle.lock().await.clone();
            merged.insert(entry.key.clone(), entry);
        }
        for entry in self.store.list_entries(limit).await? {
            merged.entry(entry.key.clone()).or_insert(entry);
        }

        let mut entries: Vec<CanonicalEntry> = merged.into_values().collect();
        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.key.cmp(&b.key)));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Key of the entry currently holding a variant.
    pub fn find_by_source(&self, source_ref: &SourceRef) -> Option<EntryKey> {
        self.by_source.get(source_ref).map(|k| k.value().clone())
    }

    /// Number of entries held in memory.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries waiting for a store write.
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }
}

fn validate(record: &RawCatalogRecord) -> Result<(), RecordRejection> {
    if record.source_item_id.trim().is_empty() {
        return Err(RecordRejection::MissingItemId {
            kind: record.source_kind,
        });
    }
    let has_title = record
        .title
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty());
    if !has_title {
        return Err(RecordRejection::MissingTitle {
            source_ref: record.source_ref().to_string(),
        });
    }
    Ok(())
}
