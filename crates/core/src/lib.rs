pub mod catalog;
pub mod config;
pub mod health;
pub mod identity;
pub mod metrics;
pub mod normalizer;
pub mod playback;
pub mod ranking;
pub mod testing;

pub use catalog::{
    CanonicalEntry, CatalogError, CatalogStore, EntryKey, HintKey, MediaKind, MemoryCatalogStore,
    QualityHints, RawCatalogRecord, SourceKind, SourceRef, SqliteCatalogStore, Variant,
};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use health::{HealthTransition, VariantHealthLedger, VariantHealthRecord};
pub use identity::{derive_key, identify, strip_noise, CanonicalKey, TitleSignals};
pub use normalizer::{IngestSummary, Normalizer, ProducerEvent, StreamReport, StreamTermination};
pub use playback::{
    Outcome, OverrideRegistry, PlaybackError, PlaybackOrchestrator, PlaybackSession,
    PlaybackTransport, SessionState, TransportFailure,
};
pub use ranking::{rank, HealthLookup, PlaybackPreferences};
