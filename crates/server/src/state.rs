use std::sync::Arc;

use sha2::{Digest, Sha256};

use reelmerge_core::{
    Config, Normalizer, OverrideRegistry, PlaybackOrchestrator, PlaybackPreferences,
    PlaybackTransport, VariantHealthLedger,
};

/// Shared application state
pub struct AppState {
    config: Config,
    config_hash: String,
    normalizer: Arc<Normalizer>,
    orchestrator: PlaybackOrchestrator,
    transport: Arc<dyn PlaybackTransport>,
    overrides: OverrideRegistry,
    default_prefs: PlaybackPreferences,
}

impl AppState {
    pub fn new(
        config: Config,
        normalizer: Arc<Normalizer>,
        health: Arc<VariantHealthLedger>,
        transport: Arc<dyn PlaybackTransport>,
    ) -> Self {
        let config_json = serde_json::to_string(&config).unwrap_or_default();
        let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
        let default_prefs = PlaybackPreferences::from(&config.ranking);

        Self {
            config,
            config_hash: config_hash[..16].to_string(),
            normalizer,
            orchestrator: PlaybackOrchestrator::new(health, Arc::clone(&transport)),
            transport,
            overrides: OverrideRegistry::new(),
            default_prefs,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Short SHA-256 of the effective configuration.
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn normalizer(&self) -> &Normalizer {
        self.normalizer.as_ref()
    }

    pub fn orchestrator(&self) -> &PlaybackOrchestrator {
        &self.orchestrator
    }

    /// Transport used for server-side probes.
    pub fn transport(&self) -> &Arc<dyn PlaybackTransport> {
        &self.transport
    }

    pub fn health(&self) -> &VariantHealthLedger {
        self.orchestrator.health().as_ref()
    }

    pub fn overrides(&self) -> &OverrideRegistry {
        &self.overrides
    }

    /// Preferences from `[ranking]`, used when a request brings none.
    pub fn default_prefs(&self) -> &PlaybackPreferences {
        &self.default_prefs
    }
}
