use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::SourceKind;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reelmerge.db")
}

/// Variant health ledger configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthConfig {
    /// Failures needed before a variant can be declared dead.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Minimum span between first and latest failure, in hours.
    #[serde(default = "default_dead_after_hours")]
    pub dead_after_hours: u64,
    /// Records kept before least-recently-touched ones are evicted.
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

impl HealthConfig {
    /// Failure span after which a variant can be declared dead. Spans too
    /// large to represent never elapse.
    pub fn dead_after(&self) -> chrono::Duration {
        i64::try_from(self.dead_after_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            dead_after_hours: default_dead_after_hours(),
            max_records: default_max_records(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_dead_after_hours() -> u64 {
    24
}

fn default_max_records() -> usize {
    100_000
}

/// Default playback preferences used when a caller supplies none
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RankingConfig {
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub prefer_omu: bool,
    #[serde(default)]
    pub preferred_source_kind: Option<SourceKind>,
}

/// Normalizer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NormalizerConfig {
    /// Records per batch when consuming a producer stream.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    256
}

/// HTTP reachability probe used by the server
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    /// Per-variant request timeout.
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_probe_timeout_secs() -> u64 {
    10
}
