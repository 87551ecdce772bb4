use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "REELMERGE_";

/// Separates section from field in override names, so snake_case fields
/// survive: `REELMERGE_HEALTH__DEAD_AFTER_HOURS=48` sets `health.dead_after_hours`.
pub const ENV_SECTION_SEPARATOR: &str = "__";

fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split(ENV_SECTION_SEPARATOR))
}

/// Load configuration from a TOML file, then apply environment overrides.
///
/// Sections missing from the file fall back to their defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    figment_for(path)
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parse configuration from TOML text alone, without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
