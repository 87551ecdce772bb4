use super::{types::Config, ConfigError};

/// Longest accepted failure window: ten years.
pub const MAX_DEAD_AFTER_HOURS: u64 = 24 * 365 * 10;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Health failure threshold and capacity are not 0
/// - Health failure window is at most ten years
/// - Normalizer batch size is not 0
/// - Probe timeout is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.health.failure_threshold == 0 {
        return Err(ConfigError::ValidationError(
            "health.failure_threshold cannot be 0".to_string(),
        ));
    }

    if config.health.dead_after_hours > MAX_DEAD_AFTER_HOURS {
        return Err(ConfigError::ValidationError(format!(
            "health.dead_after_hours cannot exceed {}",
            MAX_DEAD_AFTER_HOURS
        )));
    }

    if config.health.max_records == 0 {
        return Err(ConfigError::ValidationError(
            "health.max_records cannot be 0".to_string(),
        ));
    }

    if config.normalizer.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "normalizer.batch_size cannot be 0".to_string(),
        ));
    }

    if config.probe.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "probe.timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse().unwrap(),
                port: 0,
            },
            ..Config::default()
        };
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_threshold_fails() {
        let mut config = Config::default();
        config.health.failure_threshold = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_oversized_dead_window_fails() {
        let config =
            crate::config::load_config_from_str("[health]\ndead_after_hours = 9223372036854775807")
                .unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("dead_after_hours"));

        let mut config = Config::default();
        config.health.dead_after_hours = MAX_DEAD_AFTER_HOURS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_capacity_fails() {
        let mut config = Config::default();
        config.health.max_records = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_batch_size_fails() {
        let mut config = Config::default();
        config.normalizer.batch_size = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_validate_zero_probe_timeout_fails() {
        let mut config = Config::default();
        config.probe.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }
}
