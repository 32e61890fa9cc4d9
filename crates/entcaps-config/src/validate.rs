//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::CapsConfig;

/// Upper bound on the per-query deadline (one hour).
const MAX_QUERY_TIMEOUT_SECS: u64 = 3600;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &CapsConfig) -> ConfigResult<()> {
    validate_trust(config)?;
    validate_discovery(config)?;
    validate_buffers(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_trust(config: &CapsConfig) -> ConfigResult<()> {
    if config.trust.confirmations_required == 0 {
        return Err(ConfigError::ValidationError {
            field: "trust.confirmations_required".to_owned(),
            message: "at least one confirmation is required".to_owned(),
        });
    }
    Ok(())
}

fn validate_discovery(config: &CapsConfig) -> ConfigResult<()> {
    let secs = config.discovery.query_timeout_secs;
    if secs == 0 || secs > MAX_QUERY_TIMEOUT_SECS {
        return Err(ConfigError::ValidationError {
            field: "discovery.query_timeout_secs".to_owned(),
            message: format!("must be between 1 and {MAX_QUERY_TIMEOUT_SECS}, got {secs}"),
        });
    }
    Ok(())
}

fn validate_buffers(config: &CapsConfig) -> ConfigResult<()> {
    for (field, value) in [
        ("service.command_buffer", config.service.command_buffer),
        ("events.channel_capacity", config.events.channel_capacity),
    ] {
        if value == 0 {
            return Err(ConfigError::ValidationError {
                field: field.to_owned(),
                message: "must be greater than zero".to_owned(),
            });
        }
    }
    Ok(())
}

fn validate_logging(config: &CapsConfig) -> ConfigResult<()> {
    let l = &config.logging;

    if !matches!(
        l.level.to_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unknown level '{}'; expected one of: trace, debug, info, warn, error",
                l.level
            ),
        });
    }

    if !matches!(l.format.as_str(), "pretty" | "compact" | "json") {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unknown format '{}'; expected one of: pretty, compact, json",
                l.format
            ),
        });
    }

    if let Some(bad) = l.directives.iter().find(|d| d.trim().is_empty()) {
        return Err(ConfigError::ValidationError {
            field: "logging.directives".to_owned(),
            message: format!("empty directive '{bad}'"),
        });
    }

    Ok(())
}
