//! Config file loading.
//!
//! 1. Parse the embedded `defaults.toml` → base
//! 2. Deep-merge the config file (if any) over the base
//! 3. Apply `ENTCAPS_*` env fallbacks for fields the file left unset
//! 4. Deserialize → [`CapsConfig`]
//! 5. Validate

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::CapsConfig;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Config files larger than this are rejected before parsing.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Environment fallbacks: variable name and dotted config path.
const ENV_FALLBACKS: &[(&str, &str, EnvKind)] = &[
    ("ENTCAPS_LOG_LEVEL", "logging.level", EnvKind::String),
    (
        "ENTCAPS_QUERY_TIMEOUT_SECS",
        "discovery.query_timeout_secs",
        EnvKind::Integer,
    ),
    (
        "ENTCAPS_CONFIRMATIONS_REQUIRED",
        "trust.confirmations_required",
        EnvKind::Integer,
    ),
];

#[derive(Debug, Clone, Copy)]
enum EnvKind {
    String,
    Integer,
}

/// Load configuration from an optional file, with env fallbacks from the
/// process environment.
///
/// A missing file is not an error: defaults (plus env) apply.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, an env
/// var is malformed, or the result fails validation.
pub fn load(path: Option<&Path>) -> ConfigResult<CapsConfig> {
    load_with_env(path, &collect_env_vars())
}

/// Load configuration with an explicit environment map.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env(path: Option<&Path>, env: &HashMap<String, String>) -> ConfigResult<CapsConfig> {
    let overlay = match path {
        Some(path) => try_load_file(path)?,
        None => None,
    };
    let overlay = overlay.unwrap_or_else(|| toml::Value::Table(toml::map::Map::new()));
    resolve(&overlay, env)
}

/// Parse configuration from a TOML string layered over the defaults.
///
/// Env fallbacks are not applied.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the string does not parse or validate.
pub fn from_toml_str(content: &str) -> ConfigResult<CapsConfig> {
    let overlay = parse(content, "<string>")?;
    resolve(&overlay, &HashMap::new())
}

fn resolve(overlay: &toml::Value, env: &HashMap<String, String>) -> ConfigResult<CapsConfig> {
    let mut merged = parse(DEFAULTS_TOML, "<embedded defaults>")?;
    deep_merge(&mut merged, overlay);
    apply_env_fallbacks(&mut merged, overlay, env)?;

    let config: CapsConfig = merged.try_into().map_err(|e| ConfigError::ParseError {
        path: "<merged>".to_owned(),
        source: e,
    })?;

    validate::validate(&config)?;
    Ok(config)
}

fn parse(content: &str, origin: &str) -> ConfigResult<toml::Value> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: origin.to_owned(),
        source: e,
    })
}

/// Read a TOML file, returning `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    let value = parse(&content, &path.display().to_string())?;
    info!(path = %path.display(), "loaded config file");
    Ok(Some(value))
}

/// Deep-merge `overlay` into `base`. Tables merge recursively; any other
/// value in the overlay replaces the base value.
pub(crate) fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("ENTCAPS_"))
        .collect()
}

fn lookup<'a>(value: &'a toml::Value, dotted: &str) -> Option<&'a toml::Value> {
    dotted
        .split('.')
        .try_fold(value, |current, key| current.as_table()?.get(key))
}

fn apply_env_fallbacks(
    merged: &mut toml::Value,
    overlay: &toml::Value,
    env: &HashMap<String, String>,
) -> ConfigResult<()> {
    for (var_name, dotted, kind) in ENV_FALLBACKS {
        let Some(raw) = env.get(*var_name) else {
            continue;
        };
        if lookup(overlay, dotted).is_some() {
            debug!(var = var_name, field = dotted, "config file wins over env var");
            continue;
        }

        let value = match kind {
            EnvKind::String => toml::Value::String(raw.clone()),
            EnvKind::Integer => {
                let parsed: i64 = raw.trim().parse().map_err(|_| ConfigError::EnvError {
                    var_name: (*var_name).to_owned(),
                    message: format!("expected an integer, got '{raw}'"),
                })?;
                toml::Value::Integer(parsed)
            },
        };

        let Some((section, key)) = dotted.split_once('.') else {
            continue;
        };
        if let Some(table) = merged
            .as_table_mut()
            .and_then(|root| root.get_mut(section))
            .and_then(toml::Value::as_table_mut)
        {
            table.insert(key.to_owned(), value);
            debug!(var = var_name, field = dotted, "applied env fallback");
        }
    }
    Ok(())
}
