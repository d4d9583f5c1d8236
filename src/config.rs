//! Configuration loader — merges env vars, .env file, and a config file.

use common::config::ACCESSORY_TYPE;
use common::{AccessoryConfig, Error};
use serde::Deserialize;
use std::path::Path;

/// Host-style config document listing several accessories.
#[derive(Debug, Deserialize)]
struct HostConfig {
    #[serde(default)]
    accessories: Vec<AccessoryConfig>,
}

fn parse_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer >= 0")))
}

fn parse_json(contents: &str) -> Result<AccessoryConfig, Error> {
    let value: serde_json::Value = serde_json::from_str(contents)
        .map_err(|e| Error::Config(format!("Failed to parse config JSON: {e}")))?;

    if value.get("accessories").is_some() {
        let host: HostConfig = serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("Failed to parse accessories: {e}")))?;
        return host
            .accessories
            .into_iter()
            .find(|a| a.accessory == ACCESSORY_TYPE)
            .ok_or_else(|| {
                Error::Config(format!("No accessory of type '{ACCESSORY_TYPE}' configured"))
            });
    }

    serde_json::from_value(value)
        .map_err(|e| Error::Config(format!("Failed to parse accessory config: {e}")))
}

/// Parse a config file body; the extension picks JSON or TOML.
fn parse_file(path: &Path, contents: &str) -> Result<AccessoryConfig, Error> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        parse_json(contents)
    } else {
        toml::from_str(contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

fn apply_env_overrides(
    config: &mut AccessoryConfig,
    get: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(name) = get("AIRLY_NAME") {
        config.name = name;
    }
    if let Some(key) = get("AIRLY_API_KEY") {
        config.apikey = key;
    }
    if let Some(lat) = get("AIRLY_LATITUDE") {
        config.latitude = lat;
    }
    if let Some(lng) = get("AIRLY_LONGITUDE") {
        config.longitude = lng;
    }
    if let Some(raw) = get("AIRLY_CACHE_TTL_SECS") {
        config.cache_ttl_secs = parse_u64(&raw, "AIRLY_CACHE_TTL_SECS")?;
    }
    if let Some(raw) = get("AIRLY_REQUEST_TIMEOUT_SECS") {
        config.request_timeout_secs = parse_u64(&raw, "AIRLY_REQUEST_TIMEOUT_SECS")?;
    }
    Ok(())
}

/// Load accessory configuration from environment and an optional config file.
pub fn load_config(path: &Path) -> Result<AccessoryConfig, Error> {
    // 1. Load .env file from the working directory or its parents.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults, then the config file if it exists.
    let mut config = AccessoryConfig::default();
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        config = parse_file(path, &contents)?;
    } else {
        tracing::debug!("Config file {} not found, using environment only", path.display());
    }

    // 3. Environment variables take priority.
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    // 4. Mandatory keys.
    config.validate()?;

    Ok(config)
}
