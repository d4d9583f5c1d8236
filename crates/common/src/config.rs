//! Accessory configuration types.

use serde::{Deserialize, Deserializer, Serialize};

use crate::Error;

/// Accessory type the sensor registers under.
pub const ACCESSORY_TYPE: &str = "Air";

/// Configuration of one air-quality accessory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessoryConfig {
    /// Accessory type; the host uses it to pick the plugin.
    #[serde(default = "default_accessory")]
    pub accessory: String,

    /// Display name of the air-quality service.
    #[serde(default)]
    pub name: String,

    /// Airly API key, sent in the `apikey` header.
    #[serde(default)]
    pub apikey: String,

    /// Latitude of the measurement point, passed through verbatim.
    #[serde(default, deserialize_with = "coordinate")]
    pub latitude: String,

    /// Longitude of the measurement point, passed through verbatim.
    #[serde(default, deserialize_with = "coordinate")]
    pub longitude: String,

    /// How long a successful measurement is served from cache.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Per-request timeout for the Airly API. 0 disables the timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

// Host UIs often write coordinates as bare numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Text(String),
    Number(f64),
}

fn coordinate<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Coordinate::deserialize(deserializer)? {
        Coordinate::Text(raw) => raw,
        Coordinate::Number(n) => n.to_string(),
    })
}

fn default_accessory() -> String {
    ACCESSORY_TYPE.to_string()
}
fn default_cache_ttl() -> u64 {
    600
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for AccessoryConfig {
    fn default() -> Self {
        Self {
            accessory: default_accessory(),
            name: String::new(),
            apikey: String::new(),
            latitude: String::new(),
            longitude: String::new(),
            cache_ttl_secs: default_cache_ttl(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AccessoryConfig {
    /// Check mandatory keys, reporting the first one that is missing.
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            ("name", &self.name),
            ("apikey", &self.apikey),
            ("latitude", &self.latitude),
            ("longitude", &self.longitude),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Airly - you must provide a config value for '{key}'."
                )));
            }
        }

        if self.cache_ttl_secs == 0 {
            return Err(Error::Config("cache_ttl_secs must be > 0".into()));
        }

        Ok(())
    }
}
