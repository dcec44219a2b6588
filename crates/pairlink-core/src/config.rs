//! Configuration resolution for pairlink.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/pairlink/settings.json`)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables (highest priority)
//!
//! Files may be partial; only the keys they contain override lower layers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coordinator::HandshakeSettings;
use crate::error::{Error, Result};

/// Complete pairlink configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub handshake: HandshakeConfig,
}

/// Where invite links point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Origin and path of the page that opens invites; the token goes in the fragment.
    pub base_url: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            base_url: "https://pairlink.dev/join".to_string(),
        }
    }
}

/// Logging output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Handshake and channel limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Abort candidate gathering after this many seconds. Unset waits forever.
    pub gather_timeout_secs: Option<u64>,
    pub max_message_bytes: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            gather_timeout_secs: None,
            max_message_bytes: 64 * 1024, // 64 KB
        }
    }
}

impl HandshakeConfig {
    pub fn settings(&self) -> HandshakeSettings {
        HandshakeSettings {
            gather_timeout: self.gather_timeout_secs.map(Duration::from_secs),
            max_message_bytes: self.max_message_bytes,
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut merged = serde_json::to_value(Config::default())?;

    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        merge_json(&mut merged, load_config_value(&global_path)?);
    }

    if let Some(path) = explicit {
        merge_json(&mut merged, load_config_value(path)?);
    }

    let mut config: Config = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pairlink").join("settings.json"))
}

fn load_config_value(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("PAIRLINK_LINK_BASE") {
        config.link.base_url = val;
    }
    if let Ok(val) = std::env::var("PAIRLINK_LOG_LEVEL") {
        config.log.level = val;
    }
    if let Ok(val) = std::env::var("PAIRLINK_LOG_JSON") {
        config.log.json = matches!(val.as_str(), "1" | "true" | "yes");
    }
    if let Ok(val) = std::env::var("PAIRLINK_GATHER_TIMEOUT_SECS")
        && let Ok(n) = val.parse()
    {
        config.handshake.gather_timeout_secs = Some(n);
    }
    if let Ok(val) = std::env::var("PAIRLINK_MAX_MESSAGE_BYTES")
        && let Ok(n) = val.parse()
    {
        config.handshake.max_message_bytes = n;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_wait_forever_for_gathering() {
        let config = Config::default();
        assert!(config.handshake.gather_timeout_secs.is_none());
        assert!(config.handshake.settings().gather_timeout.is_none());
    }

    #[test]
    fn default_message_limit_is_64k() {
        assert_eq!(Config::default().handshake.max_message_bytes, 64 * 1024);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "handshake": { "gather_timeout_secs": 15 } }"#).unwrap();

        let mut merged = serde_json::to_value(Config::default()).unwrap();
        merge_json(&mut merged, load_config_value(&path).unwrap());
        let config: Config = serde_json::from_value(merged).unwrap();

        assert_eq!(config.handshake.gather_timeout_secs, Some(15));
        assert_eq!(config.handshake.max_message_bytes, 64 * 1024);
        assert_eq!(config.link.base_url, "https://pairlink.dev/join");
        assert_eq!(
            config.handshake.settings().gather_timeout,
            Some(Duration::from_secs(15))
        );
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let mut base = serde_json::json!({ "log": { "level": "info", "json": false } });
        merge_json(&mut base, serde_json::json!({ "log": { "level": "debug" } }));
        assert_eq!(base["log"]["level"], "debug");
        assert_eq!(base["log"]["json"], false);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config_value(&path), Err(Error::Config(_))));
    }

    #[test]
    fn missing_explicit_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("absent.json")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
