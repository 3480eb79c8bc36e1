//! Client configuration.
//!
//! Resolution order:
//! 1. Built-in defaults (`127.0.0.1:8080`, database `default`, dimension 128)
//! 2. JSON file at `$REDBOX_CONFIG` (must exist), else
//!    `<config dir>/redbox/client.json` if present
//! 3. Environment overrides (`REDBOX_HOST`, `REDBOX_PORT`, `REDBOX_DB`,
//!    `REDBOX_DIM`, `REDBOX_TIMEOUT_SECS`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::Endpoint;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for a RedBoxDb client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub dimension: u32,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database: "default".to_string(),
            dimension: 128,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the default file location and environment.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Resolve the file and overrides through `lookup`.
    ///
    /// A file named by `REDBOX_CONFIG` must exist. The platform default is
    /// only read if present.
    pub fn load_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("REDBOX_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))
                .with_context(|| format!("Config file from REDBOX_CONFIG not usable: {}", path))?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(&lookup)?;
        Ok(config)
    }

    /// Parse a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply `REDBOX_*` overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("REDBOX_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("REDBOX_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("Invalid REDBOX_PORT value: {}", port))?;
        }
        if let Some(database) = lookup("REDBOX_DB") {
            self.database = database;
        }
        if let Some(dim) = lookup("REDBOX_DIM") {
            self.dimension = dim
                .parse()
                .with_context(|| format!("Invalid REDBOX_DIM value: {}", dim))?;
        }
        if let Some(secs) = lookup("REDBOX_TIMEOUT_SECS") {
            self.timeout_secs = secs
                .parse()
                .with_context(|| format!("Invalid REDBOX_TIMEOUT_SECS value: {}", secs))?;
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Platform config file location (`~/.config` on Linux,
/// `~/Library/Application Support` on macOS).
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("redbox").join("client.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint(), Endpoint::new("127.0.0.1", 8080));
        assert_eq!(config.database, "default");
        assert_eq!(config.dimension, 128);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"port": 9090, "database": "alpha"}"#).unwrap();
        assert_eq!(
            config,
            ClientConfig {
                port: 9090,
                database: "alpha".to_string(),
                ..ClientConfig::default()
            }
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ClientConfig::default();
        config
            .apply_env(env_from(&[
                ("REDBOX_HOST", "db.internal"),
                ("REDBOX_PORT", "7000"),
                ("REDBOX_DB", "vectors"),
                ("REDBOX_DIM", "3"),
                ("REDBOX_TIMEOUT_SECS", "5"),
            ]))
            .unwrap();

        assert_eq!(config.endpoint().to_string(), "db.internal:7000");
        assert_eq!(config.database, "vectors");
        assert_eq!(config.dimension, 3);
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_env_invalid_port() {
        let mut config = ClientConfig::default();
        let err = config
            .apply_env(env_from(&[("REDBOX_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(err.to_string().contains("REDBOX_PORT"));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("redbox-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"host": "10.1.1.1", "dimension": 64}"#).unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.host, "10.1.1.1");
        assert_eq!(config.dimension, 64);
        assert_eq!(config.port, 8080);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_explicit_config_file_is_error() {
        let path = std::env::temp_dir().join(format!(
            "redbox-config-missing-{}.json",
            std::process::id()
        ));
        let path = path.to_string_lossy().into_owned();

        let err = ClientConfig::load_with(env_from(&[("REDBOX_CONFIG", path.as_str())]))
            .unwrap_err();
        assert!(err.to_string().contains("REDBOX_CONFIG"));
    }

    #[test]
    fn test_load_with_explicit_file_and_overrides() {
        let path = std::env::temp_dir().join(format!(
            "redbox-config-explicit-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"database": "from-file", "port": 9000}"#).unwrap();
        let path_str = path.to_string_lossy().into_owned();

        let config = ClientConfig::load_with(env_from(&[
            ("REDBOX_CONFIG", path_str.as_str()),
            ("REDBOX_PORT", "9100"),
        ]))
        .unwrap();
        assert_eq!(config.database, "from-file");
        assert_eq!(config.port, 9100);

        let _ = std::fs::remove_file(&path);
    }
}
