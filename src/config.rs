//! Engine configuration, loaded from JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::inline::PublicDir;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings shared by every document an engine renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base directory for relative template names (default: `templates`).
    pub templates_dir: PathBuf,
    /// Local directories exposed under a public URL, used when images are
    /// loaded as URLs.
    pub public_dirs: Vec<PublicDir>,
    /// URL prefix public directories are served under.
    pub public_base_url: String,
    /// Timeout for fetching remote stylesheets and images.
    pub http_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            public_dirs: Vec::new(),
            public_base_url: "http://localhost/server".to_string(),
            http_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip_keeps_public_dirs() {
        let config = EngineConfig {
            public_dirs: vec![PublicDir {
                local: "public".into(),
                remote: "files".into(),
            }],
            ..EngineConfig::default()
        };
        assert_eq!(EngineConfig::from_json(&config.to_json()).unwrap(), config);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"http_timeout_secs": 5}"#).unwrap();
        assert_eq!(config.http_timeout(), Duration::from_secs(5));
        assert_eq!(config.templates_dir, PathBuf::from("templates"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = EngineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
