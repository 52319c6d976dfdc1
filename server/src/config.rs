//! Server configuration, loadable from TOML or JSON by file extension.

use std::path::{Path, PathBuf};

use imagery::TileProvider;
use schemars::JsonSchema;
use segmentation::ModelVariant;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// Runtime configuration for the segmentation service
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Root directory for per-run pipeline artifacts
    pub workspace_dir: PathBuf,
    /// Cache directory for downloaded model checkpoints
    pub model_cache_dir: PathBuf,
    pub model_variant: ModelVariant,
    pub tile_provider: TileProvider,
    /// Output raster width in pixels; height follows the region aspect
    pub image_width: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5010,
            workspace_dir: PathBuf::from("workspace"),
            model_cache_dir: PathBuf::from("models"),
            model_variant: ModelVariant::default(),
            tile_provider: TileProvider::GoogleSatellite,
            image_width: 4096,
        }
    }
}

impl ServerConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref)?;
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Err(ConfigError::UnsupportedFileFormat),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bind_addr_and_width() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:5010");
        assert_eq!(config.image_width, 4096);
        assert_eq!(config.tile_provider, TileProvider::GoogleSatellite);
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            port = 8080
            tile_provider = "open_street_map"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.tile_provider, TileProvider::OpenStreetMap);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_json_config_parses() {
        let config = ServerConfig::from_json(r#"{"image_width": 2048}"#).unwrap();
        assert_eq!(config.image_width, 2048);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "port: 1").unwrap();

        assert!(matches!(
            ServerConfig::from_file(&path),
            Err(ConfigError::UnsupportedFileFormat)
        ));
    }
}
