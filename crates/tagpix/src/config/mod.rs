use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod duration_serde;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub storage: StorageConfig,
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for original uploads, one subdirectory per partition
    #[serde(default = "default_upload_path")]
    pub upload_path: PathBuf,

    /// Root directory for derived render artifacts
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Image served whenever no stored image matches a delivery request
    #[serde(default = "default_fallback_image")]
    pub fallback_image: PathBuf,

    /// Maximum number of live images per partition before a new one is
    /// created
    #[serde(default = "default_partition_size")]
    pub partition_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// JPEG quality (0-100) for normalization and resized renders
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// max-age advertised in Cache-Control on delivery responses
    #[serde(default = "default_cache_lifetime", with = "duration_serde::duration")]
    pub cache_lifetime: Duration,

    /// How long a sticky random choice is remembered per client fingerprint
    #[serde(
        default = "default_random_session_ttl",
        with = "duration_serde::duration"
    )]
    pub random_session_ttl: Duration,
}

// Web defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

// Storage defaults
fn default_upload_path() -> PathBuf {
    PathBuf::from("./data/uploads")
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./data/cache")
}

fn default_fallback_image() -> PathBuf {
    PathBuf::from("./data/noimage.jpg")
}

fn default_partition_size() -> u32 {
    512
}

// Delivery defaults
fn default_jpeg_quality() -> u8 {
    90
}

fn default_cache_lifetime() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_random_session_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://./data/tagpix.db".to_string(),
                max_connections: Some(10),
            },
            web: WebConfig {
                host: default_host(),
                port: default_port(),
            },
            storage: StorageConfig {
                upload_path: default_upload_path(),
                cache_path: default_cache_path(),
                fallback_image: default_fallback_image(),
                partition_size: default_partition_size(),
            },
            delivery: DeliveryConfig {
                jpeg_quality: default_jpeg_quality(),
                cache_lifetime: default_cache_lifetime(),
                random_session_ttl: default_random_session_ttl(),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.delivery.jpeg_quality > 100 {
            anyhow::bail!(
                "delivery.jpeg_quality must be between 0 and 100, got {}",
                self.delivery.jpeg_quality
            );
        }
        if self.storage.partition_size == 0 {
            anyhow::bail!("storage.partition_size must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.partition_size, 512);
        assert_eq!(config.delivery.jpeg_quality, 90);
        assert_eq!(config.delivery.cache_lifetime, Duration::from_secs(86400));
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str(
            r#"
            [database]
            url = "sqlite://./test.db"

            [web]

            [storage]

            [delivery]
            cache_lifetime = "12h"
            random_session_ttl = "30m"
            "#,
        )
        .unwrap();

        assert_eq!(config.web.port, 8080);
        assert_eq!(config.delivery.cache_lifetime, Duration::from_secs(43200));
        assert_eq!(
            config.delivery.random_session_ttl,
            Duration::from_secs(1800)
        );
    }

    #[test]
    fn test_rejects_out_of_range_quality() {
        let config: Config = toml::from_str(
            r#"
            [database]
            url = "sqlite://./test.db"

            [web]

            [storage]

            [delivery]
            jpeg_quality = 150
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
