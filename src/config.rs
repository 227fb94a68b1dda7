use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the enrichment pipeline.
///
/// Controls the geocoding credentials and retry policy, where to look for
/// stored files on disk, and diagnostic verbosity.
///
/// # Loading
///
/// ```rust,no_run
/// use media_enrich::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or from the environment (GAODE_API_KEY, GOOGLE_API_KEY, PUBLIC_DIR, NODE_ENV)
/// let config = Config::from_env();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Reverse-geocoding credentials and retry policy.
    pub geocoding: GeocodingConfig,
    /// Where stored files live on disk.
    pub storage: StorageConfig,
    /// Raises diagnostic verbosity (extra skip/persist details).
    pub development: bool,
}

/// Reverse-geocoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// AMap (Gaode) key for the domestic provider.
    pub amap_key: String,
    /// Google Maps key for the international provider.
    pub google_key: String,
    /// Attempts per coordinate before giving up.
    pub retries: u32,
    /// Fixed delay between attempts, in milliseconds.
    pub retry_delay_ms: u64,
}

/// Filesystem roots used to locate stored files.
///
/// The resolver probes these in order; see [`crate::paths::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Configured public-files root, if the host provides one.
    pub public_dir: Option<PathBuf>,
    /// Alternate public root (some hosts configure a second one).
    pub alt_public_dir: Option<PathBuf>,
    /// Subdirectory under the default public root where uploads land.
    pub uploads_subdir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geocoding: GeocodingConfig {
                amap_key: String::new(),
                google_key: String::new(),
                retries: 3,
                retry_delay_ms: 2000,
            },
            storage: StorageConfig {
                public_dir: None,
                alt_public_dir: None,
                uploads_subdir: "uploads".to_string(),
            },
            development: false,
        }
    }
}

impl Config {
    /// Load config from the given JSON file. With no path, the environment
    /// is consulted instead; a path that does not exist falls back to
    /// defaults with a warning.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(config_path) = path else {
            return Ok(Self::from_env());
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", path.display());
        Ok(())
    }

    /// Build a config from the environment.
    ///
    /// Reads `GAODE_API_KEY` and `GOOGLE_API_KEY` for the geocoding
    /// providers, `PUBLIC_DIR` as the public-files root override, and
    /// `NODE_ENV=development` for the diagnostics flag.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var("GAODE_API_KEY") {
            config.geocoding.amap_key = key;
        }
        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            config.geocoding.google_key = key;
        }
        if let Ok(dir) = std::env::var("PUBLIC_DIR") {
            if !dir.is_empty() {
                config.storage.public_dir = Some(PathBuf::from(dir));
            }
        }
        config.development = std::env::var("NODE_ENV").is_ok_and(|v| v == "development");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_retry_policy() {
        let config = Config::default();
        assert_eq!(config.geocoding.retries, 3);
        assert_eq!(config.geocoding.retry_delay_ms, 2000);
        assert_eq!(config.storage.uploads_subdir, "uploads");
        assert!(!config.development);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert!(config.geocoding.amap_key.is_empty());
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.geocoding.amap_key = "test-key".into();
        config.storage.public_dir = Some(PathBuf::from("/srv/public"));
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.geocoding.amap_key, "test-key");
        assert_eq!(
            loaded.storage.public_dir.as_deref(),
            Some(Path::new("/srv/public"))
        );
    }
}
