//! Worker configuration.
//!
//! Identifies the origin being mirrored, the versioned bucket name, the
//! precache manifest, and the offline navigation fallback document.
//!
//! Configuration is stored at `~/.config/shellcache/config.json`; the
//! `SHELLCACHE_CONFIG`, `SHELLCACHE_CACHE_DIR`, `SHELLCACHE_ORIGIN` and
//! `SHELLCACHE_CACHE_NAME` environment variables override it.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "shellcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

fn default_origin() -> String {
    "http://localhost:8000".to_string()
}

fn default_cache_name() -> String {
    "shellcache-v1".to_string()
}

fn default_precache() -> Vec<String> {
    vec!["/".to_string(), "/index.html".to_string()]
}

fn default_navigation_fallback() -> String {
    "/index.html".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Origin the application shell is mirrored from.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Bucket name for the deployed version. Bumping this on deploy is
    /// the one mechanism that retires the previous bucket at the next
    /// activate.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Shell paths fetched at install. Version-pinned via a query
    /// parameter (e.g. `/main.js?v=1.0.0`) so intermediate HTTP caches
    /// are bypassed on redeploy.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Document served when an offline navigation has no cached match.
    #[serde(default = "default_navigation_fallback")]
    pub navigation_fallback: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_name: default_cache_name(),
            precache: default_precache(),
            navigation_fallback: default_navigation_fallback(),
        }
    }
}

impl Config {
    /// Load from disk, falling back to defaults if no file exists, then
    /// apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config: Self = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };

        if let Ok(origin) = std::env::var("SHELLCACHE_ORIGIN") {
            config.origin = origin;
        }
        if let Ok(cache_name) = std::env::var("SHELLCACHE_CACHE_NAME") {
            config.cache_name = cache_name;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("SHELLCACHE_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("SHELLCACHE_CACHE_DIR") {
            return Ok(PathBuf::from(path));
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
