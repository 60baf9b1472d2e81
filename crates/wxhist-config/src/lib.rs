use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub use wxhist_core::{DEFAULT_ARCHIVE_URL, DEFAULT_CHUNK_SIZE};

pub const DEFAULT_CONFIG_PATH: &str = "wxhist.toml";
pub const DEFAULT_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_TIMEZONE: &str = "auto";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchConfig {
    pub source_timeout_secs: Option<u64>,
    pub archive_url: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsConfig {
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub name: Option<String>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: 52.52,
            longitude: 13.41,
            name: Some("Berlin".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub cache: Option<CacheConfig>,
    pub fetch: Option<FetchConfig>,
    pub stats: Option<StatsConfig>,
    pub location: Option<LocationConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

impl AppConfig {
    /// Load configuration from the WXHIST_CONFIG path (TOML) if present,
    /// then apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("WXHIST_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = Self::load_from(&path)?;
        cfg.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(cfg)
    }

    /// Read a TOML file; a missing file yields the defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let s = fs::read_to_string(path)?;
        Ok(toml::from_str::<AppConfig>(&s)?)
    }

    /// Apply WXHIST_CACHE_TTL, WXHIST_SOURCE_TIMEOUT and WXHIST_ARCHIVE_URL
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("WXHIST_CACHE_TTL") {
            let ttl = parse_env("WXHIST_CACHE_TTL", value)?;
            self.cache.get_or_insert_with(Default::default).ttl_secs = Some(ttl);
        }
        if let Some(value) = lookup("WXHIST_SOURCE_TIMEOUT") {
            let timeout: u64 = parse_env("WXHIST_SOURCE_TIMEOUT", value)?;
            if timeout == 0 {
                return Err(ConfigError::InvalidEnv {
                    var: "WXHIST_SOURCE_TIMEOUT",
                    value: timeout.to_string(),
                });
            }
            self.fetch.get_or_insert_with(Default::default).source_timeout_secs = Some(timeout);
        }
        if let Some(url) = lookup("WXHIST_ARCHIVE_URL").filter(|u| !u.trim().is_empty()) {
            self.fetch.get_or_insert_with(Default::default).archive_url = Some(url);
        }
        Ok(())
    }

    /// Cache entry time-to-live (default 30 minutes)
    pub fn cache_ttl(&self) -> Duration {
        let secs = self
            .cache
            .as_ref()
            .and_then(|c| c.ttl_secs)
            .unwrap_or(DEFAULT_TTL_SECS);
        Duration::from_secs(secs)
    }

    /// Upper bound on one data source attempt (default 15s)
    pub fn source_timeout(&self) -> Duration {
        let secs = self
            .fetch
            .as_ref()
            .and_then(|f| f.source_timeout_secs)
            .filter(|&s| s > 0)
            .unwrap_or(DEFAULT_SOURCE_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn archive_url(&self) -> String {
        self.fetch
            .as_ref()
            .and_then(|f| f.archive_url.clone())
            .unwrap_or_else(|| DEFAULT_ARCHIVE_URL.to_string())
    }

    pub fn timezone(&self) -> String {
        self.fetch
            .as_ref()
            .and_then(|f| f.timezone.clone())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string())
    }

    /// Records per chunk for cooperative statistics (default 100)
    pub fn chunk_size(&self) -> usize {
        self.stats
            .as_ref()
            .and_then(|s| s.chunk_size)
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    /// Default location (Berlin when unset)
    pub fn location(&self) -> LocationConfig {
        self.location.clone().unwrap_or_default()
    }
}
