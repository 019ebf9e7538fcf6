//! Configuration management
//!
//! TOML configuration file support with environment variable overrides and
//! defaults for every field, so an empty file (or no file at all) is valid.
//!
//! ```toml
//! [data]
//! infections_path = "data/ewp_dsh_zakazenia_po_szczepieniu.csv"
//! deaths_path = "data/ewp_dsh_zgony_po_szczep.csv"
//! county_names_path = "data/powiaty.csv"
//!
//! [cache]
//! max_entries = 512
//!
//! [query]
//! empty_buckets = "keep"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::aggregation::EmptyBucketPolicy;
use crate::cache::ViewCacheConfig;
use crate::error::{Error, Result};
use crate::ingestion::IngestOptions;
use crate::types::DatasetKind;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "COVID_STATS_CONFIG";

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "covid-stats.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ApplicationConfig {
    /// Input files
    #[serde(default)]
    pub data: DataConfig,

    /// View cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Query behavior
    #[serde(default)]
    pub query: QueryConfig,
}

/// Input file configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DataConfig {
    /// Infections-after-vaccination export
    #[serde(default = "default_infections_path")]
    pub infections_path: PathBuf,

    /// Deaths-after-vaccination export
    #[serde(default = "default_deaths_path")]
    pub deaths_path: PathBuf,

    /// County name reference (`JPT_KOD_JE;JPT_NAZWA_`), optional
    #[serde(default)]
    pub county_names_path: Option<PathBuf>,

    /// Fail a load on the first malformed record
    #[serde(default)]
    pub strict_ingestion: bool,
}

/// View cache configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheConfig {
    /// Enable the view cache
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum cached view pairs
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace) or an `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Query configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct QueryConfig {
    /// What to do with buckets where the cohort count is zero
    #[serde(default)]
    pub empty_buckets: EmptyBucketPolicy,
}

// Default value functions
fn default_infections_path() -> PathBuf {
    PathBuf::from("data/ewp_dsh_zakazenia_po_szczepieniu.csv")
}
fn default_deaths_path() -> PathBuf {
    PathBuf::from("data/ewp_dsh_zgony_po_szczep.csv")
}
fn default_max_entries() -> usize {
    256
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            infections_path: default_infections_path(),
            deaths_path: default_deaths_path(),
            county_names_path: None,
            strict_ingestion: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_max_entries(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl DataConfig {
    /// Export path for a dataset
    pub fn path_for(&self, kind: DatasetKind) -> &Path {
        match kind {
            DatasetKind::Infections => &self.infections_path,
            DatasetKind::Deaths => &self.deaths_path,
        }
    }

    /// Ingestion options derived from this section
    pub fn ingest_options(&self) -> IngestOptions {
        let options = IngestOptions::default();
        if self.strict_ingestion {
            options.strict()
        } else {
            options
        }
    }
}

impl From<&CacheConfig> for ViewCacheConfig {
    fn from(config: &CacheConfig) -> Self {
        let cache = ViewCacheConfig::default().with_max_entries(config.max_entries);
        if config.enabled {
            cache
        } else {
            cache.disabled()
        }
    }
}

impl ApplicationConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a TOML file, apply env overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_toml(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration
    ///
    /// Priority:
    /// 1. `explicit` path (the `--config` flag)
    /// 2. `COVID_STATS_CONFIG` environment variable
    /// 3. `covid-stats.toml` in the working directory
    /// 4. Default configuration
    ///
    /// Returns the configuration and the file it came from, if any.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let candidate = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        if let Some(path) = candidate {
            let config = Self::load(&path)?;
            return Ok((config, Some(path)));
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            let config = Self::load(&local)?;
            return Ok((config, Some(local)));
        }

        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok((config, None))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Data
        if let Ok(path) = std::env::var("COVID_STATS_INFECTIONS") {
            self.data.infections_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("COVID_STATS_DEATHS") {
            self.data.deaths_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("COVID_STATS_COUNTIES") {
            self.data.county_names_path = Some(PathBuf::from(path));
        }

        // Cache
        if let Ok(entries) = std::env::var("COVID_STATS_CACHE_ENTRIES") {
            self.cache.max_entries = entries.parse().map_err(|_| {
                Error::Configuration(format!(
                    "COVID_STATS_CACHE_ENTRIES must be a number, got '{}'",
                    entries
                ))
            })?;
        }

        // Logging
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.data.infections_path.as_os_str().is_empty() {
            return Err(Error::Configuration(
                "data.infections_path cannot be empty".to_string(),
            ));
        }
        if self.data.deaths_path.as_os_str().is_empty() {
            return Err(Error::Configuration(
                "data.deaths_path cannot be empty".to_string(),
            ));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(Error::Configuration(
                "cache.max_entries must be > 0 when the cache is enabled".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(Error::Configuration(
                "logging.level cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApplicationConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_entries, 256);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.query.empty_buckets, EmptyBucketPolicy::Drop);
        assert!(config.data.county_names_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = ApplicationConfig::from_toml("").unwrap();
        assert_eq!(config, ApplicationConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = ApplicationConfig::from_toml(
            r#"
            [data]
            deaths_path = "/tmp/zgony.csv"
            strict_ingestion = true

            [query]
            empty_buckets = "keep"
            "#,
        )
        .unwrap();

        assert_eq!(config.data.deaths_path, PathBuf::from("/tmp/zgony.csv"));
        assert_eq!(config.data.infections_path, default_infections_path());
        assert!(config.data.ingest_options().strict);
        assert_eq!(config.query.empty_buckets, EmptyBucketPolicy::Keep);
        assert_eq!(config.cache.max_entries, 256);
    }

    #[test]
    fn test_invalid_toml() {
        let err = ApplicationConfig::from_toml("[cache]\nmax_entries = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_validation_rejects_zero_entries() {
        let mut config = ApplicationConfig::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());

        config.cache.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_for_dataset() {
        let data = DataConfig::default();
        assert_eq!(data.path_for(DatasetKind::Deaths), data.deaths_path.as_path());
        assert_eq!(
            data.path_for(DatasetKind::Infections),
            data.infections_path.as_path()
        );
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = ApplicationConfig::default();
        config.data.county_names_path = Some(PathBuf::from("powiaty.csv"));
        let text = config.to_toml().unwrap();
        assert_eq!(ApplicationConfig::from_toml(&text).unwrap(), config);
    }
}
