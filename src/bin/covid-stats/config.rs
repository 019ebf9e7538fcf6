//! CLI Configuration
//!
//! Resolves the application configuration and reports where it came from.

use covid_pl_stats::config::ApplicationConfig;
use covid_pl_stats::Result;
use std::path::Path;

/// Load configuration
///
/// Priority:
/// 1. `--config` flag
/// 2. COVID_STATS_CONFIG environment variable
/// 3. covid-stats.toml
/// 4. Default configuration
///
/// Environment overrides are applied in every case.
pub fn load_config(explicit: Option<&Path>) -> Result<ApplicationConfig> {
    let (config, source) = ApplicationConfig::resolve(explicit)?;
    match source {
        Some(path) => eprintln!("[config] Loaded configuration from: {}", path.display()),
        None => eprintln!("[config] Using default configuration"),
    }
    Ok(config)
}
