//! Bootstrap configuration loading
//!
//! Configuration file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`HOURGLASS_CONFIG`)
//! 3. Platform config directory (`<config_dir>/hourglass/hourglass.toml`)
//! 4. Built-in defaults (every field has one)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "HOURGLASS_CONFIG";

/// Bootstrap configuration loaded from TOML
///
/// Read once at startup; the service must restart to pick up changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter directive (e.g. "info", "hourglass_analyzer=debug")
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Upstream review source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Reviews requested per page (upstream maximum is 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Retries per page after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Page requests per second across the whole process
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Analysis cache eviction policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Records older than this (since last commit) are purged
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Maximum number of cached analyses
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

/// Request-level timeouts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Ceiling for analyze requests (cold fetches can take minutes)
    #[serde(default = "default_analyze_secs")]
    pub analyze_secs: u64,
    /// Ceiling for query/export requests against cached data
    #[serde(default = "default_query_ms")]
    pub query_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "hourglass_analyzer=info,tower_http=info".to_string()
}

fn default_base_url() -> String {
    "https://store.steampowered.com".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_max_retries() -> u32 {
    4
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_requests_per_second() -> u32 {
    2
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("Hourglass/{}", env!("CARGO_PKG_VERSION"))
}

fn default_ttl_secs() -> u64 {
    30 * 60
}

fn default_max_entries() -> usize {
    50
}

fn default_analyze_secs() -> u64 {
    300
}

fn default_query_ms() -> u64 {
    5_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
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

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            requests_per_second: default_requests_per_second(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            analyze_secs: default_analyze_secs(),
            query_ms: default_query_ms(),
        }
    }
}

impl TomlConfig {
    /// Validate values that serde cannot constrain
    pub fn validate(&self) -> Result<()> {
        if self.upstream.page_size == 0 || self.upstream.page_size > 100 {
            return Err(Error::Config(format!(
                "upstream.page_size must be 1-100, got {}",
                self.upstream.page_size
            )));
        }
        if self.upstream.requests_per_second == 0 {
            return Err(Error::Config(
                "upstream.requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.upstream.initial_backoff_ms > self.upstream.max_backoff_ms {
            return Err(Error::Config(format!(
                "upstream.initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.upstream.initial_backoff_ms, self.upstream.max_backoff_ms
            )));
        }
        if self.cache.max_entries == 0 {
            return Err(Error::Config("cache.max_entries must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Resolve the config file path
///
/// Returns `None` when no explicit path was given and no file exists in
/// the platform config directory; the caller then runs on defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir()
        .map(|d| d.join("hourglass").join("hourglass.toml"))
        .filter(|p| p.exists())
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration following the resolution priority
///
/// An explicitly named file that cannot be read is an error; a missing
/// default location silently yields built-in defaults.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            let config = load_toml_config(&path)?;
            info!("Configuration loaded from {}", path.display());
            Ok(config)
        }
        None => {
            info!("No configuration file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Write configuration to a TOML file, creating parent directories
///
/// Writes to a temporary sibling first and renames it into place.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        warn!("Atomic rename failed for {}: {}", path.display(), e);
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.upstream.page_size, 100);
        assert_eq!(config.cache.ttl_secs, 1800);
        assert_eq!(config.cache.max_entries, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [server]
            port = 8080

            [upstream]
            max_retries = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.upstream.max_retries, 2);
        assert_eq!(config.upstream.page_size, 100);
        assert_eq!(config.timeouts.query_ms, 5_000);
    }

    #[test]
    fn test_validate_rejects_oversized_page() {
        let mut config = TomlConfig::default();
        config.upstream.page_size = 500;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut config = TomlConfig::default();
        config.upstream.initial_backoff_ms = 10_000;
        config.upstream.max_backoff_ms = 1_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_path_wins() {
        let path = PathBuf::from("/tmp/explicit.toml");
        assert_eq!(resolve_config_path(Some(&path)), Some(path));
    }
}
