//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/kiosk.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Environment variable consulted when no password is configured
pub const PASSWORD_ENV: &str = "ATTENDANCE_DB_PASSWORD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderSource {
    /// Reader emulates a keyboard; swipes arrive as key presses
    Keyboard,
    /// Reader attached to a UART
    Serial,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Upper bound on any single store call
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            host: default_host(),
            port: default_port(),
            database: default_database(),
            table: default_table(),
            user: default_user(),
            password: None,
            timeout_ms: default_store_timeout_ms(),
        }
    }
}

fn default_backend() -> StoreBackend {
    StoreBackend::Postgres
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_database() -> String {
    "attendance".to_string()
}

fn default_table() -> String {
    "users".to_string()
}

fn default_user() -> String {
    "kiosk".to_string()
}

fn default_store_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInConfig {
    /// Bypass the once-per-hour rule (demo and test deployments)
    #[serde(default)]
    pub allow_check_in_within_hour: bool,
    #[serde(default = "default_cool_down_secs")]
    pub cool_down_secs: f64,
    #[serde(default = "default_visit_increment")]
    pub default_visit_increment: u32,
}

impl Default for CheckInConfig {
    fn default() -> Self {
        Self {
            allow_check_in_within_hour: false,
            cool_down_secs: default_cool_down_secs(),
            default_visit_increment: default_visit_increment(),
        }
    }
}

fn default_cool_down_secs() -> f64 {
    3.0
}

fn default_visit_increment() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    #[serde(default = "default_reader_source")]
    pub source: ReaderSource,
    #[serde(default = "default_reader_device")]
    pub device: String,
    #[serde(default = "default_reader_baud")]
    pub baud: u32,
    /// Swipe buffer is discarded after this many characters without a match
    #[serde(default = "default_max_buffer_len")]
    pub max_buffer_len: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            source: default_reader_source(),
            device: default_reader_device(),
            baud: default_reader_baud(),
            max_buffer_len: default_max_buffer_len(),
        }
    }
}

fn default_reader_source() -> ReaderSource {
    ReaderSource::Keyboard
}

fn default_reader_device() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_reader_baud() -> u32 {
    9600
}

fn default_max_buffer_len() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_file")]
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { file: default_log_file() }
    }
}

fn default_log_file() -> String {
    "kiosk.log".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_name")]
    pub name: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { name: default_site_name() }
    }
}

fn default_site_name() -> String {
    "Attendance".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub checkin: CheckInConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_name: String,
    store_backend: StoreBackend,
    store_host: String,
    store_port: u16,
    store_database: String,
    store_table: String,
    store_user: String,
    store_password: Option<String>,
    store_timeout_ms: u64,
    allow_check_in_within_hour: bool,
    cool_down_ms: u64,
    default_visit_increment: u32,
    reader_source: ReaderSource,
    reader_device: String,
    reader_baud: u32,
    max_buffer_len: usize,
    log_file: String,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(
            TomlConfig {
                site: SiteConfig::default(),
                store: StoreConfig::default(),
                checkin: CheckInConfig::default(),
                reader: ReaderConfig::default(),
                logging: LoggingConfig::default(),
            },
            "default".to_string(),
        )
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        // Negative or NaN cool-downs collapse to zero
        let cool_down_ms = (toml_config.checkin.cool_down_secs.max(0.0) * 1000.0) as u64;

        Self {
            site_name: toml_config.site.name,
            store_backend: toml_config.store.backend,
            store_host: toml_config.store.host,
            store_port: toml_config.store.port,
            store_database: toml_config.store.database,
            store_table: toml_config.store.table,
            store_user: toml_config.store.user,
            store_password: toml_config.store.password,
            store_timeout_ms: toml_config.store.timeout_ms,
            allow_check_in_within_hour: toml_config.checkin.allow_check_in_within_hour,
            cool_down_ms,
            default_visit_increment: toml_config.checkin.default_visit_increment,
            reader_source: toml_config.reader.source,
            reader_device: toml_config.reader.device,
            reader_baud: toml_config.reader.baud,
            max_buffer_len: toml_config.reader.max_buffer_len,
            log_file: toml_config.logging.file,
            config_file,
        }
    }

    /// Determine config file path from the CLI value or environment
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/kiosk.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load configuration - tries the TOML file first, falls back to defaults.
    ///
    /// The load error is handed back rather than logged, because the log
    /// file itself comes from the config and no subscriber exists yet.
    pub fn load_with_fallback(path: &str) -> (Self, Option<anyhow::Error>) {
        match Self::from_file(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Password from config, falling back to the environment
    pub fn resolved_store_password(&self) -> Option<String> {
        self.store_password.clone().or_else(|| env::var(PASSWORD_ENV).ok())
    }

    // Getters for all config fields
    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    pub fn store_backend(&self) -> StoreBackend {
        self.store_backend
    }

    pub fn store_host(&self) -> &str {
        &self.store_host
    }

    pub fn store_port(&self) -> u16 {
        self.store_port
    }

    pub fn store_database(&self) -> &str {
        &self.store_database
    }

    pub fn store_table(&self) -> &str {
        &self.store_table
    }

    pub fn store_user(&self) -> &str {
        &self.store_user
    }

    pub fn store_timeout_ms(&self) -> u64 {
        self.store_timeout_ms
    }

    pub fn allow_check_in_within_hour(&self) -> bool {
        self.allow_check_in_within_hour
    }

    pub fn cool_down_ms(&self) -> u64 {
        self.cool_down_ms
    }

    pub fn default_visit_increment(&self) -> u32 {
        self.default_visit_increment
    }

    pub fn reader_source(&self) -> ReaderSource {
        self.reader_source
    }

    pub fn reader_device(&self) -> &str {
        &self.reader_device
    }

    pub fn reader_baud(&self) -> u32 {
        self.reader_baud
    }

    pub fn max_buffer_len(&self) -> usize {
        self.max_buffer_len
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method to force the in-memory store (demo mode, tests)
    pub fn with_store_backend(mut self, backend: StoreBackend) -> Self {
        self.store_backend = backend;
        self
    }

    /// Builder method to override the cool-down hold
    pub fn with_cool_down_ms(mut self, ms: u64) -> Self {
        self.cool_down_ms = ms;
        self
    }

    /// Builder method to override the store call timeout
    pub fn with_store_timeout_ms(mut self, ms: u64) -> Self {
        self.store_timeout_ms = ms;
        self
    }

    /// Builder method to toggle the once-per-hour override
    pub fn with_allow_check_in_within_hour(mut self, allow: bool) -> Self {
        self.allow_check_in_within_hour = allow;
        self
    }

    /// Builder method to set the default visit increment
    pub fn with_default_visit_increment(mut self, increment: u32) -> Self {
        self.default_visit_increment = increment;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store_backend(), StoreBackend::Postgres);
        assert_eq!(config.store_host(), "localhost");
        assert_eq!(config.store_port(), 5432);
        assert_eq!(config.store_table(), "users");
        assert!(!config.allow_check_in_within_hour());
        assert_eq!(config.cool_down_ms(), 3000);
        assert_eq!(config.default_visit_increment(), 1);
        assert_eq!(config.reader_source(), ReaderSource::Keyboard);
        assert_eq!(config.max_buffer_len(), 256);
    }

    #[test]
    fn test_resolve_config_path_from_cli() {
        assert_eq!(Config::resolve_config_path(Some("config/lab.toml")), "config/lab.toml");
    }

    #[test]
    fn test_fractional_cool_down() {
        let toml_config: TomlConfig = toml::from_str("[checkin]\ncool_down_secs = 1.5\n").unwrap();
        let config = Config::from_toml(toml_config, "inline".to_string());
        assert_eq!(config.cool_down_ms(), 1500);
    }

    #[test]
    fn test_negative_cool_down_clamped() {
        let toml_config: TomlConfig = toml::from_str("[checkin]\ncool_down_secs = -4\n").unwrap();
        let config = Config::from_toml(toml_config, "inline".to_string());
        assert_eq!(config.cool_down_ms(), 0);
    }

    #[test]
    fn test_empty_file_uses_section_defaults() {
        let toml_config: TomlConfig = toml::from_str("").unwrap();
        let config = Config::from_toml(toml_config, "inline".to_string());
        assert_eq!(config.store_database(), "attendance");
        assert_eq!(config.log_file(), "kiosk.log");
        assert_eq!(config.site_name(), "Attendance");
    }

    #[test]
    fn test_configured_password_wins() {
        let toml_config: TomlConfig =
            toml::from_str("[store]\npassword = \"s3cret\"\n").unwrap();
        let config = Config::from_toml(toml_config, "inline".to_string());
        assert_eq!(config.resolved_store_password().as_deref(), Some("s3cret"));
    }
}
