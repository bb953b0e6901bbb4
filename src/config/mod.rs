//! Configuration management
//!
//! Configuration is loaded from `config.yml` and may be overridden by
//! environment variables. Missing optional values fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Bootstrap administrator, created at startup when no admin exists
    #[serde(default)]
    pub admin: AdminBootstrapConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (the dashboard frontend)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Database name (`DB_NAME`); appended to MySQL URLs that omit one
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
            name: None,
        }
    }
}

fn default_database_url() -> String {
    "data/medconsult.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

impl std::fmt::Display for DatabaseDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseDriver::Sqlite => write!(f, "sqlite"),
            DatabaseDriver::Mysql => write!(f, "mysql"),
        }
    }
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory uploaded files are written to
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// URL prefix the directory is served under
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    /// Maximum file size in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            public_prefix: default_public_prefix(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_prefix() -> String {
    "/uploads".to_string()
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
    /// Failed logins allowed per email inside the lockout window
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: usize,
    /// Lockout window in minutes
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
            max_login_attempts: default_max_login_attempts(),
            lockout_minutes: default_lockout_minutes(),
        }
    }
}

fn default_session_days() -> i64 {
    7
}

fn default_max_login_attempts() -> usize {
    5
}

fn default_lockout_minutes() -> i64 {
    15
}

/// Cache configuration for public listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
            max_capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_capacity() -> u64 {
    1_000
}

/// Bootstrap administrator credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminBootstrapConfig {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration.
    /// Invalid YAML is reported with its line and column.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides
    ///
    /// Recognised variables:
    /// - MEDCONSULT_SERVER_HOST / _PORT / _CORS_ORIGIN
    /// - MEDCONSULT_DATABASE_DRIVER / _URL, DB_NAME
    /// - MEDCONSULT_UPLOAD_PATH / _MAX_FILE_SIZE
    /// - MEDCONSULT_AUTH_SESSION_DAYS
    /// - MEDCONSULT_CACHE_TTL_SECONDS
    /// - MEDCONSULT_ADMIN_EMAIL / _PASSWORD
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("MEDCONSULT_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("MEDCONSULT_SERVER_PORT") {
            self.server.port = port;
        }
        if let Ok(origin) = std::env::var("MEDCONSULT_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }

        if let Ok(driver) = std::env::var("MEDCONSULT_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // ignored
            }
        }
        if let Ok(url) = std::env::var("MEDCONSULT_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(name) = std::env::var("DB_NAME") {
            if !name.trim().is_empty() {
                self.database.name = Some(name);
            }
        }

        if let Ok(path) = std::env::var("MEDCONSULT_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }
        if let Some(size) = env_parse::<u64>("MEDCONSULT_UPLOAD_MAX_FILE_SIZE") {
            self.upload.max_file_size = size;
        }

        if let Some(days) = env_parse::<i64>("MEDCONSULT_AUTH_SESSION_DAYS") {
            if days > 0 {
                self.auth.session_days = days;
            }
        }

        if let Some(ttl) = env_parse::<u64>("MEDCONSULT_CACHE_TTL_SECONDS") {
            self.cache.ttl_seconds = ttl;
        }

        if let Ok(email) = std::env::var("MEDCONSULT_ADMIN_EMAIL") {
            self.admin.email = Some(email);
        }
        if let Ok(password) = std::env::var("MEDCONSULT_ADMIN_PASSWORD") {
            self.admin.password = Some(password);
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// Format YAML parsing error with location
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches process environment.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let config = Config::load(std::path::Path::new("does_not_exist.yml")).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.upload.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.auth.session_days, 7);
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let file = write_config("   \n");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.admin.email.is_none());
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let file = write_config("server:\n  port: 9000\ndatabase:\n  driver: mysql\n  url: mysql://localhost\n  name: consultancy\n");
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.driver, DatabaseDriver::Mysql);
        assert_eq!(config.database.name.as_deref(), Some("consultancy"));
        assert_eq!(config.cache.ttl_seconds, 300);
    }

    #[test]
    fn test_load_invalid_yaml_reports_location() {
        let file = write_config("server:\n  port: [not a port\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_env_overrides() {
        let _guard = lock_env();
        std::env::set_var("MEDCONSULT_SERVER_PORT", "7070");
        std::env::set_var("MEDCONSULT_DATABASE_DRIVER", "MySQL");
        std::env::set_var("DB_NAME", "medconsult_prod");
        std::env::set_var("MEDCONSULT_UPLOAD_MAX_FILE_SIZE", "1024");

        let config = Config::load_with_env(std::path::Path::new("does_not_exist.yml")).unwrap();

        std::env::remove_var("MEDCONSULT_SERVER_PORT");
        std::env::remove_var("MEDCONSULT_DATABASE_DRIVER");
        std::env::remove_var("DB_NAME");
        std::env::remove_var("MEDCONSULT_UPLOAD_MAX_FILE_SIZE");

        assert_eq!(config.server.port, 7070);
        assert_eq!(config.database.driver, DatabaseDriver::Mysql);
        assert_eq!(config.database.name.as_deref(), Some("medconsult_prod"));
        assert_eq!(config.upload.max_file_size, 1024);
    }

    #[test]
    fn test_env_invalid_values_ignored() {
        let _guard = lock_env();
        std::env::set_var("MEDCONSULT_SERVER_PORT", "not-a-port");
        std::env::set_var("MEDCONSULT_DATABASE_DRIVER", "postgres");
        std::env::set_var("MEDCONSULT_AUTH_SESSION_DAYS", "-3");

        let config = Config::load_with_env(std::path::Path::new("does_not_exist.yml")).unwrap();

        std::env::remove_var("MEDCONSULT_SERVER_PORT");
        std::env::remove_var("MEDCONSULT_DATABASE_DRIVER");
        std::env::remove_var("MEDCONSULT_AUTH_SESSION_DAYS");

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.auth.session_days, 7);
    }
}
