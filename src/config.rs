//! Application Configuration
//!
//! Settings come from an optional YAML file (`config.yaml`, or the path in
//! `CONFIG_PATH`) and are then overridden by environment variables. The
//! secret key has no default: starting without one is a fatal error.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SECRET_KEY environment variable is required")]
    MissingSecret,
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid SERVER_PORT {0:?}")]
    InvalidPort(String),
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Signed URL configuration
    pub auth: AuthConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Where the settings came from; reported once logging is up
    #[serde(skip)]
    pub source: ConfigSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    /// Values were read from this file
    File(PathBuf),
    /// The file was absent; built-in defaults were used
    Defaults(PathBuf),
    /// Built in code, not loaded
    #[default]
    Builtin,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Maximum upload size in bytes
    pub max_payload_size: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the stored objects, created on first upload
    pub upload_dir: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HMAC secret for signed URLs
    pub secret_key: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to log4rs configuration file
    pub config_file: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: 4,
            max_payload_size: 1024 * 1024 * 1024, // 1GB
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "uploads".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "server_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the file named by `CONFIG_PATH` (default
    /// `config.yaml`) plus process environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path), |key| env::var(key).ok())
    }

    /// Load from `path` if it exists, then apply overrides from `lookup`.
    pub fn load_from<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            let display = path.display().to_string();
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: display.clone(),
                source,
            })?;
            let mut config: AppConfig = serde_yaml::from_str(&content).map_err(|source| {
                ConfigError::Parse {
                    path: display.clone(),
                    source,
                }
            })?;
            config.source = ConfigSource::File(path.to_path_buf());
            config
        } else {
            Self {
                source: ConfigSource::Defaults(path.to_path_buf()),
                ..Self::default()
            }
        };
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Environment variables win over file values. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(secret) = get("SECRET_KEY") {
            self.auth.secret_key = secret;
        }
        if let Some(dir) = get("UPLOAD_DIR_PATH") {
            self.storage.upload_dir = dir;
        }
        if let Some(host) = get("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("SERVER_PORT") {
            self.server.port = parse_port(&port)?;
        }
        Ok(())
    }

    /// Report where the configuration came from. Called after the logger is
    /// installed, since loading happens before the log config is known.
    pub fn log_source(&self) {
        match &self.source {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Defaults(path) => {
                warn!("Config file {} not found, using defaults", path.display())
            }
            ConfigSource::Builtin => {}
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.secret_key.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        Ok(())
    }
}

/// Accepts both `8000` and the listen-address form `:8000`.
fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .trim_start_matches(':')
        .parse()
        .map_err(|_| ConfigError::InvalidPort(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.upload_dir, "uploads");
        assert!(config.auth.secret_key.is_empty());
        assert!(matches!(config.validate(), Err(ConfigError::MissingSecret)));
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let result = AppConfig::load_from(&tmp.path().join("absent.yaml"), lookup(&[]));
        assert!(matches!(result, Err(ConfigError::MissingSecret)));

        let result = AppConfig::load_from(&tmp.path().join("absent.yaml"), lookup(&[("SECRET_KEY", "")]));
        assert!(matches!(result, Err(ConfigError::MissingSecret)));
    }

    #[test]
    fn test_env_overrides() {
        let tmp = TempDir::new().unwrap();
        let config = AppConfig::load_from(
            &tmp.path().join("absent.yaml"),
            lookup(&[
                ("SECRET_KEY", "s3cr3t"),
                ("UPLOAD_DIR_PATH", "/srv/images"),
                ("SERVER_PORT", ":9090"),
            ]),
        )
        .unwrap();
        assert_eq!(config.auth.secret_key, "s3cr3t");
        assert_eq!(config.storage.upload_dir, "/srv/images");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(
            config.source,
            ConfigSource::Defaults(tmp.path().join("absent.yaml"))
        );
    }

    #[test]
    fn test_invalid_port() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(lookup(&[("SERVER_PORT", "eighty")]));
        assert!(matches!(result, Err(ConfigError::InvalidPort(_))));
    }

    #[test]
    fn test_yaml_file_with_env_precedence() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(
            &path,
            "server:\n  port: 7000\n  workers: 2\nstorage:\n  upload_dir: data\nauth:\n  secret_key: from-file\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path, lookup(&[])).unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.workers, 2);
        assert_eq!(config.server.max_payload_size, 1024 * 1024 * 1024);
        assert_eq!(config.storage.upload_dir, "data");
        assert_eq!(config.auth.secret_key, "from-file");
        assert_eq!(config.source, ConfigSource::File(path.clone()));

        let config = AppConfig::load_from(&path, lookup(&[("SECRET_KEY", "from-env")])).unwrap();
        assert_eq!(config.auth.secret_key, "from-env");
    }

    #[test]
    fn test_bad_yaml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "server: [not, a, map]\n").unwrap();
        let result = AppConfig::load_from(&path, lookup(&[("SECRET_KEY", "x")]));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_secret_not_in_debug_output() {
        let mut config = AppConfig::default();
        config.auth.secret_key = "hunter2".to_string();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    #[serial]
    fn test_load_reads_process_environment() {
        let tmp = TempDir::new().unwrap();
        env::set_var("CONFIG_PATH", tmp.path().join("absent.yaml"));
        env::set_var("SECRET_KEY", "process-secret");
        env::set_var("UPLOAD_DIR_PATH", "env-uploads");

        let config = AppConfig::load();

        env::remove_var("CONFIG_PATH");
        env::remove_var("SECRET_KEY");
        env::remove_var("UPLOAD_DIR_PATH");

        let config = config.unwrap();
        assert_eq!(config.auth.secret_key, "process-secret");
        assert_eq!(config.storage.upload_dir, "env-uploads");
    }

    #[test]
    #[serial]
    fn test_load_without_secret_fails() {
        let tmp = TempDir::new().unwrap();
        env::set_var("CONFIG_PATH", tmp.path().join("absent.yaml"));
        env::remove_var("SECRET_KEY");

        let result = AppConfig::load();
        env::remove_var("CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::MissingSecret)));
    }
}
