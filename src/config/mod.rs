use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Hosted realtime database reached over REST
    Remote,
    /// In-process tree, optionally seeded from a JSON export
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    /// Database root URL, e.g. `https://agency-default-rtdb.example.com`
    pub url: Option<String>,
    /// Database secret or ID token appended as `?auth=`
    pub secret: Option<String>,
    /// Timeout for a single read or write, in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// JSON export loaded into the memory backend at startup
    pub seed_file: Option<PathBuf>,
}

impl StoreConfig {
    /// Per-request timeout, never below one second
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            secret: None,
            timeout_secs: default_timeout_secs(),
            seed_file: None,
        }
    }
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_admin_token")]
    pub admin_token: String,
    /// Display name of the built-in admin profile
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
    #[serde(default = "default_admin_department")]
    pub admin_department: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_token: default_admin_token(),
            admin_name: default_admin_name(),
            admin_department: default_admin_department(),
        }
    }
}

fn default_admin_token() -> String {
    // Generate a random token if not provided
    uuid::Uuid::new_v4().to_string()
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

fn default_admin_department() -> String {
    "Management".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Read the config file, or use defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    /// Apply command-line and environment overrides for the store connection.
    /// Giving a URL switches the backend to remote.
    pub fn apply_store_overrides(&mut self, url: Option<String>, secret: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.store.url = Some(url);
            self.store.backend = StoreBackend::Remote;
        }
        if let Some(secret) = secret.filter(|s| !s.is_empty()) {
            self.store.secret = Some(secret);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.timeout(), Duration::from_secs(10));
        assert!(!config.auth.admin_token.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_remote_store() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [store]
            backend = "remote"
            url = "https://agency.example.com"
            timeout_secs = 0

            [auth]
            admin_token = "secret-token"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.store.backend, StoreBackend::Remote);
        assert_eq!(config.store.url.as_deref(), Some("https://agency.example.com"));
        assert_eq!(config.store.timeout(), Duration::from_secs(1));
        assert_eq!(config.auth.admin_token, "secret-token");
        assert_eq!(config.auth.admin_name, "Administrator");
    }

    #[test]
    fn test_store_overrides() {
        let mut config = Config::default();
        config.apply_store_overrides(None, Some(String::new()));
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.store.secret.is_none());

        config.apply_store_overrides(Some("https://db.test".into()), Some("s3cret".into()));
        assert_eq!(config.store.backend, StoreBackend::Remote);
        assert_eq!(config.store.secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/agencydesk.toml")).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
