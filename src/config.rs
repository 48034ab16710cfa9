//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `server.toml`.
//!     loads configuration from file or falls back to defaults, then lets
//!     the environment (and a local .env) override the deployment knobs.
//!
//! structure:
//!     - ServerConfig: listen address and the static form directory.
//!     - StorageConfig: Azure credentials, table name, request timeout.
//!     - LoggingConfig: default tracing filter.
//!
//! environment:
//!     PORT                              -> server.port
//!     AZURE_STORAGE_CONNECTION_STRING   -> storage.connection_string
//!     AZURE_STORAGE_ACCOUNT_NAME        -> storage.account_name
//!     AZURE_STORAGE_ACCESS_KEY          -> storage.access_key
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HubConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub table_name: String,
    pub request_timeout_seconds: u64,
    pub connection_string: Option<String>,
    pub account_name: Option<String>,
    pub access_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

/// how to reach the table service; connection string wins over name + key
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    ConnectionString(String),
    AccountKey { account: String, key: String },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            frontend_dir: PathBuf::from("frontend"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            table_name: "sensorData".to_string(),
            request_timeout_seconds: 30,
            connection_string: None,
            account_name: None,
            access_key: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl StorageConfig {
    pub fn credentials(&self) -> Option<Credentials> {
        let present = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());

        if let Some(cs) = present(&self.connection_string) {
            return Some(Credentials::ConnectionString(cs));
        }
        match (present(&self.account_name), present(&self.access_key)) {
            (Some(account), Some(key)) => Some(Credentials::AccountKey { account, key }),
            _ => None,
        }
    }
}

impl HubConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: HubConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback, then apply environment overrides
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("server.toml"),
            PathBuf::from("..").join("config").join("server.toml"),
        ];

        let mut config = None;
        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(c) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        config = Some(c);
                        break;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        let mut config = config.unwrap_or_else(|| {
            println!("[CONFIG] No config file found - using defaults");
            Self::default()
        });
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// overlay values from the environment
    /// takes a lookup function so tests don't have to touch process env
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            match port.trim().parse() {
                Ok(p) => self.server.port = p,
                Err(_) => println!("[CONFIG] Warning: ignoring invalid PORT '{}'", port),
            }
        }
        if let Some(cs) = lookup("AZURE_STORAGE_CONNECTION_STRING") {
            self.storage.connection_string = Some(cs);
        }
        if let Some(name) = lookup("AZURE_STORAGE_ACCOUNT_NAME") {
            self.storage.account_name = Some(name);
        }
        if let Some(key) = lookup("AZURE_STORAGE_ACCESS_KEY") {
            self.storage.access_key = Some(key);
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let storage = match self.storage.credentials() {
            Some(Credentials::ConnectionString(_)) => "azure (connection string)".to_string(),
            Some(Credentials::AccountKey { account, .. }) => format!("azure (account {})", account),
            None => "in-memory".to_string(),
        };
        println!("┌─────────────────────────────────────────┐");
        println!("│           HUB CONFIGURATION             │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Listen: {}", self.listen_addr());
        println!("│ Frontend: {}", self.server.frontend_dir.display());
        println!("│ Storage: {}", storage);
        println!("│ Table: {}", self.storage.table_name);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}
