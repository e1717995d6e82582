//! Server Configuration
//!
//! Defaults, overlaid by an optional JSON file (`--config` / `CONFIG_PATH`),
//! overlaid by command-line flags and environment variables.

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use subspend_core::{PgConnectOptions, PgStoreOptions};
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    #[value(alias = "text")]
    Pretty,
    Json,
}

/// Storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    #[value(alias = "postgresql")]
    Postgres,
    Memory,
}

/// Command-line flags, each also readable from the environment
#[derive(Parser)]
#[command(name = "subspend-api")]
#[command(version)]
#[command(about = "Subscription spend tracking API", long_about = None)]
pub struct Args {
    /// JSON config file
    #[arg(long, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Use the in-memory store instead of PostgreSQL
    #[arg(long)]
    pub in_memory: bool,

    /// Listen address
    #[arg(long, env = "BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Listen port
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    #[arg(long, env = "LOG_FORMAT", value_enum, ignore_case = true)]
    pub log_format: Option<LogFormat>,

    #[arg(long, env = "STORAGE", value_enum, ignore_case = true)]
    pub storage: Option<StorageBackend>,

    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    #[arg(long, env = "DB_PORT")]
    pub db_port: Option<u16>,

    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    #[arg(long, env = "DB_MAX_CONNECTIONS")]
    pub db_max_connections: Option<u32>,

    #[arg(long, env = "DB_MIN_CONNECTIONS")]
    pub db_min_connections: Option<u32>,

    /// Deadline for each storage call, in seconds
    #[arg(long, env = "DB_QUERY_TIMEOUT_SECS")]
    pub db_query_timeout_secs: Option<u64>,

    /// Apply migrations on startup (true/false)
    #[arg(long, env = "DB_RUN_MIGRATIONS")]
    pub db_run_migrations: Option<bool>,
}

impl Args {
    /// Overlay every supplied flag onto `config`
    pub fn apply_to(&self, config: &mut ServerConfig) {
        overlay(&mut config.bind_address, &self.bind_address);
        overlay(&mut config.port, &self.port);
        overlay(&mut config.log_level, &self.log_level);
        overlay(&mut config.log_format, &self.log_format);
        overlay(&mut config.storage, &self.storage);
        if self.in_memory {
            config.storage = StorageBackend::Memory;
        }

        let db = &mut config.database;
        overlay(&mut db.host, &self.db_host);
        overlay(&mut db.port, &self.db_port);
        overlay(&mut db.user, &self.db_user);
        overlay(&mut db.password, &self.db_password);
        overlay(&mut db.name, &self.db_name);
        overlay(&mut db.max_connections, &self.db_max_connections);
        overlay(&mut db.min_connections, &self.db_min_connections);
        overlay(&mut db.query_timeout_secs, &self.db_query_timeout_secs);
        overlay(&mut db.run_migrations, &self.db_run_migrations);
    }
}

fn overlay<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_address: String,
    /// Listen port
    pub port: u16,
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
    pub log_format: LogFormat,
    pub storage: StorageBackend,
    pub database: DatabaseConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 8080,
            log_level: "info".into(),
            log_format: LogFormat::Pretty,
            storage: StorageBackend::Postgres,
            database: DatabaseConfig::default(),
        }
    }
}

/// PostgreSQL settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Deadline for each storage call
    pub query_timeout_secs: u64,
    /// Apply migrations on startup
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: String::new(),
            name: "subscriptions".into(),
            max_connections: 10,
            min_connections: 1,
            query_timeout_secs: 3,
            run_migrations: true,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("query_timeout_secs", &self.query_timeout_secs)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

impl DatabaseConfig {
    /// `postgres://` URL with the password masked, for logs
    pub fn display_url(&self) -> String {
        format!(
            "postgres://{}:***@{}:{}/{}",
            self.user, self.host, self.port, self.name
        )
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.name);

        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }

    pub fn store_options(&self) -> PgStoreOptions {
        PgStoreOptions {
            max_connections: self.max_connections,
            min_connections: self.min_connections.min(self.max_connections),
            query_timeout: Duration::from_secs(self.query_timeout_secs),
        }
    }
}

impl ServerConfig {
    /// Load the file named by `args` (if it exists), then apply `args`
    ///
    /// A path that does not exist yields defaults; a file that exists but
    /// does not parse is an error.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config.as_deref() {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        args.apply_to(&mut config);
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `host:port` to listen on
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
