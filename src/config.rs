//! Configuration management for mongo-collectd
//!
//! Handles loading and validating configuration from YAML files, and applying
//! collectd-style `Key value...` items on top of it.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error reading the configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Error parsing the configuration file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// MongoDB connection settings
    #[serde(default)]
    pub mongodb: MongoOptions,

    /// What to poll and how often
    #[serde(default)]
    pub collect: CollectConfig,

    /// Where samples go
    #[serde(default)]
    pub output: OutputConfig,

    /// HTTP server configuration (prometheus output only)
    #[serde(default)]
    pub server: ServerConfig,
}

/// MongoDB connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoOptions {
    /// Server host name or address
    #[serde(default = "default_mongo_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_mongo_port")]
    pub port: u16,

    /// Optional username, authenticated against `admin`
    pub user: Option<String>,

    /// Optional password
    pub password: Option<String>,

    /// Databases polled for dbStats/collStats
    #[serde(default = "default_databases")]
    pub databases: Vec<String>,

    /// Connect and server-selection timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

/// Which plugin to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    /// Server status and per-database statistics
    #[serde(rename = "mongodb")]
    #[value(name = "mongodb")]
    Mongodb,
    /// Replica set status and oplog statistics
    #[serde(rename = "mongodb_replset")]
    #[value(name = "mongodb_replset")]
    Replset,
}

impl PluginKind {
    /// collectd plugin name
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Mongodb => "mongodb",
            PluginKind::Replset => "mongodb_replset",
        }
    }
}

/// How much of serverStatus to report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusProfile {
    /// Every section the server reports
    Full,
    /// Connections, network and opcounters only
    Simple,
}

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Plugin to run
    #[serde(default = "default_plugin")]
    pub plugin: PluginKind,

    /// serverStatus profile (mongodb plugin)
    #[serde(default = "default_profile")]
    pub profile: StatusProfile,

    /// Poll interval in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Report dbStats/collStats for each configured database (mongodb plugin)
    #[serde(default = "default_true")]
    pub db_stats: bool,

    /// Also report replica set and oplog statistics (mongodb plugin)
    #[serde(default)]
    pub replication: bool,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// collectd exec-plugin PUTVAL lines on stdout
    Putval,
    /// Prometheus text format over HTTP
    Prometheus,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Host name used in PUTVAL identifiers (defaults to the system host name)
    pub hostname: Option<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Metrics endpoint path
    #[serde(default = "default_metrics_path")]
    pub path: String,

    /// Server bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// A collectd-style configuration item: a key and its list of values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigItem {
    pub key: String,
    pub values: Vec<String>,
}

impl ConfigItem {
    pub fn new(key: &str, values: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Parse `Key=Value` pairs, grouping repeated keys into one item
    ///
    /// Order of first occurrence is preserved.
    pub fn parse_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Vec<ConfigItem>, ConfigError> {
        let mut items: Vec<ConfigItem> = Vec::new();

        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "Option '{}' must have the form Key=Value",
                    pair
                ))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Option '{}' has an empty key",
                    pair
                )));
            }

            match items.iter_mut().find(|i| i.key == key) {
                Some(item) => item.values.push(value.to_string()),
                None => items.push(ConfigItem {
                    key: key.to_string(),
                    values: vec![value.to_string()],
                }),
            }
        }

        Ok(items)
    }
}

// Default value functions
fn default_mongo_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mongo_port() -> u16 {
    27017
}

fn default_databases() -> Vec<String> {
    vec!["admin".to_string()]
}

fn default_timeout() -> u64 {
    5000
}

fn default_plugin() -> PluginKind {
    PluginKind::Mongodb
}

fn default_profile() -> StatusProfile {
    StatusProfile::Full
}

fn default_interval() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Putval
}

fn default_port() -> u16 {
    9216
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

impl Default for MongoOptions {
    fn default() -> Self {
        Self {
            host: default_mongo_host(),
            port: default_mongo_port(),
            user: None,
            password: None,
            databases: default_databases(),
            timeout_ms: default_timeout(),
        }
    }
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            plugin: default_plugin(),
            profile: default_profile(),
            interval_secs: default_interval(),
            db_stats: true,
            replication: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            hostname: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            path: default_metrics_path(),
            bind_address: default_bind_address(),
        }
    }
}

impl MongoOptions {
    /// Apply collectd-style configuration items
    ///
    /// Recognised keys are `Host`, `Port`, `User`, `Password` and, for the
    /// `mongodb` plugin, `Database`. Anything else is logged and skipped.
    /// Returns the number of items that were ignored.
    pub fn apply(&mut self, plugin: PluginKind, items: &[ConfigItem]) -> usize {
        let mut ignored = 0;

        for item in items {
            let first = item.values.first().map(String::as_str);

            match (item.key.as_str(), first) {
                ("Host", Some(host)) => self.host = host.to_string(),
                ("Port", Some(port)) => match port.parse::<u16>() {
                    Ok(port) => self.port = port,
                    Err(e) => {
                        tracing::warn!(
                            plugin = plugin.as_str(),
                            value = %port,
                            error = %e,
                            "Invalid Port value, keeping {}",
                            self.port
                        );
                        ignored += 1;
                    }
                },
                ("User", Some(user)) => self.user = Some(user.to_string()),
                ("Password", Some(password)) => self.password = Some(password.to_string()),
                ("Database", Some(_)) if plugin == PluginKind::Mongodb => {
                    self.databases = item.values.clone();
                }
                (key, None) => {
                    tracing::warn!(
                        plugin = plugin.as_str(),
                        key = %key,
                        "Configuration key has no value"
                    );
                    ignored += 1;
                }
                (key, Some(_)) => {
                    tracing::warn!(
                        plugin = plugin.as_str(),
                        key = %key,
                        "Unknown configuration key"
                    );
                    ignored += 1;
                }
            }
        }

        ignored
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, falling back to defaults if not found
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mongodb.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "MongoDB host must not be empty".to_string(),
            ));
        }

        if self.mongodb.port == 0 {
            return Err(ConfigError::ValidationError(
                "MongoDB port must be greater than 0".to_string(),
            ));
        }

        if self.collect.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.output.format == OutputFormat::Prometheus {
            if self.server.port == 0 {
                return Err(ConfigError::ValidationError(
                    "Server port must be greater than 0".to_string(),
                ));
            }

            if !self.server.path.starts_with('/') {
                return Err(ConfigError::ValidationError(
                    "Metrics path must start with '/'".to_string(),
                ));
            }

            if self.server.path == "/" || self.server.path == "/health" {
                return Err(ConfigError::ValidationError(format!(
                    "Metrics path '{}' conflicts with a built-in endpoint",
                    self.server.path
                )));
            }
        }

        Ok(())
    }
}
