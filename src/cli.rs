//! CLI argument parsing for mongo-collectd
//!
//! # Precedence
//!
//! 1. CLI arguments
//! 2. Environment variables (including `COLLECTD_HOSTNAME` and
//!    `COLLECTD_INTERVAL`, set by collectd's exec plugin)
//! 3. `--option Key=Value` items
//! 4. Configuration file
//! 5. Default values

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::{Config, ConfigError, ConfigItem, OutputFormat, PluginKind};

/// mongo-collectd - MongoDB statistics for collectd
///
/// Polls serverStatus, dbStats, collStats and replica set status and writes
/// the values as collectd PUTVAL lines, or serves them in Prometheus format.
#[derive(Parser, Debug)]
#[command(name = "mongo-collectd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.yaml",
        env = "MONGO_COLLECTD_CONFIG"
    )]
    pub config: PathBuf,

    /// Plugin to run
    #[arg(long, value_enum, env = "MONGO_COLLECTD_PLUGIN")]
    pub plugin: Option<PluginKind>,

    /// MongoDB host (overrides config file)
    #[arg(short = 'H', long, value_name = "HOST", env = "MONGO_COLLECTD_HOST")]
    pub host: Option<String>,

    /// MongoDB port (overrides config file)
    #[arg(short, long, value_name = "PORT", env = "MONGO_COLLECTD_PORT")]
    pub port: Option<u16>,

    /// Poll interval in seconds, rounded up to whole seconds
    #[arg(short, long, value_name = "SECONDS", env = "COLLECTD_INTERVAL")]
    pub interval: Option<f64>,

    /// Host name used in PUTVAL identifiers
    #[arg(long, value_name = "NAME", env = "COLLECTD_HOSTNAME")]
    pub hostname: Option<String>,

    /// Output format (overrides config file)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// HTTP port for the prometheus format (overrides config file)
    #[arg(long, value_name = "PORT", env = "MONGO_COLLECTD_LISTEN_PORT")]
    pub listen_port: Option<u16>,

    /// collectd-style plugin option, repeatable (e.g. -o Database=app -o Database=logs)
    #[arg(short, long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    /// Validate configuration and exit
    #[arg(long)]
    pub validate: bool,

    /// Poll once, print the samples and exit
    #[arg(long)]
    pub once: bool,

    /// Log level
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        env = "MONGO_COLLECTD_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

impl Cli {
    /// Apply command line values on top of a loaded configuration
    ///
    /// # Errors
    /// Fails on a malformed `--option` or a non-positive interval.
    pub fn apply_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(plugin) = self.plugin {
            config.collect.plugin = plugin;
        }

        let items = ConfigItem::parse_pairs(&self.options)?;
        config.mongodb.apply(config.collect.plugin, &items);

        if let Some(host) = &self.host {
            config.mongodb.host = host.clone();
        }
        if let Some(port) = self.port {
            config.mongodb.port = port;
        }
        if let Some(interval) = self.interval {
            config.collect.interval_secs = interval_secs(interval)?;
        }
        if let Some(hostname) = &self.hostname {
            config.output.hostname = Some(hostname.clone());
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(port) = self.listen_port {
            config.server.port = port;
        }

        Ok(())
    }
}

// collectd passes a fractional interval; polls run on whole seconds
fn interval_secs(interval: f64) -> Result<u64, ConfigError> {
    if !interval.is_finite() || interval <= 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "Interval must be a positive number of seconds, got {}",
            interval
        )));
    }
    Ok((interval.ceil() as u64).max(1))
}

/// Log level options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Log line format
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatusProfile;

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(tracing::Level::from(LogLevel::Debug), tracing::Level::DEBUG);
        assert_eq!(tracing::Level::from(LogLevel::Error), tracing::Level::ERROR);
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["mongo-collectd"]);
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert_eq!(cli.plugin, None);
        assert_eq!(cli.host, None);
        assert_eq!(cli.port, None);
        assert!(cli.options.is_empty());
        assert!(!cli.validate);
        assert!(!cli.once);
        assert_eq!(cli.log_level, LogLevel::Info);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_cli_with_options() {
        let cli = Cli::parse_from([
            "mongo-collectd",
            "--plugin",
            "mongodb_replset",
            "-H",
            "db1",
            "-p",
            "27018",
            "-o",
            "Database=app",
            "--option",
            "Database=logs",
            "--format",
            "prometheus",
            "--log-format",
            "json",
        ]);
        assert_eq!(cli.plugin, Some(PluginKind::Replset));
        assert_eq!(cli.host.as_deref(), Some("db1"));
        assert_eq!(cli.port, Some(27018));
        assert_eq!(cli.options, vec!["Database=app", "Database=logs"]);
        assert_eq!(cli.format, Some(OutputFormat::Prometheus));
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::parse_from([
            "mongo-collectd",
            "-o",
            "Host=from-option",
            "-o",
            "Database=app",
            "-o",
            "Database=logs",
            "--port",
            "27019",
            "--interval",
            "2.5",
            "--hostname",
            "collector-1",
            "--listen-port",
            "9300",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config).unwrap();

        assert_eq!(config.mongodb.host, "from-option");
        assert_eq!(config.mongodb.port, 27019);
        assert_eq!(config.mongodb.databases, vec!["app", "logs"]);
        assert_eq!(config.collect.interval_secs, 3);
        assert_eq!(config.collect.profile, StatusProfile::Full);
        assert_eq!(config.output.hostname.as_deref(), Some("collector-1"));
        assert_eq!(config.server.port, 9300);
    }

    #[test]
    fn test_host_flag_beats_option_item() {
        let cli = Cli::parse_from(["mongo-collectd", "-o", "Host=from-option", "-H", "from-flag"]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config).unwrap();
        assert_eq!(config.mongodb.host, "from-flag");
    }

    #[test]
    fn test_unknown_option_is_not_an_error() {
        let cli = Cli::parse_from(["mongo-collectd", "-o", "Verbose=true"]);
        let mut config = Config::default();
        assert!(cli.apply_overrides(&mut config).is_ok());
    }

    #[test]
    fn test_malformed_option() {
        let cli = Cli::parse_from(["mongo-collectd", "-o", "Database"]);
        let mut config = Config::default();
        assert!(matches!(
            cli.apply_overrides(&mut config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_interval_rounding() {
        assert_eq!(interval_secs(10.0).unwrap(), 10);
        assert_eq!(interval_secs(0.2).unwrap(), 1);
        assert!(interval_secs(0.0).is_err());
        assert!(interval_secs(f64::NAN).is_err());
    }
}
