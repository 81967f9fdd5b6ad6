//! Configuration and dependency initialization.
//!
//! Settings are layered as built-in defaults, then the settings file, then
//! the command line, and validated once into a typed [`Config`] that is passed
//! down to everything that needs it.

mod cli;
mod dependencies;
pub mod settings;

pub use cli::Cli;
pub use dependencies::{ConnectionMode, Dependencies};
pub use settings::{Settings, DEFAULT_CONFIG_FILE, SCHEMA};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use expander_repository::{RedisConfig, SolrConfig};
use expander_shared::{ClusterTopology, PartitionAssignment};

use crate::consumer::AmqpSettings;
use crate::errors::ConfigError;

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    /// Treated as `error`.
    Fatal,
}

impl LogLevel {
    /// The `tracing` filter directive for this level.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error | Self::Fatal => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches(':').to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            other => Err(format!(
                "unknown log level '{other}' (expected trace, debug, info, warn, error or fatal)"
            )),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fatal => "fatal",
            other => other.as_filter(),
        })
    }
}

/// The sinks an expander writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSet {
    pub solr: bool,
    pub redis: bool,
}

impl FromStr for SinkSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut sinks = Self {
            solr: false,
            redis: false,
        };
        for name in s.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            match name.to_lowercase().as_str() {
                "solr" => sinks.solr = true,
                "redis" => sinks.redis = true,
                other => return Err(format!("unknown sink '{other}' (expected solr or redis)")),
            }
        }
        if !sinks.solr && !sinks.redis {
            return Err("at least one sink must be enabled".to_string());
        }
        Ok(sinks)
    }
}

impl fmt::Display for SinkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.solr, self.redis) {
            (true, true) => f.write_str("solr,redis"),
            (true, false) => f.write_str("solr"),
            (false, true) => f.write_str("redis"),
            (false, false) => f.write_str(""),
        }
    }
}

/// Validated process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The settings file that was read, if any.
    pub config_file: Option<PathBuf>,
    pub topology: ClusterTopology,
    pub ps_tag: String,
    pub solr: SolrConfig,
    pub redis: RedisConfig,
    pub sinks: SinkSet,
    pub amqp: AmqpSettings,
    pub amqp_prefetch: u16,
    pub log_level: LogLevel,
    pub connection_mode: ConnectionMode,
    pub connection_retry_interval: Duration,
}

impl Config {
    /// Validate merged settings and build the typed configuration.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        settings.validate()?;

        let topology = ClusterTopology::parse(settings.get("index"), settings.get("node_count"))?;

        Ok(Self {
            config_file: None,
            topology,
            ps_tag: settings.get("ps_tag").unwrap_or_default().to_string(),
            solr: SolrConfig::new(
                settings.require("solr_url")?,
                Duration::from_secs(settings.parse("solr_timeout")?),
            ),
            redis: RedisConfig {
                url: settings.require("redis_url")?.to_string(),
            },
            sinks: settings.parse("sinks")?,
            amqp: AmqpSettings {
                host: settings.require("amqp_host")?.to_string(),
                port: settings.parse("amqp_port")?,
                user: settings.require("amqp_user")?.to_string(),
                pass: settings.require("amqp_pass")?.to_string(),
                vhost: settings.require("amqp_vhost")?.to_string(),
            },
            amqp_prefetch: settings.parse("amqp_prefetch")?,
            log_level: settings.parse("log_level")?,
            connection_mode: settings.parse("connection_mode")?,
            connection_retry_interval: Duration::from_secs(
                settings.parse("connection_retry_interval")?,
            ),
        })
    }

    /// Load configuration for the given command line.
    ///
    /// The settings file named with `-c` must exist; the default one is
    /// skipped when missing.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut settings = Settings::defaults();
        let cli_settings = cli.to_settings();

        let explicit = cli_settings.get("config_file").is_some();
        let path = PathBuf::from(
            cli_settings
                .get("config_file")
                .or_else(|| settings.get("config_file"))
                .unwrap_or(DEFAULT_CONFIG_FILE),
        );

        let config_file = match Settings::from_file(&path) {
            Ok(file_settings) => {
                settings.merge(file_settings);
                Some(path)
            }
            Err(e) if !explicit && e.is_file_not_found() => None,
            Err(e) => return Err(e),
        };

        settings.merge(cli_settings);

        let mut config = Self::from_settings(&settings)?;
        config.config_file = config_file;
        Ok(config)
    }

    /// The vnodes this node consumes.
    pub fn assignment(&self) -> PartitionAssignment {
        self.topology.assignment()
    }

    /// Broker URI, vhost percent-encoded.
    pub fn amqp_uri(&self) -> String {
        self.amqp.uri()
    }

    /// Change the log level.
    pub fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
    }
}
