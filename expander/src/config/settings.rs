//! Raw settings layers and the schema they are validated against.
//!
//! A [`Settings`] layer is a plain name → value table. Defaults, the
//! settings file and the command line each produce one; later layers are
//! merged over earlier ones and the result is checked against [`SCHEMA`].

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use expander_shared::ring::{parse_ordinal, ClusterTopology};
use url::Url;

use crate::config::dependencies::ConnectionMode;
use crate::config::{LogLevel, SinkSet};
use crate::errors::ConfigError;

/// Settings file read when none is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/expander/expander.toml";

/// Checks one setting against the merged layers.
pub type Validator = fn(&'static str, &Settings) -> Result<(), ConfigError>;

/// A known setting.
#[derive(Clone, Copy)]
pub struct SettingSpec {
    pub name: &'static str,
    pub default: Option<&'static str>,
    pub validate: Option<Validator>,
}

const fn setting(
    name: &'static str,
    default: Option<&'static str>,
    validate: Option<Validator>,
) -> SettingSpec {
    SettingSpec {
        name,
        default,
        validate,
    }
}

/// Every recognized setting, in validation order.
pub const SCHEMA: &[SettingSpec] = &[
    setting("config_file", Some(DEFAULT_CONFIG_FILE), None),
    setting("index", None, Some(validate_index)),
    setting("node_count", None, Some(validate_node_count)),
    setting("ps_tag", Some(""), None),
    setting("solr_url", Some("http://localhost:8983"), Some(validate_url)),
    setting("solr_timeout", Some("1200"), Some(validate_positive::<u64>)),
    setting("redis_url", Some("redis://127.0.0.1:6379"), Some(validate_url)),
    setting("sinks", Some("solr"), Some(validate_parse::<SinkSet>)),
    setting("amqp_host", Some("0.0.0.0"), None),
    setting("amqp_port", Some("5672"), Some(validate_positive::<u16>)),
    setting("amqp_user", Some("chef"), None),
    setting("amqp_pass", Some("testing"), None),
    setting("amqp_vhost", Some("/chef"), None),
    setting("amqp_prefetch", Some("32"), Some(validate_positive::<u16>)),
    setting("log_level", Some("info"), Some(validate_parse::<LogLevel>)),
    setting("connection_mode", Some("retry"), Some(validate_parse::<ConnectionMode>)),
    setting("connection_retry_interval", Some("15"), Some(validate_positive::<u64>)),
];

/// Look up a setting by name.
pub fn spec(name: &str) -> Option<&'static SettingSpec> {
    SCHEMA.iter().find(|spec| spec.name == name)
}

/// One layer of raw setting values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<&'static str, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// The layer holding every schema default.
    pub fn defaults() -> Self {
        let mut settings = Self::new();
        for spec in SCHEMA {
            if let Some(default) = spec.default {
                settings.values.insert(spec.name, default.to_string());
            }
        }
        settings
    }

    /// Read a TOML settings file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse a TOML table into a layer.
    ///
    /// Keys outside the schema are ignored. Scalar values are kept as their
    /// textual form, floats always with a fractional part so `2.0` never
    /// passes as an integer; arrays and tables are ignored.
    pub fn from_toml(contents: &str) -> Result<Self, String> {
        let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| e.to_string())?;

        let mut settings = Self::new();
        for (key, value) in table {
            let Some(spec) = spec(&key) else {
                continue;
            };
            let raw = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => format!("{f:?}"),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Datetime(d) => d.to_string(),
                toml::Value::Array(_) | toml::Value::Table(_) => continue,
            };
            settings.values.insert(spec.name, raw);
        }
        Ok(settings)
    }

    /// Set a known setting. Unknown names are ignored.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        if let Some(spec) = spec(name) {
            self.values.insert(spec.name, value.into());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Overlay `other` on this layer; values present in `other` win.
    pub fn merge(&mut self, other: Settings) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Run every schema validator in order, stopping at the first failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for spec in SCHEMA {
            if let Some(validate) = spec.validate {
                validate(spec.name, self)?;
            }
        }
        Ok(())
    }

    /// The value of `name`, which must be present.
    pub(crate) fn require(&self, name: &'static str) -> Result<&str, ConfigError> {
        self.get(name).ok_or(ConfigError::MissingValue(name))
    }

    /// Parse the value of `name` into `T`.
    pub(crate) fn parse<T>(&self, name: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.require(name)?;
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(name, raw, e.to_string()))
    }
}

fn validate_index(_: &'static str, settings: &Settings) -> Result<(), ConfigError> {
    parse_ordinal(settings.get("index"))?;
    Ok(())
}

fn validate_node_count(_: &'static str, settings: &Settings) -> Result<(), ConfigError> {
    ClusterTopology::parse(settings.get("index"), settings.get("node_count"))?;
    Ok(())
}

fn validate_url(name: &'static str, settings: &Settings) -> Result<(), ConfigError> {
    let raw = settings.require(name)?;
    Url::parse(raw).map_err(|e| ConfigError::invalid(name, raw, e.to_string()))?;
    Ok(())
}

fn validate_positive<T>(name: &'static str, settings: &Settings) -> Result<(), ConfigError>
where
    T: FromStr + Default + PartialOrd,
    T::Err: std::fmt::Display,
{
    let value: T = settings.parse(name)?;
    if value > T::default() {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            name,
            settings.get(name).unwrap_or_default(),
            "must be greater than zero",
        ))
    }
}

fn validate_parse<T>(name: &'static str, settings: &Settings) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    settings.parse::<T>(name).map(|_| ())
}
