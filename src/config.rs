//! Configuration module for proxylink
//!
//! Configuration is loaded through a registry of named formats. JSON is
//! built in; other formats can be registered at startup.

use std::io::Read;
use std::path::Path;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::common::Network;
use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Log configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Outbound configurations
    #[serde(default)]
    pub outbounds: Vec<OutboundConfig>,

    /// Routing rules
    #[serde(default)]
    pub routing: RoutingConfig,
}

impl Config {
    /// Load configuration from a file, picking the format by extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::Config(format!("Cannot infer config format of {}", path.display())))?;
        let format = format_for_extension(ext)
            .ok_or_else(|| Error::Config(format!("No config format for extension: {}", ext)))?;

        let file = std::fs::File::open(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        load_config(format, file)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Tag of the outbound used when no rule matches
    pub fn default_outbound(&self) -> Option<&str> {
        self.routing
            .default_outbound
            .as_deref()
            .or_else(|| self.outbounds.first().map(|o| o.tag.as_str()))
    }
}

/// Log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level: trace, debug, info, warn, error, none
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Outbound configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundConfig {
    /// Unique tag for this outbound
    pub tag: String,

    /// Protocol name (freedom, blackhole)
    pub protocol: String,

    /// Protocol-specific settings
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// Routing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Outbound used when no rule matches; first outbound if unset
    #[serde(default)]
    pub default_outbound: Option<String>,

    /// Routing rules
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
}

/// Routing rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Rule type
    #[serde(rename = "type", default = "default_rule_type")]
    pub rule_type: String,

    /// Network filter
    #[serde(default)]
    pub network: Vec<Network>,

    /// Domain patterns
    #[serde(default)]
    pub domain: Vec<String>,

    /// IP patterns
    #[serde(default)]
    pub ip: Vec<String>,

    /// Port patterns
    #[serde(default)]
    pub port: Option<String>,

    /// Target outbound tag
    pub outbound_tag: String,
}

fn default_rule_type() -> String {
    "field".to_string()
}

// ============================================================================
// Format registry
// ============================================================================

/// Parses a configuration from raw input
pub type ConfigLoaderFn = fn(&mut dyn Read) -> Result<Config>;

/// A named configuration format
#[derive(Clone)]
pub struct ConfigFormat {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub loader: ConfigLoaderFn,
}

lazy_static! {
    static ref CONFIG_FORMATS: RwLock<Vec<ConfigFormat>> = RwLock::new(vec![ConfigFormat {
        name: "json",
        extensions: &["json"],
        loader: load_json,
    }]);
}

fn load_json(input: &mut dyn Read) -> Result<Config> {
    serde_json::from_reader(input)
        .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}

/// Register a configuration format. Names are case-insensitive and unique.
pub fn register_config_format(format: ConfigFormat) -> Result<()> {
    let mut formats = CONFIG_FORMATS.write();
    if formats.iter().any(|f| f.name.eq_ignore_ascii_case(format.name)) {
        return Err(Error::Config(format!(
            "Config format already registered: {}",
            format.name
        )));
    }
    formats.push(format);
    Ok(())
}

fn format_for_extension(ext: &str) -> Option<&'static str> {
    CONFIG_FORMATS
        .read()
        .iter()
        .find(|f| f.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .map(|f| f.name)
}

/// Load a configuration in the named format
pub fn load_config(format: &str, mut input: impl Read) -> Result<Config> {
    let loader = CONFIG_FORMATS
        .read()
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(format))
        .map(|f| f.loader)
        .ok_or_else(|| Error::Config(format!("Unknown config format: {}", format)))?;

    loader(&mut input)
}
