//! Object registry
//!
//! Features are built from a typed configuration: a type tag such as
//! `"outbound.freedom"` selects a constructor, and the constructor receives
//! the owning instance explicitly (or `None` for a standalone object).

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OutboundConfig;
use crate::error::{Error, Result};
use crate::outbound::{
    BlackholeOutbound, BlackholeSettings, FreedomOutbound, FreedomSettings, OutboundHandler,
};

use super::instance::Instance;

/// Common capability interface of everything an instance hosts
pub trait Feature: Send + Sync {
    /// Registry type tag this feature was built from
    fn type_name(&self) -> &'static str;

    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Outbound capability, if this feature carries traffic
    fn as_outbound(self: Arc<Self>) -> Option<Arc<dyn OutboundHandler>> {
        None
    }
}

/// Serialized form of a registry object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedConfig {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default)]
    pub settings: serde_json::Value,
}

impl TypedConfig {
    pub fn new(type_name: impl Into<String>, settings: serde_json::Value) -> Self {
        Self {
            type_name: type_name.into(),
            settings,
        }
    }
}

impl From<&OutboundConfig> for TypedConfig {
    fn from(config: &OutboundConfig) -> Self {
        Self::new(
            format!("outbound.{}", config.protocol.to_lowercase()),
            serde_json::json!({
                "tag": config.tag,
                "settings": config.settings,
            }),
        )
    }
}

/// Builds a feature from its settings
pub type ObjectCreator = fn(Option<&Arc<Instance>>, &serde_json::Value) -> Result<Arc<dyn Feature>>;

/// Type tag → constructor
pub struct ObjectRegistry {
    creators: RwLock<HashMap<String, ObjectCreator>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            creators: RwLock::new(HashMap::new()),
        }
    }

    /// Registry holding the built-in outbounds
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        let builtins: [(&str, ObjectCreator); 3] = [
            ("outbound.freedom", create_freedom),
            ("outbound.direct", create_freedom),
            ("outbound.blackhole", create_blackhole),
        ];
        for (type_name, creator) in builtins {
            registry.creators.write().insert(type_name.to_string(), creator);
        }
        registry
    }

    /// Register a constructor. Each type tag can be registered once.
    pub fn register(&self, type_name: &str, creator: ObjectCreator) -> Result<()> {
        let mut creators = self.creators.write();
        if creators.contains_key(type_name) {
            return Err(Error::Config(format!(
                "Object type already registered: {}",
                type_name
            )));
        }
        creators.insert(type_name.to_string(), creator);
        Ok(())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.creators.read().contains_key(type_name)
    }

    /// Build the object described by `config`
    pub fn create(&self, instance: Option<&Arc<Instance>>, config: &TypedConfig) -> Result<Arc<dyn Feature>> {
        let creator = self
            .creators
            .read()
            .get(&config.type_name)
            .copied()
            .ok_or_else(|| Error::Config(format!("unknown object type: {}", config.type_name)))?;

        debug!("Creating object of type {}", config.type_name);
        creator(instance, &config.settings)
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

lazy_static! {
    static ref OBJECT_REGISTRY: ObjectRegistry = ObjectRegistry::with_builtins();
}

/// Register a constructor in the process-wide registry
pub fn register_object(type_name: &str, creator: ObjectCreator) -> Result<()> {
    OBJECT_REGISTRY.register(type_name, creator)
}

/// Build an object with the process-wide registry
pub fn create_object(instance: Option<&Arc<Instance>>, config: &TypedConfig) -> Result<Arc<dyn Feature>> {
    OBJECT_REGISTRY.create(instance, config)
}

// ============================================================================
// Built-in outbounds
// ============================================================================

#[derive(Deserialize)]
struct OutboundObject<S> {
    tag: String,
    #[serde(default)]
    settings: Option<S>,
}

fn parse_outbound<S: DeserializeOwned + Default>(settings: &serde_json::Value) -> Result<(String, S)> {
    let object: OutboundObject<S> = serde_json::from_value(settings.clone())
        .map_err(|e| Error::Config(format!("Invalid outbound settings: {}", e)))?;
    Ok((object.tag, object.settings.unwrap_or_default()))
}

fn create_freedom(instance: Option<&Arc<Instance>>, settings: &serde_json::Value) -> Result<Arc<dyn Feature>> {
    let (tag, settings) = parse_outbound::<FreedomSettings>(settings)?;
    if instance.is_none() {
        debug!("[{}] Freedom outbound created without an instance", tag);
    }
    Ok(Arc::new(FreedomOutbound::new(tag, settings)?))
}

fn create_blackhole(instance: Option<&Arc<Instance>>, settings: &serde_json::Value) -> Result<Arc<dyn Feature>> {
    let (tag, settings) = parse_outbound::<BlackholeSettings>(settings)?;
    if instance.is_none() {
        debug!("[{}] Blackhole outbound created without an instance", tag);
    }
    Ok(Arc::new(BlackholeOutbound::new(tag, settings)?))
}

impl Feature for FreedomOutbound {
    fn type_name(&self) -> &'static str {
        "outbound.freedom"
    }

    fn as_outbound(self: Arc<Self>) -> Option<Arc<dyn OutboundHandler>> {
        Some(self)
    }
}

impl Feature for BlackholeOutbound {
    fn type_name(&self) -> &'static str {
        "outbound.blackhole"
    }

    fn as_outbound(self: Arc<Self>) -> Option<Arc<dyn OutboundHandler>> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_builtin_outbound_without_instance() {
        let config = TypedConfig::new(
            "outbound.blackhole",
            serde_json::json!({ "tag": "block", "settings": { "response": "http" } }),
        );
        let feature = create_object(None, &config).unwrap();
        assert_eq!(feature.type_name(), "outbound.blackhole");

        let outbound = feature.as_outbound().unwrap();
        assert_eq!(outbound.tag(), "block");
        assert_eq!(outbound.protocol(), "blackhole");
    }

    #[test]
    fn test_null_settings_use_defaults() {
        let outbound = OutboundConfig {
            tag: "direct".into(),
            protocol: "Freedom".into(),
            settings: serde_json::Value::Null,
        };
        let config = TypedConfig::from(&outbound);
        assert_eq!(config.type_name, "outbound.freedom");

        let feature = create_object(None, &config).unwrap();
        assert_eq!(feature.as_outbound().unwrap().tag(), "direct");
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let config = TypedConfig::new("outbound.vmess", serde_json::json!({ "tag": "x" }));
        let err = create_object(None, &config).err().unwrap();
        assert!(matches!(err, Error::Config(msg) if msg.contains("outbound.vmess")));
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let config = TypedConfig::new("outbound.freedom", serde_json::json!({ "settings": {} }));
        assert!(matches!(create_object(None, &config), Err(Error::Config(_))));
    }

    #[test]
    fn test_register_twice_fails() {
        struct Marker;
        impl Feature for Marker {
            fn type_name(&self) -> &'static str {
                "test.marker"
            }
        }
        fn create_marker(_: Option<&Arc<Instance>>, _: &serde_json::Value) -> Result<Arc<dyn Feature>> {
            Ok(Arc::new(Marker))
        }

        let registry = ObjectRegistry::new();
        registry.register("test.marker", create_marker).unwrap();
        assert!(registry.register("test.marker", create_marker).is_err());
        assert!(!registry.contains("outbound.freedom"));

        let feature = registry
            .create(None, &TypedConfig::new("test.marker", serde_json::Value::Null))
            .unwrap();
        assert!(feature.as_outbound().is_none());
    }
}
