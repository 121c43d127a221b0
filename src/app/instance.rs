//! Instance - configuration-driven assembly and lifecycle
//!
//! The instance is responsible for:
//! - Building features from configuration
//! - Assembling router, outbound manager and dispatcher
//! - Managing lifecycle (start / close)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::outbound::OutboundManager;
use crate::router::{Router, RuleRouter, StaticRouter};

use super::dispatcher::{DefaultDispatcher, Dispatcher};
use super::metrics::init_metrics;
use super::registry::{create_object, Feature, TypedConfig};

/// A configured proxy core
///
/// Everything that needs the instance receives it explicitly; there is no
/// ambient lookup.
pub struct Instance {
    config: Config,
    outbounds: Arc<OutboundManager>,
    features: Mutex<Vec<Arc<dyn Feature>>>,
    dispatcher: Arc<dyn Dispatcher>,
    running: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl Instance {
    /// Build an instance with the router-driven default dispatcher
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let default_tag = config.default_outbound().unwrap_or_default().to_string();
        let router = build_router(&config, &default_tag)?;

        let outbounds = Arc::new(OutboundManager::new());
        let running = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();
        let dispatcher = Arc::new(DefaultDispatcher::new(
            router,
            outbounds.clone(),
            running.clone(),
            shutdown.clone(),
        ));

        let instance = Self::assemble(config, outbounds, dispatcher, running, shutdown)?;

        if !instance.outbounds.is_empty() && instance.outbounds.get(&default_tag).is_none() {
            return Err(Error::Config(format!(
                "Default outbound not found: {}",
                default_tag
            )));
        }

        Ok(instance)
    }

    /// Build an instance around a caller-supplied dispatcher
    pub fn with_dispatcher(config: Config, dispatcher: Arc<dyn Dispatcher>) -> Result<Arc<Self>> {
        Self::assemble(
            config,
            Arc::new(OutboundManager::new()),
            dispatcher,
            Arc::new(AtomicBool::new(false)),
            CancellationToken::new(),
        )
    }

    fn assemble(
        config: Config,
        outbounds: Arc<OutboundManager>,
        dispatcher: Arc<dyn Dispatcher>,
        running: Arc<AtomicBool>,
        shutdown: CancellationToken,
    ) -> Result<Arc<Self>> {
        let instance = Arc::new(Self {
            config,
            outbounds,
            features: Mutex::new(Vec::new()),
            dispatcher,
            running,
            shutdown,
        });

        // Outbounds get the instance they belong to
        for outbound_config in &instance.config.outbounds {
            debug!(
                "Building outbound [{}]: protocol={}",
                outbound_config.tag, outbound_config.protocol
            );
            let feature = create_object(Some(&instance), &TypedConfig::from(outbound_config))?;
            if let Some(handler) = feature.clone().as_outbound() {
                instance.outbounds.add(handler)?;
            }
            instance.features.lock().push(feature);
        }

        Ok(instance)
    }

    /// Start every feature and accept dispatches. Starting twice is a no-op.
    pub fn start(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Config("Instance has been closed".into()));
        }

        let features = self.features.lock();
        if self.running.load(Ordering::Acquire) {
            return Ok(());
        }

        super::log::init(&self.config.log);
        init_metrics();

        for feature in features.iter() {
            feature.start()?;
        }
        self.running.store(true, Ordering::Release);

        info!(
            "Instance started with {} outbounds",
            self.outbounds.len()
        );
        Ok(())
    }

    /// Stop the instance: live sessions are torn down and features closed.
    ///
    /// Every feature is closed even if one fails; the first error is returned.
    pub fn close(&self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        self.shutdown.cancel();

        let mut result = Ok(());
        for feature in self.features.lock().iter() {
            if let Err(e) = feature.close() {
                warn!("Failed to close {}: {}", feature.type_name(), e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        info!("Instance closed");
        result
    }

    pub fn dispatcher(&self) -> Arc<dyn Dispatcher> {
        self.dispatcher.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn outbounds(&self) -> &OutboundManager {
        &self.outbounds
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("outbounds", &self.outbounds.len())
            .field("running", &self.is_running())
            .finish()
    }
}

fn build_router(config: &Config, default_tag: &str) -> Result<Arc<dyn Router>> {
    if config.routing.rules.is_empty() {
        Ok(Arc::new(StaticRouter::new(default_tag)))
    } else {
        Ok(Arc::new(RuleRouter::from_config(&config.routing, default_tag)?))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::common::Destination;

    fn config() -> Config {
        Config::from_json(
            r#"{
                "log": { "level": "none" },
                "outbounds": [
                    { "tag": "direct", "protocol": "freedom" },
                    { "tag": "block", "protocol": "blackhole" }
                ],
                "routing": {
                    "rules": [{ "domain": ["domain:ads.example"], "outbound_tag": "block" }]
                }
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_instance_lifecycle() {
        let instance = Instance::new(config()).unwrap();
        assert_eq!(instance.outbounds().len(), 2);
        assert!(!instance.is_running());

        instance.start().unwrap();
        instance.start().unwrap();
        assert!(instance.is_running());

        instance.close().unwrap();
        assert!(!instance.is_running());
        assert!(instance.start().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_before_start_fails() {
        let instance = Instance::new(config()).unwrap();
        let err = instance
            .dispatcher()
            .dispatch(&CancellationToken::new(), &Destination::tcp(("ads.example", 80)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Dispatch(_)));
    }

    #[tokio::test]
    async fn test_close_interrupts_sessions() {
        let instance = Instance::new(config()).unwrap();
        instance.start().unwrap();

        // The blackhole holds the session open until the uplink closes
        let link = instance
            .dispatcher()
            .dispatch(&CancellationToken::new(), &Destination::tcp(("ads.example", 80)))
            .await
            .unwrap();

        instance.close().unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            crate::common::link::read_multi_buffer(link.reader.as_ref()),
        )
        .await
        .unwrap();
        assert!(Error::is_closed(&result.unwrap_err()));
    }

    #[test]
    fn test_duplicate_outbound_tag() {
        let mut config = config();
        config.outbounds[1].tag = "direct".into();
        assert!(matches!(Instance::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_default_outbound() {
        let mut config = config();
        config.routing.default_outbound = Some("nowhere".into());
        assert!(matches!(Instance::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_protocol() {
        let mut config = config();
        config.outbounds[0].protocol = "vmess".into();
        assert!(matches!(Instance::new(config), Err(Error::Config(_))));
    }
}
