//! Dispatcher - Core Execution Flow
//!
//! The dispatcher turns a destination into a live session:
//!
//! ```text
//! dispatch(Destination)
//!        ↓
//! Router.select(Destination) → outbound tag
//!        ↓
//! uplink pipe + downlink pipe
//!        ↓
//! caller Link  ⇄  OutboundHandler.process(mirrored Link)   (own task)
//! ```
//!
//! Each session runs in a separate tokio task governed by a cancellation
//! token derived from the caller's token and the instance's token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::common::{pipe, Destination, Link, PipeOptions, Result};
use crate::error::Error;
use crate::outbound::{OutboundHandler, OutboundManager};
use crate::router::Router;

use super::metrics::SessionMetrics;

/// Creates sessions towards destinations
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Open a session to `destination`.
    ///
    /// The returned Link is the caller's side: its writer carries uplink
    /// bytes and its reader yields downlink bytes. Cancelling `cancel`
    /// before this returns aborts the dispatch; cancelling it afterwards
    /// tears the session down.
    async fn dispatch(&self, cancel: &CancellationToken, destination: &Destination) -> Result<Link>;
}

/// Router-driven dispatcher of an instance
pub struct DefaultDispatcher {
    router: Arc<dyn Router>,
    outbounds: Arc<OutboundManager>,
    running: Arc<AtomicBool>,
    shutdown: CancellationToken,
    pipe_options: PipeOptions,
}

impl DefaultDispatcher {
    pub fn new(
        router: Arc<dyn Router>,
        outbounds: Arc<OutboundManager>,
        running: Arc<AtomicBool>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            router,
            outbounds,
            running,
            shutdown,
            pipe_options: PipeOptions::default(),
        }
    }

    pub fn with_pipe_options(mut self, options: PipeOptions) -> Self {
        self.pipe_options = options;
        self
    }
}

#[async_trait]
impl Dispatcher for DefaultDispatcher {
    async fn dispatch(&self, cancel: &CancellationToken, destination: &Destination) -> Result<Link> {
        if !self.running.load(Ordering::Acquire) {
            return Err(Error::Dispatch("instance is not running".into()));
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // Router selects outbound (pure function, no IO)
        let outbound_tag = self.router.select(destination);
        let handler = self
            .outbounds
            .get(outbound_tag)
            .ok_or_else(|| Error::Dispatch(format!("unknown outbound: {}", outbound_tag)))?;

        let (uplink_reader, uplink_writer) = pipe(self.pipe_options);
        let (downlink_reader, downlink_writer) = pipe(self.pipe_options);

        let caller = Link::new(Arc::new(downlink_reader), Arc::new(uplink_writer));
        let outbound = Link::new(Arc::new(uplink_reader), Arc::new(downlink_writer));

        info!("Dispatching {} via [{}]", destination, outbound_tag);

        let session = Session {
            handler_tag: outbound_tag.to_string(),
            destination: destination.clone(),
            cancel: cancel.child_token(),
            shutdown: self.shutdown.clone(),
            metrics: SessionMetrics::start(outbound_tag),
        };
        tokio::spawn(session.run(handler, outbound));

        Ok(caller)
    }
}

/// A dispatched session, owned by its task
struct Session {
    handler_tag: String,
    destination: Destination,
    cancel: CancellationToken,
    shutdown: CancellationToken,
    metrics: SessionMetrics,
}

impl Session {
    async fn run(self, handler: Arc<dyn OutboundHandler>, link: Link) {
        let result = tokio::select! {
            result = handler.process(link.clone(), &self.destination) => result,
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = self.shutdown.cancelled() => Err(Error::Cancelled),
        };

        let failed = match &result {
            Ok(()) => {
                debug!(
                    "[{}] Session to {} finished ({:?})",
                    self.handler_tag,
                    self.destination,
                    self.metrics.elapsed()
                );
                false
            }
            Err(Error::Cancelled) => {
                debug!("[{}] Session to {} cancelled", self.handler_tag, self.destination);
                link.interrupt();
                false
            }
            Err(e) => {
                warn!("[{}] Session to {} failed: {}", self.handler_tag, self.destination, e);
                link.interrupt();
                true
            }
        };

        self.metrics.finish(failed);
    }
}
