//! Entry points for embedding the core
//!
//! `dial` opens a session through an instance and hands it back as a plain
//! byte stream, so callers never see Links or pipes.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::common::{Destination, Result};
use crate::config::load_config;
use crate::error::Error;
use crate::net::VirtualConnection;

use super::instance::Instance;

/// Dial `destination` through `instance`.
///
/// Fails with `Error::Cancelled` if `cancel` fires before the session is
/// established. Errors from the dispatcher are returned as they are. The
/// same token governs the session afterwards: cancelling it tears the
/// connection down.
pub async fn dial(
    cancel: &CancellationToken,
    instance: &Instance,
    destination: &Destination,
) -> Result<VirtualConnection> {
    let dispatcher = instance.dispatcher();

    let link = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        result = dispatcher.dispatch(cancel, destination) => result?,
    };

    debug!("Dialed {}", destination);
    Ok(VirtualConnection::from_link(link))
}

/// Load a configuration in `format`, build an instance from it and start it
pub fn start_instance(format: &str, config: &[u8]) -> Result<Arc<Instance>> {
    let config = load_config(format, config)?;
    let instance = Instance::new(config)?;
    instance.start()?;
    Ok(instance)
}
