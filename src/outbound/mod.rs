//! Outbound Layer
//!
//! Responsibilities:
//! - Take the pipeline side of a dispatched Link
//! - Move its bytes to wherever the outbound sends traffic
//!
//! Handlers are built from configuration through the object registry.

mod blackhole;
mod freedom;

pub use blackhole::{BlackholeOutbound, BlackholeSettings};
pub use freedom::{FreedomOutbound, FreedomSettings};

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::app::metrics::{record_download, record_upload};
use crate::common::link::{read_multi_buffer, write_multi_buffer};
use crate::common::{Destination, Link, MultiBuffer, Result, Stream};
use crate::error::Error;

/// Relay buffer size (32KB)
const RELAY_BUFFER_SIZE: usize = 32 * 1024;

/// Outbound handler trait
///
/// `process` owns the session until it returns. Returning (with or without
/// an error) ends the session; the dispatcher interrupts the link on error.
#[async_trait]
pub trait OutboundHandler: Send + Sync {
    /// Tag used by the router to select this handler
    fn tag(&self) -> &str;

    /// Protocol name
    fn protocol(&self) -> &'static str;

    /// Carry the session's traffic towards `destination`
    async fn process(&self, link: Link, destination: &Destination) -> Result<()>;
}

/// Outbound handlers of an instance, by tag
#[derive(Default)]
pub struct OutboundManager {
    handlers: RwLock<HashMap<String, Arc<dyn OutboundHandler>>>,
}

impl OutboundManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Tags are unique.
    pub fn add(&self, handler: Arc<dyn OutboundHandler>) -> Result<()> {
        let mut handlers = self.handlers.write();
        let tag = handler.tag().to_string();
        if handlers.contains_key(&tag) {
            return Err(Error::Config(format!("Duplicate outbound tag: {}", tag)));
        }
        debug!("Registered outbound [{}] ({})", tag, handler.protocol());
        handlers.insert(tag, handler);
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn OutboundHandler>> {
        self.handlers.read().get(tag).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Relay a Link against a socket stream until both directions finish.
///
/// Uplink (link → stream) ends with a write shutdown on the stream; downlink
/// (stream → link) ends with a graceful close of the link writer. The first
/// error aborts both directions.
pub(crate) async fn relay_stream(link: &Link, stream: Stream, outbound_tag: &str) -> Result<(u64, u64)> {
    let (mut stream_read, mut stream_write) = tokio::io::split(stream);

    // Upload: caller → remote
    let upload = async {
        let mut total: u64 = 0;
        while let Some(mb) = read_multi_buffer(link.reader.as_ref()).await? {
            let n = mb.len() as u64;
            for chunk in mb {
                stream_write.write_all(&chunk).await?;
            }
            stream_write.flush().await?;

            total += n;
            record_upload(outbound_tag, n);
        }

        let _ = stream_write.shutdown().await;
        Ok::<u64, io::Error>(total)
    };

    // Download: remote → caller
    let download = async {
        let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
        let mut total: u64 = 0;
        loop {
            let n = stream_read.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            write_multi_buffer(link.writer.as_ref(), MultiBuffer::from_slice(&buf[..n])).await?;

            total += n as u64;
            record_download(outbound_tag, n as u64);
        }

        link.writer.close();
        Ok::<u64, io::Error>(total)
    };

    let (up, down) = tokio::try_join!(upload, download)?;
    Ok((up, down))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedOutbound(&'static str);

    #[async_trait]
    impl OutboundHandler for NamedOutbound {
        fn tag(&self) -> &str {
            self.0
        }

        fn protocol(&self) -> &'static str {
            "test"
        }

        async fn process(&self, _link: Link, _destination: &Destination) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_manager_rejects_duplicate_tags() {
        let manager = OutboundManager::new();
        manager.add(Arc::new(NamedOutbound("direct"))).unwrap();
        manager.add(Arc::new(NamedOutbound("block"))).unwrap();

        let err = manager.add(Arc::new(NamedOutbound("direct"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(manager.len(), 2);
        assert!(manager.get("block").is_some());
        assert!(manager.get("missing").is_none());
    }
}
