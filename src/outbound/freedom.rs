//! Freedom outbound - connect straight to the destination over TCP

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::app::metrics::format_bytes;
use crate::common::{Address, Destination, Link, Network, Result};
use crate::error::Error;
use crate::transport::{TcpTransport, Transport};

use super::{relay_stream, OutboundHandler};

/// Freedom outbound settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FreedomSettings {
    /// Send every session to this address instead of its destination
    #[serde(default)]
    pub redirect: Option<String>,

    /// TCP connect timeout
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
}

/// Direct outbound: no proxy protocol, just a TCP connection
pub struct FreedomOutbound {
    tag: String,
    redirect: Option<Address>,
    transport: TcpTransport,
}

impl FreedomOutbound {
    pub fn new(tag: impl Into<String>, settings: FreedomSettings) -> Result<Self> {
        let redirect = settings
            .redirect
            .as_deref()
            .map(|s| s.parse::<Address>())
            .transpose()?;

        let mut transport = TcpTransport::new();
        if let Some(secs) = settings.connect_timeout_secs {
            transport = transport.with_connect_timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            tag: tag.into(),
            redirect,
            transport,
        })
    }
}

#[async_trait]
impl OutboundHandler for FreedomOutbound {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn protocol(&self) -> &'static str {
        "freedom"
    }

    async fn process(&self, link: Link, destination: &Destination) -> Result<()> {
        if destination.network() != Network::Tcp {
            return Err(Error::Unsupported(format!(
                "freedom outbound cannot carry {}",
                destination
            )));
        }

        let target = self.redirect.as_ref().unwrap_or(destination.address());
        debug!("[{}] Connecting to {}", self.tag, target);

        let stream = self.transport.connect(target).await?;
        info!("[{}] Connected to {}", self.tag, target);

        let (up, down) = relay_stream(&link, stream, &self.tag).await?;
        debug!(
            "[{}] Relay to {} finished (↑{} ↓{})",
            self.tag,
            target,
            format_bytes(up),
            format_bytes(down)
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::common::link::{read_multi_buffer, write_multi_buffer};
    use crate::common::{pipe, MultiBuffer, MultiBufferWriter, PipeOptions};

    #[tokio::test]
    async fn test_freedom_relays_to_tcp_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Server uppercases whatever it receives until EOF
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            socket.write_all(&received.to_ascii_uppercase()).await.unwrap();
        });

        let (up_reader, up_writer) = pipe(PipeOptions::default());
        let (down_reader, down_writer) = pipe(PipeOptions::default());
        let outbound_link = Link::new(Arc::new(up_reader), Arc::new(down_writer));

        let freedom = FreedomOutbound::new("direct", FreedomSettings::default()).unwrap();
        let dest = Destination::tcp(addr);
        let task = tokio::spawn(async move { freedom.process(outbound_link, &dest).await });

        write_multi_buffer(&up_writer, MultiBuffer::from_slice(b"hello freedom")).await.unwrap();
        up_writer.close();

        let mut response = Vec::new();
        while let Some(mb) = read_multi_buffer(&down_reader).await.unwrap() {
            response.extend_from_slice(&mb.to_vec());
        }
        assert_eq!(response, b"HELLO FREEDOM");

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_freedom_redirect_overrides_destination() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"redirected").await.unwrap();
        });

        let settings = FreedomSettings {
            redirect: Some(addr.to_string()),
            connect_timeout_secs: Some(2),
        };
        let freedom = FreedomOutbound::new("redirect", settings).unwrap();

        let (up_reader, up_writer) = pipe(PipeOptions::default());
        let (down_reader, down_writer) = pipe(PipeOptions::default());
        let link = Link::new(Arc::new(up_reader), Arc::new(down_writer));
        up_writer.close();

        let dest = Destination::tcp(("unreachable.invalid", 9));
        freedom.process(link, &dest).await.unwrap();

        let mb = read_multi_buffer(&down_reader).await.unwrap().unwrap();
        assert_eq!(mb.to_vec(), b"redirected");
    }

    #[tokio::test]
    async fn test_freedom_rejects_udp() {
        let freedom = FreedomOutbound::new("direct", FreedomSettings::default()).unwrap();
        let (up_reader, _up_writer) = pipe(PipeOptions::default());
        let (_down_reader, down_writer) = pipe(PipeOptions::default());
        let link = Link::new(Arc::new(up_reader), Arc::new(down_writer));

        let dest = Destination::parse("udp:127.0.0.1:53").unwrap();
        let err = freedom.process(link, &dest).await.unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_invalid_redirect_is_rejected() {
        let settings = FreedomSettings {
            redirect: Some("no-port".into()),
            ..Default::default()
        };
        assert!(FreedomOutbound::new("direct", settings).is_err());
    }
}
