//! Blackhole outbound - swallows all traffic
//!
//! Everything written by the caller is read and dropped. Once the caller
//! closes its side the blackhole closes its writer, optionally after a
//! canned HTTP 403 so browsers fail fast instead of hanging.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::common::link::{read_multi_buffer, write_multi_buffer};
use crate::common::{Destination, Link, MultiBuffer, Result};
use crate::error::Error;

use super::OutboundHandler;

const HTTP_403_RESPONSE: &[u8] = b"HTTP/1.1 403 Forbidden\r\n\
Connection: close\r\n\
Cache-Control: max-age=3600, public\r\n\
Content-Length: 0\r\n\
\r\n";

/// Blackhole outbound settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlackholeSettings {
    /// `"http"` writes a 403 response before closing; `"none"` or unset stays silent
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Response {
    None,
    Http,
}

pub struct BlackholeOutbound {
    tag: String,
    response: Response,
}

impl BlackholeOutbound {
    pub fn new(tag: impl Into<String>, settings: BlackholeSettings) -> Result<Self> {
        let response = match settings.response.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("none") => Response::None,
            Some("http") => Response::Http,
            Some(other) => {
                return Err(Error::Config(format!(
                    "Unknown blackhole response type: {}",
                    other
                )))
            }
        };

        Ok(Self {
            tag: tag.into(),
            response,
        })
    }
}

#[async_trait]
impl OutboundHandler for BlackholeOutbound {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn protocol(&self) -> &'static str {
        "blackhole"
    }

    async fn process(&self, link: Link, destination: &Destination) -> Result<()> {
        debug!("[{}] Blocking {}", self.tag, destination);

        let mut discarded = 0usize;
        while let Some(mb) = read_multi_buffer(link.reader.as_ref()).await? {
            discarded += mb.len();
        }

        if self.response == Response::Http {
            write_multi_buffer(link.writer.as_ref(), MultiBuffer::from_slice(HTTP_403_RESPONSE)).await?;
        }
        link.writer.close();

        debug!("[{}] Dropped {} bytes for {}", self.tag, discarded, destination);
        Ok(())
    }
}
