//! Transport Layer
//!
//! Responsibilities:
//! - Establish lowest-level connections (TCP)
//! - NO encryption, NO protocol parsing, NO content inspection
//!
//! This layer ONLY deals with raw byte transport.

mod tcp;

pub use tcp::TcpTransport;

use async_trait::async_trait;

use crate::common::{Address, Result, Stream};

/// Transport trait for establishing raw connections
///
/// Implementations should ONLY handle connection establishment,
/// not encryption or protocol handling.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to a remote address
    async fn connect(&self, addr: &Address) -> Result<Stream>;
}
