//! Stream abstraction
//!
//! Byte-stream type produced by transports. Outbound handlers relay between
//! a Stream and the multi-buffer endpoints of a Link.

use tokio::io::{AsyncRead, AsyncWrite};

/// The socket-level stream type used by transports and outbound handlers.
pub type Stream = Box<dyn AsyncReadWrite + Unpin + Send>;

/// Combined trait for async read + write
pub trait AsyncReadWrite: AsyncRead + AsyncWrite {}

impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}
