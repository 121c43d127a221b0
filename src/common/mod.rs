//! Common types and abstractions
//!
//! This module defines the core types used throughout the application:
//! - Destination: logical endpoint a session is routed to
//! - Address: network address representation
//! - MultiBuffer: chunked byte queue moved through sessions
//! - Pipe / Link: the multi-buffer endpoints of a session
//! - Stream: socket-level async I/O used by transports

mod address;
pub mod buf;
mod destination;
pub mod link;
pub mod pipe;
mod stream;

pub use address::Address;
pub use buf::MultiBuffer;
pub use destination::{Destination, Network};
pub use link::{Link, MultiBufferReader, MultiBufferWriter};
pub use pipe::{pipe, PipeOptions, PipeReader, PipeWriter};
pub use stream::{AsyncReadWrite, Stream};

// Re-export error types from crate root
pub use crate::error::{Error, Result};
