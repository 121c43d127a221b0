//! Connection facade
//!
//! Turns the multi-buffer endpoints of a dispatched session into an
//! ordinary bidirectional byte stream:
//! - buf_stream: AsyncRead / AsyncWrite adapters over single endpoints
//! - connection: VirtualConnection composing both adapters

mod buf_stream;
mod connection;

pub use buf_stream::{BufferedReader, BufferedWriter};
pub use connection::{CloseHandle, Connection, VirtualConnection, PLACEHOLDER_ADDR};
