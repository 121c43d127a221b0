//! Virtual connection over a dispatched session
//!
//! `VirtualConnection` looks like any other bidirectional byte stream, but
//! its bytes travel through the runtime's dispatcher instead of a socket.
//!
//! The addresses it reports are placeholders (`0.0.0.0:0`). The real
//! transport, if any, lives behind the router and is not exposed; callers
//! must not use these addresses to identify the peer.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::trace;

use super::buf_stream::{BufferedReader, BufferedWriter, ReaderCloser, WriterCloser};
use crate::common::{Link, MultiBufferReader, MultiBufferWriter};

/// Address reported by virtual connections for both ends.
pub const PLACEHOLDER_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    0,
);

/// A bidirectional connection.
///
/// Reading and writing come from `AsyncRead` / `AsyncWrite`; the trait adds
/// the address accessors and an explicit, idempotent close.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {
    fn local_addr(&self) -> SocketAddr;

    fn remote_addr(&self) -> SocketAddr;

    /// Close both directions. Safe to call more than once.
    fn close(&self);
}

/// Connection backed by the two endpoints of a Link.
pub struct VirtualConnection {
    reader: BufferedReader,
    writer: BufferedWriter,
}

impl VirtualConnection {
    /// Build a connection from the writer endpoint (into the pipeline) and
    /// the reader endpoint (out of it).
    pub fn new(writer: Arc<dyn MultiBufferWriter>, reader: Arc<dyn MultiBufferReader>) -> Self {
        Self {
            reader: BufferedReader::new(reader),
            writer: BufferedWriter::new(writer),
        }
    }

    pub fn from_link(link: Link) -> Self {
        Self::new(link.writer, link.reader)
    }

    /// Handle that can close this connection from another task, e.g. while
    /// a read is pending.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            reader: self.reader.closer(),
            writer: self.writer.closer(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_closed() && self.writer.is_closed()
    }

    /// Split into independently owned read and write halves.
    pub fn into_split(self) -> (BufferedReader, BufferedWriter) {
        (self.reader, self.writer)
    }
}

impl Connection for VirtualConnection {
    fn local_addr(&self) -> SocketAddr {
        PLACEHOLDER_ADDR
    }

    fn remote_addr(&self) -> SocketAddr {
        PLACEHOLDER_ADDR
    }

    fn close(&self) {
        self.close_handle().close();
    }
}

impl AsyncRead for VirtualConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

impl AsyncWrite for VirtualConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.writer).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.writer).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.writer).poll_shutdown(cx)
    }
}

impl std::fmt::Debug for VirtualConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualConnection")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Closes a VirtualConnection from anywhere.
#[derive(Clone)]
pub struct CloseHandle {
    reader: ReaderCloser,
    writer: WriterCloser,
}

impl CloseHandle {
    /// Close the write side gracefully (data already written is still
    /// delivered) and interrupt the read side.
    pub fn close(&self) {
        trace!("Closing virtual connection");
        self.writer.close();
        self.reader.close();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::common::link::{read_multi_buffer, write_multi_buffer};
    use crate::common::{pipe, MultiBuffer, PipeOptions, PipeReader, PipeWriter};
    use crate::error::Error;

    /// Connection plus the pipeline-side endpoints of both pipes.
    fn connection() -> (VirtualConnection, Arc<PipeReader>, Arc<PipeWriter>) {
        let (up_reader, up_writer) = pipe(PipeOptions::default());
        let (down_reader, down_writer) = pipe(PipeOptions::default());
        let conn = VirtualConnection::new(Arc::new(up_writer), Arc::new(down_reader));
        (conn, Arc::new(up_reader), Arc::new(down_writer))
    }

    /// Pipeline stub that mirrors everything written back to the reader.
    fn spawn_echo(uplink: Arc<PipeReader>, downlink: Arc<PipeWriter>) {
        tokio::spawn(async move {
            while let Ok(Some(mb)) = read_multi_buffer(uplink.as_ref()).await {
                if write_multi_buffer(downlink.as_ref(), mb).await.is_err() {
                    return;
                }
            }
            downlink.close();
        });
    }

    #[tokio::test]
    async fn test_loopback_preserves_bytes_and_order() {
        let (mut conn, uplink, downlink) = connection();
        spawn_echo(uplink, downlink);

        let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        for piece in payload.chunks(777) {
            conn.write_all(piece).await.unwrap();
        }
        conn.shutdown().await.unwrap();

        let mut echoed = Vec::new();
        conn.read_to_end(&mut echoed).await.unwrap();
        assert_eq!(echoed, payload);
    }

    #[tokio::test]
    async fn test_bytes_written_before_close_reach_pipeline() {
        let (mut conn, uplink, _downlink) = connection();

        conn.write_all(b"last words").await.unwrap();
        conn.close();

        let mb = read_multi_buffer(uplink.as_ref()).await.unwrap().unwrap();
        assert_eq!(mb.to_vec(), b"last words");
        assert!(read_multi_buffer(uplink.as_ref()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (conn, _uplink, _downlink) = connection();
        for _ in 0..3 {
            conn.close();
        }
        conn.close_handle().close();
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_read_and_write_fail_after_close() {
        let (mut conn, _uplink, downlink) = connection();
        write_multi_buffer(downlink.as_ref(), MultiBuffer::from_slice(b"pending"))
            .await
            .unwrap();

        conn.close();

        let mut buf = [0u8; 16];
        assert!(Error::is_closed(&conn.read(&mut buf).await.unwrap_err()));
        assert!(Error::is_closed(&conn.write(b"x").await.unwrap_err()));
    }

    #[tokio::test]
    async fn test_peer_close_reads_remaining_data_then_eof() {
        let (mut conn, _uplink, downlink) = connection();
        write_multi_buffer(downlink.as_ref(), MultiBuffer::from_slice(b"bye"))
            .await
            .unwrap();
        downlink.close();

        let mut out = Vec::new();
        conn.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"bye");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_close_unblocks_read() {
        let (conn, _uplink, _downlink) = connection();
        let handle = conn.close_handle();
        let (mut reader, _writer) = conn.into_split();

        let pending = tokio::spawn(async move {
            let mut buf = [0u8; 32];
            reader.read(&mut buf).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.close();

        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("blocked read must return after close")
            .unwrap();
        match result {
            Ok(0) => {}
            Ok(n) => panic!("unexpected {} bytes", n),
            Err(e) => assert!(Error::is_closed(&e)),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_close_unblocks_write() {
        let (_uplink, up_writer) = pipe(PipeOptions { limit: Some(4) });
        let (down_reader, _downlink) = pipe(PipeOptions::default());
        let conn = VirtualConnection::new(Arc::new(up_writer), Arc::new(down_reader));
        let handle = conn.close_handle();
        let (_reader, mut writer) = conn.into_split();

        // Fill the uplink to its limit; nothing drains it
        writer.write_all(b"full").await.unwrap();

        let pending = tokio::spawn(async move { writer.write_all(b"more").await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());
        handle.close();

        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("blocked write must return after close")
            .unwrap();
        assert!(Error::is_closed(&result.unwrap_err()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipeline_interrupt_surfaces_as_closed() {
        let (mut conn, uplink, downlink) = connection();

        let pending = tokio::spawn(async move {
            let mut buf = [0u8; 32];
            conn.read(&mut buf).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        uplink.interrupt();
        downlink.interrupt();

        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap();
        assert!(Error::is_closed(&result.unwrap_err()));
    }

    #[tokio::test]
    async fn test_addresses_are_placeholders() {
        let (conn, _uplink, _downlink) = connection();
        assert_eq!(conn.local_addr(), PLACEHOLDER_ADDR);
        assert_eq!(conn.remote_addr(), PLACEHOLDER_ADDR);
        assert_eq!(conn.remote_addr().to_string(), "0.0.0.0:0");
    }
}
