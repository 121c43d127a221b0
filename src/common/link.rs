//! Link - the two multi-buffer endpoints of a dispatched session
//!
//! A dispatcher hands one Link to the caller and the mirrored Link to the
//! outbound handler. Endpoints are shared (`Arc`) so that closing can happen
//! from a different task than the one reading or writing.

use std::future::poll_fn;
use std::io;
use std::sync::Arc;
use std::task::{Context, Poll};

use super::MultiBuffer;

/// Source side of a session: yields multi-buffers in production order.
pub trait MultiBufferReader: Send + Sync {
    /// Poll for the next multi-buffer.
    ///
    /// `Ok(None)` means the writer closed gracefully and everything it wrote
    /// has been consumed.
    fn poll_read_multi_buffer(&self, cx: &mut Context<'_>) -> Poll<io::Result<Option<MultiBuffer>>>;

    /// Abort the session from the reading side. Pending data is released.
    fn interrupt(&self);
}

/// Sink side of a session.
pub trait MultiBufferWriter: Send + Sync {
    /// Wait until the endpoint can take more data.
    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>>;

    /// Queue a multi-buffer. Must follow a successful `poll_ready`.
    fn start_send(&self, mb: MultiBuffer) -> io::Result<()>;

    /// Graceful close: data already queued is still delivered.
    fn close(&self);

    /// Abort the session from the writing side. Pending data is released.
    fn interrupt(&self);
}

/// Read the next multi-buffer from a shared endpoint.
pub async fn read_multi_buffer(reader: &dyn MultiBufferReader) -> io::Result<Option<MultiBuffer>> {
    poll_fn(|cx| reader.poll_read_multi_buffer(cx)).await
}

/// Write a multi-buffer to a shared endpoint, waiting for capacity first.
pub async fn write_multi_buffer(writer: &dyn MultiBufferWriter, mb: MultiBuffer) -> io::Result<()> {
    poll_fn(|cx| writer.poll_ready(cx)).await?;
    writer.start_send(mb)
}

/// The pair of endpoints produced by dispatching a destination.
#[derive(Clone)]
pub struct Link {
    /// Bytes flowing out of the pipeline
    pub reader: Arc<dyn MultiBufferReader>,
    /// Bytes flowing into the pipeline
    pub writer: Arc<dyn MultiBufferWriter>,
}

impl Link {
    pub fn new(reader: Arc<dyn MultiBufferReader>, writer: Arc<dyn MultiBufferWriter>) -> Self {
        Self { reader, writer }
    }

    /// Abort both directions.
    pub fn interrupt(&self) {
        self.writer.interrupt();
        self.reader.interrupt();
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}
