//! Buffer stream adapters
//!
//! Present a multi-buffer endpoint as a tokio byte stream:
//! - BufferedReader: AsyncRead over a MultiBufferReader
//! - BufferedWriter: AsyncWrite over a MultiBufferWriter
//!
//! Each adapter carries its own closed flag so a close issued from another
//! task is observed by the next poll, whatever the endpoint does.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::common::{MultiBuffer, MultiBufferReader, MultiBufferWriter};
use crate::error::Error;

/// Closes the endpoint behind a BufferedReader.
#[derive(Clone)]
pub(crate) struct ReaderCloser {
    source: Arc<dyn MultiBufferReader>,
    closed: Arc<AtomicBool>,
}

impl ReaderCloser {
    pub(crate) fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.source.interrupt();
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Closes the endpoint behind a BufferedWriter.
#[derive(Clone)]
pub(crate) struct WriterCloser {
    sink: Arc<dyn MultiBufferWriter>,
    closed: Arc<AtomicBool>,
}

impl WriterCloser {
    pub(crate) fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.sink.close();
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Reads bytes out of a multi-buffer endpoint.
pub struct BufferedReader {
    closer: ReaderCloser,
    /// Remainder of the last multi-buffer taken from the endpoint
    pending: MultiBuffer,
}

impl BufferedReader {
    pub fn new(source: Arc<dyn MultiBufferReader>) -> Self {
        Self {
            closer: ReaderCloser {
                source,
                closed: Arc::new(AtomicBool::new(false)),
            },
            pending: MultiBuffer::new(),
        }
    }

    /// Interrupt the endpoint. Idempotent.
    pub fn close(&self) {
        self.closer.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    pub(crate) fn closer(&self) -> ReaderCloser {
        self.closer.clone()
    }
}

impl AsyncRead for BufferedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.closer.is_closed() {
            this.pending.clear();
            return Poll::Ready(Err(Error::closed()));
        }
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            if !this.pending.is_empty() {
                let n = this.pending.copy_to_slice(buf.initialize_unfilled());
                buf.advance(n);
                return Poll::Ready(Ok(()));
            }

            match ready!(this.closer.source.poll_read_multi_buffer(cx)) {
                Ok(Some(mb)) => this.pending = mb,
                // End of stream: nothing filled
                Ok(None) => return Poll::Ready(Ok(())),
                Err(_) if this.closer.is_closed() => return Poll::Ready(Err(Error::closed())),
                Err(e) => return Poll::Ready(Err(e)),
            }
        }
    }
}

/// Writes bytes into a multi-buffer endpoint.
pub struct BufferedWriter {
    closer: WriterCloser,
}

impl BufferedWriter {
    pub fn new(sink: Arc<dyn MultiBufferWriter>) -> Self {
        Self {
            closer: WriterCloser {
                sink,
                closed: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Close the endpoint gracefully. Idempotent.
    pub fn close(&self) {
        self.closer.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    pub(crate) fn closer(&self) -> WriterCloser {
        self.closer.clone()
    }
}

impl AsyncWrite for BufferedWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        if this.closer.is_closed() {
            return Poll::Ready(Err(Error::closed()));
        }
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        ready!(this.closer.sink.poll_ready(cx))?;
        this.closer.sink.start_send(MultiBuffer::from_slice(buf))?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.closer.is_closed() {
            return Poll::Ready(Err(Error::closed()));
        }
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.closer.close();
        Poll::Ready(Ok(()))
    }
}
