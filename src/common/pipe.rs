//! Pipe - bounded in-memory multi-buffer channel with lifecycle management
//!
//! A Pipe connects one writer endpoint to one reader endpoint with:
//! - FIFO delivery of chunks
//! - Backpressure once the buffered byte count reaches the limit
//! - Graceful close (reader drains, then sees end-of-stream)
//! - Interrupt (buffered data dropped, both sides fail)
//!
//! The dispatcher builds every session out of two pipes, one per direction.

use std::io;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use super::link::{MultiBufferReader, MultiBufferWriter};
use super::MultiBuffer;
use crate::error::Error;

/// Default number of buffered bytes before writers are suspended (512KB)
pub const DEFAULT_PIPE_LIMIT: usize = 512 * 1024;

/// Pipe construction options
#[derive(Debug, Clone, Copy)]
pub struct PipeOptions {
    /// Buffered bytes at which writes wait; `None` means unbounded
    pub limit: Option<usize>,
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self {
            limit: Some(DEFAULT_PIPE_LIMIT),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Open,
    /// Writer finished; remaining data can still be read
    Closed,
    /// Aborted; nothing more can be read or written
    Interrupted,
}

/// Shared state guarded by one mutex
struct PipeState {
    data: MultiBuffer,
    status: Status,
    limit: Option<usize>,
    read_waker: Option<Waker>,
    write_waker: Option<Waker>,
}

impl PipeState {
    fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.data.len() >= limit)
    }

    fn take_wakers(&mut self) -> (Option<Waker>, Option<Waker>) {
        (self.read_waker.take(), self.write_waker.take())
    }
}

struct Shared {
    state: Mutex<PipeState>,
}

impl Shared {
    fn close(&self) {
        let wakers = {
            let mut state = self.state.lock();
            if state.status != Status::Open {
                return;
            }
            state.status = Status::Closed;
            state.take_wakers()
        };
        wake(wakers);
    }

    fn interrupt(&self) {
        let wakers = {
            let mut state = self.state.lock();
            if state.status == Status::Interrupted {
                return;
            }
            state.status = Status::Interrupted;
            state.data.clear();
            state.take_wakers()
        };
        wake(wakers);
    }
}

fn wake((reader, writer): (Option<Waker>, Option<Waker>)) {
    if let Some(w) = reader {
        w.wake();
    }
    if let Some(w) = writer {
        w.wake();
    }
}

/// Read half of a Pipe
pub struct PipeReader {
    shared: Arc<Shared>,
}

/// Write half of a Pipe
pub struct PipeWriter {
    shared: Arc<Shared>,
}

/// Create a connected reader/writer pair.
pub fn pipe(options: PipeOptions) -> (PipeReader, PipeWriter) {
    let shared = Arc::new(Shared {
        state: Mutex::new(PipeState {
            data: MultiBuffer::new(),
            status: Status::Open,
            limit: options.limit,
            read_waker: None,
            write_waker: None,
        }),
    });

    (
        PipeReader {
            shared: Arc::clone(&shared),
        },
        PipeWriter { shared },
    )
}

impl PipeReader {
    /// Number of bytes waiting to be read
    pub fn buffered(&self) -> usize {
        self.shared.state.lock().data.len()
    }
}

impl PipeWriter {
    /// Check if the pipe no longer accepts writes
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().status != Status::Open
    }
}

impl MultiBufferReader for PipeReader {
    fn poll_read_multi_buffer(&self, cx: &mut Context<'_>) -> Poll<io::Result<Option<MultiBuffer>>> {
        let (result, waker) = {
            let mut state = self.shared.state.lock();
            let status = state.status;
            match status {
                Status::Interrupted => return Poll::Ready(Err(Error::closed())),
                _ if !state.data.is_empty() => {
                    let mb = std::mem::take(&mut state.data);
                    (Poll::Ready(Ok(Some(mb))), state.write_waker.take())
                }
                Status::Closed => return Poll::Ready(Ok(None)),
                Status::Open => {
                    state.read_waker = Some(cx.waker().clone());
                    return Poll::Pending;
                }
            }
        };

        // Room was just made; let a suspended writer continue
        if let Some(w) = waker {
            w.wake();
        }
        result
    }

    fn interrupt(&self) {
        self.shared.interrupt();
    }
}

impl MultiBufferWriter for PipeWriter {
    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut state = self.shared.state.lock();
        if state.status != Status::Open {
            return Poll::Ready(Err(Error::closed()));
        }
        if state.is_full() {
            state.write_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }
        Poll::Ready(Ok(()))
    }

    fn start_send(&self, mb: MultiBuffer) -> io::Result<()> {
        if mb.is_empty() {
            return Ok(());
        }

        let waker = {
            let mut state = self.shared.state.lock();
            if state.status != Status::Open {
                return Err(Error::closed());
            }
            state.data.append(mb);
            state.read_waker.take()
        };

        if let Some(w) = waker {
            w.wake();
        }
        Ok(())
    }

    fn close(&self) {
        self.shared.close();
    }

    fn interrupt(&self) {
        self.shared.interrupt();
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        // Nobody will ever drain the buffer again
        self.shared.interrupt();
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.shared.close();
    }
}
