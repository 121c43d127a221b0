//! MultiBuffer - an ordered queue of byte chunks
//!
//! Bytes move through the pipeline as whole chunks rather than as one
//! contiguous buffer, so a writer never has to wait for a reader to compact
//! anything. Consumption is destructive and FIFO.

use std::collections::VecDeque;

use bytes::{Buf, Bytes};

/// Maximum size of a chunk cut from a caller-supplied slice (2KB)
pub const CHUNK_SIZE: usize = 2048;

/// FIFO of non-empty byte chunks.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MultiBuffer {
    chunks: VecDeque<Bytes>,
    len: usize,
}

impl MultiBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `data` into chunks of at most [`CHUNK_SIZE`] bytes.
    pub fn from_slice(data: &[u8]) -> Self {
        let mut mb = Self::new();
        for chunk in data.chunks(CHUNK_SIZE) {
            mb.push(Bytes::copy_from_slice(chunk));
        }
        mb
    }

    /// Append a chunk. Empty chunks are dropped.
    pub fn push(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Move every chunk of `other` to the back of `self`.
    pub fn append(&mut self, other: MultiBuffer) {
        self.len += other.len;
        self.chunks.extend(other.chunks);
    }

    pub fn pop_front(&mut self) -> Option<Bytes> {
        let chunk = self.chunks.pop_front()?;
        self.len -= chunk.len();
        Some(chunk)
    }

    /// Total number of bytes held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Drain as many bytes as fit into `dst`, front first.
    ///
    /// A chunk that only partially fits is split; its remainder stays at the
    /// front of the queue. Returns the number of bytes copied.
    pub fn copy_to_slice(&mut self, dst: &mut [u8]) -> usize {
        let mut copied = 0;

        while copied < dst.len() {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };

            let n = front.len().min(dst.len() - copied);
            dst[copied..copied + n].copy_from_slice(&front[..n]);
            copied += n;

            if n == front.len() {
                self.chunks.pop_front();
            } else {
                front.advance(n);
            }
        }

        self.len -= copied;
        copied
    }

    /// Release every chunk.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.len = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.chunks.iter()
    }

    /// Concatenate all chunks into one vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }
}

impl From<Bytes> for MultiBuffer {
    fn from(chunk: Bytes) -> Self {
        let mut mb = Self::new();
        mb.push(chunk);
        mb
    }
}

impl IntoIterator for MultiBuffer {
    type Item = Bytes;
    type IntoIter = std::collections::vec_deque::IntoIter<Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}
