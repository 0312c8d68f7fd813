//! Pull-based input sources for the lexer.
//!
//! The lexer never assumes it can seek backwards in its input: it only ever
//! calls `read` for more bytes. `start_pos()` reports the position of the
//! next unread byte so the ring buffer in [`crate::lexer::Lexer`] can stay
//! in sync with line/column bookkeeping across refills.

use std::io;
use zx_common::Position;

/// A pull source of bytes, with a position cursor the lexer can read but
/// never rewind.
pub trait SourceReader {
    /// Fill as much of `buf` as is available; returns the number of bytes
    /// written. A return of `0` means end of input.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Adapts any [`io::Read`] into a [`SourceReader`].
pub struct ReaderSource<R: io::Read> {
    inner: R,
}

impl<R: io::Read> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: io::Read> SourceReader for ReaderSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// An in-memory source that hands back bytes in caller-chosen chunk sizes,
/// used by tests to exercise buffer-refill boundaries deterministically.
pub struct ChunkedSource {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
}

impl ChunkedSource {
    pub fn new(text: impl Into<String>, chunk: usize) -> Self {
        Self { data: text.into().into_bytes(), pos: 0, chunk: chunk.max(1) }
    }

    pub fn whole(text: impl Into<String>) -> Self {
        Self::new(text, usize::MAX)
    }
}

impl SourceReader for ChunkedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.data.len() - self.pos;
        let n = remaining.min(buf.len()).min(self.chunk);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Bookkeeping the ring buffer keeps about where its first byte sits in the
/// overall source, so the lexer can hand out accurate positions after a
/// shift-and-refill.
#[derive(Debug, Clone)]
pub struct BufferOrigin {
    pub position: Position,
}

impl BufferOrigin {
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}
