//! A coalescing send buffer: accumulates bytes and flushes them through a sink in
//! capacity-sized (or smaller, on final flush) chunks.
//!
//! This is a port of the original library's `CSendBuffer`/`CSend`/`CFlush`. The buffer itself
//! never talks to the network; it is handed any [`std::io::Write`] as its sink, which for the
//! session engine is the TCP socket and for tests is an in-memory `Vec<u8>` or a scripted pipe.

use std::io::{self, Write};

/// Fixed-capacity byte accumulator that flushes to a `Write` sink once full.
pub struct SendBuffer<W: Write> {
    data: Vec<u8>,
    capacity: usize,
    sink: W,
}

impl<W: Write> SendBuffer<W> {
    /// Creates a buffer with the given capacity, wrapping `sink`.
    pub fn new(capacity: usize, sink: W) -> Self {
        SendBuffer {
            data: Vec::with_capacity(capacity),
            capacity,
            sink,
        }
    }

    /// Appends `bytes`, flushing through the sink as many times as needed to make room.
    /// Short writes are not possible here; `sink.write_all` handles looping on the caller's
    /// behalf, matching the original contract that the sink itself must cope with partial
    /// writes.
    pub fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut remaining = bytes;
        while !remaining.is_empty() {
            let available = self.capacity - self.data.len();
            let take = available.min(remaining.len());
            self.data.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];

            if self.data.len() >= self.capacity {
                self.sink.write_all(&self.data)?;
                self.data.clear();
            }
        }
        Ok(())
    }

    /// Appends every slice in `parts`, in order. Replaces the original's null-terminated
    /// `CSendStrings` varargs convenience with an ordinary ordered sequence.
    pub fn append_all(&mut self, parts: &[&[u8]]) -> io::Result<()> {
        for part in parts {
            self.append(part)?;
        }
        Ok(())
    }

    /// Flushes the currently accumulated prefix through the sink. No-op if nothing is
    /// buffered.
    pub fn flush(&mut self) -> io::Result<()> {
        if !self.data.is_empty() {
            self.sink.write_all(&self.data)?;
            self.data.clear();
        }
        Ok(())
    }

    /// Returns the underlying sink, consuming the buffer. Any unflushed bytes are discarded;
    /// callers should `flush()` first.
    pub fn into_inner(self) -> W {
        self.sink
    }
}
