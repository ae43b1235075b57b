//! Bounded, blocking, closable character channels.
//!
//! A channel has exactly one writer and one reader. Closing either end is
//! done by dropping (or calling `close` on) that end: the reader then drains
//! whatever is buffered and sees end-of-stream, while the writer's next write
//! fails with [`PipelineError::Closed`].

use crate::error::{PipelineError, Result};
use crossbeam::channel::{bounded, Receiver, Sender};

/// Default channel capacity in code units, one classic pipe page
pub const DEFAULT_CAPACITY: usize = 1024;

/// Create a connected writer/reader pair holding at most `capacity` chars.
/// A zero capacity is clamped to one so the channel always buffers.
pub fn channel(capacity: usize) -> (ChannelWriter, ChannelReader) {
    let (tx, rx) = bounded(capacity.max(1));
    (ChannelWriter { tx }, ChannelReader { rx })
}

/// Producing half of a channel
#[derive(Debug)]
pub struct ChannelWriter {
    tx: Sender<char>,
}

impl ChannelWriter {
    /// Write one code unit, blocking while the channel is full
    pub fn write(&self, c: char) -> Result<()> {
        self.tx.send(c).map_err(|_| PipelineError::Closed)
    }

    /// Write every code unit of `text` in order
    pub fn write_str(&self, text: &str) -> Result<()> {
        for c in text.chars() {
            self.write(c)?;
        }
        Ok(())
    }

    /// Number of buffered code units not yet read
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Get the capacity of the channel
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }

    /// Close the channel; the reader drains what is buffered then sees end-of-stream
    pub fn close(self) {}
}

/// Consuming half of a channel
#[derive(Debug)]
pub struct ChannelReader {
    rx: Receiver<char>,
}

impl ChannelReader {
    /// Read the next code unit, blocking while the channel is empty and open.
    /// Returns `None` once the writer has closed and the buffer is drained.
    pub fn read(&self) -> Option<char> {
        self.rx.recv().ok()
    }

    /// Blocking iterator over the remaining code units
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.rx.iter()
    }

    /// Number of buffered code units
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Close the channel from the reading side; pending and future writes fail
    pub fn close(self) {}
}
