//! SerialLink trait for unified port access
//!
//! This module provides a common trait for byte-stream links, so the
//! controller can drive a real serial port (via serialport) or a mock link
//! for testing through the same interface.

use crate::config::BaudRate;
use crate::error::{OpenError, Result};

/// Statistics for link operations
#[derive(Debug, Clone, Default)]
pub struct LinkStats {
    /// Total bytes received
    pub bytes_read: u64,
    /// Total bytes sent
    pub bytes_written: u64,
    /// Reads that returned at least one byte
    pub chunks_read: u64,
    /// Reads that failed
    pub read_errors: u64,
    /// Writes that failed
    pub write_errors: u64,
    /// Size of the largest chunk seen
    pub max_chunk_len: usize,
}

impl LinkStats {
    /// Record a successful read
    pub fn record_read(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.chunks_read += 1;
        self.bytes_read += len as u64;
        self.max_chunk_len = self.max_chunk_len.max(len);
    }

    /// Record a successful write
    pub fn record_write(&mut self, len: usize) {
        self.bytes_written += len as u64;
    }

    /// Average bytes per non-empty read
    pub fn avg_chunk_len(&self) -> f64 {
        if self.chunks_read == 0 {
            0.0
        } else {
            self.bytes_read as f64 / self.chunks_read as f64
        }
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Unified interface for serial links
///
/// Implementations must be `Send` so the controller can own one on the
/// backend thread. Reads never block longer than the link's own timeout.
pub trait SerialLink: Send {
    /// Open the link; fails without retrying
    fn open(&mut self, port: &str, baud_rate: BaudRate) -> std::result::Result<(), OpenError>;

    /// Close the link; a no-op when already closed
    fn close(&mut self);

    /// Check if the link is open
    fn is_open(&self) -> bool;

    /// Return whatever bytes have arrived since the last call
    ///
    /// An empty vector means nothing arrived. An error means the link is no
    /// longer usable.
    fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Send bytes to the device
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Get link statistics
    fn stats(&self) -> &LinkStats;

    /// Get mutable reference to link statistics
    fn stats_mut(&mut self) -> &mut LinkStats;

    /// Reset link statistics
    fn reset_stats(&mut self) {
        self.stats_mut().reset();
    }
}
