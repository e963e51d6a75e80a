//! Connection-scoped collection state
//!
//! A [`Session`] exists from a successful connect until the matching
//! disconnect. It owns everything whose lifetime is one connection: the
//! start time, the line framer and its partial fragment, the warm-up
//! countdown, and the sliding window. Dropping the session discards all of
//! it, so a reconnect always starts from empty buffers.
//!
//! # Sample policy
//!
//! Every framed line is its own sample. `a:1\nb:2\n` yields two samples with
//! distinct timestamps, one carrying `a` and one carrying `b`.

use crate::config::{BaudRate, CollectionConfig, LineTerminator};
use crate::pipeline::{decode_line, LineFramer, SlidingWindow, WarmupFilter};
use crate::types::Sample;
use chrono::{DateTime, Local};
use std::time::Instant;

/// What one chunk did to the session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Every line completed by the chunk, decoded or not, for the raw log
    pub lines: Vec<String>,
    /// Samples pushed into the window
    pub stored: usize,
    /// Samples consumed by the warm-up filter
    pub warmup_skipped: usize,
    /// Lines without a single valid token
    pub undecoded: usize,
    /// Tokens that matched but did not parse
    pub skipped_tokens: usize,
}

/// State for one connect/disconnect cycle
#[derive(Debug)]
pub struct Session {
    port: String,
    baud_rate: BaudRate,
    started_at: Instant,
    started_wall: DateTime<Local>,
    framer: LineFramer,
    warmup: WarmupFilter,
    window: SlidingWindow,
    next_seq: u64,
}

impl Session {
    /// Start a session for a freshly opened port
    pub fn new(
        port: impl Into<String>,
        baud_rate: BaudRate,
        terminator: LineTerminator,
        collection: &CollectionConfig,
    ) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            started_at: Instant::now(),
            started_wall: Local::now(),
            framer: LineFramer::new(terminator),
            warmup: WarmupFilter::new(collection.warmup_samples),
            window: SlidingWindow::new(collection.window_capacity),
            next_seq: 0,
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baud_rate(&self) -> BaudRate {
        self.baud_rate
    }

    pub fn terminator(&self) -> LineTerminator {
        self.framer.terminator()
    }

    /// Wall-clock time of the connect
    pub fn started_wall(&self) -> DateTime<Local> {
        self.started_wall
    }

    /// Seconds since the connect
    pub fn elapsed(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn warmup_remaining(&self) -> u32 {
        self.warmup.remaining()
    }

    /// Number of samples decoded so far, stored or not
    pub fn samples_seen(&self) -> u64 {
        self.next_seq
    }

    /// Feed a chunk stamped with the current elapsed time
    pub fn ingest(&mut self, chunk: &[u8]) -> IngestReport {
        let elapsed = self.elapsed();
        self.ingest_at(chunk, elapsed)
    }

    /// Feed a chunk with an explicit timestamp for every line it completes
    pub fn ingest_at(&mut self, chunk: &[u8], elapsed: f64) -> IngestReport {
        let mut report = IngestReport {
            lines: self.framer.push_chunk(chunk),
            ..Default::default()
        };

        for line in &report.lines {
            let decoded = decode_line(line);
            report.skipped_tokens += decoded.skipped_tokens;

            if decoded.values.is_empty() {
                report.undecoded += 1;
                continue;
            }

            let sample = Sample::new(self.next_seq, elapsed, decoded.values);
            self.next_seq += 1;

            if !self.warmup.admit(&sample) {
                report.warmup_skipped += 1;
                continue;
            }
            if self.window.push(&sample) {
                report.stored += 1;
            }
        }

        if report.warmup_skipped > 0 && !self.warmup.is_warming_up() {
            tracing::debug!(port = %self.port, "Warm-up complete");
        }

        report
    }

    /// Tear down, logging any partial line that is discarded
    pub fn end(mut self) {
        self.framer.reset();
        tracing::debug!(
            port = %self.port,
            samples = self.next_seq,
            duration_s = self.elapsed(),
            "Session ended"
        );
    }
}
