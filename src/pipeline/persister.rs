//! Batch recording of window samples to a CSV file
//!
//! The persister never sees samples directly. It counts pushes into the
//! sliding window while recording is active and, on its own fixed-interval
//! schedule, writes the most recent `threshold` samples once at least that
//! many have accumulated. The counter is decremented by exactly `threshold`
//! per flush, so a surplus carries over into the next batch.
//!
//! # File Layout
//!
//! ```text
//! time,<var1>,...,<varN>,userval1,userval2,userval3
//! 0.104512,23.5,61,0,0,0
//! ```
//!
//! The header is written when recording creates the file, from the variables
//! known at that moment, and fixes the columns from then on. Recording into a
//! file that already has a header reuses its columns. A variable with no
//! value in a given sample leaves its cell empty.
//!
//! # Failure
//!
//! Any write error ends the recording: the sink is dropped, the state goes to
//! [`RecordingState::Stopped`] and the error is returned to the caller, who
//! must start a new recording explicitly.

use crate::config::RecordingConfig;
use crate::error::{Result, ResultExt, SerialVisError};
use crate::pipeline::window::{SlidingWindow, WindowRow};
use crate::types::{RecordingState, UserFields, USER_FIELD_COUNT, USER_FIELD_NAMES};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Name of the leading timestamp column
pub const TIME_COLUMN: &str = "time";

/// File created when recording is pointed at a directory
pub const DEFAULT_RECORDING_FILE: &str = "recorded_data.csv";

type SinkWriter = Box<dyn Write + Send>;

/// Resolve a user-chosen location to the file that will be recorded into
///
/// An existing directory resolves to [`DEFAULT_RECORDING_FILE`] inside it;
/// anything else is taken as the file itself.
pub fn recording_target(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(DEFAULT_RECORDING_FILE)
    } else {
        path.to_path_buf()
    }
}

// ==================== CSV Sink ====================

/// Append-only CSV destination whose variable columns are fixed when opened
pub struct CsvSink {
    writer: csv::Writer<SinkWriter>,
    columns: Vec<String>,
}

impl std::fmt::Debug for CsvSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSink")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl CsvSink {
    /// Open `path` for appending, creating it if needed
    ///
    /// A new or empty file gets its header immediately, built from
    /// `variables`. A non-empty file must start with a header this recorder
    /// wrote; its variable columns are reused and `variables` is ignored.
    pub fn open(path: impl AsRef<Path>, variables: &[String]) -> Result<Self> {
        let path = path.as_ref();
        let has_content = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);

        let existing = if has_content {
            Some(read_header_columns(path)?)
        } else {
            None
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open recording file {:?}", path))?;

        tracing::debug!(?path, existing_columns = ?existing, "Opened recording sink");
        match existing {
            Some(columns) => Ok(Self::with_columns(Box::new(file), columns)),
            None => Self::create(Box::new(file), variables),
        }
    }

    /// Start a new table on `writer`, writing its header now
    pub fn create(writer: SinkWriter, variables: &[String]) -> Result<Self> {
        let mut sink = Self::with_columns(writer, variables.to_vec());
        sink.write_header()?;
        Ok(sink)
    }

    /// Continue a table on `writer` whose header is already in place
    pub fn with_columns(writer: SinkWriter, columns: Vec<String>) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        Self { writer, columns }
    }

    /// Variable columns, between `time` and the user fields
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn write_header(&mut self) -> Result<()> {
        let header = std::iter::once(TIME_COLUMN)
            .chain(self.columns.iter().map(String::as_str))
            .chain(USER_FIELD_NAMES);
        self.writer.write_record(header)?;
        self.writer.flush()?;
        tracing::debug!(columns = ?self.columns, "Wrote recording header");
        Ok(())
    }

    /// Write rows and flush them to the underlying file
    pub fn write_rows(&mut self, rows: &[WindowRow], user_fields: &UserFields) -> Result<usize> {
        let user: Vec<String> = user_fields.values().iter().map(|v| v.to_string()).collect();

        for row in rows {
            let mut record = Vec::with_capacity(row.values.len() + 1 + USER_FIELD_COUNT);
            record.push(format!("{:.6}", row.timestamp));
            record.extend(
                row.values
                    .iter()
                    .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
            );
            record.extend(user.iter().cloned());
            self.writer.write_record(&record)?;
        }

        self.writer.flush()?;
        Ok(rows.len())
    }

    /// Flush and release the file
    pub fn close(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn read_header_columns(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let header = match reader.records().next() {
        Some(record) => record?,
        None => {
            return Err(SerialVisError::Recording(format!(
                "{:?} has content but no header row",
                path
            )))
        }
    };

    let fields: Vec<&str> = header.iter().collect();
    let user_start = fields.len().saturating_sub(USER_FIELD_COUNT);
    let valid = fields.len() > USER_FIELD_COUNT
        && fields[0] == TIME_COLUMN
        && fields[user_start..] == USER_FIELD_NAMES;

    if !valid {
        return Err(SerialVisError::Recording(format!(
            "{:?} does not have a recording header (found {:?})",
            path, fields
        )));
    }

    Ok(fields[1..user_start].iter().map(|s| s.to_string()).collect())
}

// ==================== Flush Schedule ====================

/// Fixed-interval timer that can be suspended without losing progress
#[derive(Debug, Clone)]
pub struct FlushSchedule {
    interval: Duration,
    anchor: Instant,
    paused_at: Option<Duration>,
}

impl FlushSchedule {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            anchor: now,
            paused_at: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a tick should run at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.paused_at.is_none() && now.saturating_duration_since(self.anchor) >= self.interval
    }

    /// Record that a tick ran at `now`
    pub fn mark(&mut self, now: Instant) {
        self.anchor = now;
    }

    /// Remember how far into the current interval we were
    pub fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now.saturating_duration_since(self.anchor));
        }
    }

    /// Continue the interval from where `pause` left it
    pub fn resume(&mut self, now: Instant) {
        if let Some(elapsed) = self.paused_at.take() {
            self.anchor = now.checked_sub(elapsed).unwrap_or(now);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }
}

// ==================== Batch Persister ====================

/// Outcome of one successful flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Rows written in this batch
    pub rows: usize,
    /// Pushes still counted toward the next batch
    pub pending: usize,
}

/// Counts window pushes and writes fixed-size batches on a timer
#[derive(Debug)]
pub struct BatchPersister {
    threshold: usize,
    interval: Duration,
    schedule: Option<FlushSchedule>,
    sink: Option<CsvSink>,
    path: Option<PathBuf>,
    state: RecordingState,
    pending: usize,
    user_fields: UserFields,
    rows_written: u64,
    batches_flushed: u64,
}

impl BatchPersister {
    /// Create a stopped persister; a zero threshold is raised to one
    pub fn new(threshold: usize, interval: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            interval,
            schedule: None,
            sink: None,
            path: None,
            state: RecordingState::Stopped,
            pending: 0,
            user_fields: UserFields::default(),
            rows_written: 0,
            batches_flushed: 0,
        }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        let mut persister = Self::new(
            config.flush_threshold,
            Duration::from_millis(config.flush_interval_ms),
        );
        persister.user_fields = config.user_fields;
        persister
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn user_fields(&self) -> UserFields {
        self.user_fields
    }

    /// Total rows written since this persister was created
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn batches_flushed(&self) -> u64 {
        self.batches_flushed
    }

    /// Open `path` with `variables` as its columns and begin counting pushes
    pub fn start(&mut self, path: impl AsRef<Path>, variables: &[String], now: Instant) -> Result<()> {
        let path = path.as_ref();
        if self.state.has_sink() {
            return Err(SerialVisError::Recording(format!(
                "Already recording to {:?}",
                self.path.as_deref().unwrap_or(path)
            )));
        }

        let sink = CsvSink::open(path, variables)?;
        self.start_with_sink(sink, now);
        self.path = Some(path.to_path_buf());
        tracing::info!(?path, threshold = self.threshold, "Recording started");
        Ok(())
    }

    /// Begin recording into an already opened sink
    pub fn start_with_sink(&mut self, sink: CsvSink, now: Instant) {
        self.sink = Some(sink);
        self.schedule = Some(FlushSchedule::new(self.interval, now));
        self.state = RecordingState::Active;
        self.pending = 0;
        self.path = None;
    }

    /// Close the sink, dropping any sub-threshold remainder
    ///
    /// Returns the number of counted samples that were never written.
    pub fn stop(&mut self) -> usize {
        if !self.state.has_sink() {
            return 0;
        }

        let dropped = self.pending;
        if let Some(sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                tracing::warn!("Failed to flush recording sink on stop: {}", e);
            }
        }
        self.reset();

        tracing::info!(dropped, rows_written = self.rows_written, "Recording stopped");
        dropped
    }

    /// Suspend the flush schedule; counted samples are kept
    pub fn pause(&mut self, now: Instant) -> bool {
        if self.state != RecordingState::Active {
            return false;
        }
        if let Some(schedule) = &mut self.schedule {
            schedule.pause(now);
        }
        self.state = RecordingState::Paused;
        tracing::info!(pending = self.pending, "Recording paused");
        true
    }

    /// Restart the flush schedule where it was paused
    pub fn resume(&mut self, now: Instant) -> bool {
        if self.state != RecordingState::Paused {
            return false;
        }
        if let Some(schedule) = &mut self.schedule {
            schedule.resume(now);
        }
        self.state = RecordingState::Active;
        tracing::info!(pending = self.pending, "Recording resumed");
        true
    }

    /// Count one push into the window
    pub fn record_push(&mut self) {
        if self.state.is_active() {
            self.pending += 1;
        }
    }

    /// Values written into the user columns of subsequent rows
    pub fn set_user_fields(&mut self, fields: UserFields) {
        self.user_fields = fields;
    }

    /// Run the schedule; flushes one batch if due and enough samples are pending
    pub fn tick(&mut self, now: Instant, window: &SlidingWindow) -> Result<Option<FlushReport>> {
        if !self.state.is_active() {
            return Ok(None);
        }
        let Some(schedule) = &mut self.schedule else {
            return Ok(None);
        };
        if !schedule.is_due(now) {
            return Ok(None);
        }
        schedule.mark(now);

        if self.pending < self.threshold {
            return Ok(None);
        }
        self.flush(window).map(Some)
    }

    /// Write the most recent `threshold` samples unconditionally
    pub fn flush(&mut self, window: &SlidingWindow) -> Result<FlushReport> {
        let Some(sink) = &mut self.sink else {
            return Err(SerialVisError::Recording("No recording in progress".to_string()));
        };

        let rows = window.recent_rows(self.threshold, sink.columns());
        let result = sink.write_rows(&rows, &self.user_fields);

        match result {
            Ok(rows) => {
                self.pending = self.pending.saturating_sub(self.threshold);
                self.rows_written += rows as u64;
                self.batches_flushed += 1;
                tracing::debug!(rows, pending = self.pending, "Flushed recording batch");
                Ok(FlushReport {
                    rows,
                    pending: self.pending,
                })
            }
            Err(e) => {
                tracing::error!("Recording stopped after write failure: {}", e);
                self.sink = None;
                self.reset();
                Err(SerialVisError::Recording(e.to_string()))
            }
        }
    }

    fn reset(&mut self) {
        self.state = RecordingState::Stopped;
        self.schedule = None;
        self.pending = 0;
    }
}
