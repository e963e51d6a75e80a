//! Core data types for SerialVis-RS
//!
//! This module contains the fundamental data structures passed between the
//! pipeline stages and across the backend/frontend channel.
//!
//! # Main Types
//!
//! - [`SampleValues`] - Ordered `name -> value` mapping decoded from one line
//! - [`Sample`] - Decoded values stamped with elapsed time and a sequence number
//! - [`ConnectionStatus`] - Whether the serial channel is open
//! - [`RecordingState`] - Active / Paused / Stopped recording flag
//! - [`UserFields`] - The three caller-supplied scalars appended to every row
//! - [`CollectionStats`] - Counters reported periodically to the frontend
//!
//! # Ordering
//!
//! [`SampleValues`] keeps names in the order they first appear on the line.
//! A name repeated on the same line keeps its first position and takes the
//! last value, which matches how a dict built from the tokens would behave.

use crate::error::{Result, SerialVisError};
use serde::{Deserialize, Serialize};

/// Number of caller-supplied scalar fields appended to each recorded row
pub const USER_FIELD_COUNT: usize = 3;

/// Column names of the caller-supplied scalar fields
pub const USER_FIELD_NAMES: [&str; USER_FIELD_COUNT] = ["userval1", "userval2", "userval3"];

/// Ordered mapping of variable name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleValues {
    entries: Vec<(String, f64)>,
}

impl SampleValues {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, keeping the position of the first insert
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Look up a value by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Iterate `(name, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Iterate names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for SampleValues {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut values = SampleValues::new();
        for (name, value) in iter {
            values.insert(name, value);
        }
        values
    }
}

/// One decoded telemetry line
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Monotonically increasing within a session
    pub seq: u64,
    /// Seconds since the session started
    pub elapsed: f64,
    /// Decoded values; variable sets differ between samples
    pub values: SampleValues,
}

impl Sample {
    /// Create a new sample
    pub fn new(seq: u64, elapsed: f64, values: SampleValues) -> Self {
        Self {
            seq,
            elapsed,
            values,
        }
    }

    /// A sample with no decoded values is logged but never stored
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Represents the connection status of the serial channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No channel open
    #[default]
    Disconnected,
    /// Channel open and session running
    Connected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connected => write!(f, "Connected"),
        }
    }
}

/// State of the batch recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    /// No sink open
    #[default]
    Stopped,
    /// Sink open, flush schedule running
    Active,
    /// Sink open, flush schedule suspended
    Paused,
}

impl RecordingState {
    /// Check if the sink is open (active or paused)
    pub fn has_sink(&self) -> bool {
        !matches!(self, RecordingState::Stopped)
    }

    /// Check if samples are being counted toward the next batch
    pub fn is_active(&self) -> bool {
        matches!(self, RecordingState::Active)
    }

    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            RecordingState::Stopped => "Stopped",
            RecordingState::Active => "Recording",
            RecordingState::Paused => "Paused",
        }
    }
}

/// The three caller-supplied scalars written into every recorded row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserFields(pub [f64; USER_FIELD_COUNT]);

impl Default for UserFields {
    fn default() -> Self {
        Self([0.0; USER_FIELD_COUNT])
    }
}

impl UserFields {
    /// Parse the fields from user-entered text
    ///
    /// Anything that is not a finite number is rejected here so malformed
    /// input never reaches the recorder.
    pub fn parse<S: AsRef<str>>(texts: &[S]) -> Result<Self> {
        if texts.len() != USER_FIELD_COUNT {
            return Err(SerialVisError::Config(format!(
                "Expected {} user fields, got {}",
                USER_FIELD_COUNT,
                texts.len()
            )));
        }

        let mut values = [0.0; USER_FIELD_COUNT];
        for (i, text) in texts.iter().enumerate() {
            let text = text.as_ref().trim();
            let value: f64 = text.parse().map_err(|_| {
                SerialVisError::Config(format!(
                    "User field {} is not a number: {:?}",
                    USER_FIELD_NAMES[i], text
                ))
            })?;
            if !value.is_finite() {
                return Err(SerialVisError::Config(format!(
                    "User field {} must be finite, got {}",
                    USER_FIELD_NAMES[i], text
                )));
            }
            values[i] = value;
        }
        Ok(Self(values))
    }

    /// Check that every field is finite
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn values(&self) -> &[f64; USER_FIELD_COUNT] {
        &self.0
    }
}

/// Statistics about the data collection
#[derive(Debug, Clone, Default)]
pub struct CollectionStats {
    /// Raw bytes received from the channel
    pub bytes_received: u64,
    /// Complete lines produced by the framer
    pub lines_framed: u64,
    /// Lines that yielded at least one value
    pub samples_decoded: u64,
    /// Samples pushed into the sliding window
    pub samples_stored: u64,
    /// Samples consumed by the warm-up filter
    pub warmup_skipped: u64,
    /// Lines with no `name:value` token
    pub undecoded_lines: u64,
    /// Individual tokens whose number failed to parse
    pub skipped_tokens: u64,
    /// Rows written to the recording sink
    pub rows_written: u64,
    /// Batches flushed to the recording sink
    pub batches_flushed: u64,
    /// Number of messages dropped due to queue backpressure
    pub dropped_messages: u64,
}

impl CollectionStats {
    /// Fraction of framed lines that decoded to a sample, as a percentage
    pub fn decode_rate(&self) -> f64 {
        if self.lines_framed == 0 {
            100.0
        } else {
            (self.samples_decoded as f64 / self.lines_framed as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_values_keep_first_position() {
        let mut values = SampleValues::new();
        values.insert("a", 1.0);
        values.insert("b", 2.0);
        values.insert("a", 3.0);

        let names: Vec<_> = values.names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(values.get("a"), Some(3.0));
        assert_eq!(values.get("missing"), None);
    }

    #[test]
    fn test_sample_values_from_iter() {
        let values: SampleValues = vec![("x", 1.5), ("y", -2.0)].into_iter().collect();
        assert_eq!(values.len(), 2);
        assert_eq!(values.get("y"), Some(-2.0));
    }

    #[test]
    fn test_empty_sample() {
        let sample = Sample::new(0, 0.0, SampleValues::new());
        assert!(sample.is_empty());
    }

    #[test]
    fn test_recording_state_flags() {
        assert!(!RecordingState::Stopped.has_sink());
        assert!(RecordingState::Paused.has_sink());
        assert!(RecordingState::Active.is_active());
        assert!(!RecordingState::Paused.is_active());
    }

    #[test]
    fn test_user_fields_parse() {
        let fields = UserFields::parse(&["1.5", " -2 ", "0.0"]).unwrap();
        assert_eq!(fields.values(), &[1.5, -2.0, 0.0]);
    }

    #[test]
    fn test_user_fields_reject_non_numeric() {
        let err = UserFields::parse(&["1.0", "abc", "0"]).unwrap_err();
        assert!(err.to_string().contains("userval2"));
    }

    #[test]
    fn test_user_fields_reject_non_finite() {
        assert!(UserFields::parse(&["inf", "0", "0"]).is_err());
        assert!(UserFields::parse(&["NaN", "0", "0"]).is_err());
    }

    #[test]
    fn test_user_fields_wrong_count() {
        assert!(UserFields::parse(&["1.0", "2.0"]).is_err());
    }

    #[test]
    fn test_decode_rate() {
        let stats = CollectionStats {
            lines_framed: 4,
            samples_decoded: 3,
            ..Default::default()
        };
        assert!((stats.decode_rate() - 75.0).abs() < 1e-9);
        assert_eq!(CollectionStats::default().decode_rate(), 100.0);
    }
}
