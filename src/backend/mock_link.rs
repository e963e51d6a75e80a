//! Mock serial link for testing without hardware
//!
//! This module provides a simulated serial device that emits telemetry
//! lines in the `name:value` format. It can be used for:
//!
//! - Unit testing the controller without a device attached
//! - Demonstrating the plot and recorder with `serialvis --mock`
//! - Reproducing awkward chunking by scripting exact byte chunks
//!
//! # Data Patterns
//!
//! Each generated channel follows one [`MockDataPattern`]:
//!
//! - [`MockDataPattern::Constant`] - Fixed value
//! - [`MockDataPattern::Sine`] - Sinusoidal wave with configurable frequency/amplitude
//! - [`MockDataPattern::Counter`] - Incrementing counter with wrap-around
//! - [`MockDataPattern::Random`] - Random values within a range
//! - [`MockDataPattern::Sawtooth`] - Linear ramp that resets periodically
//!
//! # Example
//!
//! ```ignore
//! use serialvis_rs::backend::mock_link::{MockSerialLink, MockDataPattern};
//!
//! let link = MockSerialLink::new()
//!     .with_channel("temp", MockDataPattern::Sine { frequency: 0.5, amplitude: 5.0, offset: 22.0 })
//!     .with_line_interval(Duration::from_millis(10));
//! let handle = link.handle();
//! handle.push_chunk(b"hum:61\n");
//! ```

use crate::backend::link::{LinkStats, SerialLink};
use crate::config::{BaudRate, LineTerminator};
use crate::error::{OpenError, Result, SerialVisError};
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Most lines generated by a single read after a long stall
const MAX_LINES_PER_READ: u32 = 100;

/// Data generation pattern for a mock channel
#[derive(Debug, Clone, PartialEq)]
pub enum MockDataPattern {
    /// Constant value
    Constant(f64),
    /// Sine wave with frequency and amplitude
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Counter that increments
    Counter { step: f64, min: f64, max: f64 },
    /// Random values within range
    Random { min: f64, max: f64 },
    /// Sawtooth wave
    Sawtooth { period: f64, amplitude: f64 },
}

impl Default for MockDataPattern {
    fn default() -> Self {
        MockDataPattern::Sine {
            frequency: 1.0,
            amplitude: 100.0,
            offset: 0.0,
        }
    }
}

/// One named value in every generated line
#[derive(Debug, Clone)]
pub struct MockChannel {
    /// Token name
    pub name: String,
    /// Data generation pattern
    pub pattern: MockDataPattern,
    /// Current counter value (for Counter pattern)
    counter_value: f64,
}

impl MockChannel {
    pub fn new(name: impl Into<String>, pattern: MockDataPattern) -> Self {
        let counter_value = match pattern {
            MockDataPattern::Counter { min, step, .. } => min - step,
            _ => 0.0,
        };
        Self {
            name: name.into(),
            pattern,
            counter_value,
        }
    }

    /// Generate a value based on the pattern and elapsed time
    pub fn generate_value(&mut self, elapsed_secs: f64) -> f64 {
        match self.pattern {
            MockDataPattern::Constant(v) => v,
            MockDataPattern::Sine {
                frequency,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * std::f64::consts::PI * frequency * elapsed_secs).sin(),
            MockDataPattern::Counter { step, min, max } => {
                self.counter_value += step;
                if self.counter_value > max {
                    self.counter_value = min;
                } else if self.counter_value < min {
                    self.counter_value = max;
                }
                self.counter_value
            }
            MockDataPattern::Random { min, max } => min + rand_simple() * (max - min),
            MockDataPattern::Sawtooth { period, amplitude } => {
                let t = elapsed_secs % period;
                amplitude * (t / period)
            }
        }
    }
}

/// Simple pseudo-random number generator (xorshift, no external dependency)
fn rand_simple() -> f64 {
    use std::cell::Cell;
    thread_local! {
        static SEED: Cell<u64> = const { Cell::new(0x5EED_1234) };
    }
    SEED.with(|seed| {
        let mut s = seed.get();
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        seed.set(s);
        (s as f64) / (u64::MAX as f64)
    })
}

/// State shared between the link and its handles
#[derive(Debug, Default)]
struct MockState {
    /// Chunks delivered one per read, in order
    script: VecDeque<Vec<u8>>,
    /// Everything written to the link
    written: Vec<u8>,
    /// Error returned by the next `open`
    open_failure: Option<OpenError>,
    /// Make the next read fail as if the cable was pulled
    fail_next_read: bool,
    /// Number of successful opens
    opens: u32,
}

fn lock_state(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Test-side handle to a [`MockSerialLink`] that has been moved into a controller
#[derive(Debug, Clone)]
pub struct MockLinkHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockLinkHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock_state(&self.state)
    }

    /// Queue bytes for a future read
    pub fn push_chunk(&self, chunk: &[u8]) {
        self.lock().script.push_back(chunk.to_vec());
    }

    /// Make the next `open` fail with `error`
    pub fn fail_next_open(&self, error: OpenError) {
        self.lock().open_failure = Some(error);
    }

    /// Make the next read report a lost link
    pub fn fail_next_read(&self) {
        self.lock().fail_next_read = true;
    }

    /// Bytes written to the link so far
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Chunks not yet consumed
    pub fn queued_chunks(&self) -> usize {
        self.lock().script.len()
    }

    pub fn open_count(&self) -> u32 {
        self.lock().opens
    }
}

/// Simulated serial device
#[derive(Debug)]
pub struct MockSerialLink {
    state: Arc<Mutex<MockState>>,
    port: Option<String>,
    channels: Vec<MockChannel>,
    terminator: LineTerminator,
    line_interval: Duration,
    opened_at: Instant,
    last_line: Instant,
    stats: LinkStats,
}

impl Default for MockSerialLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSerialLink {
    /// Create a link that only delivers scripted chunks
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            port: None,
            channels: Vec::new(),
            terminator: LineTerminator::Lf,
            line_interval: Duration::from_millis(10),
            opened_at: now,
            last_line: now,
            stats: LinkStats::default(),
        }
    }

    /// A device printing temperature, humidity and a sample counter
    pub fn demo() -> Self {
        Self::new()
            .with_channel(
                "temp",
                MockDataPattern::Sine {
                    frequency: 0.2,
                    amplitude: 4.0,
                    offset: 22.0,
                },
            )
            .with_channel("hum", MockDataPattern::Random { min: 40.0, max: 60.0 })
            .with_channel(
                "count",
                MockDataPattern::Counter {
                    step: 1.0,
                    min: 0.0,
                    max: 1000.0,
                },
            )
    }

    /// Add a generated channel
    pub fn with_channel(mut self, name: impl Into<String>, pattern: MockDataPattern) -> Self {
        self.channels.push(MockChannel::new(name, pattern));
        self
    }

    /// Time between generated lines
    pub fn with_line_interval(mut self, interval: Duration) -> Self {
        self.line_interval = interval.max(Duration::from_micros(100));
        self
    }

    /// Terminator appended to generated lines
    pub fn with_terminator(mut self, terminator: LineTerminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Handle for scripting the link after it has been boxed
    pub fn handle(&self) -> MockLinkHandle {
        MockLinkHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Render every line due since the last read
    fn generate_lines(&mut self, out: &mut Vec<u8>) {
        if self.channels.is_empty() {
            return;
        }

        let mut produced = 0;
        while self.last_line.elapsed() >= self.line_interval && produced < MAX_LINES_PER_READ {
            self.last_line += self.line_interval;
            let elapsed = self.last_line.duration_since(self.opened_at).as_secs_f64();

            let mut line = String::new();
            for (i, channel) in self.channels.iter_mut().enumerate() {
                if i > 0 {
                    line.push(' ');
                }
                let value = channel.generate_value(elapsed);
                let _ = write!(line, "{}:{:.3}", channel.name, value);
            }
            out.extend_from_slice(line.as_bytes());
            out.extend_from_slice(self.terminator.as_bytes());
            produced += 1;
        }

        if produced == MAX_LINES_PER_READ {
            // Drop the backlog instead of replaying it
            self.last_line = Instant::now();
        }
    }
}

impl SerialLink for MockSerialLink {
    fn open(&mut self, port: &str, baud_rate: BaudRate) -> std::result::Result<(), OpenError> {
        {
            let mut state = lock_state(&self.state);
            if let Some(error) = state.open_failure.take() {
                tracing::debug!("Mock open of '{}' failing: {}", port, error);
                return Err(error);
            }
            state.opens += 1;
        }

        let now = Instant::now();
        self.opened_at = now;
        self.last_line = now;
        self.port = Some(port.to_string());
        tracing::info!("Mock serial link opened on '{}' at {} baud", port, baud_rate);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(port) = self.port.take() {
            tracing::info!("Mock serial link on '{}' closed", port);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        if self.port.is_none() {
            return Err(SerialVisError::NotOpen);
        }

        let mut chunk = {
            let mut state = lock_state(&self.state);
            if std::mem::take(&mut state.fail_next_read) {
                self.stats.read_errors += 1;
                return Err(SerialVisError::Link("Mock device disconnected".to_string()));
            }
            state.script.pop_front().unwrap_or_default()
        };

        self.generate_lines(&mut chunk);
        self.stats.record_read(chunk.len());
        Ok(chunk)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.port.is_none() {
            return Err(SerialVisError::NotOpen);
        }
        lock_state(&self.state).written.extend_from_slice(data);
        self.stats.record_write(data.len());
        Ok(())
    }

    fn stats(&self) -> &LinkStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut LinkStats {
        &mut self.stats
    }
}
