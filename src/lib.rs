//! # SerialVis-RS: Serial Telemetry Monitor
//!
//! Reads `name:value` telemetry lines from a serial port, keeps the most
//! recent samples in a sliding window for live plotting, and records batches
//! of samples to CSV. The collection loop runs on its own thread, separate
//! from whatever frontend drives it.
//!
//! ## Architecture
//!
//! - **Backend**: Owns the serial link and the [`backend::Controller`] loop
//! - **Pipeline**: Framing, decoding, warm-up, the sliding window and the batch recorder
//! - **Session**: Per-connection state that is discarded on disconnect
//! - **Communication**: Crossbeam channels for thread-safe data transfer
//!
//! ## Configuration
//!
//! The TOML config lives in the platform config directory and application
//! state (recent ports, last recording file) in the data directory, both
//! under `serialvis-rs`:
//!
//! - **Linux**: `~/.config/serialvis-rs/`, `~/.local/share/serialvis-rs/`
//! - **macOS**: `~/Library/Application Support/serialvis-rs/`
//! - **Windows**: `%APPDATA%\serialvis-rs\`
//!
//! ## Example
//!
//! ```ignore
//! use serialvis_rs::{AppConfig, BackendMessage, SerialBackend};
//!
//! let mut config = AppConfig::default();
//! config.serial.port = "/dev/ttyUSB0".to_string();
//!
//! let (backend, frontend) = SerialBackend::new(config.clone());
//! std::thread::spawn(move || backend.run());
//!
//! frontend.connect(config.serial);
//! frontend.start_recording(Some("run1.csv".into()));
//!
//! while let Some(msg) = frontend.recv_timeout(std::time::Duration::from_secs(1)) {
//!     if let BackendMessage::RawLine(line) = msg {
//!         println!("{}", line);
//!     }
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use backend::{BackendCommand, BackendMessage, FrontendReceiver, SerialBackend};
pub use config::{AppConfig, AppState, PlotSettings};
pub use error::{OpenError, Result, SerialVisError};
pub use pipeline::{SlidingWindow, WindowSnapshot};
pub use types::{ConnectionStatus, RecordingState, Sample, SampleValues, UserFields};
