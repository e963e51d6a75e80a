//! Backend module for serial collection
//!
//! This module runs the whole data path on a separate thread so the
//! frontend never blocks on the port. It uses crossbeam channels for
//! thread-safe communication with the frontend.
//!
//! # Architecture
//!
//! The backend runs in a separate thread from the frontend, communicating via channels:
//!
//! - [`BackendCommand`] - Messages sent from frontend to backend (connect, record, plot, etc.)
//! - [`BackendMessage`] - Messages sent from backend to frontend (raw lines, snapshots, status, errors)
//! - [`FrontendReceiver`] - Frontend-side handle for sending commands and receiving messages
//! - [`SerialBackend`] - Main backend entry point that owns the controller
//!
//! # Components
//!
//! - [`SerialLink`] - Byte-stream link trait
//! - [`SerialPortLink`] - Real ports through the `serialport` crate
//! - [`MockSerialLink`] - Simulated device for testing without hardware (feature-gated)
//! - [`ChannelReader`] - Turns link reads into [`ReaderEvent`]s
//! - [`Controller`] - Session lifecycle, recording and plotting state machine
//!
//! # Example
//!
//! ```ignore
//! use serialvis_rs::backend::{BackendMessage, SerialBackend};
//! use serialvis_rs::config::AppConfig;
//!
//! let config = AppConfig::default();
//! let (backend, frontend) = SerialBackend::new(config.clone());
//!
//! // Spawn backend thread
//! std::thread::spawn(move || backend.run());
//!
//! // Send commands from the frontend
//! frontend.connect(config.serial);
//! frontend.set_plotting(true);
//!
//! // Receive messages
//! for msg in frontend.drain() {
//!     match msg {
//!         BackendMessage::RawLine(line) => println!("{}", line),
//!         _ => {}
//!     }
//! }
//! ```

pub mod controller;
pub mod link;
#[cfg(any(test, feature = "mock-serial"))]
pub mod mock_link;
pub mod reader;
pub mod serial_port;

pub use controller::Controller;
pub use link::{LinkStats, SerialLink};
#[cfg(any(test, feature = "mock-serial"))]
pub use mock_link::{MockChannel, MockDataPattern, MockLinkHandle, MockSerialLink};
pub use reader::{ChannelReader, ReaderEvent};
pub use serial_port::SerialPortLink;

use crate::config::{AppConfig, AxisBound, PlotSettings, SerialConfig};
use crate::error::OpenError;
use crate::pipeline::WindowSnapshot;
use crate::types::{CollectionStats, ConnectionStatus, RecordingState, UserFields};
use crossbeam_channel::{bounded, Receiver, RecvError, RecvTimeoutError, Sender};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Message sent from the frontend to the backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    /// Open a port and start a session
    Connect(SerialConfig),
    /// Close the port and discard the session
    Disconnect,
    /// Start or stop delivering snapshots on the refresh cadence
    SetPlotting(bool),
    /// Start recording; `None` uses the configured file
    StartRecording { path: Option<PathBuf> },
    /// Stop recording, dropping any partial batch
    StopRecording,
    /// Suspend the flush schedule
    PauseRecording,
    /// Continue the flush schedule
    ResumeRecording,
    /// Replace the three user fields written into each row
    SetUserFields(UserFields),
    /// Move one Y-axis slider
    SetAxisBound { bound: AxisBound, value: f64 },
    /// Set both Y-axis bounds
    SetYRange { lower: f64, upper: f64 },
    /// Return the Y axis to autoscale
    ClearYRange,
    /// Set the baseline marker from user text
    SetBaseline(String),
    /// Remove the baseline marker
    ClearBaseline,
    /// Send text to the device
    SendText(String),
    /// Request a snapshot now, regardless of plotting
    RequestSnapshot,
    /// Request current statistics
    RequestStats,
    /// Shutdown the backend
    Shutdown,
}

/// Message sent from the backend to the frontend
#[derive(Debug, Clone)]
pub enum BackendMessage {
    /// Connection status changed
    ConnectionStatus(ConnectionStatus),
    /// Opening the port failed; still disconnected
    ConnectionError(OpenError),
    /// The port failed while connected; a disconnect follows
    LinkLost(String),
    /// One framed line for the raw log, decoded or not
    RawLine(String),
    /// Window contents for the renderer
    Snapshot {
        snapshot: WindowSnapshot,
        view: PlotSettings,
    },
    /// Recording state changed
    RecordingStatus {
        state: RecordingState,
        path: Option<PathBuf>,
    },
    /// Recording failed and has stopped
    RecordingError(String),
    /// A batch was written
    BatchFlushed { rows: usize, pending: usize },
    /// Sending text to the device failed
    WriteError(String),
    /// A command carried a value the backend refused
    InputRejected(String),
    /// Statistics update
    Stats(CollectionStats),
    /// Backend is shutting down
    Shutdown,
}

/// Frontend receiver for backend messages
pub struct FrontendReceiver {
    /// Receiver for backend messages
    pub receiver: Receiver<BackendMessage>,
    /// Sender for commands to the backend
    pub command_sender: Sender<BackendCommand>,
}

impl FrontendReceiver {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<BackendMessage> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for a message
    ///
    /// Returns `Ok(None)` on timeout and `Err(RecvError)` once the backend
    /// is gone and every message it sent has been received.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<BackendMessage>, RecvError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(msg) => Ok(Some(msg)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(RecvError),
        }
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<BackendMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Send a command to the backend
    pub fn send_command(&self, cmd: BackendCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    /// Request connection to a port
    pub fn connect(&self, serial: SerialConfig) {
        let _ = self.command_sender.send(BackendCommand::Connect(serial));
    }

    /// Request disconnection
    pub fn disconnect(&self) {
        let _ = self.command_sender.send(BackendCommand::Disconnect);
    }

    /// Turn snapshot delivery on or off
    pub fn set_plotting(&self, on: bool) {
        let _ = self.command_sender.send(BackendCommand::SetPlotting(on));
    }

    /// Start recording
    pub fn start_recording(&self, path: Option<PathBuf>) {
        let _ = self
            .command_sender
            .send(BackendCommand::StartRecording { path });
    }

    /// Stop recording
    pub fn stop_recording(&self) {
        let _ = self.command_sender.send(BackendCommand::StopRecording);
    }

    /// Pause recording
    pub fn pause_recording(&self) {
        let _ = self.command_sender.send(BackendCommand::PauseRecording);
    }

    /// Resume recording
    pub fn resume_recording(&self) {
        let _ = self.command_sender.send(BackendCommand::ResumeRecording);
    }

    /// Update the user fields
    pub fn set_user_fields(&self, fields: UserFields) {
        let _ = self
            .command_sender
            .send(BackendCommand::SetUserFields(fields));
    }

    /// Send text to the device
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self
            .command_sender
            .send(BackendCommand::SendText(text.into()));
    }

    /// Ask for a snapshot
    pub fn request_snapshot(&self) {
        let _ = self.command_sender.send(BackendCommand::RequestSnapshot);
    }

    /// Ask for statistics
    pub fn request_stats(&self) {
        let _ = self.command_sender.send(BackendCommand::RequestStats);
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        let _ = self.command_sender.send(BackendCommand::Shutdown);
    }
}

/// The serial backend that runs in a separate thread
pub struct SerialBackend {
    /// Configuration
    config: AppConfig,
    /// Link the controller reads from
    link: Box<dyn SerialLink>,
    /// Receiver for commands from the frontend
    command_receiver: Receiver<BackendCommand>,
    /// Sender for messages to the frontend
    message_sender: Sender<BackendMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
}

impl SerialBackend {
    /// Create a backend on a real serial port
    pub fn new(config: AppConfig) -> (Self, FrontendReceiver) {
        let link = Box::new(SerialPortLink::from_config(&config.serial));
        Self::with_link(config, link)
    }

    /// Create a backend on any link
    pub fn with_link(config: AppConfig, link: Box<dyn SerialLink>) -> (Self, FrontendReceiver) {
        let (cmd_tx, cmd_rx) = bounded(256);
        // Bounded for backpressure; raw lines and snapshots are dropped, not queued forever
        let (msg_tx, msg_rx) = bounded(10_000);

        let backend = Self {
            config,
            link,
            command_receiver: cmd_rx,
            message_sender: msg_tx,
            running: Arc::new(AtomicBool::new(true)),
        };

        let frontend = FrontendReceiver {
            receiver: msg_rx,
            command_sender: cmd_tx,
        };

        (backend, frontend)
    }

    /// Run the backend loop
    pub fn run(self) {
        let mut controller = Controller::new(
            self.config,
            self.link,
            self.command_receiver,
            self.message_sender,
            self.running,
        );
        controller.run();
    }

    /// Get a handle to stop the backend
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}
