//! Controller event loop
//!
//! This module contains the loop that runs on the backend thread and owns
//! every piece of collection state. It communicates with the frontend
//! through crossbeam channels.
//!
//! # Responsibilities
//!
//! - **Command processing**: connect, disconnect, recording, plotting and plot view commands
//! - **Ingestion**: drains [`ReaderEvent`]s into the session in arrival order
//! - **Recording**: ticks the batch persister on its own interval
//! - **Plotting**: sends window snapshots on the refresh interval while plotting is on
//! - **Statistics tracking**: reports [`CollectionStats`] periodically
//!
//! # Scheduling
//!
//! Everything happens on one thread. Each iteration of [`Controller::step`]
//! pumps the reader, handles every queued event, then runs the flush and
//! refresh tasks if their interval has elapsed. Handlers never block, so a
//! disconnect or stop takes effect before the next tick.

use crate::backend::link::SerialLink;
use crate::backend::reader::{ChannelReader, ReaderEvent};
use crate::backend::{BackendCommand, BackendMessage};
use crate::config::{AppConfig, PlotSettings, SerialConfig};
use crate::pipeline::{recording_target, BatchPersister, WindowSnapshot};
use crate::session::Session;
use crate::types::{CollectionStats, ConnectionStatus, RecordingState, UserFields};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on reads per step so commands are never starved
const MAX_PUMPS_PER_STEP: usize = 64;

/// The controller that runs the collection loop
pub struct Controller {
    /// Application configuration
    config: AppConfig,
    /// Command receiver from the frontend
    command_rx: Receiver<BackendCommand>,
    /// Message sender to the frontend
    message_tx: Sender<BackendMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Byte source over the link
    reader: ChannelReader,
    /// Events from the reader while connected
    events: Option<Receiver<ReaderEvent>>,
    /// State of the current connection
    session: Option<Session>,
    /// Batch recorder
    persister: BatchPersister,
    /// Whether snapshots are delivered on the refresh interval
    plotting: bool,
    /// Plot view settings sent with each snapshot
    plot_settings: PlotSettings,
    /// Statistics
    stats: CollectionStats,
    /// Last snapshot delivery
    last_refresh: Instant,
    /// Last time stats were sent to the frontend
    last_stats_time: Instant,
    /// Last loop iteration for rate limiting
    last_loop_time: Instant,
}

impl Controller {
    /// Create a new controller
    pub fn new(
        config: AppConfig,
        link: Box<dyn SerialLink>,
        command_rx: Receiver<BackendCommand>,
        message_tx: Sender<BackendMessage>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let persister = BatchPersister::from_config(&config.recording);
        let now = Instant::now();

        Self {
            config,
            command_rx,
            message_tx,
            running,
            reader: ChannelReader::new(link),
            events: None,
            session: None,
            persister,
            plotting: false,
            plot_settings: PlotSettings::default(),
            stats: CollectionStats::default(),
            last_refresh: now,
            last_stats_time: now,
            last_loop_time: now,
        }
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        if self.session.is_some() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn persister(&self) -> &BatchPersister {
        &self.persister
    }

    pub fn recording_state(&self) -> RecordingState {
        self.persister.state()
    }

    pub fn is_plotting(&self) -> bool {
        self.plotting
    }

    pub fn plot_settings(&self) -> &PlotSettings {
        &self.plot_settings
    }

    pub fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Copy of the current window, empty when disconnected
    pub fn snapshot(&self) -> WindowSnapshot {
        self.session
            .as_ref()
            .map(|s| s.window().snapshot())
            .unwrap_or_default()
    }

    /// Run the main loop until shutdown
    pub fn run(&mut self) {
        tracing::info!("Controller started");

        while self.running.load(Ordering::SeqCst) {
            self.process_commands();
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.step(Instant::now());
            self.rate_limit();
        }

        // Cleanup
        self.disconnect();
        if self.persister.state().has_sink() {
            self.stop_recording();
        }

        let _ = self.message_tx.send(BackendMessage::Shutdown);
        tracing::info!("Controller stopped");
    }

    /// Process pending commands from the frontend
    pub fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    /// Handle a single command
    pub fn handle_command(&mut self, cmd: BackendCommand) {
        let now = Instant::now();
        match cmd {
            BackendCommand::Connect(serial) => self.connect(serial),
            BackendCommand::Disconnect => self.disconnect(),
            BackendCommand::SetPlotting(on) => self.set_plotting(on, now),
            BackendCommand::StartRecording { path } => self.start_recording(path, now),
            BackendCommand::StopRecording => self.stop_recording(),
            BackendCommand::PauseRecording => {
                if self.persister.pause(now) {
                    self.send_recording_status();
                }
            }
            BackendCommand::ResumeRecording => {
                if self.persister.resume(now) {
                    self.send_recording_status();
                }
            }
            BackendCommand::SetUserFields(fields) => self.set_user_fields(fields),
            BackendCommand::SetAxisBound { bound, value } => {
                if value.is_finite() {
                    self.plot_settings.set_bound(bound, value);
                } else {
                    self.reject_input(format!("Axis bound must be finite, got {}", value));
                }
            }
            BackendCommand::SetYRange { lower, upper } => {
                if lower.is_finite() && upper.is_finite() {
                    self.plot_settings.set_y_range(lower, upper);
                } else {
                    self.reject_input(format!("Y range must be finite, got {}..{}", lower, upper));
                }
            }
            BackendCommand::ClearYRange => self.plot_settings.clear_y_range(),
            BackendCommand::SetBaseline(text) => {
                if let Err(e) = self.plot_settings.set_baseline_text(&text) {
                    self.reject_input(e.to_string());
                }
            }
            BackendCommand::ClearBaseline => self.plot_settings.clear_baseline(),
            BackendCommand::SendText(text) => self.send_text(&text),
            BackendCommand::RequestSnapshot => self.send_snapshot(),
            BackendCommand::RequestStats => self.send_stats(),
            BackendCommand::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// One loop iteration: ingest, then the scheduled tasks
    pub fn step(&mut self, now: Instant) {
        for _ in 0..MAX_PUMPS_PER_STEP {
            if self.reader.pump() == 0 {
                break;
            }
        }
        self.drain_events();

        self.tick_persister(now);

        if self.plotting && now.saturating_duration_since(self.last_refresh) >= self.refresh_interval() {
            self.last_refresh = now;
            if self.session.as_ref().is_some_and(|s| !s.window().is_empty()) {
                self.send_snapshot();
            }
        }

        if self.session.is_some()
            && now.saturating_duration_since(self.last_stats_time)
                >= Duration::from_millis(self.config.collection.stats_interval_ms)
        {
            self.send_stats();
            self.last_stats_time = now;
        }
    }

    fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.config.plot.refresh_interval_ms)
    }

    /// Open the port and start a new session
    fn connect(&mut self, serial: SerialConfig) {
        if let Some(session) = &self.session {
            tracing::warn!(
                "Connect ignored: already connected to '{}'",
                session.port()
            );
            return;
        }

        match self.reader.open(&serial.port, serial.baud_rate) {
            Ok(()) => {
                self.events = Some(self.reader.subscribe());
                self.session = Some(Session::new(
                    serial.port.clone(),
                    serial.baud_rate,
                    serial.terminator,
                    &self.config.collection,
                ));
                self.stats = CollectionStats::default();
                self.reader.reset_link_stats();
                self.config.serial = serial;

                tracing::info!(
                    port = %self.config.serial.port,
                    baud = %self.config.serial.baud_rate,
                    terminator = %self.config.serial.terminator,
                    "Connected"
                );
                self.send_message(BackendMessage::ConnectionStatus(ConnectionStatus::Connected));
            }
            Err(e) => {
                tracing::error!("Failed to open '{}': {}", serial.port, e);
                self.send_message(BackendMessage::ConnectionError(e));
            }
        }
    }

    /// Close the port and discard the session
    fn disconnect(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        self.reader.unsubscribe();
        self.reader.close();
        // Drop queued chunks along with the receiver
        self.events = None;

        if self.persister.state().has_sink() {
            self.stop_recording();
        }

        let port = session.port().to_string();
        session.end();

        tracing::info!("Disconnected from '{}'", port);
        self.send_message(BackendMessage::ConnectionStatus(ConnectionStatus::Disconnected));
    }

    fn drain_events(&mut self) {
        let Some(events) = &self.events else {
            return;
        };
        let pending: Vec<ReaderEvent> = events.try_iter().collect();

        for event in pending {
            match event {
                ReaderEvent::DataAvailable(chunk) => self.ingest(&chunk),
                ReaderEvent::LinkLost(reason) => {
                    self.send_message(BackendMessage::LinkLost(reason));
                    self.disconnect();
                    return;
                }
            }
        }
    }

    fn ingest(&mut self, chunk: &[u8]) {
        let Some(session) = &mut self.session else {
            return;
        };
        let report = session.ingest(chunk);

        self.stats.bytes_received += chunk.len() as u64;
        self.stats.lines_framed += report.lines.len() as u64;
        self.stats.samples_decoded += (report.stored + report.warmup_skipped) as u64;
        self.stats.samples_stored += report.stored as u64;
        self.stats.warmup_skipped += report.warmup_skipped as u64;
        self.stats.undecoded_lines += report.undecoded as u64;
        self.stats.skipped_tokens += report.skipped_tokens as u64;

        for _ in 0..report.stored {
            self.persister.record_push();
        }
        for line in report.lines {
            self.try_send_message(BackendMessage::RawLine(line));
        }
    }

    fn tick_persister(&mut self, now: Instant) {
        let Some(session) = &self.session else {
            return;
        };

        match self.persister.tick(now, session.window()) {
            Ok(Some(report)) => {
                self.stats.rows_written = self.persister.rows_written();
                self.stats.batches_flushed = self.persister.batches_flushed();
                self.try_send_message(BackendMessage::BatchFlushed {
                    rows: report.rows,
                    pending: report.pending,
                });
            }
            Ok(None) => {}
            Err(e) => {
                self.send_message(BackendMessage::RecordingError(e.to_string()));
                self.send_recording_status();
            }
        }
    }

    fn set_plotting(&mut self, on: bool, now: Instant) {
        if self.plotting == on {
            return;
        }
        self.plotting = on;
        // First snapshot goes out on the next step
        self.last_refresh = now.checked_sub(self.refresh_interval()).unwrap_or(now);
        tracing::info!("Plotting {}", if on { "on" } else { "off" });
    }

    fn start_recording(&mut self, path: Option<PathBuf>, now: Instant) {
        let Some(path) = path.or_else(|| self.config.recording.file_path.clone()) else {
            self.send_message(BackendMessage::RecordingError(
                "No recording file configured".to_string(),
            ));
            return;
        };
        let path = recording_target(&path);

        // Columns are fixed by whatever the window has seen so far
        let variables = self
            .session
            .as_ref()
            .map(|session| session.window().variables())
            .unwrap_or(&[]);
        if variables.is_empty() {
            tracing::warn!(?path, "Recording started before any variable was seen");
        }

        match self.persister.start(&path, variables, now) {
            Ok(()) => {
                self.config.recording.file_path = Some(path);
                self.send_recording_status();
            }
            Err(e) => {
                tracing::error!("Failed to start recording: {}", e);
                self.send_message(BackendMessage::RecordingError(e.to_string()));
            }
        }
    }

    fn stop_recording(&mut self) {
        if !self.persister.state().has_sink() {
            return;
        }
        let dropped = self.persister.stop();
        if dropped > 0 {
            tracing::debug!(dropped, "Partial batch discarded on stop");
        }
        self.send_recording_status();
    }

    fn set_user_fields(&mut self, fields: UserFields) {
        if !fields.is_valid() {
            self.reject_input("User fields must be finite numbers".to_string());
            return;
        }
        self.persister.set_user_fields(fields);
        self.config.recording.user_fields = fields;
    }

    fn send_text(&mut self, text: &str) {
        if let Err(e) = self.reader.write(text) {
            tracing::warn!("Failed to send text: {}", e);
            self.send_message(BackendMessage::WriteError(e.to_string()));
        }
    }

    fn send_snapshot(&mut self) {
        let snapshot = self.snapshot();
        self.try_send_message(BackendMessage::Snapshot {
            snapshot,
            view: self.plot_settings.clone(),
        });
    }

    fn send_recording_status(&mut self) {
        let state = self.persister.state();
        let path = self.persister.path().map(|p| p.to_path_buf());
        self.send_message(BackendMessage::RecordingStatus { state, path });
    }

    /// Send statistics to the frontend (using try_send for backpressure)
    fn send_stats(&mut self) {
        self.stats.rows_written = self.persister.rows_written();
        self.stats.batches_flushed = self.persister.batches_flushed();
        let stats = self.stats.clone();
        self.try_send_message(BackendMessage::Stats(stats));
    }

    /// Sleep to keep the loop near the configured poll interval
    fn rate_limit(&mut self) {
        let target = Duration::from_millis(self.config.collection.poll_interval_ms);
        if target.is_zero() {
            std::thread::yield_now();
            return;
        }

        let elapsed = self.last_loop_time.elapsed();
        if elapsed < target {
            std::thread::sleep(target - elapsed);
        }
        self.last_loop_time = Instant::now();
    }

    fn reject_input(&self, reason: String) {
        tracing::warn!("Input rejected: {}", reason);
        self.send_message(BackendMessage::InputRejected(reason));
    }

    /// Status and error messages are never dropped
    fn send_message(&self, msg: BackendMessage) {
        let _ = self.message_tx.send(msg);
    }

    /// Try to send a message, tracking dropped messages if queue is full
    ///
    /// Uses try_send() to avoid blocking. If the queue is full, the message
    /// is dropped and the dropped_messages counter is incremented.
    fn try_send_message(&mut self, msg: BackendMessage) {
        if self.message_tx.try_send(msg).is_err() {
            self.stats.dropped_messages += 1;
        }
    }
}
