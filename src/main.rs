//! Serial Telemetry Monitor - Main Entry Point
//!
//! Headless frontend for the collection backend. Raw telemetry lines are
//! printed to stdout as they arrive; commands are read from stdin.
//!
//! # Usage
//!
//! ```bash
//! serialvis --port /dev/ttyUSB0 --baud 115200 --record run1.csv
//! serialvis --list-ports
//! ```
//!
//! While running, lines starting with `:` are commands (`:help` lists them);
//! any other line is sent to the device followed by the line terminator.

use anyhow::{Context, Result};
use clap::Parser;
use serialvis_rs::{
    backend::{BackendCommand, BackendMessage, FrontendReceiver, SerialBackend},
    config::{AppConfig, AppState, BaudRate, LineTerminator, SerialConfig},
    types::{ConnectionStatus, UserFields},
};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "serialvis")]
#[command(about = "Serial telemetry monitor with batched CSV recording", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port to open (defaults to the last used port)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Line terminator: LF, CR or CR/LF
    #[arg(short, long)]
    terminator: Option<LineTerminator>,

    /// Samples discarded after connecting
    #[arg(long)]
    warmup: Option<u32>,

    /// Start recording to this file or directory once connected
    #[arg(short, long)]
    record: Option<PathBuf>,

    /// Initial user field values
    #[arg(long, num_args = 3, value_names = ["V1", "V2", "V3"])]
    fields: Option<Vec<String>>,

    /// Print window snapshots as JSON lines
    #[arg(long)]
    plot: bool,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Use a synthetic device instead of a serial port
    #[cfg(feature = "mock-serial")]
    #[arg(long)]
    mock: bool,
}

/// One line of user input
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Command(BackendCommand),
    Help,
    Quit,
    Invalid(String),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_file.as_deref())?;

    if cli.list_ports {
        return list_ports();
    }

    tracing::info!("Starting serial telemetry monitor");

    let mut app_state = AppState::load_or_default();
    let config = build_config(&cli, &app_state)?;
    config.validate().context("Invalid configuration")?;

    if config.serial.port.is_empty() && !use_mock(&cli) {
        anyhow::bail!("No serial port given; pass --port or run --list-ports");
    }

    let (backend, frontend) = create_backend(&cli, config.clone());
    let backend_handle = std::thread::spawn(move || backend.run());

    frontend.connect(config.serial.clone());
    if cli.plot {
        frontend.set_plotting(true);
    }
    if let Some(path) = &cli.record {
        frontend.start_recording(Some(path.clone()));
    }

    spawn_stdin_reader(frontend.command_sender.clone(), config.serial.clone());

    let result = run_frontend(&frontend, &config, &mut app_state);

    // Signal backend to stop and wait for it
    tracing::info!("Shutting down...");
    frontend.shutdown();
    if backend_handle.join().is_err() {
        tracing::error!("Backend thread panicked");
    }

    result
}

fn init_logging(
    log_file: Option<&std::path::Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,serialvis_rs=debug"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    let name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .init();
    Ok(Some(guard))
}

fn list_ports() -> Result<()> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port.port_name);
    }
    Ok(())
}

fn build_config(cli: &Cli, app_state: &AppState) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load_or_default(AppConfig::default_path()),
    };

    if let Some(port) = &cli.port {
        config.serial.port = port.clone();
    } else if config.serial.port.is_empty() {
        if let Some(last) = app_state.last_port() {
            tracing::info!("Using last port {}", last);
            config.serial.port = last.to_string();
        }
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = BaudRate::new(baud)?;
    }
    if let Some(terminator) = cli.terminator {
        config.serial.terminator = terminator;
    }
    if let Some(warmup) = cli.warmup {
        config.collection.warmup_samples = warmup;
    }
    if let Some(fields) = &cli.fields {
        config.recording.user_fields = UserFields::parse(fields.as_slice())?;
    }
    Ok(config)
}

#[cfg(feature = "mock-serial")]
fn use_mock(cli: &Cli) -> bool {
    cli.mock
}

#[cfg(not(feature = "mock-serial"))]
fn use_mock(_cli: &Cli) -> bool {
    false
}

#[cfg(feature = "mock-serial")]
fn create_backend(cli: &Cli, config: AppConfig) -> (SerialBackend, FrontendReceiver) {
    if cli.mock {
        tracing::info!("Using synthetic serial device");
        let link = serialvis_rs::backend::MockSerialLink::demo();
        return SerialBackend::with_link(config, Box::new(link));
    }
    SerialBackend::new(config)
}

#[cfg(not(feature = "mock-serial"))]
fn create_backend(_cli: &Cli, config: AppConfig) -> (SerialBackend, FrontendReceiver) {
    SerialBackend::new(config)
}

/// Read stdin on its own thread so the message loop never blocks on it
fn spawn_stdin_reader(commands: crossbeam_channel::Sender<BackendCommand>, serial: SerialConfig) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match parse_input(&line, &serial) {
                Input::Command(cmd) => {
                    if commands.send(cmd).is_err() {
                        break;
                    }
                }
                Input::Help => print_help(),
                Input::Quit => break,
                Input::Invalid(reason) => eprintln!("{}", reason),
            }
        }
        // EOF or :quit
        let _ = commands.send(BackendCommand::Shutdown);
    });
}

fn run_frontend(
    frontend: &FrontendReceiver,
    config: &AppConfig,
    app_state: &mut AppState,
) -> Result<()> {
    loop {
        let msg = match frontend.recv_timeout(Duration::from_millis(250)) {
            Ok(Some(msg)) => msg,
            Ok(None) => continue,
            Err(_) => anyhow::bail!("Backend stopped without shutting down"),
        };

        match msg {
            BackendMessage::RawLine(line) => println!("{}", line),
            BackendMessage::Snapshot { snapshot, view } => {
                let json = serde_json::json!({ "snapshot": snapshot, "view": view });
                println!("{}", json);
            }
            BackendMessage::ConnectionStatus(ConnectionStatus::Connected) => {
                eprintln!("Connected to {} at {} baud", config.serial.port, config.serial.baud_rate);
                app_state.remember_connection(&config.serial.port, config.serial.baud_rate.value());
                if let Err(e) = app_state.save() {
                    tracing::warn!("Failed to save app state: {}", e);
                }
            }
            BackendMessage::ConnectionStatus(ConnectionStatus::Disconnected) => {
                eprintln!("Disconnected");
            }
            BackendMessage::ConnectionError(e) => {
                eprintln!("Could not open serial port: {} (:connect to retry)", e);
            }
            BackendMessage::LinkLost(reason) => eprintln!("Link lost: {}", reason),
            BackendMessage::RecordingStatus { state, path } => {
                match &path {
                    Some(path) => eprintln!("Recording: {} ({})", state.display_name(), path.display()),
                    None => eprintln!("Recording: {}", state.display_name()),
                }
                if path.is_some() && app_state.last_recording_path != path {
                    app_state.last_recording_path = path;
                    if let Err(e) = app_state.save() {
                        tracing::warn!("Failed to save app state: {}", e);
                    }
                }
            }
            BackendMessage::RecordingError(e) => eprintln!("Recording error: {}", e),
            BackendMessage::BatchFlushed { rows, pending } => {
                tracing::debug!(rows, pending, "Batch flushed");
            }
            BackendMessage::WriteError(e) => eprintln!("Send failed: {}", e),
            BackendMessage::InputRejected(reason) => eprintln!("Rejected: {}", reason),
            BackendMessage::Stats(stats) => {
                tracing::debug!(
                    bytes = stats.bytes_received,
                    lines = stats.lines_framed,
                    stored = stats.samples_stored,
                    rows = stats.rows_written,
                    dropped = stats.dropped_messages,
                    "Collection stats"
                );
            }
            BackendMessage::Shutdown => return Ok(()),
        }
    }
}

fn parse_input(line: &str, serial: &SerialConfig) -> Input {
    let Some(command) = line.strip_prefix(':') else {
        let mut text = line.to_string();
        text.push_str(&String::from_utf8_lossy(serial.terminator.as_bytes()));
        return Input::Command(BackendCommand::SendText(text));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    let cmd = match (name, args.as_slice()) {
        ("record", []) => BackendCommand::StartRecording { path: None },
        ("record", [path]) => BackendCommand::StartRecording {
            path: Some(PathBuf::from(path)),
        },
        ("stop", []) => BackendCommand::StopRecording,
        ("pause", []) => BackendCommand::PauseRecording,
        ("resume", []) => BackendCommand::ResumeRecording,
        ("plot", ["on"]) => BackendCommand::SetPlotting(true),
        ("plot", ["off"]) => BackendCommand::SetPlotting(false),
        ("fields", values) => match UserFields::parse(values) {
            Ok(fields) => BackendCommand::SetUserFields(fields),
            Err(e) => return Input::Invalid(e.to_string()),
        },
        ("baseline", []) => BackendCommand::ClearBaseline,
        ("baseline", [value]) => BackendCommand::SetBaseline(value.to_string()),
        ("range", [lower, upper]) => match (lower.parse::<f64>(), upper.parse::<f64>()) {
            (Ok(lower), Ok(upper)) => BackendCommand::SetYRange { lower, upper },
            _ => return Input::Invalid(format!("Range bounds must be numbers: {} {}", lower, upper)),
        },
        ("autoscale", []) => BackendCommand::ClearYRange,
        ("snapshot", []) => BackendCommand::RequestSnapshot,
        ("stats", []) => BackendCommand::RequestStats,
        ("connect", []) => BackendCommand::Connect(serial.clone()),
        ("disconnect", []) => BackendCommand::Disconnect,
        ("help", _) => return Input::Help,
        ("quit", _) | ("q", _) => return Input::Quit,
        _ => return Input::Invalid(format!("Unknown command: {} (try :help)", line)),
    };
    Input::Command(cmd)
}

fn print_help() {
    eprintln!(
        "Commands:
  :record [path]    start recording (file or directory)
  :stop             stop recording
  :pause / :resume  pause or resume recording
  :plot on|off      print window snapshots
  :fields a b c     set the three user fields
  :baseline [x]     set or clear the baseline marker
  :range lo hi      fix the Y axis range
  :autoscale        fit the Y axis to the data
  :snapshot         print one snapshot now
  :stats            report collection statistics
  :connect          reopen the configured port
  :disconnect       close the port
  :quit             exit
Any other line is sent to the device."
    );
}
