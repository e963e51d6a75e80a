//! Integration tests for the controller lifecycle
//!
//! These tests validate the complete backend workflow:
//! - Connection, open failure and link loss
//! - Framing across chunk boundaries and terminators
//! - Warm-up per connection
//! - Backend message handling on a real backend thread

mod common;

use common::builders::{serial_config, telemetry_lines, ConfigBuilder};
use common::mock_helpers::{ScriptHandle, ScriptedLink};
use common::{assert_float_eq, test_timeout, wait_for};
use crossbeam_channel::bounded;
use serialvis_rs::backend::{BackendCommand, BackendMessage, Controller, SerialBackend};
use serialvis_rs::config::{AppConfig, LineTerminator};
use serialvis_rs::error::OpenError;
use serialvis_rs::types::ConnectionStatus;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn controller(config: AppConfig) -> (Controller, crossbeam_channel::Receiver<BackendMessage>, ScriptHandle) {
    let (link, handle) = ScriptedLink::new();
    let (_cmd_tx, cmd_rx) = bounded(16);
    let (msg_tx, msg_rx) = bounded(10_000);
    let running = Arc::new(AtomicBool::new(true));
    let controller = Controller::new(config, Box::new(link), cmd_rx, msg_tx, running);
    (controller, msg_rx, handle)
}

fn raw_lines(messages: &[BackendMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            BackendMessage::RawLine(line) => Some(line.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_backend_creation_and_shutdown() {
    let (link, _handle) = ScriptedLink::new();
    let (backend, frontend) = SerialBackend::with_link(ConfigBuilder::new().build(), Box::new(link));

    let handle = thread::spawn(move || backend.run());
    frontend.shutdown();

    assert!(handle.join().is_ok(), "Backend thread should exit cleanly");
    let messages = frontend.drain();
    assert!(matches!(messages.last(), Some(BackendMessage::Shutdown)));
}

#[test]
fn test_backend_streams_lines_and_snapshots() {
    let (link, script) = ScriptedLink::new();
    let (backend, frontend) = SerialBackend::with_link(ConfigBuilder::new().build(), Box::new(link));
    let handle = thread::spawn(move || backend.run());

    frontend.connect(serial_config(LineTerminator::Lf));
    let (_, connected) = wait_for(&frontend, Duration::from_secs(2), |m| {
        matches!(m, BackendMessage::ConnectionStatus(ConnectionStatus::Connected))
    });
    assert!(connected);

    script.push("temp:23.5 hum:61\n");
    script.push("temp:24.0\n");
    let (messages, done) = wait_for(&frontend, Duration::from_secs(2), |m| {
        matches!(m, BackendMessage::RawLine(line) if line == "temp:24.0")
    });
    assert!(done);
    assert_eq!(raw_lines(&messages), vec!["temp:23.5 hum:61", "temp:24.0"]);

    frontend.request_snapshot();
    let (messages, got) = wait_for(&frontend, Duration::from_secs(2), |m| {
        matches!(m, BackendMessage::Snapshot { .. })
    });
    assert!(got);
    let Some(BackendMessage::Snapshot { snapshot, .. }) = messages.last() else {
        panic!("expected a snapshot");
    };
    assert_eq!(snapshot.variables, vec!["temp", "hum"]);
    assert_eq!(snapshot.series["temp"], vec![23.5, 24.0]);
    assert_eq!(snapshot.series["hum"], vec![61.0]);

    frontend.shutdown();
    handle.join().unwrap();
}

#[test]
fn test_open_failure_then_retry() {
    let (mut controller, msg_rx, script) = controller(ConfigBuilder::new().build());
    script.fail_next_open(OpenError::Busy("scripted".to_string()));

    controller.handle_command(BackendCommand::Connect(serial_config(LineTerminator::Lf)));
    assert_eq!(controller.connection_status(), ConnectionStatus::Disconnected);
    assert!(matches!(
        msg_rx.try_recv(),
        Ok(BackendMessage::ConnectionError(OpenError::Busy(_)))
    ));

    // No automatic retry; the caller connects again
    controller.step(Instant::now());
    assert_eq!(script.open_count(), 0);

    controller.handle_command(BackendCommand::Connect(serial_config(LineTerminator::Lf)));
    assert_eq!(controller.connection_status(), ConnectionStatus::Connected);
    assert_eq!(script.open_count(), 1);
}

#[test]
fn test_line_split_across_chunks() {
    let (mut controller, _msg_rx, script) = controller(ConfigBuilder::new().build());
    controller.handle_command(BackendCommand::Connect(serial_config(LineTerminator::Lf)));

    script.push("te");
    controller.step(Instant::now());
    script.push("mp:2");
    controller.step(Instant::now());
    assert!(controller.snapshot().is_empty());

    script.push("3.5\n");
    controller.step(Instant::now());
    let snap = controller.snapshot();
    assert_eq!(snap.timestamps.len(), 1);
    assert_float_eq(snap.series["temp"][0], 23.5, 1e-12);
}

#[test]
fn test_one_chunk_two_lines_two_samples() {
    let (mut controller, msg_rx, script) = controller(ConfigBuilder::new().build());
    controller.handle_command(BackendCommand::Connect(serial_config(LineTerminator::Lf)));

    script.push("a:1\nb:2\n");
    controller.step(Instant::now());

    let snap = controller.snapshot();
    assert_eq!(snap.timestamps.len(), 2);
    assert_eq!(snap.series["a"], vec![1.0]);
    assert_eq!(snap.series["b"], vec![2.0]);
    assert_eq!(snap.variables, vec!["a", "b"]);

    let messages: Vec<_> = msg_rx.try_iter().collect();
    assert_eq!(raw_lines(&messages), vec!["a:1", "b:2"]);
}

#[test]
fn test_crlf_terminator() {
    let (mut controller, msg_rx, script) = controller(ConfigBuilder::new().build());
    controller.handle_command(BackendCommand::Connect(serial_config(LineTerminator::CrLf)));

    script.push("a:1\r\nb:2\r");
    controller.step(Instant::now());
    script.push("\n");
    controller.step(Instant::now());

    let messages: Vec<_> = msg_rx.try_iter().collect();
    assert_eq!(raw_lines(&messages), vec!["a:1", "b:2"]);
    assert_eq!(controller.snapshot().timestamps.len(), 2);
}

#[test]
fn test_undecodable_lines_reach_raw_log_only() {
    let (mut controller, msg_rx, script) = controller(ConfigBuilder::new().build());
    controller.handle_command(BackendCommand::Connect(serial_config(LineTerminator::Lf)));

    script.push("booting...\nv:abc\nv:1\n");
    controller.step(Instant::now());

    let messages: Vec<_> = msg_rx.try_iter().collect();
    assert_eq!(raw_lines(&messages), vec!["booting...", "v:abc", "v:1"]);
    assert_eq!(controller.snapshot().series["v"], vec![1.0]);
    assert_eq!(controller.stats().undecoded_lines, 2);
}

#[test]
fn test_warmup_applies_per_connection() {
    let (mut controller, _msg_rx, script) = controller(ConfigBuilder::new().warmup(3).build());
    controller.handle_command(BackendCommand::Connect(serial_config(LineTerminator::Lf)));

    script.push(telemetry_lines("v", 0, 5));
    controller.step(Instant::now());
    assert_eq!(controller.snapshot().series["v"], vec![3.0, 4.0]);

    controller.handle_command(BackendCommand::Disconnect);
    controller.handle_command(BackendCommand::Connect(serial_config(LineTerminator::Lf)));
    script.push(telemetry_lines("v", 10, 4));
    controller.step(Instant::now());
    assert_eq!(controller.snapshot().series["v"], vec![13.0]);
}

#[test]
fn test_window_keeps_most_recent_samples() {
    let config = ConfigBuilder::new().window_capacity(300).build();
    let (mut controller, _msg_rx, script) = controller(config);
    controller.handle_command(BackendCommand::Connect(serial_config(LineTerminator::Lf)));

    script.push(telemetry_lines("v", 0, 350));
    controller.step(Instant::now());

    let snap = controller.snapshot();
    assert_eq!(snap.timestamps.len(), 300);
    assert_eq!(snap.series["v"].first(), Some(&50.0));
    assert_eq!(snap.series["v"].last(), Some(&349.0));
}

#[test]
fn test_link_lost_disconnects() {
    let (link, script) = ScriptedLink::new();
    let (backend, frontend) = SerialBackend::with_link(ConfigBuilder::new().build(), Box::new(link));
    let handle = thread::spawn(move || backend.run());

    frontend.connect(serial_config(LineTerminator::Lf));
    let (_, connected) = wait_for(&frontend, Duration::from_secs(2), |m| {
        matches!(m, BackendMessage::ConnectionStatus(ConnectionStatus::Connected))
    });
    assert!(connected);

    script.fail_next_read();
    let (messages, disconnected) = wait_for(&frontend, Duration::from_secs(2), |m| {
        matches!(m, BackendMessage::ConnectionStatus(ConnectionStatus::Disconnected))
    });
    assert!(disconnected);
    assert!(messages.iter().any(|m| matches!(m, BackendMessage::LinkLost(_))));

    frontend.shutdown();
    handle.join().unwrap();
}

#[test]
fn test_send_text_reaches_device() {
    let (mut controller, msg_rx, script) = controller(ConfigBuilder::new().build());

    controller.handle_command(BackendCommand::SendText("start\n".to_string()));
    assert!(matches!(msg_rx.try_recv(), Ok(BackendMessage::WriteError(_))));

    controller.handle_command(BackendCommand::Connect(serial_config(LineTerminator::Lf)));
    controller.handle_command(BackendCommand::SendText("start\n".to_string()));
    assert_eq!(script.written(), b"start\n");
}

#[test]
fn test_no_snapshots_while_plotting_off() {
    let (link, script) = ScriptedLink::new();
    let (backend, frontend) = SerialBackend::with_link(ConfigBuilder::new().build(), Box::new(link));
    let handle = thread::spawn(move || backend.run());

    frontend.connect(serial_config(LineTerminator::Lf));
    script.push("v:1\n");
    let (messages, _) = wait_for(&frontend, test_timeout() * 3, |_| false);
    assert!(!messages
        .iter()
        .any(|m| matches!(m, BackendMessage::Snapshot { .. })));

    frontend.set_plotting(true);
    let (_, got) = wait_for(&frontend, Duration::from_secs(2), |m| {
        matches!(m, BackendMessage::Snapshot { .. })
    });
    assert!(got);

    frontend.shutdown();
    handle.join().unwrap();
}

#[test]
#[cfg(feature = "mock-serial")]
fn test_backend_with_mock_device() {
    let link = common::mock_helpers::create_test_mock_link();
    let (backend, frontend) = SerialBackend::with_link(ConfigBuilder::new().build(), Box::new(link));
    let handle = thread::spawn(move || backend.run());

    frontend.connect(serial_config(LineTerminator::Lf));
    let (_, got) = wait_for(&frontend, Duration::from_secs(2), |m| {
        matches!(m, BackendMessage::RawLine(line) if line.starts_with("wave:"))
    });
    assert!(got, "Mock device should produce telemetry lines");

    frontend.shutdown();
    handle.join().unwrap();
}
