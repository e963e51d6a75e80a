//! Serial port link backed by the `serialport` crate
//!
//! Reads are non-blocking from the controller's point of view: only the
//! bytes already queued in the driver are read, so an idle port costs one
//! `bytes_to_read` call per loop iteration.

use crate::backend::link::{LinkStats, SerialLink};
use crate::config::{BaudRate, SerialConfig};
use crate::error::{OpenError, Result, SerialVisError};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Largest chunk pulled from the driver in one read
const MAX_CHUNK_LEN: usize = 4096;

/// A physical or virtual serial port
pub struct SerialPortLink {
    port: Option<Box<dyn SerialPort>>,
    name: String,
    read_timeout: Duration,
    buffer: Vec<u8>,
    stats: LinkStats,
}

impl std::fmt::Debug for SerialPortLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortLink")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

impl SerialPortLink {
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            port: None,
            name: String::new(),
            read_timeout,
            buffer: vec![0; MAX_CHUNK_LEN],
            stats: LinkStats::default(),
        }
    }

    pub fn from_config(config: &SerialConfig) -> Self {
        Self::new(Duration::from_millis(config.read_timeout_ms))
    }

    /// Name of the open port, empty when closed
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SerialLink for SerialPortLink {
    fn open(&mut self, port: &str, baud_rate: BaudRate) -> std::result::Result<(), OpenError> {
        let handle = serialport::new(port, baud_rate.value())
            .timeout(self.read_timeout)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| map_open_error(port, e))?;

        tracing::debug!("Serial port '{}' opened at {} baud", port, baud_rate);
        self.port = Some(handle);
        self.name = port.to_string();
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::debug!("Serial port '{}' closed", self.name);
        }
        self.name.clear();
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let port = self.port.as_mut().ok_or(SerialVisError::NotOpen)?;

        let queued = port.bytes_to_read().map_err(|e| {
            self.stats.read_errors += 1;
            SerialVisError::Link(format!("Failed to query '{}': {}", self.name, e))
        })? as usize;
        if queued == 0 {
            return Ok(Vec::new());
        }

        let len = queued.min(self.buffer.len());
        match port.read(&mut self.buffer[..len]) {
            Ok(n) => {
                self.stats.record_read(n);
                Ok(self.buffer[..n].to_vec())
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                Ok(Vec::new())
            }
            Err(e) => {
                self.stats.read_errors += 1;
                Err(SerialVisError::Link(format!(
                    "Read from '{}' failed: {}",
                    self.name, e
                )))
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(SerialVisError::NotOpen)?;

        match port.write_all(data).and_then(|_| port.flush()) {
            Ok(()) => {
                self.stats.record_write(data.len());
                Ok(())
            }
            Err(e) => {
                self.stats.write_errors += 1;
                Err(SerialVisError::Link(format!(
                    "Write to '{}' failed: {}",
                    self.name, e
                )))
            }
        }
    }

    fn stats(&self) -> &LinkStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut LinkStats {
        &mut self.stats
    }
}

/// Classify a driver error into the open failures callers can act on
fn map_open_error(port: &str, err: serialport::Error) -> OpenError {
    use serialport::ErrorKind as Kind;

    let port = port.to_string();
    match err.kind() {
        Kind::NoDevice => OpenError::Busy(port),
        Kind::Io(ErrorKind::NotFound) => OpenError::NotFound(port),
        Kind::Io(ErrorKind::PermissionDenied) => OpenError::PermissionDenied(port),
        Kind::Io(ErrorKind::AddrInUse) | Kind::Io(ErrorKind::WouldBlock) => OpenError::Busy(port),
        Kind::InvalidInput => OpenError::InvalidSettings {
            port,
            message: err.description,
        },
        _ if err.description.to_ascii_lowercase().contains("busy") => OpenError::Busy(port),
        _ => OpenError::Other {
            port,
            message: err.description,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(kind: serialport::ErrorKind, description: &str) -> serialport::Error {
        serialport::Error::new(kind, description)
    }

    #[test]
    fn test_map_open_errors() {
        use serialport::ErrorKind as Kind;

        assert_eq!(
            map_open_error("COM3", err(Kind::Io(ErrorKind::NotFound), "no such file")),
            OpenError::NotFound("COM3".to_string())
        );
        assert_eq!(
            map_open_error("COM3", err(Kind::Io(ErrorKind::PermissionDenied), "denied")),
            OpenError::PermissionDenied("COM3".to_string())
        );
        assert_eq!(
            map_open_error("COM3", err(Kind::NoDevice, "in use")),
            OpenError::Busy("COM3".to_string())
        );
        assert_eq!(
            map_open_error("COM3", err(Kind::Unknown, "Device or resource busy")),
            OpenError::Busy("COM3".to_string())
        );
        assert!(matches!(
            map_open_error("COM3", err(Kind::InvalidInput, "bad baud")),
            OpenError::InvalidSettings { .. }
        ));
        assert!(matches!(
            map_open_error("COM3", err(Kind::Unknown, "???")),
            OpenError::Other { .. }
        ));
    }

    #[test]
    fn test_closed_link() {
        let mut link = SerialPortLink::new(Duration::from_millis(10));
        assert!(!link.is_open());
        assert!(matches!(link.read_available(), Err(SerialVisError::NotOpen)));
        assert!(matches!(link.write(b"x"), Err(SerialVisError::NotOpen)));
        link.close();
    }

    #[test]
    fn test_open_missing_port_fails() {
        let mut link = SerialPortLink::new(Duration::from_millis(10));
        let result = link.open("/dev/serialvis-does-not-exist", BaudRate::default());
        assert!(result.is_err());
        assert!(!link.is_open());
    }
}
