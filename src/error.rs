//! Error handling for the SerialVis-RS application
//!
//! This module defines custom error types and a Result alias for use
//! throughout the application.

use thiserror::Error;

/// Reasons a serial port can fail to open
///
/// Opening never retries on its own; the caller decides whether to try again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// The device exists but another process holds it
    #[error("Port {0} is busy")]
    Busy(String),

    /// No device with that identifier
    #[error("Port {0} not found")]
    NotFound(String),

    /// The OS refused access to the device
    #[error("Permission denied opening {0}")]
    PermissionDenied(String),

    /// The driver rejected the requested settings
    #[error("Invalid settings for {port}: {message}")]
    InvalidSettings { port: String, message: String },

    /// Anything the driver could not classify
    #[error("Failed to open {port}: {message}")]
    Other { port: String, message: String },
}

/// Main error type for SerialVis-RS operations
#[derive(Error, Debug)]
pub enum SerialVisError {
    /// Opening the serial channel failed
    #[error("Open error: {0}")]
    Open(#[from] OpenError),

    /// An operation needed an open channel
    #[error("Serial channel is not open")]
    NotOpen,

    /// Read or write failure on an open link
    #[error("Link error: {0}")]
    Link(String),

    /// Errors related to the recording sink
    #[error("Recording error: {0}")]
    Recording(String),

    /// CSV encoding/decoding errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SerialVisError>,
    },
}

impl SerialVisError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SerialVisError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for SerialVis-RS operations
pub type Result<T> = std::result::Result<T, SerialVisError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| SerialVisError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| SerialVisError::Io(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SerialVisError::Recording("sink closed".to_string());
        assert_eq!(err.to_string(), "Recording error: sink closed");
    }

    #[test]
    fn test_open_error_converts() {
        let err: SerialVisError = OpenError::Busy("/dev/ttyUSB0".to_string()).into();
        assert_eq!(err.to_string(), "Open error: Port /dev/ttyUSB0 is busy");
    }

    #[test]
    fn test_error_with_context() {
        let err = SerialVisError::NotOpen;
        let with_ctx = err.with_context("Failed to send text");
        assert!(with_ctx.to_string().contains("Failed to send text"));
        assert!(with_ctx.to_string().contains("not open"));
    }

    #[test]
    fn test_io_result_context() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        ));
        let err = res.context("Opening recording file").unwrap_err();
        assert!(err.to_string().starts_with("Opening recording file"));
    }

    // No wildcard arm: every variant must be produced somewhere
    fn is_link_failure(err: &SerialVisError) -> bool {
        match err {
            SerialVisError::Open(_) | SerialVisError::NotOpen | SerialVisError::Link(_) => true,
            SerialVisError::Recording(_)
            | SerialVisError::Csv(_)
            | SerialVisError::Config(_)
            | SerialVisError::Io(_) => false,
            SerialVisError::WithContext { source, .. } => is_link_failure(source),
        }
    }

    #[test]
    fn test_link_failures_are_classified() {
        assert!(is_link_failure(&OpenError::NotFound("COM9".to_string()).into()));
        assert!(is_link_failure(
            &SerialVisError::NotOpen.with_context("Failed to send text")
        ));
        assert!(!is_link_failure(&SerialVisError::Recording("full".to_string())));
        assert!(!is_link_failure(&SerialVisError::Config("bad".to_string())));
    }
}
