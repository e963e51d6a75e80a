//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use serialvis_rs::backend::{BackendMessage, FrontendReceiver};
use std::time::{Duration, Instant};

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_millis(100)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Collect messages until one matches `pred` or `timeout` passes
///
/// Returns everything received, including the matching message, and whether
/// a match was seen.
pub fn wait_for<F>(
    frontend: &FrontendReceiver,
    timeout: Duration,
    mut pred: F,
) -> (Vec<BackendMessage>, bool)
where
    F: FnMut(&BackendMessage) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        match frontend.recv_timeout(Duration::from_millis(10)) {
            Ok(Some(msg)) => {
                let matched = pred(&msg);
                seen.push(msg);
                if matched {
                    return (seen, true);
                }
            }
            Ok(None) => {}
            Err(_) => break,
        }
    }
    (seen, false)
}
