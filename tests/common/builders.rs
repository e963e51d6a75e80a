//! Test data builders for creating test objects

use serialvis_rs::config::{AppConfig, BaudRate, LineTerminator, SerialConfig};

/// Builder for configs tuned for fast, deterministic tests
pub struct ConfigBuilder {
    config: AppConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.serial.port = "scripted".to_string();
        config.collection.warmup_samples = 0;
        config.collection.poll_interval_ms = 1;
        Self { config }
    }

    pub fn warmup(mut self, samples: u32) -> Self {
        self.config.collection.warmup_samples = samples;
        self
    }

    pub fn window_capacity(mut self, capacity: usize) -> Self {
        self.config.collection.window_capacity = capacity;
        self
    }

    pub fn flush(mut self, threshold: usize, interval_ms: u64) -> Self {
        self.config.recording.flush_threshold = threshold;
        self.config.recording.flush_interval_ms = interval_ms;
        self
    }

    pub fn terminator(mut self, terminator: LineTerminator) -> Self {
        self.config.serial.terminator = terminator;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Serial settings for the scripted link
pub fn serial_config(terminator: LineTerminator) -> SerialConfig {
    SerialConfig {
        port: "scripted".to_string(),
        baud_rate: BaudRate::default(),
        terminator,
        read_timeout_ms: 1,
    }
}

/// `count` lines of `name:<index>` starting at `start`
pub fn telemetry_lines(name: &str, start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("{}:{}\n", name, i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new().warmup(5).flush(10, 20).build();

        assert_eq!(config.collection.warmup_samples, 5);
        assert_eq!(config.recording.flush_threshold, 10);
        assert_eq!(config.recording.flush_interval_ms, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_telemetry_lines() {
        assert_eq!(telemetry_lines("v", 2, 2), "v:2\nv:3\n");
    }
}
