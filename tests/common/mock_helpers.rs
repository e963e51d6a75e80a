//! Mock construction helpers

use crossbeam_channel::{bounded, Receiver, Sender};
use serialvis_rs::backend::{LinkStats, SerialLink};
use serialvis_rs::config::BaudRate;
use serialvis_rs::error::{OpenError, Result, SerialVisError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[cfg(feature = "mock-serial")]
use serialvis_rs::backend::{MockDataPattern, MockSerialLink};

/// Create test channels with default size
pub fn create_test_channels<T, U>() -> (Sender<T>, Receiver<T>, Sender<U>, Receiver<U>) {
    let (tx1, rx1) = bounded(16);
    let (tx2, rx2) = bounded(16);
    (tx1, rx1, tx2, rx2)
}

#[derive(Default)]
struct ScriptState {
    chunks: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    open_failure: Option<OpenError>,
    fail_next_read: bool,
    opens: usize,
}

/// Link that replays chunks pushed through its [`ScriptHandle`]
pub struct ScriptedLink {
    state: Arc<Mutex<ScriptState>>,
    open: bool,
    stats: LinkStats,
}

/// Shared handle for feeding a [`ScriptedLink`] from the test thread
#[derive(Clone)]
pub struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

fn lock(state: &Mutex<ScriptState>) -> MutexGuard<'_, ScriptState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl ScriptedLink {
    pub fn new() -> (Self, ScriptHandle) {
        let state = Arc::new(Mutex::new(ScriptState::default()));
        let link = Self {
            state: state.clone(),
            open: false,
            stats: LinkStats::default(),
        };
        (link, ScriptHandle { state })
    }
}

impl ScriptHandle {
    pub fn push(&self, chunk: impl AsRef<[u8]>) {
        lock(&self.state).chunks.push_back(chunk.as_ref().to_vec());
    }

    pub fn fail_next_open(&self, err: OpenError) {
        lock(&self.state).open_failure = Some(err);
    }

    pub fn fail_next_read(&self) {
        lock(&self.state).fail_next_read = true;
    }

    pub fn written(&self) -> Vec<u8> {
        lock(&self.state).written.clone()
    }

    pub fn pending_chunks(&self) -> usize {
        lock(&self.state).chunks.len()
    }

    pub fn open_count(&self) -> usize {
        lock(&self.state).opens
    }
}

impl SerialLink for ScriptedLink {
    fn open(&mut self, _port: &str, _baud_rate: BaudRate) -> std::result::Result<(), OpenError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.open_failure.take() {
            return Err(err);
        }
        state.opens += 1;
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        if !self.open {
            return Err(SerialVisError::NotOpen);
        }
        let mut state = lock(&self.state);
        if state.fail_next_read {
            state.fail_next_read = false;
            return Err(SerialVisError::Link("device unplugged".to_string()));
        }
        let chunk = state.chunks.pop_front().unwrap_or_default();
        drop(state);
        self.stats.record_read(chunk.len());
        Ok(chunk)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(SerialVisError::NotOpen);
        }
        lock(&self.state).written.extend_from_slice(data);
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

#[cfg(feature = "mock-serial")]
pub fn create_test_mock_link() -> MockSerialLink {
    MockSerialLink::new().with_channel(
        "wave",
        MockDataPattern::Sine {
            frequency: 1.0,
            amplitude: 100.0,
            offset: 0.0,
        },
    )
}
