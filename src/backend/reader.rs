//! Event-raising byte source over a [`SerialLink`]
//!
//! The reader turns polled reads into [`ReaderEvent`]s on a crossbeam
//! channel. Each [`ChannelReader::pump`] moves whatever the link has
//! buffered into one `DataAvailable` event, so chunks are delivered in
//! arrival order and the loop that owns the reader never blocks on I/O.
//!
//! Events only flow while a subscriber is attached. Unsubscribing drops the
//! sender, which also discards nothing already queued; the controller drains
//! or drops its receiver itself.

use crate::backend::link::{LinkStats, SerialLink};
use crate::config::BaudRate;
use crate::error::{OpenError, Result, SerialVisError};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Event raised by the reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// New bytes arrived
    DataAvailable(Vec<u8>),
    /// The link failed and is no longer readable
    LinkLost(String),
}

/// Owns the link and forwards what it reads to a subscriber
pub struct ChannelReader {
    link: Box<dyn SerialLink>,
    subscriber: Option<Sender<ReaderEvent>>,
}

impl std::fmt::Debug for ChannelReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelReader")
            .field("open", &self.link.is_open())
            .field("subscribed", &self.subscriber.is_some())
            .finish()
    }
}

impl ChannelReader {
    pub fn new(link: Box<dyn SerialLink>) -> Self {
        Self {
            link,
            subscriber: None,
        }
    }

    /// Open the underlying link
    pub fn open(&mut self, port: &str, baud_rate: BaudRate) -> std::result::Result<(), OpenError> {
        if self.link.is_open() {
            self.link.close();
        }
        self.link.open(port, baud_rate)
    }

    pub fn close(&mut self) {
        self.link.close();
    }

    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    /// Send text to the device as UTF-8
    pub fn write(&mut self, text: &str) -> Result<()> {
        if !self.link.is_open() {
            return Err(SerialVisError::NotOpen);
        }
        self.link.write(text.as_bytes())
    }

    /// Attach a new subscriber, replacing any previous one
    pub fn subscribe(&mut self) -> Receiver<ReaderEvent> {
        let (tx, rx) = unbounded();
        self.subscriber = Some(tx);
        rx
    }

    /// Detach the subscriber; later reads raise no events
    pub fn unsubscribe(&mut self) {
        self.subscriber = None;
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriber.is_some()
    }

    /// Poll the link once, raising at most one event
    ///
    /// Returns the number of bytes forwarded. A read failure is raised as
    /// [`ReaderEvent::LinkLost`] and closes the link.
    pub fn pump(&mut self) -> usize {
        if !self.link.is_open() {
            return 0;
        }
        let Some(subscriber) = &self.subscriber else {
            return 0;
        };

        match self.link.read_available() {
            Ok(chunk) if chunk.is_empty() => 0,
            Ok(chunk) => {
                let len = chunk.len();
                tracing::trace!(len, "DataAvailable");
                if subscriber.send(ReaderEvent::DataAvailable(chunk)).is_err() {
                    tracing::debug!("Reader subscriber gone, dropping chunk");
                    self.subscriber = None;
                    return 0;
                }
                len
            }
            Err(e) => {
                tracing::warn!("Serial link lost: {}", e);
                let _ = subscriber.send(ReaderEvent::LinkLost(e.to_string()));
                self.link.close();
                0
            }
        }
    }

    pub fn link_stats(&self) -> &LinkStats {
        self.link.stats()
    }

    pub fn reset_link_stats(&mut self) {
        self.link.reset_stats();
    }
}
