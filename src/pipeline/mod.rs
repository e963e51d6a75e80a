//! Telemetry data path.
//!
//! Raw bytes become stored samples in four stages, all owned by the
//! controller and driven on its thread:
//!
//! ```text
//! [LineFramer] ──► decode ──► [WarmupFilter] ──► [SlidingWindow] ◄── [BatchPersister]
//!      │                                               ▲
//!      └──► raw log                                    └── snapshots for the renderer
//! ```
//!
//! # Design
//!
//! - **Single writer**: only the decode path pushes into the window; the
//!   persister and the renderer read it between pushes, so no locking.
//! - **Pure decoding**: `decode` keeps no state between lines.
//! - **Counting persister**: the persister counts pushes and copies rows
//!   out of the window when a batch is due.

pub mod decoder;
pub mod framer;
pub mod persister;
pub mod warmup;
pub mod window;

pub use decoder::{decode, decode_line, DecodedLine};
pub use framer::LineFramer;
pub use persister::{
    recording_target, BatchPersister, CsvSink, FlushReport, FlushSchedule, DEFAULT_RECORDING_FILE,
    TIME_COLUMN,
};
pub use warmup::WarmupFilter;
pub use window::{SlidingWindow, WindowRow, WindowSnapshot};
