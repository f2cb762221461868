//! # CAN Logger
//!
//! Records the event log of a WiFi CAN sniffer to a local CSV file.
//!
//! The sniffer keeps a ring buffer of received frames and user annotations,
//! each tagged with a sequence number, and serves the most recent window of it
//! over HTTP. This crate polls that window, drops entries it has already
//! recorded and appends the rest to a per-session record, flushing after
//! every batch.
//!
//! ```text
//! ConnectionGate ──▶ PollLoop ──▶ RecordSink (CsvRecordWriter)
//!        │              │
//!        └──── DeviceApi (HttpDevice) ────┘
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod poll;
pub mod record;
pub mod report;
pub mod types;

pub use config::LoggerConfig;
pub use device::{DeviceApi, HttpDevice};
pub use error::{FetchError, LoggerError, RecordError};
pub use poll::{ConnectionGate, GateConfig, PollConfig, PollLoop, Summary, Watermark};
pub use record::{CsvRecordWriter, RecordRow, RecordSink};
pub use report::{ConsoleReporter, Reporter};
pub use types::{DeviceStatus, RemoteEntry};
