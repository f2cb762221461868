//! # Durable Record
//!
//! The session's append-only CSV table. Column layout and sentinel values
//! are consumed by downstream tooling and must not change:
//!
//! ```text
//! timestamp,id,extended,rtr,dlc,data
//! 10,0x100,0,0,2,aa bb
//! 20,MARK,0,0,0,Shift FWD
//! ```

pub mod writer;

pub use writer::{session_file_name, CsvRecordWriter, RecordStats};

use crate::error::RecordError;
use crate::types::RemoteEntry;

/// Column names, in file order.
pub const HEADER: [&str; 6] = ["timestamp", "id", "extended", "rtr", "dlc", "data"];

/// Identifier written for annotation rows.
pub const MARK_ID: &str = "MARK";

/// Row terminator used for every line, header included.
pub const LINE_END: &str = "\r\n";

/// One row of the durable record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRow {
    pub timestamp_ms: u64,
    /// `0x`-prefixed upper-case hex, or [`MARK_ID`]
    pub id: String,
    /// Reserved, always 0
    pub extended: u8,
    /// Reserved, always 0
    pub rtr: u8,
    pub dlc: u8,
    /// Payload string, or the annotation label
    pub data: String,
}

impl From<&RemoteEntry> for RecordRow {
    fn from(entry: &RemoteEntry) -> Self {
        match entry {
            RemoteEntry::Annotation(a) => RecordRow {
                timestamp_ms: a.timestamp_ms,
                id: MARK_ID.to_string(),
                extended: 0,
                rtr: 0,
                dlc: 0,
                data: a.label.clone(),
            },
            RemoteEntry::Frame(f) => RecordRow {
                timestamp_ms: f.timestamp_ms,
                id: format!("0x{:X}", f.id),
                extended: 0,
                rtr: 0,
                dlc: f.length,
                data: f.payload.clone(),
            },
        }
    }
}

impl RecordRow {
    pub fn is_annotation(&self) -> bool {
        self.id == MARK_ID
    }

    /// Appends this row, terminated, to `out`.
    pub fn encode_into(&self, out: &mut String) {
        let fields = [
            self.timestamp_ms.to_string(),
            self.id.clone(),
            self.extended.to_string(),
            self.rtr.to_string(),
            self.dlc.to_string(),
            self.data.clone(),
        ];
        encode_line(fields.iter().map(String::as_str), out);
    }
}

/// Writes one CSV line with minimal quoting.
pub fn encode_line<'a>(fields: impl IntoIterator<Item = &'a str>, out: &mut String) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        encode_field(field, out);
    }
    out.push_str(LINE_END);
}

fn encode_field(field: &str, out: &mut String) {
    let needs_quotes = field.contains([',', '"', '\r', '\n']);
    if !needs_quotes {
        out.push_str(field);
        return;
    }

    out.push('"');
    for c in field.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}

/// Append + flush capability the poll loop writes through.
///
/// Rows handed to [`append`](RecordSink::append) only become durable on the
/// next [`flush`](RecordSink::flush). After [`close`](RecordSink::close)
/// the sink rejects further rows; closing twice is a no-op.
pub trait RecordSink {
    fn append(&mut self, row: &RecordRow) -> Result<(), RecordError>;

    fn flush(&mut self) -> Result<(), RecordError>;

    fn close(&mut self) -> Result<(), RecordError>;
}
