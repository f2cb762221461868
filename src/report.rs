//! Progress reporting for a logging session.
//!
//! The gate and the poll loop report through [`Reporter`] and never print
//! directly. [`ConsoleReporter`] is the terminal implementation used by the
//! binary.

use crate::error::FetchError;
use crate::poll::Summary;
use crate::types::{Annotation, DeviceStatus, Frame, RemoteEntry};
use std::io::Write;

const YELLOW_BOLD: &str = "\x1b[1;33m";
const RESET: &str = "\x1b[0m";

/// Callbacks for session progress. Every method defaults to a no-op.
pub trait Reporter {
    /// A `/status` probe failed; the gate will retry.
    fn probe_failed(&mut self, _error: &FetchError) {}

    /// The gate is satisfied.
    fn connected(&mut self, _status: &DeviceStatus) {}

    /// A `/log` fetch failed; the loop will back off and retry.
    fn fetch_failed(&mut self, _error: &FetchError) {}

    /// An entry was appended to the record (not yet flushed).
    fn entry_recorded(&mut self, _entry: &RemoteEntry) {}

    /// A non-empty batch was flushed.
    fn batch_committed(&mut self, _summary: &Summary) {}
}

/// Terminal output, in the format of the bench scripts.
#[derive(Debug, Clone)]
pub struct ConsoleReporter {
    /// Print every data frame, not just marks
    pub verbose: bool,
    /// Wrap mark lines in ANSI colour
    pub color: bool,
    /// Print a progress line each time this many more frames are logged
    pub progress_every: u64,
    last_milestone: u64,
}

impl ConsoleReporter {
    pub fn new(verbose: bool, color: bool, progress_every: u64) -> Self {
        Self {
            verbose,
            color,
            progress_every,
            last_milestone: 0,
        }
    }

    /// Returns the progress line to print after a batch, if a new multiple of
    /// `progress_every` was crossed.
    pub fn progress_line(&mut self, summary: &Summary) -> Option<String> {
        if self.progress_every == 0 {
            return None;
        }
        let milestone = summary.entries_appended / self.progress_every;
        if milestone <= self.last_milestone {
            return None;
        }
        self.last_milestone = milestone;
        Some(format!(
            "  ... {} messages, {} marks logged (seq={})",
            summary.entries_appended, summary.annotations_appended, summary.final_watermark
        ))
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new(false, true, 500)
    }
}

impl Reporter for ConsoleReporter {
    fn probe_failed(&mut self, _error: &FetchError) {
        print!(".");
        let _ = std::io::stdout().flush();
    }

    fn connected(&mut self, status: &DeviceStatus) {
        println!(" connected! Baud: {}", status.baud);
    }

    fn fetch_failed(&mut self, error: &FetchError) {
        println!("  Connection error: {}", error);
    }

    fn entry_recorded(&mut self, entry: &RemoteEntry) {
        match entry {
            RemoteEntry::Annotation(a) => println!("{}", format_mark_line(a, self.color)),
            RemoteEntry::Frame(f) if self.verbose => println!("{}", format_frame_line(f)),
            RemoteEntry::Frame(_) => {}
        }
    }

    fn batch_committed(&mut self, summary: &Summary) {
        if let Some(line) = self.progress_line(summary) {
            println!("{}", line);
        }
    }
}

/// Terminal line for an annotation.
pub fn format_mark_line(mark: &Annotation, color: bool) -> String {
    let line = format!("  {:>10}ms  >>> {}", mark.timestamp_ms, mark.label);
    if color {
        format!("{}{}{}", YELLOW_BOLD, line, RESET)
    } else {
        line
    }
}

/// Terminal line for a data frame.
pub fn format_frame_line(frame: &Frame) -> String {
    format!(
        "  {:>10}ms  0x{:03X}  DLC={}  {}",
        frame.timestamp_ms, frame.id, frame.length, frame.payload
    )
}
