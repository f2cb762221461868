//! # Record Writer
//!
//! Batch-atomic CSV writer for one logging session.
//!
//! Appended rows are staged in memory and reach the file as a single
//! `write_all` on flush, followed by `fdatasync`. A crash can therefore only
//! lose rows staged since the last flush, never half a row.
//!
//! A batch counts as written once `write_all` returns. If the write itself
//! fails, the file is cut back to the last written batch and the rows stay
//! staged. If only the sync fails, the rows are not staged again; the next
//! flush or `close` retries the sync alone, so a batch never lands twice.

use super::{encode_line, RecordRow, RecordSink, HEADER};
use crate::error::RecordError;
use chrono::{DateTime, TimeZone};
use log::{debug, error};
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Prefix of every session file name.
pub const FILE_PREFIX: &str = "ets_can_log";

/// File name for a session started at `started_at`,
/// e.g. `ets_can_log_20240611_143005.csv`.
pub fn session_file_name<Tz>(started_at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("{}_{}.csv", FILE_PREFIX, started_at.format("%Y%m%d_%H%M%S"))
}

/// CSV writer backing the durable record.
pub struct CsvRecordWriter {
    file: Option<File>,
    path: PathBuf,
    /// Encoded rows not yet written
    pending: String,
    rows_pending: u64,
    rows_written: u64,
    /// Length of the file up to the last written batch
    bytes_written: u64,
    sync_on_flush: bool,
    /// Written bytes not yet confirmed by `sync_data`
    unsynced: bool,
}

impl CsvRecordWriter {
    /// Create a new record at `path` and write the header.
    ///
    /// Fails if the file already exists; an earlier session's log is never
    /// overwritten.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, RecordError> {
        Self::create_with_sync(path, true)
    }

    /// Like [`create`](Self::create), optionally skipping the fsync on flush.
    pub fn create_with_sync(
        path: impl Into<PathBuf>,
        sync_on_flush: bool,
    ) -> Result<Self, RecordError> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| RecordError::Create {
                path: path.clone(),
                source,
            })?;

        let mut writer = CsvRecordWriter {
            file: Some(file),
            path,
            pending: String::new(),
            rows_pending: 0,
            rows_written: 0,
            bytes_written: 0,
            sync_on_flush,
            unsynced: false,
        };

        // Header counts as bytes but not as a row
        encode_line(HEADER, &mut writer.pending);
        writer.flush()?;
        debug!("Opened record file {}", writer.path.display());

        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Get current file stats
    pub fn stats(&self) -> RecordStats {
        RecordStats {
            path: self.path.clone(),
            rows_written: self.rows_written,
            rows_pending: self.rows_pending,
            bytes_written: self.bytes_written,
        }
    }

    fn write_pending(&mut self) -> Result<(), RecordError> {
        let file = self.file.as_mut().ok_or(RecordError::Closed)?;
        if let Err(source) = file.write_all(self.pending.as_bytes()) {
            if let Err(e) = self.discard_torn_tail() {
                error!(
                    "Failed to cut {} back to {} bytes: {}",
                    self.path.display(),
                    self.bytes_written,
                    e
                );
            }
            return Err(RecordError::Write {
                path: self.path.clone(),
                source,
            });
        }

        self.bytes_written += self.pending.len() as u64;
        self.rows_written += self.rows_pending;
        self.rows_pending = 0;
        self.pending.clear();
        self.unsynced = self.sync_on_flush;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), RecordError> {
        let file = self.file.as_mut().ok_or(RecordError::Closed)?;
        file.sync_data().map_err(|source| RecordError::Flush {
            path: self.path.clone(),
            source,
        })?;
        self.unsynced = false;
        Ok(())
    }

    /// Drops whatever a failed write left past the last written batch.
    fn discard_torn_tail(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.set_len(self.bytes_written)?;
            file.seek(SeekFrom::Start(self.bytes_written))?;
        }
        Ok(())
    }
}

impl RecordSink for CsvRecordWriter {
    fn append(&mut self, row: &RecordRow) -> Result<(), RecordError> {
        if self.file.is_none() {
            return Err(RecordError::Closed);
        }
        row.encode_into(&mut self.pending);
        self.rows_pending += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecordError> {
        if self.file.is_none() {
            return Err(RecordError::Closed);
        }
        if !self.pending.is_empty() {
            self.write_pending()?;
        }
        if self.unsynced {
            self.sync()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), RecordError> {
        if self.file.is_none() {
            return Ok(());
        }
        let result = self.flush();
        // Dropping the handle closes it, even when the final flush failed
        self.file = None;
        if result.is_ok() {
            debug!(
                "Closed record file {} ({} rows)",
                self.path.display(),
                self.rows_written
            );
        }
        result
    }
}

impl Drop for CsvRecordWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Failed to finalize {}: {}", self.path.display(), e);
        }
    }
}

/// Statistics for the current record file
#[derive(Debug, Clone)]
pub struct RecordStats {
    pub path: PathBuf,
    pub rows_written: u64,
    pub rows_pending: u64,
    pub bytes_written: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Annotation, RemoteEntry};
    use chrono::Utc;
    use std::fs;

    fn mark(seq: u64, label: &str) -> RecordRow {
        RecordRow::from(&RemoteEntry::Annotation(Annotation {
            sequence: seq,
            timestamp_ms: seq * 10,
            label: label.to_string(),
        }))
    }

    #[test]
    fn test_session_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 6, 11, 14, 30, 5).unwrap();
        assert_eq!(session_file_name(&at), "ets_can_log_20240611_143005.csv");
    }

    #[test]
    fn test_header_written_on_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let writer = CsvRecordWriter::create(&path).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "timestamp,id,extended,rtr,dlc,data\r\n"
        );
        assert_eq!(writer.stats().rows_written, 0);
    }

    #[test]
    fn test_rows_reach_disk_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let mut writer = CsvRecordWriter::create(&path).unwrap();

        writer.append(&mark(1, "Key ON")).unwrap();
        writer.append(&mark(2, "Shift FWD, slow")).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
        assert_eq!(writer.stats().rows_pending, 2);

        writer.flush().unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "timestamp,id,extended,rtr,dlc,data\r\n\
             10,MARK,0,0,0,Key ON\r\n\
             20,MARK,0,0,0,\"Shift FWD, slow\"\r\n"
        );

        let stats = writer.stats();
        assert_eq!(stats.rows_written, 2);
        assert_eq!(stats.rows_pending, 0);
    }

    #[test]
    fn test_close_flushes_and_rejects_further_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let mut writer = CsvRecordWriter::create_with_sync(&path, false).unwrap();

        writer.append(&mark(1, "Key OFF")).unwrap();
        writer.close().unwrap();
        assert!(writer.is_closed());
        assert!(fs::read_to_string(&path).unwrap().contains("Key OFF"));

        assert!(matches!(
            writer.append(&mark(2, "late")),
            Err(RecordError::Closed)
        ));
        // Second close is a no-op
        writer.close().unwrap();
    }

    #[test]
    fn test_drop_flushes_pending_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        {
            let mut writer = CsvRecordWriter::create(&path).unwrap();
            writer.append(&mark(1, "Engine START")).unwrap();
        }
        assert!(fs::read_to_string(&path).unwrap().contains("Engine START"));
    }

    #[test]
    fn test_torn_tail_is_cut_before_next_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let mut writer = CsvRecordWriter::create_with_sync(&path, false).unwrap();
        writer.append(&mark(1, "first")).unwrap();
        writer.flush().unwrap();

        // What an interrupted write_all leaves behind
        writer
            .file
            .as_mut()
            .unwrap()
            .write_all(b"20,MARK,0,0,0,sec")
            .unwrap();
        writer.discard_torn_tail().unwrap();

        writer.append(&mark(2, "second")).unwrap();
        writer.close().unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "timestamp,id,extended,rtr,dlc,data\r\n\
             10,MARK,0,0,0,first\r\n\
             20,MARK,0,0,0,second\r\n"
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_write_keeps_rows_staged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let mut writer = CsvRecordWriter::create(&path).unwrap();
        // Every write to /dev/full fails with ENOSPC
        writer.file = Some(OpenOptions::new().write(true).open("/dev/full").unwrap());

        writer.append(&mark(1, "lost")).unwrap();
        assert!(matches!(writer.flush(), Err(RecordError::Write { .. })));

        let stats = writer.stats();
        assert_eq!(stats.rows_written, 0);
        assert_eq!(stats.rows_pending, 1);
        assert!(matches!(writer.close(), Err(RecordError::Write { .. })));
        assert!(writer.is_closed());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_sync_does_not_write_batch_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let mut writer = CsvRecordWriter::create(&path).unwrap();

        // Writes to a FIFO succeed but fsync on it fails with EINVAL
        let fifo = dir.path().join("record.fifo");
        let made = std::process::Command::new("mkfifo")
            .arg(&fifo)
            .status()
            .unwrap();
        assert!(made.success());
        let pipe = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&fifo)
            .unwrap();
        let mut reader = pipe.try_clone().unwrap();
        writer.file = Some(pipe);

        writer.append(&mark(1, "once")).unwrap();
        assert!(matches!(writer.flush(), Err(RecordError::Flush { .. })));
        assert_eq!(writer.stats().rows_written, 1);
        assert_eq!(writer.stats().rows_pending, 0);

        // Close retries the sync, never the rows
        assert!(matches!(writer.close(), Err(RecordError::Flush { .. })));

        let mut buf = [0u8; 4096];
        let n = std::io::Read::read(&mut reader, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"10,MARK,0,0,0,once\r\n");
    }

    #[test]
    fn test_existing_file_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        fs::write(&path, "previous session\n").unwrap();

        let err = CsvRecordWriter::create(&path).err().unwrap();
        assert!(matches!(err, RecordError::Create { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous session\n");
    }
}
