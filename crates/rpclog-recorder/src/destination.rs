use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use rpclog_codec::{CodecError, Record, TranscriptWriter};

use crate::error::{RecorderError, Result};

/// A transcript directory plus a time-based file-name pattern.
///
/// The file is opened for append, written once and closed for every
/// record; no handle outlives a single append. A write that fails part
/// way is rolled back so the file never ends in a partial line.
#[derive(Debug, Clone)]
pub struct Destination {
    dir: PathBuf,
    pattern: String,
}

impl Destination {
    /// Validate the directory and the pattern.
    pub fn new(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        let pattern = pattern.into();

        if !dir.is_dir() {
            return Err(RecorderError::MissingDirectory(dir));
        }
        if pattern.is_empty() {
            return Err(RecorderError::InvalidPattern {
                pattern,
                reason: "pattern is empty".to_string(),
            });
        }
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(RecorderError::InvalidPattern {
                pattern,
                reason: "unsupported strftime specifier".to_string(),
            });
        }

        Ok(Self { dir, pattern })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// File a record written at `when` goes to.
    pub fn path_at(&self, when: DateTime<Local>) -> Result<PathBuf> {
        let mut file_name = String::new();
        write!(
            file_name,
            "{}",
            when.format_with_items(StrftimeItems::new(&self.pattern))
        )
        .map_err(|_| RecorderError::InvalidPattern {
            pattern: self.pattern.clone(),
            reason: format!("cannot be rendered for {when}"),
        })?;
        Ok(self.dir.join(file_name))
    }

    /// File a record written now goes to.
    pub fn current_path(&self) -> Result<PathBuf> {
        self.path_at(Local::now())
    }

    /// Append one encoded record to the current file.
    pub fn append(&self, record: &Record<'_>) -> Result<PathBuf> {
        let path = self.current_path()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| RecorderError::Open {
                path: path.clone(),
                source,
            })?;

        append_line(&mut file, record).map_err(|source| RecorderError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Sinks whose length can be read and cut back.
trait Truncate {
    fn len(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Write one record, truncating the sink to its previous length on failure.
fn append_line<F: Write + Truncate>(
    sink: &mut F,
    record: &Record<'_>,
) -> std::result::Result<(), CodecError> {
    let start = sink.len().ok();
    let result = TranscriptWriter::new(&mut *sink).write_record(record);
    if let (Err(_), Some(start)) = (&result, start) {
        if let Err(err) = sink.truncate(start) {
            tracing::warn!(error = %err, "couldn't roll back a partially written record");
        }
    }
    result
}
