use std::path::PathBuf;

use bytes::Bytes;

/// Default strftime pattern for transcript file names (one file per day).
pub const DEFAULT_FILE_NAME_PATTERN: &str = "rpclog-%Y%m%d.log";

/// Where and as whom a [`Recorder`](crate::Recorder) writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Directory holding transcript files. Must already exist.
    pub dir: PathBuf,
    /// strftime pattern resolved against local time on every write, so
    /// `%Y%m%d` rolls daily and `%Y%m%d%H` hourly.
    pub file_name_pattern: String,
    /// Opaque identifier stamped on every record (e.g. a session cookie).
    /// May be empty and may contain arbitrary bytes.
    pub client_identifier: Bytes,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir(),
            file_name_pattern: DEFAULT_FILE_NAME_PATTERN.to_string(),
            client_identifier: Bytes::new(),
        }
    }
}

impl RecorderConfig {
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn with_file_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_name_pattern = pattern.into();
        self
    }

    pub fn with_client_identifier(mut self, client_identifier: impl Into<Bytes>) -> Self {
        self.client_identifier = client_identifier.into();
        self
    }
}
