use std::path::PathBuf;

/// Errors that can occur while recording gateway traffic.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// The configured log directory is missing or not a directory.
    #[error("log directory '{}' does not exist or is not a directory", .0.display())]
    MissingDirectory(PathBuf),

    /// The file-name pattern is not a valid strftime pattern.
    #[error("invalid file name pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The transcript file could not be opened for append.
    #[error("couldn't open log file '{}' for writing: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing a record to the transcript failed.
    #[error("failed writing to log file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: rpclog_codec::CodecError,
    },
}

pub type Result<T> = std::result::Result<T, RecorderError>;
