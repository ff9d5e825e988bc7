/// Errors that stop reading a transcript stream.
///
/// Anything wrong inside an otherwise well-framed line is reported as an
/// [`EntryError`] on the returned entry instead.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The transcript could not be opened for reading.
    #[error("cannot open '{name}' for reading: {source}")]
    Open {
        name: String,
        source: std::io::Error,
    },

    /// An I/O error occurred while reading or writing a transcript.
    #[error("transcript I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The line has no record separator at all, so it was not written by this codec.
    #[error("{name}, line {line}: no 0x1e separator found")]
    MissingSeparator { name: String, line: u64 },

    /// The structural header does not match the transcript grammar.
    #[error(
        "{name}, line {line}: invalid timestamp, version, duration, number, type, \
         or client identifier length: '{header}'"
    )]
    MalformedHeader {
        name: String,
        line: u64,
        header: String,
    },
}

impl CodecError {
    /// True for errors that mean the stream is not in transcript format.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            CodecError::MissingSeparator { .. } | CodecError::MalformedHeader { .. }
        )
    }
}

/// A payload decoder rejected the bytes it was given.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A recoverable problem with a single transcript line.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntryError {
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("logfile version {found} > {supported}")]
    VersionTooNew { found: String, supported: u32 },

    #[error("unrecognized type '{0}'")]
    UnrecognizedType(String),

    #[error("client identifier not followed by blank")]
    ClientIdentifierFraming,

    #[error("non-numeric payload length '{0}'")]
    InvalidPayloadLength(String),

    #[error("payload length {declared} exceeds the {available} bytes left on the line")]
    PayloadTruncated { declared: usize, available: usize },

    #[error("payload decoding error: {0}")]
    Decode(#[from] DecodeError),

    #[error("no terminator after payload")]
    MissingTerminator,
}

pub type Result<T> = std::result::Result<T, CodecError>;
