use std::fmt;
use std::io;

use rpclog_codec::CodecError;
use rpclog_recorder::RecorderError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    match err {
        CodecError::Open { name, source } => io_error(&format!("{context}: {name}"), source),
        CodecError::Io(source) => io_error(context, source),
        other if other.is_format_error() => {
            CliError::new(DATA_INVALID, format!("{context}: {other}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn recorder_error(context: &str, err: RecorderError) -> CliError {
    match err {
        RecorderError::MissingDirectory(_) | RecorderError::InvalidPattern { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        RecorderError::Open { path, source } => {
            io_error(&format!("{context}: {}", path.display()), source)
        }
        RecorderError::Write { path, source } => {
            codec_error(&format!("{context}: {}", path.display()), source)
        }
    }
}
