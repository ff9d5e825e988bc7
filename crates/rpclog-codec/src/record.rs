//! Record types and the writer-side record description.

use std::borrow::Cow;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Transcript format version written by this codec.
pub const FORMAT_VERSION: u32 = 2;

/// Duration token meaning "no paired request/response".
pub const DURATION_UNKNOWN: &str = "-";

/// Sequence display value when a line carries no `#seq` group.
pub const SEQUENCE_UNKNOWN: &str = "?";

/// The kind of event a transcript line records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// Request observed without a paired response.
    Request,
    /// Response observed without a preceding request.
    Response,
    /// Request and response paired, with a known round-trip duration.
    Transaction,
}

impl RecordType {
    /// On-disk token.
    pub fn token(self) -> &'static str {
        match self {
            RecordType::Request => "RQT",
            RecordType::Response => "RPT",
            RecordType::Transaction => "TRN",
        }
    }

    /// Parse an on-disk token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "RQT" => Some(RecordType::Request),
            "RPT" => Some(RecordType::Response),
            "TRN" => Some(RecordType::Transaction),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            RecordType::Request => "Request",
            RecordType::Response => "Response",
            RecordType::Transaction => "Transaction",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A type token as read back from a file, recognized or not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordTag {
    Known(RecordType),
    Unknown(String),
}

impl RecordTag {
    pub fn parse(token: &str) -> Self {
        match RecordType::from_token(token) {
            Some(kind) => RecordTag::Known(kind),
            None => RecordTag::Unknown(token.to_string()),
        }
    }

    /// Human-readable name; unknown tokens are flagged with `??`.
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            RecordTag::Known(kind) => Cow::Borrowed(kind.name()),
            RecordTag::Unknown(token) => Cow::Owned(format!("{token}??")),
        }
    }
}

impl fmt::Display for RecordTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordTag::Known(kind) => f.write_str(kind.token()),
            RecordTag::Unknown(token) => f.write_str(token),
        }
    }
}

/// Round-trip duration of a record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Elapsed {
    #[default]
    Unknown,
    Seconds(f64),
}

impl Elapsed {
    pub fn from_duration(duration: Duration) -> Self {
        Elapsed::Seconds(duration.as_secs_f64())
    }

    pub fn as_secs_f64(&self) -> Option<f64> {
        match self {
            Elapsed::Seconds(secs) => Some(*secs),
            Elapsed::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Elapsed::Unknown)
    }
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Non-finite values have no representation in the header grammar.
            Elapsed::Seconds(secs) if secs.is_finite() => write!(f, "{:.6}", secs.max(0.0)),
            _ => f.write_str(DURATION_UNKNOWN),
        }
    }
}

/// Payload region of a record about to be written.
///
/// The variant decides the type token, so a `TRN` line always carries two
/// payloads and the other types exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body<'a> {
    Request(&'a [u8]),
    Response(&'a [u8]),
    Transaction {
        request: &'a [u8],
        response: &'a [u8],
    },
}

impl Body<'_> {
    pub fn record_type(&self) -> RecordType {
        match self {
            Body::Request(_) => RecordType::Request,
            Body::Response(_) => RecordType::Response,
            Body::Transaction { .. } => RecordType::Transaction,
        }
    }
}

/// One transcript line, before encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record<'a> {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub duration: Elapsed,
    /// Request counter; the `#seq` group is omitted when `None`.
    pub sequence: Option<u64>,
    pub client_identifier: &'a [u8],
    pub body: Body<'a>,
}

impl<'a> Record<'a> {
    /// A record stamped with the current wall-clock time.
    pub fn new(body: Body<'a>, client_identifier: &'a [u8]) -> Self {
        Self {
            timestamp: unix_timestamp(),
            duration: Elapsed::Unknown,
            sequence: None,
            client_identifier,
            body,
        }
    }

    pub fn with_duration(mut self, duration: Elapsed) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_sequence(mut self, sequence: Option<u64>) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn record_type(&self) -> RecordType {
        self.body.record_type()
    }
}

/// Current wall-clock time as fractional seconds since the Unix epoch.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
