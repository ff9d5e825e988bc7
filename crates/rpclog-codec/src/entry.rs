//! Decoded transcript entries.

use bytes::Bytes;

use crate::error::EntryError;
use crate::record::{Elapsed, RecordTag, RecordType, DURATION_UNKNOWN, SEQUENCE_UNKNOWN};

/// Decoded payload region of a line.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<P> {
    /// `RQT` or `RPT` lines.
    Single(P),
    /// `TRN` lines.
    Pair { request: P, response: P },
}

impl<P> Payload<P> {
    pub fn single(&self) -> Option<&P> {
        match self {
            Payload::Single(payload) => Some(payload),
            Payload::Pair { .. } => None,
        }
    }

    pub fn pair(&self) -> Option<(&P, &P)> {
        match self {
            Payload::Pair { request, response } => Some((request, response)),
            Payload::Single(_) => None,
        }
    }

    pub fn map<Q>(self, mut f: impl FnMut(P) -> Q) -> Payload<Q> {
        match self {
            Payload::Single(payload) => Payload::Single(f(payload)),
            Payload::Pair { request, response } => Payload::Pair {
                request: f(request),
                response: f(response),
            },
        }
    }
}

/// A well-formed transcript line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry<P> {
    /// 1-based line number within the stream.
    pub line_number: u64,
    /// Seconds since the Unix epoch at which the line was written.
    pub timestamp: f64,
    pub version: u32,
    pub duration: Elapsed,
    pub sequence: Option<u64>,
    pub record_type: RecordType,
    pub client_identifier: Bytes,
    pub payload: Payload<P>,
}

/// Header tokens exactly as they appear on a line.
///
/// Absent optional groups are filled with their display defaults
/// (`-` for the duration, `?` for the sequence number).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    pub timestamp: String,
    pub version: String,
    pub duration: String,
    pub sequence: String,
    pub record_type: RecordTag,
}

impl RawHeader {
    pub(crate) fn new(
        timestamp: &str,
        version: &str,
        duration: Option<&str>,
        sequence: Option<&str>,
        record_type: &str,
    ) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            version: version.to_string(),
            duration: duration.unwrap_or(DURATION_UNKNOWN).to_string(),
            sequence: sequence.unwrap_or(SEQUENCE_UNKNOWN).to_string(),
            record_type: RecordTag::parse(record_type),
        }
    }
}

/// A line that is framed correctly but whose content cannot be trusted.
#[derive(Debug, Clone, PartialEq)]
pub struct DamagedEntry {
    pub line_number: u64,
    pub header: RawHeader,
    /// Present when the identifier was extracted before the problem was found.
    pub client_identifier: Option<Bytes>,
    pub error: EntryError,
}

/// Result of decoding one line that passed framing checks.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry<P> {
    Valid(LogEntry<P>),
    Damaged(DamagedEntry),
}

impl<P> Entry<P> {
    pub fn line_number(&self) -> u64 {
        match self {
            Entry::Valid(entry) => entry.line_number,
            Entry::Damaged(entry) => entry.line_number,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Entry::Valid(_))
    }

    pub fn error(&self) -> Option<&EntryError> {
        match self {
            Entry::Valid(_) => None,
            Entry::Damaged(entry) => Some(&entry.error),
        }
    }

    pub fn record_tag(&self) -> RecordTag {
        match self {
            Entry::Valid(entry) => RecordTag::Known(entry.record_type),
            Entry::Damaged(entry) => entry.header.record_type.clone(),
        }
    }

    pub fn client_identifier(&self) -> Option<&Bytes> {
        match self {
            Entry::Valid(entry) => Some(&entry.client_identifier),
            Entry::Damaged(entry) => entry.client_identifier.as_ref(),
        }
    }

    pub fn valid(self) -> Option<LogEntry<P>> {
        match self {
            Entry::Valid(entry) => Some(entry),
            Entry::Damaged(_) => None,
        }
    }

    pub fn into_result(self) -> Result<LogEntry<P>, DamagedEntry> {
        match self {
            Entry::Valid(entry) => Ok(entry),
            Entry::Damaged(entry) => Err(entry),
        }
    }
}
