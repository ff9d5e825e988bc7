//! Line-oriented, binary-safe transcript codec for RPC gateway payloads.
//!
//! Every record is one physical line that ordinary text tools can handle:
//! - A space-separated ASCII header (timestamp, version, duration,
//!   sequence number, type, client identifier)
//! - A record separator (0x1E) before each payload
//! - Payload bytes escaped so that no raw newline or separator remains
//!
//! Readers locate payloads by their declared length, never by scanning.

pub mod codec;
pub mod decode;
pub mod entry;
pub mod error;
pub mod escape;
pub mod reader;
pub mod record;
pub mod writer;

pub use codec::{decode_line, encode_record};
#[cfg(feature = "json")]
pub use decode::JsonPayload;
pub use decode::{PayloadDecoder, RawPayload, Utf8Payload};
pub use entry::{DamagedEntry, Entry, LogEntry, Payload, RawHeader};
pub use error::{CodecError, DecodeError, EntryError, Result};
pub use escape::{escape, unescape, PREFIX, RS};
pub use reader::LogReader;
pub use record::{
    unix_timestamp, Body, Elapsed, Record, RecordTag, RecordType, DURATION_UNKNOWN,
    FORMAT_VERSION, SEQUENCE_UNKNOWN,
};
pub use writer::TranscriptWriter;
