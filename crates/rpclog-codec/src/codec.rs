use bytes::{BufMut, Bytes, BytesMut};

use crate::decode::PayloadDecoder;
use crate::entry::{DamagedEntry, Entry, LogEntry, Payload, RawHeader};
use crate::error::{CodecError, EntryError, Result};
use crate::escape::{escape_into, escaped_len, unescape, NEWLINE, RS};
use crate::record::{Body, Elapsed, Record, RecordType, DURATION_UNKNOWN, FORMAT_VERSION};

/// Encode a record as one transcript line, terminator included.
///
/// Line format:
/// ```text
/// <ts> <ver> D=<dur|-> [#<seq> ]<TYPE> <idLen> <id> <len> <RS><payload>[<RS><payload2>]\n
/// ```
///
/// `idLen` and `len` count escaped bytes. The second payload of a `TRN`
/// line has no length of its own; it runs to the terminator.
pub fn encode_record(record: &Record<'_>, dst: &mut BytesMut) {
    let (first, second) = match record.body {
        Body::Request(payload) | Body::Response(payload) => (payload, None),
        Body::Transaction { request, response } => (request, Some(response)),
    };

    let mut head = format!(
        "{:.6} {} D={} ",
        record.timestamp.max(0.0),
        FORMAT_VERSION,
        record.duration
    );
    if let Some(sequence) = record.sequence {
        head.push_str(&format!("#{sequence} "));
    }
    head.push_str(&format!(
        "{} {} ",
        record.record_type().token(),
        escaped_len(record.client_identifier)
    ));

    let payload_len = escaped_len(first);
    dst.reserve(
        head.len()
            + escaped_len(record.client_identifier)
            + payload_len
            + second.map_or(0, |s| escaped_len(s) + 1)
            + 24,
    );
    dst.put_slice(head.as_bytes());
    escape_into(record.client_identifier, dst);
    dst.put_slice(format!(" {payload_len} ").as_bytes());
    dst.put_u8(RS);
    escape_into(first, dst);
    if let Some(second) = second {
        dst.put_u8(RS);
        escape_into(second, dst);
    }
    dst.put_u8(NEWLINE);
}

/// Header tokens matched by the grammar
/// `ts ver[ D=dur][ #seq] type idLen ` plus whatever follows up to the RS.
struct HeaderTokens<'a> {
    timestamp: &'a str,
    version: &'a str,
    duration: Option<&'a str>,
    sequence: Option<&'a str>,
    record_type: &'a str,
    client_id_len: &'a str,
    rest: &'a [u8],
}

struct Scanner<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn eat(&mut self, literal: &[u8]) -> bool {
        if self.buf[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    /// One or more bytes matching `pred`, as ASCII text.
    fn token(&mut self, pred: impl Fn(u8) -> bool) -> Option<&'a str> {
        let start = self.pos;
        while self.pos < self.buf.len() && pred(self.buf[self.pos]) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.buf[start..self.pos]).ok()
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

fn is_number_byte(b: u8) -> bool {
    b.is_ascii_digit() || b == b'.'
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn parse_header(header: &[u8]) -> Option<HeaderTokens<'_>> {
    let mut scan = Scanner::new(header);

    let timestamp = scan.token(is_number_byte)?;
    if !scan.eat(b" ") {
        return None;
    }
    let version = scan.token(|b| b.is_ascii_digit())?;

    let duration = if scan.eat(b" D=") {
        if scan.eat(DURATION_UNKNOWN.as_bytes()) {
            Some(DURATION_UNKNOWN)
        } else {
            Some(scan.token(is_number_byte)?)
        }
    } else {
        None
    };
    let sequence = if scan.eat(b" #") {
        Some(scan.token(|b| b.is_ascii_digit())?)
    } else {
        None
    };

    if !scan.eat(b" ") {
        return None;
    }
    let record_type = scan.token(is_word_byte)?;
    if !scan.eat(b" ") {
        return None;
    }
    let client_id_len = scan.token(|b| b.is_ascii_digit())?;
    if !scan.eat(b" ") {
        return None;
    }

    Some(HeaderTokens {
        timestamp,
        version,
        duration,
        sequence,
        record_type,
        client_id_len,
        rest: scan.rest(),
    })
}

/// Decode one transcript line (terminator included).
///
/// Returns `Err` only when the line is not in transcript format at all:
/// no record separator, or a header that does not match the grammar.
/// Every other problem yields [`Entry::Damaged`].
///
/// Payloads are located by their declared length rather than by scanning,
/// so escaped bytes inside them are never mistaken for structure.
pub fn decode_line<D: PayloadDecoder>(
    line: &[u8],
    name: &str,
    line_number: u64,
    decoder: &D,
) -> Result<Entry<D::Output>> {
    let Some(rs) = line.iter().position(|&b| b == RS) else {
        return Err(CodecError::MissingSeparator {
            name: name.to_string(),
            line: line_number,
        });
    };
    let header = &line[..rs];
    let Some(tokens) = parse_header(header) else {
        return Err(CodecError::MalformedHeader {
            name: name.to_string(),
            line: line_number,
            header: String::from_utf8_lossy(header).into_owned(),
        });
    };

    let raw = RawHeader::new(
        tokens.timestamp,
        tokens.version,
        tokens.duration,
        tokens.sequence,
        tokens.record_type,
    );
    let damaged = |raw: RawHeader, client_identifier: Option<Bytes>, error: EntryError| {
        tracing::warn!(
            transcript = name,
            line = line_number,
            error = %error,
            "damaged transcript entry"
        );
        Ok(Entry::Damaged(DamagedEntry {
            line_number,
            header: raw,
            client_identifier,
            error,
        }))
    };

    let timestamp = match tokens.timestamp.parse::<f64>() {
        Ok(ts) if ts.is_finite() => ts,
        _ => {
            let error = EntryError::InvalidTimestamp(tokens.timestamp.to_string());
            return damaged(raw, None, error);
        }
    };
    let version = match tokens.version.parse::<u32>() {
        Ok(version) if version <= FORMAT_VERSION => version,
        _ => {
            let error = EntryError::VersionTooNew {
                found: tokens.version.to_string(),
                supported: FORMAT_VERSION,
            };
            return damaged(raw, None, error);
        }
    };
    let Some(record_type) = RecordType::from_token(tokens.record_type) else {
        let error = EntryError::UnrecognizedType(tokens.record_type.to_string());
        return damaged(raw, None, error);
    };
    let duration = match tokens.duration {
        None | Some(DURATION_UNKNOWN) => Elapsed::Unknown,
        Some(text) => match text.parse::<f64>() {
            Ok(secs) => Elapsed::Seconds(secs),
            Err(_) => {
                let error = EntryError::InvalidDuration(text.to_string());
                return damaged(raw, None, error);
            }
        },
    };
    let sequence = tokens.sequence.and_then(|s| s.parse::<u64>().ok());

    // Client identifier: exactly `idLen` escaped bytes, then a blank.
    let rest = tokens.rest;
    let id_len = match tokens.client_id_len.parse::<usize>() {
        Ok(len) if len <= rest.len() => len,
        _ => return damaged(raw, None, EntryError::ClientIdentifierFraming),
    };
    let client_identifier = unescape(&rest[..id_len]).freeze();
    let after_id = &rest[id_len..];
    if after_id.first() != Some(&b' ') {
        return damaged(
            raw,
            Some(client_identifier),
            EntryError::ClientIdentifierFraming,
        );
    }

    // What is left before the RS is the escaped length of the first payload.
    let length_text = after_id[1..].trim_ascii();
    let declared = match std::str::from_utf8(length_text)
        .ok()
        .filter(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|t| t.parse::<usize>().ok())
    {
        Some(len) => len,
        None => {
            let error =
                EntryError::InvalidPayloadLength(String::from_utf8_lossy(length_text).into_owned());
            return damaged(raw, Some(client_identifier), error);
        }
    };

    let start = rs + 1;
    let available = line.len() - start;
    if declared > available {
        let error = EntryError::PayloadTruncated {
            declared,
            available,
        };
        return damaged(raw, Some(client_identifier), error);
    }
    let end = start + declared;
    let first = match decoder.decode(unescape(&line[start..end]).freeze()) {
        Ok(value) => value,
        Err(err) => return damaged(raw, Some(client_identifier), EntryError::Decode(err)),
    };

    let mut cursor = end;
    let payload = if line.get(end) == Some(&RS) {
        // Length-free second payload: everything up to the last byte.
        let second_start = end + 1;
        let second_end = (line.len() - 1).max(second_start);
        let escaped = &line[second_start..second_end];
        cursor = second_end;
        match decoder.decode(unescape(escaped).freeze()) {
            Ok(response) => Payload::Pair {
                request: first,
                response,
            },
            Err(err) => return damaged(raw, Some(client_identifier), EntryError::Decode(err)),
        }
    } else {
        Payload::Single(first)
    };

    if line.get(cursor) != Some(&NEWLINE) {
        return damaged(
            raw,
            Some(client_identifier),
            EntryError::MissingTerminator,
        );
    }

    tracing::debug!(
        transcript = name,
        line = line_number,
        record_type = %record_type,
        "decoded transcript entry"
    );

    Ok(Entry::Valid(LogEntry {
        line_number,
        timestamp,
        version,
        duration,
        sequence,
        record_type,
        client_identifier,
        payload,
    }))
}
