//! Byte-stuffing that keeps binary payloads off the line structure.
//!
//! Three bytes are structural in a transcript line: the line terminator,
//! the record separator and the escape marker itself. Each of them is
//! replaced by the marker followed by a substitute byte:
//!
//! ```text
//! 0x01 (PREFIX)   -> 0x01 0x82
//! 0x0A (newline)  -> 0x01 0x81
//! 0x1E (RS)       -> 0x01 0x83
//! ```
//!
//! Both directions work in one pass over the input, so a substitute
//! introduced for one byte is never rewritten again.

use bytes::{BufMut, BytesMut};

/// Escape marker byte.
pub const PREFIX: u8 = 0x01;

/// Record separator between a line's header and its payload region(s).
pub const RS: u8 = 0x1E;

/// Line terminator.
pub const NEWLINE: u8 = b'\n';

/// Substitute for an escaped newline.
pub const ESCAPED_NEWLINE: u8 = 0x81;

/// Substitute for an escaped marker.
pub const ESCAPED_PREFIX: u8 = 0x82;

/// Substitute for an escaped record separator.
pub const ESCAPED_RS: u8 = 0x83;

#[inline]
fn is_structural(byte: u8) -> bool {
    matches!(byte, PREFIX | NEWLINE | RS)
}

/// Length `src` will have once escaped.
pub fn escaped_len(src: &[u8]) -> usize {
    src.len() + src.iter().filter(|b| is_structural(**b)).count()
}

/// Escape `src`, appending the result to `dst`.
pub fn escape_into(src: &[u8], dst: &mut BytesMut) {
    dst.reserve(escaped_len(src));
    let mut run_start = 0;
    for (i, &byte) in src.iter().enumerate() {
        let substitute = match byte {
            PREFIX => ESCAPED_PREFIX,
            NEWLINE => ESCAPED_NEWLINE,
            RS => ESCAPED_RS,
            _ => continue,
        };
        dst.put_slice(&src[run_start..i]);
        dst.put_u8(PREFIX);
        dst.put_u8(substitute);
        run_start = i + 1;
    }
    dst.put_slice(&src[run_start..]);
}

/// Escape `src` into a fresh buffer.
pub fn escape(src: &[u8]) -> BytesMut {
    let mut dst = BytesMut::with_capacity(escaped_len(src));
    escape_into(src, &mut dst);
    dst
}

/// Reverse [`escape`].
///
/// A marker that is not followed by one of the three substitute bytes is
/// copied through untouched; `escape` never produces one.
pub fn unescape(src: &[u8]) -> BytesMut {
    let mut dst = BytesMut::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        let byte = src[i];
        if byte == PREFIX {
            let original = match src.get(i + 1) {
                Some(&ESCAPED_PREFIX) => Some(PREFIX),
                Some(&ESCAPED_NEWLINE) => Some(NEWLINE),
                Some(&ESCAPED_RS) => Some(RS),
                _ => None,
            };
            if let Some(original) = original {
                dst.put_u8(original);
                i += 2;
                continue;
            }
        }
        dst.put_u8(byte);
        i += 1;
    }
    dst
}
