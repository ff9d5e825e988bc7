//! Payload decoders.
//!
//! The codec never looks inside a payload. Whatever turns the recovered
//! bytes into a structured value plugs in through [`PayloadDecoder`];
//! failures become the entry's error instead of aborting the read.

use bytes::Bytes;

use crate::error::DecodeError;

/// Turns recovered payload bytes into a structured value.
pub trait PayloadDecoder {
    type Output;

    fn decode(&self, payload: Bytes) -> Result<Self::Output, DecodeError>;
}

impl<D: PayloadDecoder + ?Sized> PayloadDecoder for &D {
    type Output = D::Output;

    fn decode(&self, payload: Bytes) -> Result<Self::Output, DecodeError> {
        (**self).decode(payload)
    }
}

/// Hands back the raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawPayload;

impl PayloadDecoder for RawPayload {
    type Output = Bytes;

    fn decode(&self, payload: Bytes) -> Result<Bytes, DecodeError> {
        Ok(payload)
    }
}

/// Requires the payload to be UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Payload;

impl PayloadDecoder for Utf8Payload {
    type Output = String;

    fn decode(&self, payload: Bytes) -> Result<String, DecodeError> {
        String::from_utf8(payload.to_vec()).map_err(|err| DecodeError::new(err.to_string()))
    }
}

/// Parses the payload as a JSON document.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayload;

#[cfg(feature = "json")]
impl PayloadDecoder for JsonPayload {
    type Output = serde_json::Value;

    fn decode(&self, payload: Bytes) -> Result<serde_json::Value, DecodeError> {
        serde_json::from_slice(&payload).map_err(|err| DecodeError::new(err.to_string()))
    }
}
