//! Binary-safe transcripts of RPC gateway traffic.
//!
//! Each request/response exchange a gateway forwards becomes one line in a
//! plain-text transcript, with payload bytes escaped so that arbitrary
//! binary content survives `grep`, `tail` and friends.
//!
//! # Crate Structure
//!
//! - [`codec`]: escaping, line encode/decode, transcript reader and writer
//! - [`recorder`]: request/response pairing and time-rotated log files

/// Re-export codec types.
pub mod codec {
    pub use rpclog_codec::*;
}

/// Re-export recorder types.
pub mod recorder {
    pub use rpclog_recorder::*;
}
