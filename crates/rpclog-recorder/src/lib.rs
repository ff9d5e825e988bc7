//! Records RPC gateway traffic into escaped line transcripts.
//!
//! A [`Recorder`] sits in the gateway's data path. It pairs each outbound
//! request with the next inbound response and appends one line per
//! exchange to a file chosen by a strftime pattern.

pub mod config;
pub mod destination;
pub mod error;
pub mod hook;
pub mod recorder;

pub use config::{RecorderConfig, DEFAULT_FILE_NAME_PATTERN};
pub use destination::Destination;
pub use error::{RecorderError, Result};
pub use hook::{ExchangeError, GatewayHook, SharedRecorder};
pub use recorder::Recorder;
