use std::string::FromUtf8Error;

use thiserror::Error;

/// Decode-time failures for the ring RPC wire format.
///
/// Incompleteness is not an error: `decode` signals it via `Ok(None)` so the
/// caller can buffer more bytes and retry, mirroring `mqtt-codec`'s
/// `Packet::parse` convention.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("unknown RPC opcode {0}")]
    UnknownOpcode(u8),

    #[error("string payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    #[error("length-prefixed string is missing its trailing NUL")]
    MissingNul,

    #[error("participant list length {0} exceeds the wire limit")]
    ListTooLarge(u32),
}
