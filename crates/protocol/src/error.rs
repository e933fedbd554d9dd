//! Error types for the wire protocol.

/// Errors produced while validating a fixed-size string field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("{field} too long: {len} bytes (max {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{field} contains an interior NUL byte")]
    InteriorNul { field: &'static str },

    #[error("{field} is not NUL-terminated")]
    Unterminated { field: &'static str },

    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
}

/// Errors produced by the frame codec.
///
/// Every variant is fatal for the connection it was raised on.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("negative payload length: {0}")]
    NegativePayloadLength(i32),

    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("stream ended mid-frame: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("malformed header: {0}")]
    Field(#[from] FieldError),
}
