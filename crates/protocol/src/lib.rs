//! Wire protocol for the Parley chat service.
//!
//! Every message is a fixed 648-byte header followed by a variable-length
//! payload. See [`frame`] for the byte layout and [`codec`] for the
//! stream framing used by both server and client.

pub mod codec;
pub mod constants;
pub mod error;
pub mod field;
pub mod frame;
pub mod kind;

// Re-export primary types for convenience.
pub use codec::FrameCodec;
pub use error::{FieldError, ProtocolError};
pub use field::{FixedString, Info, Nickname};
pub use frame::{Frame, Header};
pub use kind::MessageKind;
