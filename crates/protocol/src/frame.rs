//! Frame: one wire message, header plus payload.
//!
//! # Wire format
//!
//! ```text
//! [4 bytes BE: payload_len (i32)]
//! [128 bytes:  sender, UTF-8, NUL-padded]
//! [4 bytes BE: kind tag (u32)]
//! [512 bytes:  info, UTF-8, NUL-padded]
//! [payload_len bytes: payload]
//! ```

use bytes::{Buf, BufMut, Bytes};
use serde::{Deserialize, Serialize};

use crate::constants::{HEADER_LEN, INFO_LEN, NICK_LEN};
use crate::error::{FieldError, ProtocolError};
use crate::field::{Info, Nickname};
use crate::kind::MessageKind;

/// Decoded fixed-size header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub payload_len: i32,
    pub sender: Nickname,
    pub kind: MessageKind,
    pub info: Info,
}

impl Header {
    /// Parses a header from exactly [`HEADER_LEN`] bytes.
    pub fn decode(mut raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw.len() < HEADER_LEN {
            return Err(ProtocolError::Truncated {
                expected: HEADER_LEN,
                got: raw.len(),
            });
        }

        let payload_len = raw.get_i32();
        let sender = Nickname::decode(&raw[..NICK_LEN])?;
        raw.advance(NICK_LEN);
        let kind = MessageKind::from_tag(raw.get_u32());
        let info = Info::decode(&raw[..INFO_LEN])?;

        Ok(Self {
            payload_len,
            sender,
            kind,
            info,
        })
    }

    /// Writes exactly [`HEADER_LEN`] bytes.
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_i32(self.payload_len);
        self.sender.encode(dst);
        dst.put_u32(self.kind.tag());
        self.info.encode(dst);
    }
}

/// A complete message: the header fields and the payload they describe.
///
/// The payload length is never stored separately, so a frame cannot claim
/// more or fewer bytes than it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sender: Nickname,
    pub kind: MessageKind,
    pub info: Info,
    pub payload: Bytes,
}

impl Frame {
    /// Creates an empty frame of the given kind.
    pub fn new(kind: MessageKind) -> Self {
        Self {
            sender: Nickname::default(),
            kind: kind.normalized(),
            info: Info::default(),
            payload: Bytes::new(),
        }
    }

    pub fn with_sender(mut self, sender: Nickname) -> Self {
        self.sender = sender;
        self
    }

    pub fn with_info(mut self, info: Info) -> Self {
        self.info = info;
        self
    }

    /// Sets `info` from server-generated text, truncating if needed.
    pub fn with_info_text(mut self, text: &str) -> Self {
        self.info = Info::truncated(text);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Validates `sender` and `info` supplied by a local user.
    pub fn try_with_fields(
        kind: MessageKind,
        sender: &str,
        info: &str,
    ) -> Result<Self, FieldError> {
        Ok(Self::new(kind)
            .with_sender(Nickname::new(sender)?)
            .with_info(Info::new(info)?))
    }

    /// Returns the header describing this frame.
    ///
    /// Payloads are bounded by the codec, far below `i32::MAX`.
    pub fn header(&self) -> Header {
        Header {
            payload_len: self.payload.len() as i32,
            sender: self.sender.clone(),
            kind: self.kind,
            info: self.info.clone(),
        }
    }

    /// Payload decoded as UTF-8, lossily.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Total encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}
