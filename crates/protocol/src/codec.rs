//! Frame codec: splits a TCP byte stream into [`Frame`]s.
//!
//! Decoding is two-phase: the fixed header is parsed once all of its bytes
//! are buffered, then the frame is held back until exactly `payload_len`
//! more bytes arrived. A caller therefore never sees a header without its
//! payload, and every payload is drained even when the frame is ignored.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::constants::{HEADER_LEN, MAX_PAYLOAD_LEN};
use crate::error::ProtocolError;
use crate::frame::{Frame, Header};

/// Tokio codec for the binary chat protocol.
#[derive(Debug)]
pub struct FrameCodec {
    max_payload: usize,
    /// Header of the frame whose payload is still being buffered.
    pending: Option<Header>,
}

impl FrameCodec {
    /// Creates a codec accepting payloads up to [`MAX_PAYLOAD_LEN`].
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_LEN)
    }

    /// Creates a codec with a lower payload limit (clamped to the protocol cap).
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            max_payload: max_payload.min(MAX_PAYLOAD_LEN),
            pending: None,
        }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    fn check_len(&self, len: i32) -> Result<usize, ProtocolError> {
        if len < 0 {
            return Err(ProtocolError::NegativePayloadLength(len));
        }
        let len = len as usize;
        if len > self.max_payload {
            return Err(ProtocolError::PayloadTooLarge {
                len,
                max: self.max_payload,
            });
        }
        Ok(len)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.pending.take() {
            Some(header) => header,
            None => {
                if src.len() < HEADER_LEN {
                    src.reserve(HEADER_LEN - src.len());
                    return Ok(None);
                }
                let header = Header::decode(&src[..HEADER_LEN])?;
                let len = self.check_len(header.payload_len)?;
                src.advance(HEADER_LEN);
                src.reserve(len);
                header
            }
        };

        let len = header.payload_len as usize;
        if src.len() < len {
            self.pending = Some(header);
            return Ok(None);
        }

        let payload = src.split_to(len).freeze();
        trace!(kind = %header.kind, len, "decoded frame");

        Ok(Some(Frame {
            sender: header.sender,
            kind: header.kind,
            info: header.info,
            payload,
        }))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        if let Some(header) = self.pending.take() {
            return Err(ProtocolError::Truncated {
                expected: header.payload_len as usize,
                got: buf.len(),
            });
        }
        if !buf.is_empty() {
            return Err(ProtocolError::Truncated {
                expected: HEADER_LEN,
                got: buf.len(),
            });
        }
        Ok(None)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() > self.max_payload {
            return Err(ProtocolError::PayloadTooLarge {
                len: item.payload.len(),
                max: self.max_payload,
            });
        }

        dst.reserve(item.encoded_len());
        item.header().encode(dst);
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}
