//! Bounded, NUL-padded string fields of the frame header.
//!
//! A field of capacity `N` stores at most `N - 1` bytes of UTF-8 so the
//! encoded form always carries a NUL terminator. Values supplied by peers
//! are rejected when they do not fit; text generated by the server itself
//! can be truncated explicitly with [`FixedString::truncated`].

use std::fmt;

use bytes::BufMut;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{INFO_LEN, NICK_LEN};
use crate::error::FieldError;

/// The `sender` header field.
pub type Nickname = FixedString<NICK_LEN>;

/// The `info` header field.
pub type Info = FixedString<INFO_LEN>;

/// A UTF-8 string guaranteed to fit a fixed-size field of `N` bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FixedString<const N: usize>(String);

impl<const N: usize> FixedString<N> {
    /// Largest value length in bytes.
    pub const MAX_LEN: usize = N - 1;

    /// Validates `value` against the field capacity.
    pub fn new(value: impl Into<String>) -> Result<Self, FieldError> {
        let value = value.into();
        if value.len() > Self::MAX_LEN {
            return Err(FieldError::TooLong {
                field: field_name(N),
                len: value.len(),
                max: Self::MAX_LEN,
            });
        }
        if value.contains('\0') {
            return Err(FieldError::InteriorNul {
                field: field_name(N),
            });
        }
        Ok(Self(value))
    }

    /// Builds a field from server-generated text, cutting it at the last
    /// char boundary that fits.
    pub fn truncated(value: &str) -> Self {
        let value = value.split('\0').next().unwrap_or_default();
        if value.len() <= Self::MAX_LEN {
            return Self(value.to_owned());
        }

        let mut end = Self::MAX_LEN;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        warn!(
            field = field_name(N),
            len = value.len(),
            max = Self::MAX_LEN,
            "truncating oversized field"
        );
        Self(value[..end].to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Writes exactly `N` bytes: the value followed by NUL padding.
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_slice(self.0.as_bytes());
        dst.put_bytes(0, N - self.0.len());
    }

    /// Parses exactly `N` bytes of NUL-padded UTF-8.
    pub fn decode(raw: &[u8]) -> Result<Self, FieldError> {
        debug_assert_eq!(raw.len(), N);
        let end = raw
            .iter()
            .position(|b| *b == 0)
            .ok_or(FieldError::Unterminated {
                field: field_name(N),
            })?;
        let value = std::str::from_utf8(&raw[..end]).map_err(|_| FieldError::InvalidUtf8 {
            field: field_name(N),
        })?;
        Ok(Self(value.to_owned()))
    }
}

fn field_name(capacity: usize) -> &'static str {
    match capacity {
        NICK_LEN => "sender",
        INFO_LEN => "info",
        _ => "field",
    }
}

impl<const N: usize> TryFrom<String> for FixedString<N> {
    type Error = FieldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<const N: usize> TryFrom<&str> for FixedString<N> {
    type Error = FieldError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<const N: usize> From<FixedString<N>> for String {
    fn from(field: FixedString<N>) -> Self {
        field.0
    }
}

impl<const N: usize> AsRef<str> for FixedString<N> {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<const N: usize> PartialEq<str> for FixedString<N> {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl<const N: usize> PartialEq<&str> for FixedString<N> {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl<const N: usize> fmt::Debug for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<const N: usize> fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
