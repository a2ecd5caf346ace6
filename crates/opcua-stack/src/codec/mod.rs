// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OPC UA Binary encoding (Part 6 Sec.5.2).
//!
//! Two layers share one wire format:
//!
//! - [`BinaryEncodable`]: statically typed encode/decode/size for every
//!   builtin and every generated protocol structure. Structures encode their
//!   fields in declaration order, which is the wire order.
//! - [`dynamic`]: a descriptor-walking engine that encodes and decodes values
//!   whose type is only known at runtime, driven by the [`TypeTable`].
//!
//! Encoding always goes through a [`BinaryWriter`]. A writer may be bounded
//! and carry a [`BufferExchange`] sink: when the next write does not fit, the
//! filled buffer is handed to the sink (which typically frames and queues it
//! as a transport chunk) and the write is retried against the emptied buffer.
//! The codec has no notion of chunks, only of running out of room.
//!
//! # Example
//!
//! ```
//! use opcua_stack::codec::{decode_from_slice, encode_to_vec, DecodingOptions};
//! use opcua_stack::types::UaString;
//!
//! let bytes = encode_to_vec(&UaString::from("hello")).unwrap();
//! assert_eq!(&bytes[..4], &5i32.to_le_bytes());
//! let back: UaString = decode_from_slice(&bytes, &DecodingOptions::default()).unwrap();
//! assert_eq!(back.as_str(), Some("hello"));
//! ```

pub mod descriptor;
pub mod dynamic;
mod primitives;
mod reader;
mod writer;

pub use descriptor::{
    type_table, DataType, Described, MemberDescriptor, TypeDescriptor, TypeRef, TypeTable,
};
pub use primitives::{decode_f32, decode_f64, encode_f32_bits, encode_f64_bits};
pub use reader::{BinaryReader, DecodingOptions};
pub use writer::{BinaryWriter, BufferExchange};

use crate::status::StatusCode;
use std::fmt;

/// Errors raised while encoding or decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodingError {
    /// Bounded writer is full and has no exchange sink.
    BufferFull { needed: usize, available: usize },
    /// Reader ran past the end of its input.
    UnexpectedEof { offset: usize, needed: usize },
    /// A configured limit (string/array length, recursion) was exceeded.
    LimitsExceeded(String),
    /// Input is structurally invalid.
    InvalidData(String),
    /// Value does not match the type it is encoded as.
    TypeMismatch { expected: String, found: String },
    /// Numeric type id not present in the type table.
    UnknownType(u32),
    /// The exchange sink refused to take more data (chunk/message limits).
    Aborted(StatusCode),
}

impl EncodingError {
    /// Status code reported on the wire for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BufferFull { .. } | Self::LimitsExceeded(_) => {
                StatusCode::BAD_ENCODING_LIMITS_EXCEEDED
            }
            Self::UnexpectedEof { .. } | Self::InvalidData(_) => StatusCode::BAD_DECODING_ERROR,
            Self::TypeMismatch { .. } => StatusCode::BAD_ENCODING_ERROR,
            Self::UnknownType(_) => StatusCode::BAD_DATA_TYPE_ID_UNKNOWN,
            Self::Aborted(status) => *status,
        }
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl fmt::Debug) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: format!("{:?}", found),
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferFull { needed, available } => write!(
                f,
                "buffer full: need {} bytes, {} available",
                needed, available
            ),
            Self::UnexpectedEof { offset, needed } => write!(
                f,
                "unexpected end of input at offset {} (need {} bytes)",
                offset, needed
            ),
            Self::LimitsExceeded(msg) => write!(f, "encoding limits exceeded: {}", msg),
            Self::InvalidData(msg) => write!(f, "invalid data: {}", msg),
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            Self::UnknownType(id) => write!(f, "unknown type id ns=0;i={}", id),
            Self::Aborted(status) => write!(f, "encoding aborted: {}", status),
        }
    }
}

impl std::error::Error for EncodingError {}

impl From<EncodingError> for StatusCode {
    fn from(e: EncodingError) -> Self {
        e.status()
    }
}

pub type EncodingResult<T> = core::result::Result<T, EncodingError>;

/// OPC UA Binary serialization.
pub trait BinaryEncodable: Sized {
    /// Wire size of a value that is overlayable (fixed width, no pointers),
    /// `None` otherwise. Arrays of overlayable types take the block path.
    const FIXED_SIZE: Option<usize> = None;

    /// Exact number of bytes [`encode`](Self::encode) will write.
    fn byte_len(&self) -> usize;

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()>;

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self>;

    /// Encode array elements (length prefix already written).
    fn encode_slice(items: &[Self], w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        for item in items {
            item.encode(w)?;
        }
        Ok(())
    }

    /// Decode `len` array elements (length prefix already consumed).
    fn decode_vec(r: &mut BinaryReader<'_>, len: usize) -> EncodingResult<Vec<Self>> {
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(Self::decode(r)?);
        }
        Ok(items)
    }
}

/// Encode into one unbounded buffer.
pub fn encode_to_vec<T: BinaryEncodable>(value: &T) -> EncodingResult<Vec<u8>> {
    let mut w = BinaryWriter::with_capacity(value.byte_len());
    value.encode(&mut w)?;
    Ok(w.into_inner())
}

/// Decode one value from the start of `bytes`.
pub fn decode_from_slice<T: BinaryEncodable>(
    bytes: &[u8],
    options: &DecodingOptions,
) -> EncodingResult<T> {
    let mut r = BinaryReader::new(bytes, options.clone());
    T::decode(&mut r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            EncodingError::UnexpectedEof {
                offset: 3,
                needed: 4
            }
            .status(),
            StatusCode::BAD_DECODING_ERROR
        );
        assert_eq!(
            EncodingError::BufferFull {
                needed: 8,
                available: 2
            }
            .status(),
            StatusCode::BAD_ENCODING_LIMITS_EXCEEDED
        );
        assert_eq!(
            EncodingError::Aborted(StatusCode::BAD_RESPONSE_TOO_LARGE).status(),
            StatusCode::BAD_RESPONSE_TOO_LARGE
        );
        assert_eq!(
            EncodingError::UnknownType(9999).status(),
            StatusCode::BAD_DATA_TYPE_ID_UNKNOWN
        );
    }

    #[test]
    fn test_error_display() {
        let err = EncodingError::UnexpectedEof {
            offset: 12,
            needed: 4,
        };
        assert_eq!(
            err.to_string(),
            "unexpected end of input at offset 12 (need 4 bytes)"
        );
    }
}
