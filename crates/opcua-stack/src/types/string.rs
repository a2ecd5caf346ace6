// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! String, ByteString and XmlElement.
//!
//! All three are Int32-length-prefixed byte runs where `-1` is null. Null and
//! empty are distinct values and survive a round trip.

use crate::codec::{BinaryEncodable, BinaryReader, BinaryWriter, EncodingError, EncodingResult};
use std::fmt;

fn write_prefixed(w: &mut BinaryWriter<'_>, bytes: Option<&[u8]>) -> EncodingResult<()> {
    match bytes {
        None => w.write_i32(-1),
        Some(b) => {
            let len = i32::try_from(b.len()).map_err(|_| {
                EncodingError::LimitsExceeded(format!("length {} does not fit Int32", b.len()))
            })?;
            w.write_i32(len)?;
            w.write_block(b)
        }
    }
}

fn read_prefixed<'a>(
    r: &mut BinaryReader<'a>,
    max: usize,
    what: &str,
) -> EncodingResult<Option<&'a [u8]>> {
    let len = r.read_i32()?;
    if len < 0 {
        return Ok(None);
    }
    let len = len as usize;
    if len > max {
        return Err(EncodingError::LimitsExceeded(format!(
            "{} length {} exceeds {}",
            what, len, max
        )));
    }
    r.read_bytes(len).map(Some)
}

/// UTF-8 string that may be null.
#[derive(Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct UaString(Option<String>);

impl UaString {
    pub fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Null or zero-length.
    pub fn is_empty(&self) -> bool {
        self.0.as_deref().map_or(true, str::is_empty)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Contents, with null read as "".
    pub fn as_str_or_empty(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }

    pub fn into_option(self) -> Option<String> {
        self.0
    }
}

impl From<&str> for UaString {
    fn from(s: &str) -> Self {
        Self(Some(s.to_string()))
    }
}

impl From<String> for UaString {
    fn from(s: String) -> Self {
        Self(Some(s))
    }
}

impl From<Option<String>> for UaString {
    fn from(s: Option<String>) -> Self {
        Self(s)
    }
}

impl fmt::Debug for UaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => f.write_str("null"),
            Some(s) => write!(f, "{:?}", s),
        }
    }
}

impl fmt::Display for UaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str_or_empty())
    }
}

impl BinaryEncodable for UaString {
    fn byte_len(&self) -> usize {
        4 + self.0.as_ref().map_or(0, String::len)
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        write_prefixed(w, self.0.as_deref().map(str::as_bytes))
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        let max = r.options().max_string_length;
        match read_prefixed(r, max, "string")? {
            None => Ok(Self(None)),
            Some(bytes) => std::str::from_utf8(bytes)
                .map(|s| Self(Some(s.to_string())))
                .map_err(|e| EncodingError::InvalidData(format!("string is not UTF-8: {}", e))),
        }
    }
}

/// Opaque byte sequence that may be null.
#[derive(Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ByteString(Option<Vec<u8>>);

impl ByteString {
    pub fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_ref().map_or(true, Vec::is_empty)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }

    pub fn as_bytes_or_empty(&self) -> &[u8] {
        self.0.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, Vec::len)
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(v: Vec<u8>) -> Self {
        Self(Some(v))
    }
}

impl From<&[u8]> for ByteString {
    fn from(v: &[u8]) -> Self {
        Self(Some(v.to_vec()))
    }
}

impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => f.write_str("null"),
            Some(b) if b.len() > 32 => write!(f, "ByteString({} bytes)", b.len()),
            Some(b) => write!(f, "{:02x?}", b),
        }
    }
}

impl BinaryEncodable for ByteString {
    fn byte_len(&self) -> usize {
        4 + self.len()
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        write_prefixed(w, self.0.as_deref())
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        let max = r.options().max_byte_string_length;
        Ok(Self(read_prefixed(r, max, "byte string")?.map(<[u8]>::to_vec)))
    }
}

/// XML fragment, carried as a length-prefixed UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct XmlElement(pub UaString);

impl From<&str> for XmlElement {
    fn from(s: &str) -> Self {
        Self(UaString::from(s))
    }
}

impl BinaryEncodable for XmlElement {
    fn byte_len(&self) -> usize {
        self.0.byte_len()
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        self.0.encode(w)
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        UaString::decode(r).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_from_slice, encode_to_vec, DecodingOptions};

    #[test]
    fn test_null_vs_empty_string() {
        let null = encode_to_vec(&UaString::null()).unwrap();
        let empty = encode_to_vec(&UaString::from("")).unwrap();
        assert_eq!(null, vec![0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(empty, vec![0, 0, 0, 0]);

        let opts = DecodingOptions::default();
        assert!(decode_from_slice::<UaString>(&null, &opts).unwrap().is_null());
        let e = decode_from_slice::<UaString>(&empty, &opts).unwrap();
        assert!(!e.is_null() && e.is_empty());
    }

    #[test]
    fn test_string_limit() {
        let opts = DecodingOptions {
            max_string_length: 3,
            ..Default::default()
        };
        let bytes = encode_to_vec(&UaString::from("four")).unwrap();
        assert!(matches!(
            decode_from_slice::<UaString>(&bytes, &opts),
            Err(EncodingError::LimitsExceeded(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut bytes = 2i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xC3, 0x28]);
        assert!(decode_from_slice::<UaString>(&bytes, &DecodingOptions::default()).is_err());
    }

    #[test]
    fn test_byte_string() {
        let v = ByteString::from(vec![1u8, 2, 3]);
        let bytes = encode_to_vec(&v).unwrap();
        assert_eq!(bytes, vec![3, 0, 0, 0, 1, 2, 3]);
        assert_eq!(
            decode_from_slice::<ByteString>(&bytes, &DecodingOptions::default()).unwrap(),
            v
        );
    }
}
