// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Input cursor with decoding limits.

use super::{EncodingError, EncodingResult};

/// Limits applied while decoding untrusted input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodingOptions {
    pub max_string_length: usize,
    pub max_byte_string_length: usize,
    pub max_array_length: usize,
    /// Nesting limit for Variant / DiagnosticInfo / structure recursion.
    pub max_recursion_depth: usize,
}

impl Default for DecodingOptions {
    fn default() -> Self {
        Self {
            max_string_length: 65_535,
            max_byte_string_length: 16 * 1024 * 1024,
            max_array_length: 100_000,
            max_recursion_depth: 50,
        }
    }
}

impl DecodingOptions {
    /// Limits for re-decoding bytes this process encoded itself.
    pub fn trusted() -> Self {
        Self {
            max_string_length: usize::MAX,
            max_byte_string_length: usize::MAX,
            max_array_length: usize::MAX,
            max_recursion_depth: 256,
        }
    }
}

/// Decoder input cursor over a complete message body.
pub struct BinaryReader<'a> {
    buf: &'a [u8],
    offset: usize,
    options: DecodingOptions,
    depth: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(buf: &'a [u8], options: DecodingOptions) -> Self {
        Self {
            buf,
            offset: 0,
            options,
            depth: 0,
        }
    }

    pub fn options(&self) -> &DecodingOptions {
        &self.options
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Rewind or skip to an absolute offset within the input.
    pub fn set_position(&mut self, offset: usize) -> EncodingResult<()> {
        if offset > self.buf.len() {
            return Err(EncodingError::UnexpectedEof {
                offset,
                needed: offset - self.buf.len(),
            });
        }
        self.offset = offset;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Unread input.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.offset..]
    }

    pub fn read_bytes(&mut self, n: usize) -> EncodingResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(EncodingError::UnexpectedEof {
                offset: self.offset,
                needed: n,
            });
        }
        let bytes = &self.buf[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> EncodingResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> EncodingResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i32(&mut self) -> EncodingResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> EncodingResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Validate an array length prefix.
    ///
    /// Besides the configured maximum, `len * mem_size / 32` must not exceed
    /// the bytes left, where `mem_size` is the in-memory element size.
    pub fn check_array_len(&self, len: usize, mem_size: usize) -> EncodingResult<()> {
        if len > self.options.max_array_length {
            return Err(EncodingError::LimitsExceeded(format!(
                "array length {} exceeds {}",
                len, self.options.max_array_length
            )));
        }
        if len.saturating_mul(mem_size) / 32 > self.remaining() {
            return Err(EncodingError::InvalidData(format!(
                "array length {} larger than remaining input ({} bytes)",
                len,
                self.remaining()
            )));
        }
        Ok(())
    }

    /// Run `f` one nesting level deeper over the next `len` bytes only.
    /// `f` must consume exactly those bytes.
    pub fn limited<T>(
        &mut self,
        len: usize,
        f: impl FnOnce(&mut BinaryReader<'a>) -> EncodingResult<T>,
    ) -> EncodingResult<T> {
        let start = self.offset;
        let body = self.read_bytes(len)?;
        let mut sub = BinaryReader {
            buf: body,
            offset: 0,
            options: self.options.clone(),
            depth: self.depth,
        };
        let value = sub.nested(f)?;
        if !sub.is_empty() {
            return Err(EncodingError::InvalidData(format!(
                "{} unread bytes in {}-byte body at offset {}",
                sub.remaining(),
                len,
                start
            )));
        }
        Ok(value)
    }

    /// Run `f` one nesting level deeper.
    pub fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> EncodingResult<T>,
    ) -> EncodingResult<T> {
        if self.depth >= self.options.max_recursion_depth {
            return Err(EncodingError::LimitsExceeded(format!(
                "recursion depth {} exceeded",
                self.options.max_recursion_depth
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [0x01, 0x02, 0x03, 0x04, 0xFF];
        let mut r = BinaryReader::new(&data, DecodingOptions::default());
        assert_eq!(r.read_u32().unwrap(), 0x0403_0201);
        assert_eq!(r.read_u8().unwrap(), 0xFF);
        assert!(r.is_empty());
        assert_eq!(
            r.read_u8(),
            Err(EncodingError::UnexpectedEof {
                offset: 5,
                needed: 1
            })
        );
    }

    #[test]
    fn test_rewind() {
        let data = [1, 0, 0, 0];
        let mut r = BinaryReader::new(&data, DecodingOptions::default());
        r.read_i32().unwrap();
        r.set_position(0).unwrap();
        assert_eq!(r.read_i32().unwrap(), 1);
        assert!(r.set_position(5).is_err());
    }

    #[test]
    fn test_array_len_sanity() {
        let data = [0u8; 4];
        let r = BinaryReader::new(&data, DecodingOptions::default());
        assert!(r.check_array_len(100, 1).is_ok());
        assert!(r.check_array_len(10_000, 8).is_err());
        assert!(r.check_array_len(200_000, 1).is_err());
    }

    #[test]
    fn test_recursion_limit() {
        let options = DecodingOptions {
            max_recursion_depth: 2,
            ..Default::default()
        };
        let mut r = BinaryReader::new(&[], options);
        let ok = r.nested(|r| r.nested(|_| Ok(())));
        assert!(ok.is_ok());
        let too_deep = r.nested(|r| r.nested(|r| r.nested(|_| Ok(()))));
        assert!(matches!(too_deep, Err(EncodingError::LimitsExceeded(_))));
    }
}
