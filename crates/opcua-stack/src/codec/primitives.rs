// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-width numerics, Boolean and generic arrays.

use super::{BinaryEncodable, BinaryReader, BinaryWriter, EncodingResult};

const F32_NAN: u32 = 0xFFC0_0000;
const F64_NAN: u64 = 0xFFF8_0000_0000_0000;

/// IEEE-754 single bit pattern with NaN canonicalized.
pub fn encode_f32_bits(value: f32) -> u32 {
    if value.is_nan() {
        F32_NAN
    } else {
        value.to_bits()
    }
}

/// IEEE-754 double bit pattern with NaN canonicalized.
pub fn encode_f64_bits(value: f64) -> u64 {
    if value.is_nan() {
        F64_NAN
    } else {
        value.to_bits()
    }
}

pub fn decode_f32(bits: u32) -> f32 {
    match bits {
        0x7F80_0000 => f32::INFINITY,
        0xFF80_0000 => f32::NEG_INFINITY,
        0x8000_0000 => -0.0,
        b if f32::from_bits(b).is_nan() => f32::NAN,
        b => f32::from_bits(b),
    }
}

pub fn decode_f64(bits: u64) -> f64 {
    match bits {
        0x7FF0_0000_0000_0000 => f64::INFINITY,
        0xFFF0_0000_0000_0000 => f64::NEG_INFINITY,
        0x8000_0000_0000_0000 => -0.0,
        b if f64::from_bits(b).is_nan() => f64::NAN,
        b => f64::from_bits(b),
    }
}

// Overlayable types write arrays as one contiguous block.
macro_rules! impl_numeric {
    ($ty:ty, $size:expr, $to:expr, $from:expr) => {
        impl BinaryEncodable for $ty {
            const FIXED_SIZE: Option<usize> = Some($size);

            #[inline]
            fn byte_len(&self) -> usize {
                $size
            }

            #[inline]
            fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
                let to: fn($ty) -> [u8; $size] = $to;
                w.write_atomic(&to(*self))
            }

            #[inline]
            fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
                let from: fn([u8; $size]) -> $ty = $from;
                Ok(from(r.read_array::<$size>()?))
            }

            fn encode_slice(items: &[Self], w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
                let to: fn($ty) -> [u8; $size] = $to;
                let mut block = vec![0u8; items.len() * $size];
                for (dst, item) in block.chunks_exact_mut($size).zip(items) {
                    dst.copy_from_slice(&to(*item));
                }
                w.write_block(&block)
            }

            fn decode_vec(r: &mut BinaryReader<'_>, len: usize) -> EncodingResult<Vec<Self>> {
                let from: fn([u8; $size]) -> $ty = $from;
                let block = r.read_bytes(len * $size)?;
                Ok(block
                    .chunks_exact($size)
                    .map(|c| {
                        let mut raw = [0u8; $size];
                        raw.copy_from_slice(c);
                        from(raw)
                    })
                    .collect())
            }
        }
    };
}

impl_numeric!(i8, 1, |v| v.to_le_bytes(), i8::from_le_bytes);
impl_numeric!(u8, 1, |v| v.to_le_bytes(), u8::from_le_bytes);
impl_numeric!(i16, 2, |v| v.to_le_bytes(), i16::from_le_bytes);
impl_numeric!(u16, 2, |v| v.to_le_bytes(), u16::from_le_bytes);
impl_numeric!(i32, 4, |v| v.to_le_bytes(), i32::from_le_bytes);
impl_numeric!(u32, 4, |v| v.to_le_bytes(), u32::from_le_bytes);
impl_numeric!(i64, 8, |v| v.to_le_bytes(), i64::from_le_bytes);
impl_numeric!(u64, 8, |v| v.to_le_bytes(), u64::from_le_bytes);
impl_numeric!(
    f32,
    4,
    |v| encode_f32_bits(v).to_le_bytes(),
    |b| decode_f32(u32::from_le_bytes(b))
);
impl_numeric!(
    f64,
    8,
    |v| encode_f64_bits(v).to_le_bytes(),
    |b| decode_f64(u64::from_le_bytes(b))
);

impl BinaryEncodable for bool {
    const FIXED_SIZE: Option<usize> = Some(1);

    fn byte_len(&self) -> usize {
        1
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        w.write_u8(u8::from(*self))
    }

    /// Any non-zero byte is true.
    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        Ok(r.read_u8()? != 0)
    }

    fn encode_slice(items: &[Self], w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        let block: Vec<u8> = items.iter().map(|b| u8::from(*b)).collect();
        w.write_block(&block)
    }

    fn decode_vec(r: &mut BinaryReader<'_>, len: usize) -> EncodingResult<Vec<Self>> {
        Ok(r.read_bytes(len)?.iter().map(|b| *b != 0).collect())
    }
}

/// Arrays: Int32 length, `-1` for null. Any negative length decodes as null.
impl<T: BinaryEncodable> BinaryEncodable for Option<Vec<T>> {
    fn byte_len(&self) -> usize {
        match self {
            None => 4,
            Some(items) => match T::FIXED_SIZE {
                Some(size) => 4 + size * items.len(),
                None => 4 + items.iter().map(BinaryEncodable::byte_len).sum::<usize>(),
            },
        }
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        match self {
            None => w.write_i32(-1),
            Some(items) => {
                w.write_array_len(items.len())?;
                T::encode_slice(items, w)
            }
        }
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        let len = r.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        let len = len as usize;
        r.check_array_len(len, std::mem::size_of::<T>())?;
        T::decode_vec(r, len).map(Some)
    }
}
