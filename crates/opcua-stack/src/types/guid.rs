// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use crate::codec::{BinaryEncodable, BinaryReader, BinaryWriter, EncodingResult};
use std::fmt;

/// 16-byte GUID: `data1` u32, `data2` u16, `data3` u16 little-endian, then 8 raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const NULL: Guid = Guid {
        data1: 0,
        data2: 0,
        data3: 0,
        data4: [0; 8],
    };

    /// Build from the 16 wire bytes.
    pub fn from_wire(bytes: [u8; 16]) -> Self {
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&bytes[8..]);
        Self {
            data1: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_le_bytes([bytes[4], bytes[5]]),
            data3: u16::from_le_bytes([bytes[6], bytes[7]]),
            data4,
        }
    }

    pub fn to_wire(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..4].copy_from_slice(&self.data1.to_le_bytes());
        out[4..6].copy_from_slice(&self.data2.to_le_bytes());
        out[6..8].copy_from_slice(&self.data3.to_le_bytes());
        out[8..].copy_from_slice(&self.data4);
        out
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-",
            self.data1, self.data2, self.data3, self.data4[0], self.data4[1]
        )?;
        for b in &self.data4[2..] {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl BinaryEncodable for Guid {
    const FIXED_SIZE: Option<usize> = Some(16);

    fn byte_len(&self) -> usize {
        16
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        w.write_atomic(&self.to_wire())
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        Ok(Self::from_wire(r.read_array()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_to_vec;

    #[test]
    fn test_guid_wire_layout() {
        let g = Guid {
            data1: 0x7252_0A7C,
            data2: 0x1B2D,
            data3: 0x4C1E,
            data4: [0x9A, 0x10, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06],
        };
        let bytes = encode_to_vec(&g).unwrap();
        assert_eq!(&bytes[..4], &[0x7C, 0x0A, 0x52, 0x72]);
        assert_eq!(&bytes[4..6], &[0x2D, 0x1B]);
        assert_eq!(Guid::from_wire(g.to_wire()), g);
        assert_eq!(g.to_string(), "72520A7C-1B2D-4C1E-9A10-010203040506");
    }
}
