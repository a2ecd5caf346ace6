// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{read_mask, DateTime, Variant};
use crate::codec::{BinaryEncodable, BinaryReader, BinaryWriter, EncodingResult};
use crate::status::StatusCode;

const HAS_VALUE: u8 = 0x01;
const HAS_STATUS: u8 = 0x02;
const HAS_SOURCE_TIMESTAMP: u8 = 0x04;
const HAS_SERVER_TIMESTAMP: u8 = 0x08;
const HAS_SOURCE_PICOSECONDS: u8 = 0x10;
const HAS_SERVER_PICOSECONDS: u8 = 0x20;

/// Value with status and timestamps. Every field is optional on the wire.
///
/// Wire order: value, status, source timestamp, source picoseconds,
/// server timestamp, server picoseconds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    pub value: Option<Variant>,
    pub status: Option<StatusCode>,
    pub source_timestamp: Option<DateTime>,
    pub source_picoseconds: Option<u16>,
    pub server_timestamp: Option<DateTime>,
    pub server_picoseconds: Option<u16>,
}

impl DataValue {
    pub fn new(value: Variant) -> Self {
        Self {
            value: Some(value),
            ..Default::default()
        }
    }

    /// Value stamped with the current time as both source and server timestamp.
    pub fn new_now(value: Variant) -> Self {
        let now = DateTime::now();
        Self {
            value: Some(value),
            source_timestamp: Some(now),
            server_timestamp: Some(now),
            ..Default::default()
        }
    }

    /// DataValue carrying only a status code.
    pub fn from_status(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Effective status (missing means Good).
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::GOOD)
    }

    fn mask(&self) -> u8 {
        let mut mask = 0;
        if self.value.is_some() {
            mask |= HAS_VALUE;
        }
        if self.status.is_some() {
            mask |= HAS_STATUS;
        }
        if self.source_timestamp.is_some() {
            mask |= HAS_SOURCE_TIMESTAMP;
        }
        if self.server_timestamp.is_some() {
            mask |= HAS_SERVER_TIMESTAMP;
        }
        if self.source_picoseconds.is_some() {
            mask |= HAS_SOURCE_PICOSECONDS;
        }
        if self.server_picoseconds.is_some() {
            mask |= HAS_SERVER_PICOSECONDS;
        }
        mask
    }
}

impl BinaryEncodable for DataValue {
    fn byte_len(&self) -> usize {
        1 + self.value.as_ref().map_or(0, Variant::byte_len)
            + self.status.map_or(0, |_| 4)
            + self.source_timestamp.map_or(0, |_| 8)
            + self.source_picoseconds.map_or(0, |_| 2)
            + self.server_timestamp.map_or(0, |_| 8)
            + self.server_picoseconds.map_or(0, |_| 2)
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        w.write_u8(self.mask())?;
        if let Some(v) = &self.value {
            v.encode(w)?;
        }
        if let Some(s) = &self.status {
            s.encode(w)?;
        }
        if let Some(t) = &self.source_timestamp {
            t.encode(w)?;
        }
        if let Some(p) = &self.source_picoseconds {
            p.encode(w)?;
        }
        if let Some(t) = &self.server_timestamp {
            t.encode(w)?;
        }
        if let Some(p) = &self.server_picoseconds {
            p.encode(w)?;
        }
        Ok(())
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        let mask = read_mask(r, 0x3F, "DataValue")?;
        let value = if mask & HAS_VALUE != 0 {
            Some(r.nested(Variant::decode)?)
        } else {
            None
        };
        let status = if mask & HAS_STATUS != 0 {
            Some(StatusCode::decode(r)?)
        } else {
            None
        };
        let source_timestamp = if mask & HAS_SOURCE_TIMESTAMP != 0 {
            Some(DateTime::decode(r)?)
        } else {
            None
        };
        let source_picoseconds = if mask & HAS_SOURCE_PICOSECONDS != 0 {
            Some(u16::decode(r)?)
        } else {
            None
        };
        let server_timestamp = if mask & HAS_SERVER_TIMESTAMP != 0 {
            Some(DateTime::decode(r)?)
        } else {
            None
        };
        let server_picoseconds = if mask & HAS_SERVER_PICOSECONDS != 0 {
            Some(u16::decode(r)?)
        } else {
            None
        };
        Ok(Self {
            value,
            status,
            source_timestamp,
            source_picoseconds,
            server_timestamp,
            server_picoseconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_from_slice, encode_to_vec, DecodingOptions};

    #[test]
    fn test_empty_data_value() {
        assert_eq!(encode_to_vec(&DataValue::default()).unwrap(), vec![0]);
    }

    #[test]
    fn test_field_order() {
        let dv = DataValue {
            value: Some(Variant::Byte(7)),
            status: Some(StatusCode::UNCERTAIN),
            source_timestamp: Some(DateTime(1)),
            source_picoseconds: Some(2),
            server_timestamp: Some(DateTime(3)),
            server_picoseconds: Some(4),
        };
        let bytes = encode_to_vec(&dv).unwrap();
        assert_eq!(bytes.len(), dv.byte_len());
        assert_eq!(bytes[0], 0x3F);
        // value: type byte + payload
        assert_eq!(&bytes[1..3], &[3, 7]);
        assert_eq!(&bytes[3..7], &0x4000_0000u32.to_le_bytes());
        assert_eq!(&bytes[7..15], &1i64.to_le_bytes());
        assert_eq!(&bytes[15..17], &2u16.to_le_bytes());
        assert_eq!(&bytes[17..25], &3i64.to_le_bytes());
        let back: DataValue = decode_from_slice(&bytes, &DecodingOptions::default()).unwrap();
        assert_eq!(back, dv);
    }
}
