// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{read_mask, UaString};
use crate::codec::{BinaryEncodable, BinaryReader, BinaryWriter, EncodingResult};
use crate::status::StatusCode;

const HAS_SYMBOLIC_ID: u8 = 0x01;
const HAS_NAMESPACE_URI: u8 = 0x02;
const HAS_LOCALIZED_TEXT: u8 = 0x04;
const HAS_LOCALE: u8 = 0x08;
const HAS_ADDITIONAL_INFO: u8 = 0x10;
const HAS_INNER_STATUS: u8 = 0x20;
const HAS_INNER_DIAGNOSTIC: u8 = 0x40;

/// Recursive diagnostic record. The inner chain depth is bounded by the
/// reader's recursion limit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiagnosticInfo {
    pub symbolic_id: Option<i32>,
    pub namespace_uri: Option<i32>,
    pub locale: Option<i32>,
    pub localized_text: Option<i32>,
    pub additional_info: Option<UaString>,
    pub inner_status_code: Option<StatusCode>,
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

impl DiagnosticInfo {
    fn mask(&self) -> u8 {
        let mut mask = 0;
        if self.symbolic_id.is_some() {
            mask |= HAS_SYMBOLIC_ID;
        }
        if self.namespace_uri.is_some() {
            mask |= HAS_NAMESPACE_URI;
        }
        if self.localized_text.is_some() {
            mask |= HAS_LOCALIZED_TEXT;
        }
        if self.locale.is_some() {
            mask |= HAS_LOCALE;
        }
        if self.additional_info.is_some() {
            mask |= HAS_ADDITIONAL_INFO;
        }
        if self.inner_status_code.is_some() {
            mask |= HAS_INNER_STATUS;
        }
        if self.inner_diagnostic_info.is_some() {
            mask |= HAS_INNER_DIAGNOSTIC;
        }
        mask
    }
}

fn opt<T>(mask: u8, bit: u8, r: &mut BinaryReader<'_>) -> EncodingResult<Option<T>>
where
    T: BinaryEncodable,
{
    if mask & bit != 0 {
        T::decode(r).map(Some)
    } else {
        Ok(None)
    }
}

impl BinaryEncodable for DiagnosticInfo {
    fn byte_len(&self) -> usize {
        1 + self.symbolic_id.map_or(0, |_| 4)
            + self.namespace_uri.map_or(0, |_| 4)
            + self.locale.map_or(0, |_| 4)
            + self.localized_text.map_or(0, |_| 4)
            + self.additional_info.as_ref().map_or(0, UaString::byte_len)
            + self.inner_status_code.map_or(0, |_| 4)
            + self
                .inner_diagnostic_info
                .as_ref()
                .map_or(0, |d| d.byte_len())
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        w.write_u8(self.mask())?;
        if let Some(v) = self.symbolic_id {
            v.encode(w)?;
        }
        if let Some(v) = self.namespace_uri {
            v.encode(w)?;
        }
        if let Some(v) = self.locale {
            v.encode(w)?;
        }
        if let Some(v) = self.localized_text {
            v.encode(w)?;
        }
        if let Some(v) = &self.additional_info {
            v.encode(w)?;
        }
        if let Some(v) = &self.inner_status_code {
            v.encode(w)?;
        }
        if let Some(v) = &self.inner_diagnostic_info {
            v.encode(w)?;
        }
        Ok(())
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        let mask = read_mask(r, 0x7F, "DiagnosticInfo")?;
        let symbolic_id = opt(mask, HAS_SYMBOLIC_ID, r)?;
        let namespace_uri = opt(mask, HAS_NAMESPACE_URI, r)?;
        let locale = opt(mask, HAS_LOCALE, r)?;
        let localized_text = opt(mask, HAS_LOCALIZED_TEXT, r)?;
        let additional_info = opt(mask, HAS_ADDITIONAL_INFO, r)?;
        let inner_status_code = opt(mask, HAS_INNER_STATUS, r)?;
        let inner_diagnostic_info = if mask & HAS_INNER_DIAGNOSTIC != 0 {
            Some(Box::new(r.nested(DiagnosticInfo::decode)?))
        } else {
            None
        };
        Ok(Self {
            symbolic_id,
            namespace_uri,
            locale,
            localized_text,
            additional_info,
            inner_status_code,
            inner_diagnostic_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_from_slice, encode_to_vec, DecodingOptions, EncodingError};

    #[test]
    fn test_nested_chain_round_trip() {
        let inner = DiagnosticInfo {
            inner_status_code: Some(StatusCode::BAD_TIMEOUT),
            inner_diagnostic_info: Some(Box::default()),
            ..Default::default()
        };
        let outer = DiagnosticInfo {
            symbolic_id: Some(3),
            locale: Some(1),
            additional_info: Some(UaString::null()),
            inner_diagnostic_info: Some(Box::new(inner)),
            ..Default::default()
        };
        let bytes = encode_to_vec(&outer).unwrap();
        assert_eq!(bytes.len(), outer.byte_len());
        let back: DiagnosticInfo = decode_from_slice(&bytes, &DecodingOptions::default()).unwrap();
        assert_eq!(back, outer);
    }

    #[test]
    fn test_locale_precedes_localized_text() {
        let d = DiagnosticInfo {
            locale: Some(0x11),
            localized_text: Some(0x22),
            ..Default::default()
        };
        let bytes = encode_to_vec(&d).unwrap();
        assert_eq!(bytes[0], HAS_LOCALE | HAS_LOCALIZED_TEXT);
        assert_eq!(bytes[1], 0x11);
        assert_eq!(bytes[5], 0x22);
    }

    #[test]
    fn test_recursion_bounded() {
        // 0x40 repeated: each level only says "inner diagnostic follows"
        let bytes = vec![HAS_INNER_DIAGNOSTIC; 200];
        let res = decode_from_slice::<DiagnosticInfo>(&bytes, &DecodingOptions::default());
        assert!(matches!(res, Err(EncodingError::LimitsExceeded(_))));
    }
}
