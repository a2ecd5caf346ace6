// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ExtensionObject: NodeId (binary encoding id) + encoding byte + optional body.

use super::{ByteString, NodeId, XmlElement};
use crate::codec::dynamic::{self, DynamicStructure};
use crate::codec::{
    decode_from_slice, encode_to_vec, BinaryEncodable, BinaryReader, BinaryWriter, DataType,
    DecodingOptions, EncodingError, EncodingResult,
};

const NO_BODY: u8 = 0x00;
const BYTE_STRING_BODY: u8 = 0x01;
const XML_BODY: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExtensionObjectBody {
    #[default]
    None,
    /// Binary encoded body, not interpreted.
    ByteString(ByteString),
    Xml(XmlElement),
    /// Body decoded in memory (encoded as a byte string on the wire).
    Decoded(Box<DynamicStructure>),
}

/// Container for a structure whose type is only known at runtime.
///
/// `type_id` is the structure's binary encoding id (not its DataType id).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtensionObject {
    pub type_id: NodeId,
    pub body: ExtensionObjectBody,
}

impl ExtensionObject {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.type_id.is_null() && matches!(self.body, ExtensionObjectBody::None)
    }

    /// Wrap a typed structure as a byte-string body.
    pub fn from_encodable<T: DataType>(value: &T) -> EncodingResult<Self> {
        Ok(Self {
            type_id: NodeId::ns0(T::BINARY_ENCODING_ID),
            body: ExtensionObjectBody::ByteString(ByteString::from(encode_to_vec(value)?)),
        })
    }

    /// Wrap a dynamically typed structure.
    pub fn from_structure(value: DynamicStructure) -> Self {
        Self {
            type_id: NodeId::ns0(value.descriptor().binary_encoding_id),
            body: ExtensionObjectBody::Decoded(Box::new(value)),
        }
    }

    /// Binary encoding id in namespace 0, if numeric.
    pub fn encoding_id(&self) -> Option<u32> {
        self.type_id.as_ns0()
    }

    /// Decode the body as `T` when the encoding id matches.
    ///
    /// Returns `Ok(None)` for a null object or a different type.
    pub fn decode_inner<T: DataType>(
        &self,
        options: &DecodingOptions,
    ) -> EncodingResult<Option<T>> {
        if self.encoding_id() != Some(T::BINARY_ENCODING_ID) {
            return Ok(None);
        }
        match &self.body {
            ExtensionObjectBody::None => Ok(None),
            ExtensionObjectBody::ByteString(bytes) => {
                decode_from_slice(bytes.as_bytes_or_empty(), options).map(Some)
            }
            ExtensionObjectBody::Decoded(s) => s.to_typed().map(Some),
            ExtensionObjectBody::Xml(_) => Err(EncodingError::InvalidData(
                "XML encoded extension objects are not supported".to_string(),
            )),
        }
    }

    fn body_len(&self) -> usize {
        match &self.body {
            ExtensionObjectBody::None => 0,
            ExtensionObjectBody::ByteString(b) => b.byte_len(),
            ExtensionObjectBody::Xml(x) => x.byte_len(),
            ExtensionObjectBody::Decoded(s) => 4 + dynamic::structure_byte_len(s),
        }
    }
}

impl BinaryEncodable for ExtensionObject {
    fn byte_len(&self) -> usize {
        self.type_id.byte_len() + 1 + self.body_len()
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        self.type_id.encode(w)?;
        match &self.body {
            ExtensionObjectBody::None => w.write_u8(NO_BODY),
            ExtensionObjectBody::ByteString(b) => {
                w.write_u8(BYTE_STRING_BODY)?;
                b.encode(w)
            }
            ExtensionObjectBody::Xml(x) => {
                w.write_u8(XML_BODY)?;
                x.encode(w)
            }
            ExtensionObjectBody::Decoded(s) => {
                w.write_u8(BYTE_STRING_BODY)?;
                dynamic::encode_length_prefixed(s, w)
            }
        }
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        let type_id = NodeId::decode(r)?;
        let body = match r.read_u8()? {
            NO_BODY => ExtensionObjectBody::None,
            BYTE_STRING_BODY => ExtensionObjectBody::ByteString(ByteString::decode(r)?),
            XML_BODY => ExtensionObjectBody::Xml(XmlElement::decode(r)?),
            other => {
                return Err(EncodingError::InvalidData(format!(
                    "unknown ExtensionObject encoding 0x{:02X}",
                    other
                )))
            }
        };
        Ok(Self { type_id, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ReadValueId;

    #[test]
    fn test_null_extension_object() {
        let bytes = encode_to_vec(&ExtensionObject::null()).unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_typed_body_round_trip() {
        let rv = ReadValueId {
            node_id: NodeId::ns0(2258),
            attribute_id: 13,
            ..Default::default()
        };
        let eo = ExtensionObject::from_encodable(&rv).unwrap();
        assert_eq!(eo.encoding_id(), Some(ReadValueId::BINARY_ENCODING_ID));
        let opts = DecodingOptions::default();
        let back: Option<ReadValueId> = eo.decode_inner(&opts).unwrap();
        assert_eq!(back, Some(rv.clone()));

        // decoded-in-memory body encodes to the same bytes
        let dynamic = ExtensionObject::from_structure(DynamicStructure::from_typed(&rv).unwrap());
        assert_eq!(encode_to_vec(&dynamic).unwrap(), encode_to_vec(&eo).unwrap());
        assert_eq!(dynamic.byte_len(), eo.byte_len());
    }

    #[test]
    fn test_unknown_encoding_byte() {
        assert!(decode_from_slice::<ExtensionObject>(&[0, 0, 3], &DecodingOptions::default())
            .is_err());
    }
}
