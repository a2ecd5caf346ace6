// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Variant: dynamically typed scalar or array value.
//!
//! Wire layout: one mask byte (bit 7 array, bit 6 dimensions, bits 0-5
//! builtin type id), then either the scalar body or an Int32 length and the
//! element bodies, then the dimensions array when bit 6 is set.
//!
//! Structures are always carried as ExtensionObjects. When decoding an
//! ExtensionObject whose encoding id is in the type table and whose body is
//! byte-string encoded, the body is decoded in place and surfaces as
//! [`Variant::Structure`]; anything else stays a generic ExtensionObject.

use super::{
    BuiltinType, ByteString, DataValue, DateTime, DiagnosticInfo, ExpandedNodeId, ExtensionObject,
    Guid, LocalizedText, NodeId, QualifiedName, UaString, XmlElement,
};
use crate::codec::dynamic::{self, DynamicStructure};
use crate::codec::{
    type_table, BinaryEncodable, BinaryReader, BinaryWriter, DataType, EncodingError,
    EncodingResult,
};
use crate::status::StatusCode;

const ARRAY_BIT: u8 = 0x80;
const DIMENSIONS_BIT: u8 = 0x40;
const TYPE_MASK: u8 = 0x3F;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Empty,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(UaString),
    DateTime(DateTime),
    Guid(Box<Guid>),
    ByteString(ByteString),
    XmlElement(XmlElement),
    NodeId(Box<NodeId>),
    ExpandedNodeId(Box<ExpandedNodeId>),
    StatusCode(StatusCode),
    QualifiedName(Box<QualifiedName>),
    LocalizedText(Box<LocalizedText>),
    ExtensionObject(Box<ExtensionObject>),
    DataValue(Box<DataValue>),
    DiagnosticInfo(Box<DiagnosticInfo>),
    /// Known structure, wrapped in an ExtensionObject on the wire.
    Structure(Box<DynamicStructure>),
    Array(Box<VariantArray>),
}

/// Array payload. Every value is a scalar of `element_type`, except for
/// `Variant` arrays (any scalar) and `ExtensionObject` arrays (which may hold
/// [`Variant::Structure`] values).
#[derive(Debug, Clone, PartialEq)]
pub struct VariantArray {
    pub element_type: BuiltinType,
    pub values: Vec<Variant>,
    pub dimensions: Option<Vec<i32>>,
}

impl VariantArray {
    pub fn new(element_type: BuiltinType, values: Vec<Variant>) -> Self {
        Self {
            element_type,
            values,
            dimensions: None,
        }
    }
}

type DecodeFn = fn(&mut BinaryReader<'_>) -> EncodingResult<Variant>;

/// Scalar body decoders indexed by [`BuiltinType::index`].
const DECODERS: [DecodeFn; 25] = [
    |r| bool::decode(r).map(Variant::Boolean),
    |r| i8::decode(r).map(Variant::SByte),
    |r| u8::decode(r).map(Variant::Byte),
    |r| i16::decode(r).map(Variant::Int16),
    |r| u16::decode(r).map(Variant::UInt16),
    |r| i32::decode(r).map(Variant::Int32),
    |r| u32::decode(r).map(Variant::UInt32),
    |r| i64::decode(r).map(Variant::Int64),
    |r| u64::decode(r).map(Variant::UInt64),
    |r| f32::decode(r).map(Variant::Float),
    |r| f64::decode(r).map(Variant::Double),
    |r| UaString::decode(r).map(Variant::String),
    |r| DateTime::decode(r).map(Variant::DateTime),
    |r| Guid::decode(r).map(|v| Variant::Guid(Box::new(v))),
    |r| ByteString::decode(r).map(Variant::ByteString),
    |r| XmlElement::decode(r).map(Variant::XmlElement),
    |r| NodeId::decode(r).map(|v| Variant::NodeId(Box::new(v))),
    |r| ExpandedNodeId::decode(r).map(|v| Variant::ExpandedNodeId(Box::new(v))),
    |r| StatusCode::decode(r).map(Variant::StatusCode),
    |r| QualifiedName::decode(r).map(|v| Variant::QualifiedName(Box::new(v))),
    |r| LocalizedText::decode(r).map(|v| Variant::LocalizedText(Box::new(v))),
    |r| ExtensionObject::decode(r).map(|v| Variant::ExtensionObject(Box::new(v))),
    |r| r.nested(DataValue::decode).map(|v| Variant::DataValue(Box::new(v))),
    |r| r.nested(Variant::decode),
    |r| r.nested(DiagnosticInfo::decode).map(|v| Variant::DiagnosticInfo(Box::new(v))),
];

/// Decode the body of one builtin value.
pub(crate) fn decode_builtin(
    kind: BuiltinType,
    r: &mut BinaryReader<'_>,
) -> EncodingResult<Variant> {
    DECODERS[kind.index()](r)
}

impl Variant {
    /// Builtin kind of a scalar (structures report ExtensionObject).
    pub fn builtin_type(&self) -> Option<BuiltinType> {
        Some(match self {
            Self::Empty => return None,
            Self::Boolean(_) => BuiltinType::Boolean,
            Self::SByte(_) => BuiltinType::SByte,
            Self::Byte(_) => BuiltinType::Byte,
            Self::Int16(_) => BuiltinType::Int16,
            Self::UInt16(_) => BuiltinType::UInt16,
            Self::Int32(_) => BuiltinType::Int32,
            Self::UInt32(_) => BuiltinType::UInt32,
            Self::Int64(_) => BuiltinType::Int64,
            Self::UInt64(_) => BuiltinType::UInt64,
            Self::Float(_) => BuiltinType::Float,
            Self::Double(_) => BuiltinType::Double,
            Self::String(_) => BuiltinType::String,
            Self::DateTime(_) => BuiltinType::DateTime,
            Self::Guid(_) => BuiltinType::Guid,
            Self::ByteString(_) => BuiltinType::ByteString,
            Self::XmlElement(_) => BuiltinType::XmlElement,
            Self::NodeId(_) => BuiltinType::NodeId,
            Self::ExpandedNodeId(_) => BuiltinType::ExpandedNodeId,
            Self::StatusCode(_) => BuiltinType::StatusCode,
            Self::QualifiedName(_) => BuiltinType::QualifiedName,
            Self::LocalizedText(_) => BuiltinType::LocalizedText,
            Self::ExtensionObject(_) | Self::Structure(_) => BuiltinType::ExtensionObject,
            Self::DataValue(_) => BuiltinType::DataValue,
            Self::DiagnosticInfo(_) => BuiltinType::DiagnosticInfo,
            Self::Array(a) => a.element_type,
        })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// DataType node id of the value: the structure's type id, or the builtin's.
    pub fn data_type_id(&self) -> Option<NodeId> {
        match self {
            Self::Structure(s) => Some(NodeId::ns0(s.descriptor().type_id)),
            other => other.builtin_type().map(BuiltinType::data_type_id),
        }
    }

    /// Array of scalars of one builtin kind.
    pub fn array(element_type: BuiltinType, values: Vec<Variant>) -> Self {
        Self::Array(Box::new(VariantArray::new(element_type, values)))
    }

    /// Wrap a typed structure.
    pub fn from_structure<T: DataType>(value: &T) -> EncodingResult<Self> {
        DynamicStructure::from_typed(value).map(|s| Self::Structure(Box::new(s)))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => s.as_str(),
            _ => None,
        }
    }

    /// Integer value widened to i64 (unsigned 64-bit values above i64::MAX excluded).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::SByte(v) => Some(i64::from(*v)),
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::UInt16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::UInt32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_node_id(&self) -> Option<&NodeId> {
        match self {
            Self::NodeId(n) => Some(n),
            _ => None,
        }
    }

    /// Size of the scalar body (no mask byte).
    fn body_len(&self) -> usize {
        match self {
            Self::Empty | Self::Array(_) => 0,
            Self::Boolean(_) | Self::SByte(_) | Self::Byte(_) => 1,
            Self::Int16(_) | Self::UInt16(_) => 2,
            Self::Int32(_) | Self::UInt32(_) | Self::Float(_) | Self::StatusCode(_) => 4,
            Self::Int64(_) | Self::UInt64(_) | Self::Double(_) | Self::DateTime(_) => 8,
            Self::Guid(_) => 16,
            Self::String(v) => v.byte_len(),
            Self::ByteString(v) => v.byte_len(),
            Self::XmlElement(v) => v.byte_len(),
            Self::NodeId(v) => v.byte_len(),
            Self::ExpandedNodeId(v) => v.byte_len(),
            Self::QualifiedName(v) => v.byte_len(),
            Self::LocalizedText(v) => v.byte_len(),
            Self::ExtensionObject(v) => v.byte_len(),
            Self::DataValue(v) => v.byte_len(),
            Self::DiagnosticInfo(v) => v.byte_len(),
            Self::Structure(s) => {
                NodeId::ns0(s.descriptor().binary_encoding_id).byte_len()
                    + 1
                    + 4
                    + dynamic::structure_byte_len(s)
            }
        }
    }

    /// Write the scalar body (no mask byte).
    pub(crate) fn encode_body(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        match self {
            Self::Empty | Self::Array(_) => Err(EncodingError::mismatch("scalar", self)),
            Self::Boolean(v) => v.encode(w),
            Self::SByte(v) => v.encode(w),
            Self::Byte(v) => v.encode(w),
            Self::Int16(v) => v.encode(w),
            Self::UInt16(v) => v.encode(w),
            Self::Int32(v) => v.encode(w),
            Self::UInt32(v) => v.encode(w),
            Self::Int64(v) => v.encode(w),
            Self::UInt64(v) => v.encode(w),
            Self::Float(v) => v.encode(w),
            Self::Double(v) => v.encode(w),
            Self::String(v) => v.encode(w),
            Self::DateTime(v) => v.encode(w),
            Self::Guid(v) => v.encode(w),
            Self::ByteString(v) => v.encode(w),
            Self::XmlElement(v) => v.encode(w),
            Self::NodeId(v) => v.encode(w),
            Self::ExpandedNodeId(v) => v.encode(w),
            Self::StatusCode(v) => v.encode(w),
            Self::QualifiedName(v) => v.encode(w),
            Self::LocalizedText(v) => v.encode(w),
            Self::ExtensionObject(v) => v.encode(w),
            Self::DataValue(v) => v.encode(w),
            Self::DiagnosticInfo(v) => v.encode(w),
            Self::Structure(s) => {
                NodeId::ns0(s.descriptor().binary_encoding_id).encode(w)?;
                w.write_u8(0x01)?;
                dynamic::encode_length_prefixed(s, w)
            }
        }
    }

    fn array_element_len(element_type: BuiltinType, v: &Variant) -> usize {
        if element_type == BuiltinType::Variant {
            v.byte_len()
        } else {
            v.body_len()
        }
    }

    fn check_element(element_type: BuiltinType, v: &Variant) -> EncodingResult<()> {
        let ok = match element_type {
            BuiltinType::Variant => !v.is_array(),
            other => !v.is_array() && v.builtin_type() == Some(other),
        };
        if ok {
            Ok(())
        } else {
            Err(EncodingError::mismatch(
                format!("{} array element", element_type),
                v,
            ))
        }
    }
}

/// Decode an ExtensionObject, unwrapping known byte-string encoded structures.
fn decode_extension_object_unwrapped(r: &mut BinaryReader<'_>) -> EncodingResult<Variant> {
    let start = r.position();
    let type_id = NodeId::decode(r)?;
    let encoding = r.read_u8()?;
    if encoding == 0x01 {
        if let Some(descriptor) = type_id
            .as_ns0()
            .and_then(|id| type_table().by_encoding_id(id))
        {
            let len = r.read_i32()?;
            if let Ok(len) = usize::try_from(len) {
                let s = r.limited(len, |body| dynamic::decode_structure(descriptor, body))?;
                return Ok(Variant::Structure(Box::new(s)));
            }
        }
    }
    r.set_position(start)?;
    ExtensionObject::decode(r).map(|v| Variant::ExtensionObject(Box::new(v)))
}

fn decode_scalar(kind: BuiltinType, r: &mut BinaryReader<'_>) -> EncodingResult<Variant> {
    match kind {
        BuiltinType::ExtensionObject => decode_extension_object_unwrapped(r),
        _ => decode_builtin(kind, r),
    }
}

impl BinaryEncodable for Variant {
    fn byte_len(&self) -> usize {
        match self {
            Self::Empty => 1,
            Self::Array(a) => {
                1 + 4
                    + a.values
                        .iter()
                        .map(|v| Self::array_element_len(a.element_type, v))
                        .sum::<usize>()
                    + a.dimensions.as_ref().map_or(0, |d| 4 + 4 * d.len())
            }
            scalar => 1 + scalar.body_len(),
        }
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        match self {
            Self::Empty => w.write_u8(0),
            Self::Array(a) => {
                let mut mask = a.element_type.id() | ARRAY_BIT;
                if a.dimensions.is_some() {
                    mask |= DIMENSIONS_BIT;
                }
                w.write_u8(mask)?;
                w.write_array_len(a.values.len())?;
                for v in &a.values {
                    Self::check_element(a.element_type, v)?;
                    if a.element_type == BuiltinType::Variant {
                        v.encode(w)?;
                    } else {
                        v.encode_body(w)?;
                    }
                }
                if let Some(dims) = &a.dimensions {
                    Some(dims.clone()).encode(w)?;
                }
                Ok(())
            }
            scalar => {
                let kind = scalar
                    .builtin_type()
                    .ok_or_else(|| EncodingError::mismatch("scalar", scalar))?;
                w.write_u8(kind.id())?;
                scalar.encode_body(w)
            }
        }
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        let mask = r.read_u8()?;
        let type_id = mask & TYPE_MASK;
        if type_id == 0 {
            if mask != 0 {
                return Err(EncodingError::InvalidData(format!(
                    "empty variant with mask 0x{:02X}",
                    mask
                )));
            }
            return Ok(Self::Empty);
        }
        let kind = BuiltinType::from_id(type_id).ok_or_else(|| {
            EncodingError::InvalidData(format!("variant type id {} out of range", type_id))
        })?;

        if mask & ARRAY_BIT == 0 {
            if kind == BuiltinType::Variant {
                return Err(EncodingError::InvalidData(
                    "scalar variant cannot contain a variant".to_string(),
                ));
            }
            return decode_scalar(kind, r);
        }

        let len = r.read_i32()?;
        let len = if len < 0 { 0 } else { len as usize };
        r.check_array_len(len, std::mem::size_of::<Variant>())?;
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(decode_scalar(kind, r)?);
        }
        let dimensions = if mask & DIMENSIONS_BIT != 0 {
            let dims = Option::<Vec<i32>>::decode(r)?;
            if let Some(d) = &dims {
                let product = d.iter().try_fold(1usize, |acc, x| {
                    usize::try_from(*x).ok().and_then(|x| acc.checked_mul(x))
                });
                if product != Some(len) {
                    return Err(EncodingError::InvalidData(format!(
                        "array dimensions {:?} do not match length {}",
                        d, len
                    )));
                }
            }
            dims
        } else {
            None
        };
        Ok(Self::Array(Box::new(VariantArray {
            element_type: kind,
            values,
            dimensions,
        })))
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(v: $ty) -> Self {
                    Variant::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Boolean,
    i8 => SByte,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    UaString => String,
    DateTime => DateTime,
    Guid => Guid,
    ByteString => ByteString,
    NodeId => NodeId,
    StatusCode => StatusCode,
    QualifiedName => QualifiedName,
    LocalizedText => LocalizedText,
    DataValue => DataValue,
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(UaString::from(v))
    }
}

impl From<Vec<UaString>> for Variant {
    fn from(v: Vec<UaString>) -> Self {
        Variant::array(
            BuiltinType::String,
            v.into_iter().map(Variant::String).collect(),
        )
    }
}
