// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The 25 OPC UA builtin types (Part 6 Sec.5.1.2).
//!
//! | Id | Type | Rust |
//! |----|------|------|
//! | 1-11 | Boolean .. Double | `bool`, `i8` .. `f64` |
//! | 12 | String | [`UaString`] |
//! | 13 | DateTime | [`DateTime`] |
//! | 14 | Guid | [`Guid`] |
//! | 15 | ByteString | [`ByteString`] |
//! | 16 | XmlElement | [`XmlElement`] |
//! | 17/18 | NodeId / ExpandedNodeId | [`NodeId`], [`ExpandedNodeId`] |
//! | 19 | StatusCode | [`StatusCode`](crate::status::StatusCode) |
//! | 20/21 | QualifiedName / LocalizedText | [`QualifiedName`], [`LocalizedText`] |
//! | 22 | ExtensionObject | [`ExtensionObject`] |
//! | 23 | DataValue | [`DataValue`] |
//! | 24 | Variant | [`Variant`] |
//! | 25 | DiagnosticInfo | [`DiagnosticInfo`] |

mod data_value;
mod date_time;
mod diagnostic_info;
mod extension_object;
mod guid;
mod localized_text;
mod node_id;
mod string;
mod variant;

pub use data_value::DataValue;
pub use date_time::DateTime;
pub use diagnostic_info::DiagnosticInfo;
pub use extension_object::{ExtensionObject, ExtensionObjectBody};
pub use guid::Guid;
pub use localized_text::{LocalizedText, QualifiedName};
pub use node_id::{ExpandedNodeId, Identifier, NodeId};
pub use string::{ByteString, UaString, XmlElement};
pub use variant::{Variant, VariantArray};

pub(crate) use variant::decode_builtin;

use crate::codec::{BinaryEncodable, BinaryReader, BinaryWriter, EncodingError, EncodingResult};
use crate::status::StatusCode;

/// Builtin type kind, numbered as on the wire (Variant mask bits 0-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum BuiltinType {
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    XmlElement = 16,
    NodeId = 17,
    ExpandedNodeId = 18,
    StatusCode = 19,
    QualifiedName = 20,
    LocalizedText = 21,
    ExtensionObject = 22,
    DataValue = 23,
    Variant = 24,
    DiagnosticInfo = 25,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 25] = [
        Self::Boolean,
        Self::SByte,
        Self::Byte,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Float,
        Self::Double,
        Self::String,
        Self::DateTime,
        Self::Guid,
        Self::ByteString,
        Self::XmlElement,
        Self::NodeId,
        Self::ExpandedNodeId,
        Self::StatusCode,
        Self::QualifiedName,
        Self::LocalizedText,
        Self::ExtensionObject,
        Self::DataValue,
        Self::Variant,
        Self::DiagnosticInfo,
    ];

    /// Wire type id (1-based).
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Zero-based index into per-builtin dispatch tables.
    #[inline]
    pub fn index(self) -> usize {
        self as usize - 1
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1..=25 => Some(Self::ALL[id as usize - 1]),
            _ => None,
        }
    }

    /// The builtin's DataType node id in namespace 0 (numerically equal to the wire id).
    pub fn data_type_id(self) -> NodeId {
        NodeId::numeric(0, u32::from(self.id()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::Guid => "Guid",
            Self::ByteString => "ByteString",
            Self::XmlElement => "XmlElement",
            Self::NodeId => "NodeId",
            Self::ExpandedNodeId => "ExpandedNodeId",
            Self::StatusCode => "StatusCode",
            Self::QualifiedName => "QualifiedName",
            Self::LocalizedText => "LocalizedText",
            Self::ExtensionObject => "ExtensionObject",
            Self::DataValue => "DataValue",
            Self::Variant => "Variant",
            Self::DiagnosticInfo => "DiagnosticInfo",
        }
    }

    /// Fixed wire width for overlayable builtins.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Boolean | Self::SByte | Self::Byte => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float | Self::StatusCode => Some(4),
            Self::Int64 | Self::UInt64 | Self::Double | Self::DateTime => Some(8),
            Self::Guid => Some(16),
            _ => None,
        }
    }

    /// Integer kinds, used for Number/Integer/UInteger type checks.
    pub fn is_signed_integer(self) -> bool {
        matches!(self, Self::SByte | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            Self::Byte | Self::UInt16 | Self::UInt32 | Self::UInt64
        )
    }

    pub fn is_number(self) -> bool {
        self.is_signed_integer()
            || self.is_unsigned_integer()
            || matches!(self, Self::Float | Self::Double)
    }
}

impl std::fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl BinaryEncodable for StatusCode {
    const FIXED_SIZE: Option<usize> = Some(4);

    fn byte_len(&self) -> usize {
        4
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        w.write_u32(self.0)
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        Ok(StatusCode(r.read_u32()?))
    }
}

/// Read a mask byte and reject bits outside `allowed`.
pub(crate) fn read_mask(r: &mut BinaryReader<'_>, allowed: u8, what: &str) -> EncodingResult<u8> {
    let mask = r.read_u8()?;
    if mask & !allowed != 0 {
        return Err(EncodingError::InvalidData(format!(
            "{} encoding mask 0x{:02X} has unknown bits",
            what, mask
        )));
    }
    Ok(mask)
}
