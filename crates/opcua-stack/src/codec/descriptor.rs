// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime type descriptors.
//!
//! Every serializable type has a [`TypeDescriptor`]: identity (DataType id,
//! binary encoding id, table index), in-memory size, builtin kind, whether
//! the wire layout is a flat run of fixed-width fields (`overlayable`), and
//! the ordered member list. The [`TypeTable`] holds the 25 builtins followed
//! by every registered structure. It is built once on first use and is
//! read-only afterwards.

use super::BinaryEncodable;
use crate::types::{
    BuiltinType, ByteString, DataValue, DateTime, DiagnosticInfo, ExpandedNodeId,
    ExtensionObject, Guid, LocalizedText, NodeId, QualifiedName, UaString, Variant, XmlElement,
};
use crate::status::StatusCode;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Member type reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    Builtin(BuiltinType),
    /// Structure, by DataType id (namespace 0).
    Structure(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub name: &'static str,
    pub type_ref: TypeRef,
    pub is_array: bool,
}

#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub type_index: usize,
    /// DataType node id (namespace 0).
    pub type_id: u32,
    /// Binary encoding node id; 0 for builtins.
    pub binary_encoding_id: u32,
    pub name: &'static str,
    pub mem_size: usize,
    pub builtin: Option<BuiltinType>,
    /// Wire layout is a flat run of fixed-width fields.
    pub overlayable: bool,
    /// Wire size when overlayable.
    pub fixed_size: Option<usize>,
    pub members: Vec<MemberDescriptor>,
}

impl TypeDescriptor {
    pub fn is_builtin(&self) -> bool {
        self.builtin.is_some()
    }
}

/// Static descriptor of a type usable as a structure member.
pub trait Described {
    const TYPE_REF: TypeRef;
    const IS_ARRAY: bool = false;
}

impl<T: Described> Described for Option<Vec<T>> {
    const TYPE_REF: TypeRef = T::TYPE_REF;
    const IS_ARRAY: bool = true;
}

macro_rules! described_builtin {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Described for $ty {
                const TYPE_REF: TypeRef = TypeRef::Builtin(BuiltinType::$kind);
            }
        )*
    };
}

described_builtin! {
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
    XmlElement => XmlElement,
    NodeId => NodeId,
    ExpandedNodeId => ExpandedNodeId,
    StatusCode => StatusCode,
    QualifiedName => QualifiedName,
    LocalizedText => LocalizedText,
    ExtensionObject => ExtensionObject,
    DataValue => DataValue,
    Variant => Variant,
    DiagnosticInfo => DiagnosticInfo,
}

/// A protocol structure with a registered descriptor.
pub trait DataType:
    BinaryEncodable + Described + Clone + fmt::Debug + Default + PartialEq + Send + Sync + 'static
{
    const NAME: &'static str;
    const TYPE_ID: u32;
    const BINARY_ENCODING_ID: u32;

    /// Members in wire order.
    fn members() -> Vec<MemberDescriptor>;
}

fn builtin_mem_size(kind: BuiltinType) -> usize {
    use std::mem::size_of;
    match kind {
        BuiltinType::Boolean => size_of::<bool>(),
        BuiltinType::SByte => size_of::<i8>(),
        BuiltinType::Byte => size_of::<u8>(),
        BuiltinType::Int16 => size_of::<i16>(),
        BuiltinType::UInt16 => size_of::<u16>(),
        BuiltinType::Int32 => size_of::<i32>(),
        BuiltinType::UInt32 => size_of::<u32>(),
        BuiltinType::Int64 => size_of::<i64>(),
        BuiltinType::UInt64 => size_of::<u64>(),
        BuiltinType::Float => size_of::<f32>(),
        BuiltinType::Double => size_of::<f64>(),
        BuiltinType::String => size_of::<UaString>(),
        BuiltinType::DateTime => size_of::<DateTime>(),
        BuiltinType::Guid => size_of::<Guid>(),
        BuiltinType::ByteString => size_of::<ByteString>(),
        BuiltinType::XmlElement => size_of::<XmlElement>(),
        BuiltinType::NodeId => size_of::<NodeId>(),
        BuiltinType::ExpandedNodeId => size_of::<ExpandedNodeId>(),
        BuiltinType::StatusCode => size_of::<StatusCode>(),
        BuiltinType::QualifiedName => size_of::<QualifiedName>(),
        BuiltinType::LocalizedText => size_of::<LocalizedText>(),
        BuiltinType::ExtensionObject => size_of::<ExtensionObject>(),
        BuiltinType::DataValue => size_of::<DataValue>(),
        BuiltinType::Variant => size_of::<Variant>(),
        BuiltinType::DiagnosticInfo => size_of::<DiagnosticInfo>(),
    }
}

/// Immutable registry of all type descriptors.
pub struct TypeTable {
    descriptors: Vec<TypeDescriptor>,
    by_type_id: HashMap<u32, usize>,
    by_encoding_id: HashMap<u32, usize>,
}

impl TypeTable {
    fn new() -> Self {
        let mut table = Self {
            descriptors: Vec::with_capacity(128),
            by_type_id: HashMap::new(),
            by_encoding_id: HashMap::new(),
        };
        for kind in BuiltinType::ALL {
            let index = table.descriptors.len();
            table.descriptors.push(TypeDescriptor {
                type_index: index,
                type_id: u32::from(kind.id()),
                binary_encoding_id: 0,
                name: kind.name(),
                mem_size: builtin_mem_size(kind),
                builtin: Some(kind),
                overlayable: kind.fixed_size().is_some(),
                fixed_size: kind.fixed_size(),
                members: Vec::new(),
            });
            table.by_type_id.insert(u32::from(kind.id()), index);
        }
        table
    }

    /// Add a structure type. Registering the same type twice is a no-op.
    pub(crate) fn register<T: DataType>(&mut self) {
        if self.by_type_id.contains_key(&T::TYPE_ID) {
            return;
        }
        let members = T::members();
        let fixed_size = members
            .iter()
            .map(|m| match m.type_ref {
                TypeRef::Builtin(kind) if !m.is_array => kind.fixed_size(),
                _ => None,
            })
            .try_fold(0usize, |acc, size| size.map(|s| acc + s));
        let index = self.descriptors.len();
        self.descriptors.push(TypeDescriptor {
            type_index: index,
            type_id: T::TYPE_ID,
            binary_encoding_id: T::BINARY_ENCODING_ID,
            name: T::NAME,
            mem_size: std::mem::size_of::<T>(),
            builtin: None,
            overlayable: fixed_size.is_some() && !members.is_empty(),
            fixed_size,
            members,
        });
        self.by_type_id.insert(T::TYPE_ID, index);
        self.by_encoding_id.insert(T::BINARY_ENCODING_ID, index);
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TypeDescriptor> {
        self.descriptors.get(index)
    }

    pub fn builtin(&self, kind: BuiltinType) -> &TypeDescriptor {
        &self.descriptors[kind.index()]
    }

    /// Look up by DataType id (builtins included).
    pub fn by_type_id(&self, type_id: u32) -> Option<&TypeDescriptor> {
        self.by_type_id.get(&type_id).map(|i| &self.descriptors[*i])
    }

    /// Look up a structure by binary encoding id.
    pub fn by_encoding_id(&self, encoding_id: u32) -> Option<&TypeDescriptor> {
        self.by_encoding_id
            .get(&encoding_id)
            .map(|i| &self.descriptors[*i])
    }

    /// Descriptor a member refers to.
    pub fn resolve(&self, type_ref: TypeRef) -> Option<&TypeDescriptor> {
        match type_ref {
            TypeRef::Builtin(kind) => Some(self.builtin(kind)),
            TypeRef::Structure(type_id) => self.by_type_id(type_id),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.descriptors.iter()
    }
}

/// The process-wide type table.
pub fn type_table() -> &'static TypeTable {
    static TABLE: OnceLock<TypeTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = TypeTable::new();
        crate::messages::register_types(&mut table);
        log::debug!(
            "[codec] type table built: {} descriptors",
            table.descriptors.len()
        );
        table
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ChannelSecurityToken, ReadValueId, ServerStatusDataType};

    #[test]
    fn test_builtins_come_first() {
        let table = type_table();
        for kind in BuiltinType::ALL {
            let d = table.builtin(kind);
            assert_eq!(d.type_index, kind.index());
            assert_eq!(d.builtin, Some(kind));
            assert!(d.members.is_empty());
        }
        assert!(table.builtin(BuiltinType::Double).overlayable);
        assert!(!table.builtin(BuiltinType::String).overlayable);
    }

    #[test]
    fn test_structure_lookup() {
        let table = type_table();
        let d = table.by_type_id(ReadValueId::TYPE_ID).unwrap();
        assert_eq!(d.name, "ReadValueId");
        assert_eq!(d.members.len(), 4);
        assert_eq!(d.members[1].type_ref, TypeRef::Builtin(BuiltinType::UInt32));
        assert!(!d.overlayable);
        let same = table.by_encoding_id(ReadValueId::BINARY_ENCODING_ID).unwrap();
        assert_eq!(same.type_index, d.type_index);
        assert!(same.type_index >= 25);
    }

    #[test]
    fn test_overlayable_detection() {
        let table = type_table();
        // three UInt32 fields and a DateTime
        let token = table.by_type_id(ChannelSecurityToken::TYPE_ID).unwrap();
        assert!(token.overlayable);
        assert_eq!(token.fixed_size, Some(20));
        // nested structure member
        let status = table.by_type_id(ServerStatusDataType::TYPE_ID).unwrap();
        assert!(!status.overlayable);
        assert!(status
            .members
            .iter()
            .any(|m| matches!(m.type_ref, TypeRef::Structure(_))));
    }

    #[test]
    fn test_array_members_described() {
        assert!(<Option<Vec<u32>> as Described>::IS_ARRAY);
        assert_eq!(
            <Option<Vec<NodeId>> as Described>::TYPE_REF,
            TypeRef::Builtin(BuiltinType::NodeId)
        );
    }
}
