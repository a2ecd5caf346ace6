// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Descriptor-driven encoding of structures known only at runtime.
//!
//! A [`DynamicStructure`] holds one [`Variant`] per member of its
//! [`TypeDescriptor`], in member order:
//!
//! - scalar builtin member: the matching scalar variant (a `Variant` member
//!   holds any variant),
//! - scalar structure member: [`Variant::Structure`],
//! - array member: [`Variant::Array`], or [`Variant::Empty`] for a null array.
//!
//! The walker produces exactly the bytes the statically typed
//! [`BinaryEncodable`] impl of the same type produces. Overlayable structures
//! and arrays of fixed-width builtins take a block path (one bounds check,
//! one contiguous copy).

use super::descriptor::{type_table, MemberDescriptor, TypeDescriptor, TypeRef};
use super::{
    BinaryEncodable, BinaryReader, BinaryWriter, DataType, DecodingOptions, EncodingError,
    EncodingResult,
};
use crate::types::{BuiltinType, Variant, VariantArray};
use std::fmt;

#[derive(Clone)]
pub struct DynamicStructure {
    descriptor: &'static TypeDescriptor,
    pub fields: Vec<Variant>,
}

impl DynamicStructure {
    pub fn new(descriptor: &'static TypeDescriptor, fields: Vec<Variant>) -> Self {
        Self { descriptor, fields }
    }

    pub fn descriptor(&self) -> &'static TypeDescriptor {
        self.descriptor
    }

    /// Member value by name.
    pub fn field(&self, name: &str) -> Option<&Variant> {
        self.descriptor()
            .members
            .iter()
            .position(|m| m.name == name)
            .and_then(|i| self.fields.get(i))
    }

    /// Convert a typed value through its wire form.
    pub fn from_typed<T: DataType>(value: &T) -> EncodingResult<Self> {
        let descriptor = type_table()
            .by_type_id(T::TYPE_ID)
            .ok_or(EncodingError::UnknownType(T::TYPE_ID))?;
        let bytes = super::encode_to_vec(value)?;
        let mut r = BinaryReader::new(&bytes, DecodingOptions::trusted());
        decode_structure(descriptor, &mut r)
    }

    /// Convert back into a typed value.
    pub fn to_typed<T: DataType>(&self) -> EncodingResult<T> {
        let descriptor = self.descriptor();
        if descriptor.type_id != T::TYPE_ID {
            return Err(EncodingError::mismatch(T::NAME, descriptor.name));
        }
        let mut w = BinaryWriter::with_capacity(structure_byte_len(self));
        encode_structure(self, &mut w)?;
        super::decode_from_slice(&w.into_inner(), &DecodingOptions::trusted())
    }
}

impl PartialEq for DynamicStructure {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.type_index == other.descriptor.type_index && self.fields == other.fields
    }
}

impl fmt::Debug for DynamicStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct(self.descriptor.name);
        for (m, v) in self.descriptor.members.iter().zip(&self.fields) {
            d.field(m.name, v);
        }
        d.finish()
    }
}

fn resolve(type_ref: TypeRef) -> EncodingResult<&'static TypeDescriptor> {
    type_table().resolve(type_ref).ok_or(match type_ref {
        TypeRef::Builtin(kind) => EncodingError::UnknownType(u32::from(kind.id())),
        TypeRef::Structure(id) => EncodingError::UnknownType(id),
    })
}

/// Wire size of a structure body.
pub fn structure_byte_len(s: &DynamicStructure) -> usize {
    s.descriptor()
        .members
        .iter()
        .zip(&s.fields)
        .map(|(m, v)| member_byte_len(m, v))
        .sum()
}

fn member_byte_len(m: &MemberDescriptor, value: &Variant) -> usize {
    if !m.is_array {
        return scalar_byte_len(m.type_ref, value);
    }
    match value {
        Variant::Array(a) => {
            4 + a
                .values
                .iter()
                .map(|v| scalar_byte_len(m.type_ref, v))
                .sum::<usize>()
        }
        _ => 4,
    }
}

fn scalar_byte_len(type_ref: TypeRef, value: &Variant) -> usize {
    match (type_ref, value) {
        (TypeRef::Structure(_), Variant::Structure(s)) => structure_byte_len(s),
        // a Variant member carries its own mask byte
        (TypeRef::Builtin(BuiltinType::Variant), v) => v.byte_len(),
        // scalar body = full variant minus the mask byte
        (_, v) => v.byte_len().saturating_sub(1),
    }
}

/// Encode a structure body in member order.
pub fn encode_structure(s: &DynamicStructure, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
    let descriptor = s.descriptor();
    if s.fields.len() != descriptor.members.len() {
        return Err(EncodingError::InvalidData(format!(
            "{} has {} members, value has {} fields",
            descriptor.name,
            descriptor.members.len(),
            s.fields.len()
        )));
    }
    if descriptor.overlayable {
        let mut block = BinaryWriter::with_capacity(descriptor.fixed_size.unwrap_or(0));
        for (m, v) in descriptor.members.iter().zip(&s.fields) {
            encode_member(m, v, &mut block)?;
        }
        return w.write_block(&block.into_inner());
    }
    for (m, v) in descriptor.members.iter().zip(&s.fields) {
        encode_member(m, v, w)?;
    }
    Ok(())
}

/// Int32 byte length followed by the structure body (ExtensionObject payload).
pub fn encode_length_prefixed(
    s: &DynamicStructure,
    w: &mut BinaryWriter<'_>,
) -> EncodingResult<()> {
    let len = structure_byte_len(s);
    let len = i32::try_from(len)
        .map_err(|_| EncodingError::LimitsExceeded(format!("structure of {} bytes", len)))?;
    w.write_i32(len)?;
    encode_structure(s, w)
}

fn encode_member(
    m: &MemberDescriptor,
    value: &Variant,
    w: &mut BinaryWriter<'_>,
) -> EncodingResult<()> {
    if !m.is_array {
        return encode_scalar(m.type_ref, value, w);
    }
    match value {
        Variant::Empty => w.write_i32(-1),
        Variant::Array(a) => {
            w.write_array_len(a.values.len())?;
            match m.type_ref {
                TypeRef::Builtin(kind) if kind.fixed_size().is_some() => {
                    let size = kind.fixed_size().unwrap_or(0);
                    let mut block = BinaryWriter::with_capacity(size * a.values.len());
                    for v in &a.values {
                        encode_scalar(m.type_ref, v, &mut block)?;
                    }
                    w.write_block(&block.into_inner())
                }
                _ => {
                    for v in &a.values {
                        encode_scalar(m.type_ref, v, w)?;
                    }
                    Ok(())
                }
            }
        }
        other => Err(EncodingError::mismatch(
            format!("array member '{}'", m.name),
            other,
        )),
    }
}

fn encode_scalar(
    type_ref: TypeRef,
    value: &Variant,
    w: &mut BinaryWriter<'_>,
) -> EncodingResult<()> {
    match type_ref {
        TypeRef::Builtin(BuiltinType::Variant) => value.encode(w),
        TypeRef::Builtin(kind) => {
            if value.is_array() || value.builtin_type() != Some(kind) {
                return Err(EncodingError::mismatch(kind.name(), value));
            }
            value.encode_body(w)
        }
        TypeRef::Structure(type_id) => match value {
            Variant::Structure(s) if s.descriptor().type_id == type_id => encode_structure(s, w),
            other => Err(EncodingError::mismatch(format!("structure i={}", type_id), other)),
        },
    }
}

/// Decode a structure body described by `descriptor`.
pub fn decode_structure(
    descriptor: &'static TypeDescriptor,
    r: &mut BinaryReader<'_>,
) -> EncodingResult<DynamicStructure> {
    if descriptor.is_builtin() {
        return Err(EncodingError::mismatch("structure", descriptor.name));
    }
    let fields = match descriptor.fixed_size {
        Some(size) if descriptor.overlayable => {
            let block = r.read_bytes(size)?;
            let mut sub = BinaryReader::new(block, r.options().clone());
            decode_members(descriptor, &mut sub)?
        }
        _ => decode_members(descriptor, r)?,
    };
    Ok(DynamicStructure { descriptor, fields })
}

fn decode_members(
    descriptor: &TypeDescriptor,
    r: &mut BinaryReader<'_>,
) -> EncodingResult<Vec<Variant>> {
    let mut fields = Vec::with_capacity(descriptor.members.len());
    for m in &descriptor.members {
        fields.push(decode_member(m, r)?);
    }
    Ok(fields)
}

fn decode_member(m: &MemberDescriptor, r: &mut BinaryReader<'_>) -> EncodingResult<Variant> {
    if !m.is_array {
        return decode_scalar(m.type_ref, r);
    }
    let len = r.read_i32()?;
    if len < 0 {
        return Ok(Variant::Empty);
    }
    let len = len as usize;
    let element = resolve(m.type_ref)?;
    r.check_array_len(len, element.mem_size)?;
    let values = match (m.type_ref, element.fixed_size) {
        (TypeRef::Builtin(_), Some(size)) => {
            let block = r.read_bytes(len * size)?;
            let mut sub = BinaryReader::new(block, r.options().clone());
            decode_elements(m.type_ref, len, &mut sub)?
        }
        _ => decode_elements(m.type_ref, len, r)?,
    };
    let element_type = match m.type_ref {
        TypeRef::Builtin(kind) => kind,
        TypeRef::Structure(_) => BuiltinType::ExtensionObject,
    };
    Ok(Variant::Array(Box::new(VariantArray::new(element_type, values))))
}

fn decode_elements(
    type_ref: TypeRef,
    len: usize,
    r: &mut BinaryReader<'_>,
) -> EncodingResult<Vec<Variant>> {
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(decode_scalar(type_ref, r)?);
    }
    Ok(values)
}

fn decode_scalar(type_ref: TypeRef, r: &mut BinaryReader<'_>) -> EncodingResult<Variant> {
    match type_ref {
        TypeRef::Builtin(kind) => crate::types::decode_builtin(kind, r),
        TypeRef::Structure(_) => {
            let descriptor = resolve(type_ref)?;
            r.nested(|r| decode_structure(descriptor, r))
                .map(|s| Variant::Structure(Box::new(s)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_to_vec;
    use crate::messages::{
        BrowseResult, ChannelSecurityToken, NodeClass, ReferenceDescription, ServerState,
        ServerStatusDataType,
    };
    use crate::types::{ByteString, DateTime, LocalizedText, NodeId, QualifiedName, UaString};
    use crate::status::StatusCode;

    fn same_bytes<T: DataType>(value: &T) -> DynamicStructure {
        let s = DynamicStructure::from_typed(value).unwrap();
        let mut w = BinaryWriter::new();
        encode_structure(&s, &mut w).unwrap();
        let dynamic_bytes = w.into_inner();
        assert_eq!(dynamic_bytes, encode_to_vec(value).unwrap());
        assert_eq!(structure_byte_len(&s), dynamic_bytes.len());
        assert_eq!(&s.to_typed::<T>().unwrap(), value);
        s
    }

    #[test]
    fn test_overlayable_structure() {
        let token = ChannelSecurityToken {
            channel_id: 7,
            token_id: 2,
            created_at: DateTime(42),
            revised_lifetime: 600_000,
        };
        let s = same_bytes(&token);
        assert_eq!(s.field("token_id"), Some(&Variant::UInt32(2)));
    }

    #[test]
    fn test_nested_and_array_members() {
        let result = BrowseResult {
            status_code: StatusCode::GOOD,
            continuation_point: ByteString::null(),
            references: Some(vec![
                ReferenceDescription {
                    reference_type_id: NodeId::ns0(35),
                    is_forward: true,
                    node_id: NodeId::ns0(2253).into(),
                    browse_name: QualifiedName::new(0, "Server"),
                    display_name: LocalizedText::text("Server"),
                    node_class: NodeClass::Object,
                    type_definition: NodeId::ns0(2004).into(),
                },
                ReferenceDescription::default(),
            ]),
        };
        let s = same_bytes(&result);
        match s.field("references") {
            Some(Variant::Array(a)) => {
                assert_eq!(a.values.len(), 2);
                assert!(matches!(a.values[0], Variant::Structure(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
        // null array member
        let empty = BrowseResult::default();
        let s = same_bytes(&empty);
        assert_eq!(s.field("references"), Some(&Variant::Empty));
    }

    #[test]
    fn test_structure_in_structure() {
        let status = ServerStatusDataType {
            start_time: DateTime(1),
            current_time: DateTime(2),
            state: ServerState::Running,
            build_info: Default::default(),
            seconds_till_shutdown: 0,
            shutdown_reason: LocalizedText::default(),
        };
        same_bytes(&status);
    }

    #[test]
    fn test_field_type_mismatch() {
        let token = ChannelSecurityToken::default();
        let mut s = DynamicStructure::from_typed(&token).unwrap();
        s.fields[0] = Variant::String(UaString::from("not a u32"));
        let mut w = BinaryWriter::new();
        assert!(matches!(
            encode_structure(&s, &mut w),
            Err(EncodingError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_structure_fails() {
        let token = ChannelSecurityToken::default();
        let bytes = encode_to_vec(&token).unwrap();
        let descriptor = type_table().by_type_id(ChannelSecurityToken::TYPE_ID).unwrap();
        let mut r = BinaryReader::new(&bytes[..bytes.len() - 1], DecodingOptions::default());
        assert!(decode_structure(descriptor, &mut r).is_err());
    }
}
