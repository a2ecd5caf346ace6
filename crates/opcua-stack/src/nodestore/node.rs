// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Address space nodes.
//!
//! A [`Node`] is immutable once published to the store; editing goes
//! through [`NodeStore::edit`](super::NodeStore::edit), which clones,
//! mutates and swaps.

use std::fmt;
use std::sync::Arc;

use crate::messages::{Argument, NodeClass};
use crate::status::StatusCode;
use crate::types::{DataValue, LocalizedText, NodeId, QualifiedName, Variant};

/// Attribute ids (Part 6 Annex A.1).
pub mod attribute_id {
    pub const NODE_ID: u32 = 1;
    pub const NODE_CLASS: u32 = 2;
    pub const BROWSE_NAME: u32 = 3;
    pub const DISPLAY_NAME: u32 = 4;
    pub const DESCRIPTION: u32 = 5;
    pub const WRITE_MASK: u32 = 6;
    pub const USER_WRITE_MASK: u32 = 7;
    pub const IS_ABSTRACT: u32 = 8;
    pub const SYMMETRIC: u32 = 9;
    pub const INVERSE_NAME: u32 = 10;
    pub const CONTAINS_NO_LOOPS: u32 = 11;
    pub const EVENT_NOTIFIER: u32 = 12;
    pub const VALUE: u32 = 13;
    pub const DATA_TYPE: u32 = 14;
    pub const VALUE_RANK: u32 = 15;
    pub const ARRAY_DIMENSIONS: u32 = 16;
    pub const ACCESS_LEVEL: u32 = 17;
    pub const USER_ACCESS_LEVEL: u32 = 18;
    pub const MINIMUM_SAMPLING_INTERVAL: u32 = 19;
    pub const HISTORIZING: u32 = 20;
    pub const EXECUTABLE: u32 = 21;
    pub const USER_EXECUTABLE: u32 = 22;

    pub fn is_valid(id: u32) -> bool {
        (NODE_ID..=USER_EXECUTABLE).contains(&id)
    }
}

/// AccessLevel bits.
pub mod access_level {
    pub const CURRENT_READ: u8 = 0x01;
    pub const CURRENT_WRITE: u8 = 0x02;
}

/// ValueRank -1: scalar.
pub const VALUE_RANK_SCALAR: i32 = -1;

/// Produces a variable's value on every read.
///
/// Arguments: the variable's node id and whether a source timestamp is wanted.
pub type DataSource =
    Arc<dyn Fn(&NodeId, bool) -> Result<DataValue, StatusCode> + Send + Sync>;

/// Invoked by the Call service: `(object_id, input_arguments) -> outputs`.
pub type MethodCallback =
    Arc<dyn Fn(&NodeId, &[Variant]) -> Result<Vec<Variant>, StatusCode> + Send + Sync>;

/// Directed, typed edge stored on its source node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub reference_type_id: NodeId,
    pub is_forward: bool,
    pub target_id: NodeId,
}

impl Reference {
    pub fn forward(reference_type_id: NodeId, target_id: NodeId) -> Self {
        Self {
            reference_type_id,
            is_forward: true,
            target_id,
        }
    }

    pub fn inverse(reference_type_id: NodeId, target_id: NodeId) -> Self {
        Self {
            reference_type_id,
            is_forward: false,
            target_id,
        }
    }
}

/// Where a variable's value comes from.
#[derive(Clone)]
pub enum VariableValue {
    Stored(DataValue),
    Source(DataSource),
}

impl fmt::Debug for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored(v) => f.debug_tuple("Stored").field(v).finish(),
            Self::Source(_) => f.write_str("Source(..)"),
        }
    }
}

impl Default for VariableValue {
    fn default() -> Self {
        Self::Stored(DataValue::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct VariableAttrs {
    pub value: VariableValue,
    pub data_type: NodeId,
    pub value_rank: i32,
    pub array_dimensions: Option<Vec<u32>>,
    pub access_level: u8,
    pub user_access_level: u8,
    pub minimum_sampling_interval: f64,
    pub historizing: bool,
}

#[derive(Clone, Default)]
pub struct MethodAttrs {
    pub executable: bool,
    pub user_executable: bool,
    pub input_arguments: Vec<Argument>,
    pub output_arguments: Vec<Argument>,
    pub callback: Option<MethodCallback>,
}

impl fmt::Debug for MethodAttrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodAttrs")
            .field("executable", &self.executable)
            .field("user_executable", &self.user_executable)
            .field("input_arguments", &self.input_arguments.len())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Node-class specific attributes.
#[derive(Debug, Clone)]
pub enum NodeBody {
    Object {
        event_notifier: u8,
    },
    Variable(VariableAttrs),
    Method(MethodAttrs),
    ObjectType {
        is_abstract: bool,
    },
    VariableType {
        value: Option<DataValue>,
        data_type: NodeId,
        value_rank: i32,
        is_abstract: bool,
    },
    ReferenceType {
        is_abstract: bool,
        symmetric: bool,
        inverse_name: Option<LocalizedText>,
    },
    DataType {
        is_abstract: bool,
    },
    View {
        contains_no_loops: bool,
        event_notifier: u8,
    },
}

/// One address space entry.
#[derive(Debug, Clone)]
pub struct Node {
    pub node_id: NodeId,
    pub browse_name: QualifiedName,
    pub display_name: LocalizedText,
    pub description: LocalizedText,
    pub write_mask: u32,
    pub user_write_mask: u32,
    pub references: Vec<Reference>,
    pub body: NodeBody,
}

impl Node {
    pub fn new(node_id: NodeId, browse_name: QualifiedName, body: NodeBody) -> Self {
        let display_name = LocalizedText::text(browse_name.name.as_str_or_empty());
        Self {
            node_id,
            browse_name,
            display_name,
            description: LocalizedText::default(),
            write_mask: 0,
            user_write_mask: 0,
            references: Vec::new(),
            body,
        }
    }

    pub fn object(node_id: NodeId, name: &str) -> Self {
        Self::new(
            node_id,
            QualifiedName::new(0, name),
            NodeBody::Object { event_notifier: 0 },
        )
    }

    /// Readable and writable scalar variable with a stored value.
    pub fn variable(node_id: NodeId, name: &str, data_type: NodeId, value: Variant) -> Self {
        let namespace = node_id.namespace;
        Self::new(
            node_id,
            QualifiedName::new(namespace, name),
            NodeBody::Variable(VariableAttrs {
                value: VariableValue::Stored(DataValue::new_now(value)),
                data_type,
                value_rank: VALUE_RANK_SCALAR,
                array_dimensions: None,
                access_level: access_level::CURRENT_READ | access_level::CURRENT_WRITE,
                user_access_level: access_level::CURRENT_READ | access_level::CURRENT_WRITE,
                minimum_sampling_interval: 0.0,
                historizing: false,
            }),
        )
    }

    pub fn method(node_id: NodeId, name: &str, callback: MethodCallback) -> Self {
        let namespace = node_id.namespace;
        Self::new(
            node_id,
            QualifiedName::new(namespace, name),
            NodeBody::Method(MethodAttrs {
                executable: true,
                user_executable: true,
                callback: Some(callback),
                ..Default::default()
            }),
        )
    }

    pub fn with_description(mut self, text: &str) -> Self {
        self.description = LocalizedText::text(text);
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    pub fn node_class(&self) -> NodeClass {
        match self.body {
            NodeBody::Object { .. } => NodeClass::Object,
            NodeBody::Variable(_) => NodeClass::Variable,
            NodeBody::Method(_) => NodeClass::Method,
            NodeBody::ObjectType { .. } => NodeClass::ObjectType,
            NodeBody::VariableType { .. } => NodeClass::VariableType,
            NodeBody::ReferenceType { .. } => NodeClass::ReferenceType,
            NodeBody::DataType { .. } => NodeClass::DataType,
            NodeBody::View { .. } => NodeClass::View,
        }
    }

    pub fn as_variable(&self) -> Option<&VariableAttrs> {
        match &self.body {
            NodeBody::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_variable_mut(&mut self) -> Option<&mut VariableAttrs> {
        match &mut self.body {
            NodeBody::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodAttrs> {
        match &self.body {
            NodeBody::Method(m) => Some(m),
            _ => None,
        }
    }

    /// Forward target of the first `HasTypeDefinition` reference.
    pub fn type_definition(&self) -> Option<&NodeId> {
        self.references
            .iter()
            .find(|r| r.is_forward && r.reference_type_id == super::ns0::id::HAS_TYPE_DEFINITION)
            .map(|r| &r.target_id)
    }

    pub fn has_reference(&self, reference: &Reference) -> bool {
        self.references.contains(reference)
    }

    /// Current value of a Variable or VariableType.
    pub fn read_value(&self, want_source_timestamp: bool) -> Result<DataValue, StatusCode> {
        match &self.body {
            NodeBody::Variable(v) => {
                if v.access_level & access_level::CURRENT_READ == 0 {
                    return Err(StatusCode::BAD_NOT_READABLE);
                }
                match &v.value {
                    VariableValue::Stored(dv) => Ok(dv.clone()),
                    VariableValue::Source(source) => source(&self.node_id, want_source_timestamp),
                }
            }
            NodeBody::VariableType { value, .. } => Ok(value.clone().unwrap_or_default()),
            _ => Err(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
        }
    }

    /// Any attribute except Value, as a Variant.
    pub fn read_attribute(&self, attribute: u32) -> Result<Variant, StatusCode> {
        use attribute_id as a;
        let invalid = Err(StatusCode::BAD_ATTRIBUTE_ID_INVALID);
        let value = match attribute {
            a::NODE_ID => Variant::from(self.node_id.clone()),
            a::NODE_CLASS => Variant::Int32(self.node_class() as i32),
            a::BROWSE_NAME => Variant::from(self.browse_name.clone()),
            a::DISPLAY_NAME => Variant::from(self.display_name.clone()),
            a::DESCRIPTION => Variant::from(self.description.clone()),
            a::WRITE_MASK => Variant::UInt32(self.write_mask),
            a::USER_WRITE_MASK => Variant::UInt32(self.user_write_mask),
            a::IS_ABSTRACT => match &self.body {
                NodeBody::ObjectType { is_abstract }
                | NodeBody::VariableType { is_abstract, .. }
                | NodeBody::ReferenceType { is_abstract, .. }
                | NodeBody::DataType { is_abstract } => Variant::Boolean(*is_abstract),
                _ => return invalid,
            },
            a::SYMMETRIC => match &self.body {
                NodeBody::ReferenceType { symmetric, .. } => Variant::Boolean(*symmetric),
                _ => return invalid,
            },
            a::INVERSE_NAME => match &self.body {
                NodeBody::ReferenceType { inverse_name, .. } => {
                    Variant::from(inverse_name.clone().unwrap_or_default())
                }
                _ => return invalid,
            },
            a::CONTAINS_NO_LOOPS => match &self.body {
                NodeBody::View {
                    contains_no_loops, ..
                } => Variant::Boolean(*contains_no_loops),
                _ => return invalid,
            },
            a::EVENT_NOTIFIER => match &self.body {
                NodeBody::Object { event_notifier } | NodeBody::View { event_notifier, .. } => {
                    Variant::Byte(*event_notifier)
                }
                _ => return invalid,
            },
            a::VALUE => {
                return self
                    .read_value(false)
                    .map(|dv| dv.value.unwrap_or_default())
            }
            a::DATA_TYPE => match &self.body {
                NodeBody::Variable(v) => Variant::from(v.data_type.clone()),
                NodeBody::VariableType { data_type, .. } => Variant::from(data_type.clone()),
                _ => return invalid,
            },
            a::VALUE_RANK => match &self.body {
                NodeBody::Variable(v) => Variant::Int32(v.value_rank),
                NodeBody::VariableType { value_rank, .. } => Variant::Int32(*value_rank),
                _ => return invalid,
            },
            a::ARRAY_DIMENSIONS => match &self.body {
                NodeBody::Variable(v) => match &v.array_dimensions {
                    Some(dims) => Variant::array(
                        crate::types::BuiltinType::UInt32,
                        dims.iter().copied().map(Variant::UInt32).collect(),
                    ),
                    None => Variant::Empty,
                },
                NodeBody::VariableType { .. } => Variant::Empty,
                _ => return invalid,
            },
            a::ACCESS_LEVEL => match &self.body {
                NodeBody::Variable(v) => Variant::Byte(v.access_level),
                _ => return invalid,
            },
            a::USER_ACCESS_LEVEL => match &self.body {
                NodeBody::Variable(v) => Variant::Byte(v.user_access_level),
                _ => return invalid,
            },
            a::MINIMUM_SAMPLING_INTERVAL => match &self.body {
                NodeBody::Variable(v) => Variant::Double(v.minimum_sampling_interval),
                _ => return invalid,
            },
            a::HISTORIZING => match &self.body {
                NodeBody::Variable(v) => Variant::Boolean(v.historizing),
                _ => return invalid,
            },
            a::EXECUTABLE => match &self.body {
                NodeBody::Method(m) => Variant::Boolean(m.executable),
                _ => return invalid,
            },
            a::USER_EXECUTABLE => match &self.body {
                NodeBody::Method(m) => Variant::Boolean(m.user_executable),
                _ => return invalid,
            },
            _ => return invalid,
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BuiltinType;

    #[test]
    fn test_variable_attributes() {
        let node = Node::variable(
            NodeId::numeric(1, 10),
            "Counter",
            BuiltinType::Int32.data_type_id(),
            Variant::Int32(3),
        );
        assert_eq!(node.node_class(), NodeClass::Variable);
        assert_eq!(
            node.read_attribute(attribute_id::VALUE).unwrap(),
            Variant::Int32(3)
        );
        assert_eq!(
            node.read_attribute(attribute_id::VALUE_RANK).unwrap(),
            Variant::Int32(-1)
        );
        assert_eq!(
            node.read_attribute(attribute_id::DISPLAY_NAME).unwrap(),
            Variant::from(LocalizedText::text("Counter"))
        );
        assert_eq!(
            node.read_attribute(attribute_id::EXECUTABLE),
            Err(StatusCode::BAD_ATTRIBUTE_ID_INVALID)
        );
        assert_eq!(
            node.read_attribute(99),
            Err(StatusCode::BAD_ATTRIBUTE_ID_INVALID)
        );
    }

    #[test]
    fn test_data_source_is_called() {
        let mut node = Node::variable(
            NodeId::numeric(1, 11),
            "Now",
            BuiltinType::Int32.data_type_id(),
            Variant::Empty,
        );
        if let Some(v) = node.as_variable_mut() {
            v.value =
                VariableValue::Source(Arc::new(|_, _| Ok(DataValue::new(Variant::Int32(42)))));
        }
        assert_eq!(node.read_value(false).unwrap().value, Some(Variant::Int32(42)));
    }

    #[test]
    fn test_unreadable_variable() {
        let mut node = Node::variable(
            NodeId::numeric(1, 12),
            "Secret",
            BuiltinType::Int32.data_type_id(),
            Variant::Int32(1),
        );
        if let Some(v) = node.as_variable_mut() {
            v.access_level = access_level::CURRENT_WRITE;
        }
        assert_eq!(node.read_value(false), Err(StatusCode::BAD_NOT_READABLE));
    }
}
