// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Namespace 0 bootstrap.
//!
//! Only the part of the standard address space the services rely on:
//! the root folders, the core reference type hierarchy, the builtin data
//! types, a few object/variable types and the `Server` object.

use std::sync::Arc;

use super::node::{access_level, Node, NodeBody, Reference, VariableAttrs, VariableValue};
use super::store::NodeStore;
use crate::config::ServerConfig;
use crate::messages::{BuildInfo, ServerState, ServerStatusDataType};
use crate::status::StatusCode;
use crate::types::{
    BuiltinType, DataValue, DateTime, LocalizedText, NodeId, QualifiedName, UaString, Variant,
};

/// Well-known namespace 0 node ids.
pub mod id {
    use crate::types::NodeId;

    pub const BOOLEAN: NodeId = NodeId::ns0(1);
    pub const STRUCTURE: NodeId = NodeId::ns0(22);
    pub const BASE_DATA_TYPE: NodeId = NodeId::ns0(24);
    pub const NUMBER: NodeId = NodeId::ns0(26);
    pub const INTEGER: NodeId = NodeId::ns0(27);
    pub const UINTEGER: NodeId = NodeId::ns0(28);

    pub const REFERENCES: NodeId = NodeId::ns0(31);
    pub const NON_HIERARCHICAL_REFERENCES: NodeId = NodeId::ns0(32);
    pub const HIERARCHICAL_REFERENCES: NodeId = NodeId::ns0(33);
    pub const HAS_CHILD: NodeId = NodeId::ns0(34);
    pub const ORGANIZES: NodeId = NodeId::ns0(35);
    pub const HAS_MODELLING_RULE: NodeId = NodeId::ns0(37);
    pub const HAS_TYPE_DEFINITION: NodeId = NodeId::ns0(40);
    pub const AGGREGATES: NodeId = NodeId::ns0(44);
    pub const HAS_SUBTYPE: NodeId = NodeId::ns0(45);
    pub const HAS_PROPERTY: NodeId = NodeId::ns0(46);
    pub const HAS_COMPONENT: NodeId = NodeId::ns0(47);

    pub const BASE_OBJECT_TYPE: NodeId = NodeId::ns0(58);
    pub const FOLDER_TYPE: NodeId = NodeId::ns0(61);
    pub const BASE_VARIABLE_TYPE: NodeId = NodeId::ns0(62);
    pub const BASE_DATA_VARIABLE_TYPE: NodeId = NodeId::ns0(63);
    pub const PROPERTY_TYPE: NodeId = NodeId::ns0(68);

    pub const ROOT_FOLDER: NodeId = NodeId::ns0(84);
    pub const OBJECTS_FOLDER: NodeId = NodeId::ns0(85);
    pub const TYPES_FOLDER: NodeId = NodeId::ns0(86);
    pub const VIEWS_FOLDER: NodeId = NodeId::ns0(87);
    pub const OBJECT_TYPES_FOLDER: NodeId = NodeId::ns0(88);
    pub const VARIABLE_TYPES_FOLDER: NodeId = NodeId::ns0(89);
    pub const DATA_TYPES_FOLDER: NodeId = NodeId::ns0(90);
    pub const REFERENCE_TYPES_FOLDER: NodeId = NodeId::ns0(91);

    pub const SERVER_STATE_TYPE: NodeId = NodeId::ns0(852);
    pub const SERVER_STATUS_DATA_TYPE: NodeId = NodeId::ns0(862);

    pub const SERVER: NodeId = NodeId::ns0(2253);
    pub const SERVER_SERVER_ARRAY: NodeId = NodeId::ns0(2254);
    pub const SERVER_NAMESPACE_ARRAY: NodeId = NodeId::ns0(2255);
    pub const SERVER_SERVER_STATUS: NodeId = NodeId::ns0(2256);
    pub const SERVER_SERVER_STATUS_START_TIME: NodeId = NodeId::ns0(2257);
    pub const SERVER_SERVER_STATUS_CURRENT_TIME: NodeId = NodeId::ns0(2258);
    pub const SERVER_SERVER_STATUS_STATE: NodeId = NodeId::ns0(2259);
}

/// Namespace 0 URI.
pub const NAMESPACE_URI: &str = "http://opcfoundation.org/UA/";

fn reference_type(
    node_id: NodeId,
    name: &str,
    is_abstract: bool,
    symmetric: bool,
    inverse_name: Option<&str>,
) -> Node {
    Node::new(
        node_id,
        QualifiedName::new(0, name),
        NodeBody::ReferenceType {
            is_abstract,
            symmetric,
            inverse_name: inverse_name.map(LocalizedText::text),
        },
    )
}

fn data_type(node_id: NodeId, name: &str, is_abstract: bool) -> Node {
    Node::new(
        node_id,
        QualifiedName::new(0, name),
        NodeBody::DataType { is_abstract },
    )
}

fn folder(node_id: NodeId, name: &str) -> Node {
    Node::object(node_id, name)
        .with_reference(Reference::forward(id::HAS_TYPE_DEFINITION, id::FOLDER_TYPE))
}

fn read_only_variable(
    node_id: NodeId,
    name: &str,
    data_type: NodeId,
    value: VariableValue,
    type_def: NodeId,
) -> Node {
    Node::new(
        node_id,
        QualifiedName::new(0, name),
        NodeBody::Variable(VariableAttrs {
            value,
            data_type,
            value_rank: super::node::VALUE_RANK_SCALAR,
            access_level: access_level::CURRENT_READ,
            user_access_level: access_level::CURRENT_READ,
            ..Default::default()
        }),
    )
    .with_reference(Reference::forward(id::HAS_TYPE_DEFINITION, type_def))
}

/// Insert `node` and hang it below `parent`.
fn add_child(
    store: &NodeStore,
    parent: &NodeId,
    reference_type_id: &NodeId,
    node: Node,
) -> Result<(), StatusCode> {
    let child = node.node_id.clone();
    store.insert(node)?;
    store.add_bidirectional(parent, reference_type_id, &child)
}

/// Populate namespace 0.
pub fn populate(
    store: &NodeStore,
    config: &ServerConfig,
    start_time: DateTime,
) -> Result<(), StatusCode> {
    store.insert(folder(id::ROOT_FOLDER, "Root"))?;
    add_child(store, &id::ROOT_FOLDER, &id::ORGANIZES, folder(id::OBJECTS_FOLDER, "Objects"))?;
    add_child(store, &id::ROOT_FOLDER, &id::ORGANIZES, folder(id::TYPES_FOLDER, "Types"))?;
    add_child(store, &id::ROOT_FOLDER, &id::ORGANIZES, folder(id::VIEWS_FOLDER, "Views"))?;
    for (folder_id, name) in [
        (id::OBJECT_TYPES_FOLDER, "ObjectTypes"),
        (id::VARIABLE_TYPES_FOLDER, "VariableTypes"),
        (id::DATA_TYPES_FOLDER, "DataTypes"),
        (id::REFERENCE_TYPES_FOLDER, "ReferenceTypes"),
    ] {
        add_child(store, &id::TYPES_FOLDER, &id::ORGANIZES, folder(folder_id, name))?;
    }

    populate_reference_types(store)?;
    populate_data_types(store)?;
    populate_object_and_variable_types(store)?;
    populate_server_object(store, config, start_time)?;
    log::debug!("[nodestore] namespace 0 ready ({} nodes)", store.len());
    Ok(())
}

fn populate_reference_types(store: &NodeStore) -> Result<(), StatusCode> {
    add_child(
        store,
        &id::REFERENCE_TYPES_FOLDER,
        &id::ORGANIZES,
        reference_type(id::REFERENCES, "References", true, true, None),
    )?;
    let hierarchy = [
        (id::REFERENCES, id::HIERARCHICAL_REFERENCES, "HierarchicalReferences", true, None),
        (id::REFERENCES, id::NON_HIERARCHICAL_REFERENCES, "NonHierarchicalReferences", true, None),
        (id::HIERARCHICAL_REFERENCES, id::HAS_CHILD, "HasChild", true, None),
        (id::HIERARCHICAL_REFERENCES, id::ORGANIZES, "Organizes", false, Some("OrganizedBy")),
        (id::HAS_CHILD, id::AGGREGATES, "Aggregates", true, None),
        (id::HAS_CHILD, id::HAS_SUBTYPE, "HasSubtype", false, Some("SubtypeOf")),
        (id::AGGREGATES, id::HAS_COMPONENT, "HasComponent", false, Some("ComponentOf")),
        (id::AGGREGATES, id::HAS_PROPERTY, "HasProperty", false, Some("PropertyOf")),
        (
            id::NON_HIERARCHICAL_REFERENCES,
            id::HAS_TYPE_DEFINITION,
            "HasTypeDefinition",
            false,
            Some("TypeDefinitionOf"),
        ),
        (
            id::NON_HIERARCHICAL_REFERENCES,
            id::HAS_MODELLING_RULE,
            "HasModellingRule",
            false,
            Some("ModellingRuleOf"),
        ),
    ];
    for (parent, node_id, name, is_abstract, inverse) in hierarchy {
        add_child(
            store,
            &parent,
            &id::HAS_SUBTYPE,
            reference_type(node_id, name, is_abstract, false, inverse),
        )?;
    }
    Ok(())
}

fn populate_data_types(store: &NodeStore) -> Result<(), StatusCode> {
    add_child(
        store,
        &id::DATA_TYPES_FOLDER,
        &id::ORGANIZES,
        data_type(id::BASE_DATA_TYPE, "BaseDataType", true),
    )?;
    add_child(store, &id::BASE_DATA_TYPE, &id::HAS_SUBTYPE, data_type(id::NUMBER, "Number", true))?;
    add_child(store, &id::NUMBER, &id::HAS_SUBTYPE, data_type(id::INTEGER, "Integer", true))?;
    add_child(store, &id::NUMBER, &id::HAS_SUBTYPE, data_type(id::UINTEGER, "UInteger", true))?;

    for kind in BuiltinType::ALL {
        // Variant (24) is BaseDataType itself.
        if kind == BuiltinType::Variant {
            continue;
        }
        let parent = if kind.is_signed_integer() {
            id::INTEGER
        } else if kind.is_unsigned_integer() {
            id::UINTEGER
        } else if kind.is_number() {
            id::NUMBER
        } else {
            id::BASE_DATA_TYPE
        };
        let is_abstract = kind == BuiltinType::ExtensionObject;
        let name = if is_abstract { "Structure" } else { kind.name() };
        add_child(
            store,
            &parent,
            &id::HAS_SUBTYPE,
            data_type(kind.data_type_id(), name, is_abstract),
        )?;
    }
    add_child(
        store,
        &id::STRUCTURE,
        &id::HAS_SUBTYPE,
        data_type(id::SERVER_STATUS_DATA_TYPE, "ServerStatusDataType", false),
    )?;
    Ok(())
}

fn populate_object_and_variable_types(store: &NodeStore) -> Result<(), StatusCode> {
    add_child(
        store,
        &id::OBJECT_TYPES_FOLDER,
        &id::ORGANIZES,
        Node::new(
            id::BASE_OBJECT_TYPE,
            QualifiedName::new(0, "BaseObjectType"),
            NodeBody::ObjectType { is_abstract: false },
        ),
    )?;
    add_child(
        store,
        &id::BASE_OBJECT_TYPE,
        &id::HAS_SUBTYPE,
        Node::new(
            id::FOLDER_TYPE,
            QualifiedName::new(0, "FolderType"),
            NodeBody::ObjectType { is_abstract: false },
        ),
    )?;

    let variable_type = |node_id: NodeId, name: &str, is_abstract: bool| {
        Node::new(
            node_id,
            QualifiedName::new(0, name),
            NodeBody::VariableType {
                value: None,
                data_type: id::BASE_DATA_TYPE,
                value_rank: -2,
                is_abstract,
            },
        )
    };
    add_child(
        store,
        &id::VARIABLE_TYPES_FOLDER,
        &id::ORGANIZES,
        variable_type(id::BASE_VARIABLE_TYPE, "BaseVariableType", true),
    )?;
    add_child(
        store,
        &id::BASE_VARIABLE_TYPE,
        &id::HAS_SUBTYPE,
        variable_type(id::BASE_DATA_VARIABLE_TYPE, "BaseDataVariableType", false),
    )?;
    add_child(
        store,
        &id::BASE_VARIABLE_TYPE,
        &id::HAS_SUBTYPE,
        variable_type(id::PROPERTY_TYPE, "PropertyType", false),
    )
}

fn build_info(config: &ServerConfig) -> BuildInfo {
    BuildInfo {
        product_uri: UaString::from(config.product_uri.as_str()),
        manufacturer_name: UaString::from(config.manufacturer_name.as_str()),
        product_name: UaString::from(config.application_name.as_str()),
        software_version: UaString::from(config.software_version.as_str()),
        build_number: UaString::from(env!("CARGO_PKG_VERSION")),
        build_date: DateTime::default(),
    }
}

fn populate_server_object(
    store: &NodeStore,
    config: &ServerConfig,
    start_time: DateTime,
) -> Result<(), StatusCode> {
    add_child(
        store,
        &id::OBJECTS_FOLDER,
        &id::ORGANIZES,
        Node::object(id::SERVER, "Server")
            .with_reference(Reference::forward(id::HAS_TYPE_DEFINITION, id::BASE_OBJECT_TYPE)),
    )?;

    let namespaces = vec![
        UaString::from(NAMESPACE_URI),
        UaString::from(config.application_uri.as_str()),
    ];
    add_child(
        store,
        &id::SERVER,
        &id::HAS_PROPERTY,
        read_only_variable(
            id::SERVER_NAMESPACE_ARRAY,
            "NamespaceArray",
            BuiltinType::String.data_type_id(),
            VariableValue::Stored(DataValue::new(Variant::from(namespaces))),
            id::PROPERTY_TYPE,
        ),
    )?;
    add_child(
        store,
        &id::SERVER,
        &id::HAS_PROPERTY,
        read_only_variable(
            id::SERVER_SERVER_ARRAY,
            "ServerArray",
            BuiltinType::String.data_type_id(),
            VariableValue::Stored(DataValue::new(Variant::from(vec![UaString::from(
                config.application_uri.as_str(),
            )]))),
            id::PROPERTY_TYPE,
        ),
    )?;

    let info = build_info(config);
    let status_source: super::node::DataSource = Arc::new(move |_, want_source| {
        let now = DateTime::now();
        let status = ServerStatusDataType {
            start_time,
            current_time: now,
            state: ServerState::Running,
            build_info: info.clone(),
            seconds_till_shutdown: 0,
            shutdown_reason: LocalizedText::default(),
        };
        let value = Variant::from_structure(&status).map_err(|e| e.status())?;
        Ok(stamped(value, now, want_source))
    });
    add_child(
        store,
        &id::SERVER,
        &id::HAS_COMPONENT,
        read_only_variable(
            id::SERVER_SERVER_STATUS,
            "ServerStatus",
            id::SERVER_STATUS_DATA_TYPE,
            VariableValue::Source(status_source),
            id::BASE_DATA_VARIABLE_TYPE,
        ),
    )?;

    add_child(
        store,
        &id::SERVER_SERVER_STATUS,
        &id::HAS_COMPONENT,
        read_only_variable(
            id::SERVER_SERVER_STATUS_START_TIME,
            "StartTime",
            BuiltinType::DateTime.data_type_id(),
            VariableValue::Stored(DataValue::new(Variant::DateTime(start_time))),
            id::BASE_DATA_VARIABLE_TYPE,
        ),
    )?;
    let current_time: super::node::DataSource = Arc::new(|_, want_source| {
        let now = DateTime::now();
        Ok(stamped(Variant::DateTime(now), now, want_source))
    });
    add_child(
        store,
        &id::SERVER_SERVER_STATUS,
        &id::HAS_COMPONENT,
        read_only_variable(
            id::SERVER_SERVER_STATUS_CURRENT_TIME,
            "CurrentTime",
            BuiltinType::DateTime.data_type_id(),
            VariableValue::Source(current_time),
            id::BASE_DATA_VARIABLE_TYPE,
        ),
    )?;
    add_child(
        store,
        &id::SERVER_SERVER_STATUS,
        &id::HAS_COMPONENT,
        read_only_variable(
            id::SERVER_SERVER_STATUS_STATE,
            "State",
            id::SERVER_STATE_TYPE,
            VariableValue::Stored(DataValue::new(Variant::Int32(ServerState::Running as i32))),
            id::BASE_DATA_VARIABLE_TYPE,
        ),
    )
}

fn stamped(value: Variant, now: DateTime, want_source: bool) -> DataValue {
    DataValue {
        value: Some(value),
        source_timestamp: want_source.then_some(now),
        ..Default::default()
    }
}
