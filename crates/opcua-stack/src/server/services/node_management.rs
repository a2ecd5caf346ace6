// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! AddNodes, AddReferences, DeleteNodes and DeleteReferences.
//!
//! Only Object and Variable nodes can be added from the wire. Methods and
//! data sources carry callbacks and are installed through the
//! [`NodeStore`] API instead.

use crate::codec::{DataType, DecodingOptions};
use crate::messages::{
    specified, AddNodesItem, AddNodesRequest, AddNodesResponse, AddNodesResult,
    AddReferencesItem, AddReferencesRequest, AddReferencesResponse, DeleteNodesItem,
    DeleteNodesRequest, DeleteNodesResponse, DeleteReferencesItem, DeleteReferencesRequest,
    DeleteReferencesResponse, NodeClass, ObjectAttributes, ResponseHeader, SupportedMessage,
    VariableAttributes,
};
use crate::nodestore::{
    access_level, is_subtype_of, ns0, value_matches_data_type, Node, NodeBody, NodeStore,
    Reference, VariableAttrs, VariableValue, VALUE_RANK_SCALAR,
};
use crate::status::StatusCode;
use crate::types::{DataValue, ExpandedNodeId, ExtensionObject, LocalizedText, NodeId};

use super::{check_operations, fault};
use crate::server::ServerCore;

/// First identifier tried for server-assigned node ids in namespace 1.
const GENERATED_ID_BASE: u32 = 50_000;

fn local(id: &ExpandedNodeId) -> Option<&NodeId> {
    id.is_local().then_some(&id.node_id)
}

fn is_reference_type(store: &NodeStore, id: &NodeId) -> bool {
    store
        .get(id)
        .is_some_and(|n| matches!(n.body, NodeBody::ReferenceType { .. }))
}

fn generate_node_id(store: &NodeStore) -> NodeId {
    let mut candidate = GENERATED_ID_BASE.wrapping_add(store.len() as u32);
    loop {
        let id = NodeId::numeric(1, candidate);
        if !store.contains(&id) {
            return id;
        }
        candidate = candidate.wrapping_add(1);
    }
}

fn object_node(
    node_id: NodeId,
    item: &AddNodesItem,
    attributes: Option<ObjectAttributes>,
) -> Node {
    let mut node = Node::new(
        node_id,
        item.browse_name.clone(),
        NodeBody::Object { event_notifier: 0 },
    );
    if let Some(a) = attributes {
        apply_common(&mut node, a.specified_attributes, &a);
        if a.specified_attributes & specified::EVENT_NOTIFIER != 0 {
            node.body = NodeBody::Object {
                event_notifier: a.event_notifier,
            };
        }
    }
    node
}

trait CommonAttributes {
    fn display_name(&self) -> &LocalizedText;
    fn description(&self) -> &LocalizedText;
    fn write_mask(&self) -> u32;
    fn user_write_mask(&self) -> u32;
}

macro_rules! common_attributes {
    ($($ty:ty),*) => {$(
        impl CommonAttributes for $ty {
            fn display_name(&self) -> &LocalizedText { &self.display_name }
            fn description(&self) -> &LocalizedText { &self.description }
            fn write_mask(&self) -> u32 { self.write_mask }
            fn user_write_mask(&self) -> u32 { self.user_write_mask }
        }
    )*};
}

common_attributes!(ObjectAttributes, VariableAttributes);

fn apply_common(node: &mut Node, bits: u32, attributes: &impl CommonAttributes) {
    if bits & specified::DISPLAY_NAME != 0 {
        node.display_name = attributes.display_name().clone();
    }
    if bits & specified::DESCRIPTION != 0 {
        node.description = attributes.description().clone();
    }
    if bits & specified::WRITE_MASK != 0 {
        node.write_mask = attributes.write_mask();
        node.user_write_mask = attributes.user_write_mask();
    }
}

fn variable_node(
    store: &NodeStore,
    node_id: NodeId,
    item: &AddNodesItem,
    attributes: Option<VariableAttributes>,
) -> Result<Node, StatusCode> {
    let rw = access_level::CURRENT_READ | access_level::CURRENT_WRITE;
    let mut attrs = VariableAttrs {
        value: VariableValue::Stored(DataValue::default()),
        data_type: ns0::id::BASE_DATA_TYPE,
        value_rank: VALUE_RANK_SCALAR,
        array_dimensions: None,
        access_level: rw,
        user_access_level: rw,
        minimum_sampling_interval: 0.0,
        historizing: false,
    };
    let mut node = Node::new(
        node_id,
        item.browse_name.clone(),
        NodeBody::Object { event_notifier: 0 },
    );

    if let Some(a) = attributes {
        let bits = a.specified_attributes;
        apply_common(&mut node, bits, &a);
        if bits & specified::DATA_TYPE != 0 && !a.data_type.is_null() {
            let is_data_type = store
                .get(&a.data_type)
                .is_some_and(|n| matches!(n.body, NodeBody::DataType { .. }));
            if !is_data_type {
                return Err(StatusCode::BAD_NODE_ATTRIBUTES_INVALID);
            }
            attrs.data_type = a.data_type.clone();
        }
        if bits & specified::VALUE_RANK != 0 {
            attrs.value_rank = a.value_rank;
        }
        if bits & specified::ARRAY_DIMENSIONS != 0 {
            attrs.array_dimensions = a.array_dimensions.clone();
        }
        if bits & specified::ACCESS_LEVEL != 0 {
            attrs.access_level = a.access_level;
        }
        if bits & specified::USER_ACCESS_LEVEL != 0 {
            attrs.user_access_level = a.user_access_level;
        }
        if bits & specified::MINIMUM_SAMPLING_INTERVAL != 0 {
            let interval = a.minimum_sampling_interval;
            if !interval.is_finite() || interval < 0.0 {
                return Err(StatusCode::BAD_NODE_ATTRIBUTES_INVALID);
            }
            attrs.minimum_sampling_interval = interval;
        }
        if bits & specified::HISTORIZING != 0 {
            attrs.historizing = a.historizing;
        }
        if bits & specified::VALUE != 0 {
            if !value_matches_data_type(store, &attrs.data_type, &a.value) {
                return Err(StatusCode::BAD_TYPE_MISMATCH);
            }
            attrs.value = VariableValue::Stored(DataValue::new_now(a.value));
        }
    }
    node.body = NodeBody::Variable(attrs);
    Ok(node)
}

fn decode_attributes<T: DataType>(
    attributes: &ExtensionObject,
) -> Result<Option<T>, StatusCode> {
    if attributes.is_null() {
        return Ok(None);
    }
    match attributes.decode_inner::<T>(&DecodingOptions::default()) {
        Ok(Some(decoded)) => Ok(Some(decoded)),
        _ => Err(StatusCode::BAD_NODE_ATTRIBUTES_INVALID),
    }
}

fn add_node(store: &NodeStore, item: &AddNodesItem) -> Result<NodeId, StatusCode> {
    let parent = local(&item.parent_node_id)
        .filter(|id| store.contains(id))
        .ok_or(StatusCode::BAD_PARENT_NODE_ID_INVALID)?;
    if !is_reference_type(store, &item.reference_type_id) {
        return Err(StatusCode::BAD_REFERENCE_TYPE_ID_INVALID);
    }
    if !is_subtype_of(store, &item.reference_type_id, &ns0::id::HIERARCHICAL_REFERENCES) {
        return Err(StatusCode::BAD_REFERENCE_NOT_ALLOWED);
    }
    if item.browse_name.is_null() {
        return Err(StatusCode::BAD_BROWSE_NAME_INVALID);
    }

    let node_id = if item.requested_new_node_id.node_id.is_null() {
        generate_node_id(store)
    } else {
        let id = local(&item.requested_new_node_id).ok_or(StatusCode::BAD_NODE_ID_REJECTED)?;
        if store.contains(id) {
            return Err(StatusCode::BAD_NODE_ID_EXISTS);
        }
        id.clone()
    };

    let (node, default_type, type_class) = match item.node_class {
        NodeClass::Object => (
            object_node(node_id.clone(), item, decode_attributes(&item.node_attributes)?),
            ns0::id::BASE_OBJECT_TYPE,
            NodeClass::ObjectType,
        ),
        NodeClass::Variable => (
            variable_node(store, node_id.clone(), item, decode_attributes(&item.node_attributes)?)?,
            ns0::id::BASE_DATA_VARIABLE_TYPE,
            NodeClass::VariableType,
        ),
        _ => return Err(StatusCode::BAD_NODE_CLASS_INVALID),
    };

    let type_definition = if item.type_definition.node_id.is_null() {
        default_type
    } else {
        local(&item.type_definition)
            .cloned()
            .ok_or(StatusCode::BAD_TYPE_DEFINITION_INVALID)?
    };
    let type_ok = store
        .get(&type_definition)
        .is_some_and(|t| t.node_class() == type_class);
    if !type_ok {
        return Err(StatusCode::BAD_TYPE_DEFINITION_INVALID);
    }

    store.insert(node.with_reference(Reference::forward(
        ns0::id::HAS_TYPE_DEFINITION,
        type_definition,
    )))?;
    if let Err(status) = store.add_bidirectional(parent, &item.reference_type_id, &node_id) {
        store.remove(&node_id);
        // the forward edge may already be on the parent
        let _ = store.remove_references(parent, |r| r.target_id == node_id);
        return Err(status);
    }
    log::debug!("[nodestore] added {} under {}", node_id, parent);
    Ok(node_id)
}

pub(super) fn add_nodes(core: &ServerCore, request: &AddNodesRequest) -> SupportedMessage {
    let items = match check_operations(core, &request.nodes_to_add) {
        Ok(items) => items,
        Err(status) => return fault(request.request_header.request_handle, status),
    };
    let results = items
        .iter()
        .map(|item| match add_node(&core.node_store, item) {
            Ok(added_node_id) => AddNodesResult {
                status_code: StatusCode::GOOD,
                added_node_id,
            },
            Err(status_code) => AddNodesResult {
                status_code,
                added_node_id: NodeId::NULL,
            },
        })
        .collect();
    SupportedMessage::from(AddNodesResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}

fn add_reference(store: &NodeStore, item: &AddReferencesItem) -> Result<(), StatusCode> {
    if !store.contains(&item.source_node_id) {
        return Err(StatusCode::BAD_SOURCE_NODE_ID_INVALID);
    }
    if !item.target_server_uri.is_empty() || item.target_node_id.server_index != 0 {
        return Err(StatusCode::BAD_SERVER_INDEX_INVALID);
    }
    let target = local(&item.target_node_id)
        .filter(|id| store.contains(id))
        .ok_or(StatusCode::BAD_TARGET_NODE_ID_INVALID)?;
    if !is_reference_type(store, &item.reference_type_id) {
        return Err(StatusCode::BAD_REFERENCE_TYPE_ID_INVALID);
    }
    let (source, target) = if item.is_forward {
        (&item.source_node_id, target)
    } else {
        (target, &item.source_node_id)
    };
    store.add_bidirectional(source, &item.reference_type_id, target)
}

pub(super) fn add_references(
    core: &ServerCore,
    request: &AddReferencesRequest,
) -> SupportedMessage {
    let items = match check_operations(core, &request.references_to_add) {
        Ok(items) => items,
        Err(status) => return fault(request.request_header.request_handle, status),
    };
    let results = items
        .iter()
        .map(|item| match add_reference(&core.node_store, item) {
            Ok(()) => StatusCode::GOOD,
            Err(status) => status,
        })
        .collect();
    SupportedMessage::from(AddReferencesResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}

fn delete_node(store: &NodeStore, item: &DeleteNodesItem) -> StatusCode {
    let Some(node) = store.remove(&item.node_id) else {
        return StatusCode::BAD_NODE_ID_UNKNOWN;
    };
    // Counterpart edges on the nodes this one pointed at.
    for reference in &node.references {
        let _ = store.remove_references(&reference.target_id, |r| {
            r.target_id == item.node_id && r.reference_type_id == reference.reference_type_id
        });
    }
    if item.delete_target_references {
        for id in store.node_ids() {
            let _ = store.remove_references(&id, |r| r.target_id == item.node_id);
        }
    }
    log::debug!("[nodestore] deleted {}", item.node_id);
    StatusCode::GOOD
}

pub(super) fn delete_nodes(core: &ServerCore, request: &DeleteNodesRequest) -> SupportedMessage {
    let items = match check_operations(core, &request.nodes_to_delete) {
        Ok(items) => items,
        Err(status) => return fault(request.request_header.request_handle, status),
    };
    let results = items
        .iter()
        .map(|item| delete_node(&core.node_store, item))
        .collect();
    SupportedMessage::from(DeleteNodesResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}

fn delete_reference(store: &NodeStore, item: &DeleteReferencesItem) -> Result<(), StatusCode> {
    if !store.contains(&item.source_node_id) {
        return Err(StatusCode::BAD_SOURCE_NODE_ID_INVALID);
    }
    let target = local(&item.target_node_id).ok_or(StatusCode::BAD_TARGET_NODE_ID_INVALID)?;
    let edge = |is_forward: bool, to: &NodeId| Reference {
        reference_type_id: item.reference_type_id.clone(),
        is_forward,
        target_id: to.clone(),
    };
    let wanted = edge(item.is_forward, target);
    let removed = store.remove_references(&item.source_node_id, |r| *r == wanted)?;
    if removed == 0 {
        return Err(StatusCode::BAD_NOT_FOUND);
    }
    if item.delete_bidirectional {
        let counterpart = edge(!item.is_forward, &item.source_node_id);
        // the target may already be gone
        let _ = store.remove_references(target, |r| *r == counterpart);
    }
    Ok(())
}

pub(super) fn delete_references(
    core: &ServerCore,
    request: &DeleteReferencesRequest,
) -> SupportedMessage {
    let items = match check_operations(core, &request.references_to_delete) {
        Ok(items) => items,
        Err(status) => return fault(request.request_header.request_handle, status),
    };
    let results = items
        .iter()
        .map(|item| match delete_reference(&core.node_store, item) {
            Ok(()) => StatusCode::GOOD,
            Err(status) => status,
        })
        .collect();
    SupportedMessage::from(DeleteReferencesResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}
