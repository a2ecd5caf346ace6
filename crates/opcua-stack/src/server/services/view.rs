// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Browse and BrowseNext with server-side continuation points.

use crate::messages::{
    result_mask, BrowseDescription, BrowseDirection, BrowseNextRequest, BrowseNextResponse,
    BrowseRequest, BrowseResponse, BrowseResult, NodeClass, ReferenceDescription, ResponseHeader,
    SupportedMessage,
};
use crate::nodestore::{subtypes_of, NodeBody, NodeStore};
use crate::status::StatusCode;
use crate::types::{ByteString, ExpandedNodeId, NodeId};

use super::{check_operations, fault};
use crate::server::session::Session;
use crate::server::ServerCore;

/// Every reference of the described node that passes the filters.
fn matching_references(
    store: &NodeStore,
    description: &BrowseDescription,
) -> Result<Vec<ReferenceDescription>, StatusCode> {
    if description.browse_direction == BrowseDirection::Invalid {
        return Err(StatusCode::BAD_BROWSE_DIRECTION_INVALID);
    }
    let node = store
        .get(&description.node_id)
        .ok_or(StatusCode::BAD_NODE_ID_UNKNOWN)?;

    let reference_types = if description.reference_type_id.is_null() {
        None
    } else {
        let is_reference_type = store
            .get(&description.reference_type_id)
            .is_some_and(|n| matches!(n.body, NodeBody::ReferenceType { .. }));
        if !is_reference_type {
            return Err(StatusCode::BAD_REFERENCE_TYPE_ID_INVALID);
        }
        Some(if description.include_subtypes {
            subtypes_of(store, &description.reference_type_id)
        } else {
            vec![description.reference_type_id.clone()]
        })
    };

    let mask = description.result_mask;
    let mut out = Vec::new();
    for reference in &node.references {
        let direction_ok = match description.browse_direction {
            BrowseDirection::Forward => reference.is_forward,
            BrowseDirection::Inverse => !reference.is_forward,
            _ => true,
        };
        if !direction_ok {
            continue;
        }
        if let Some(types) = &reference_types {
            if !types.contains(&reference.reference_type_id) {
                continue;
            }
        }

        let target = store.get(&reference.target_id);
        let node_class = target.as_ref().map_or(NodeClass::Unspecified, |t| t.node_class());
        let class_mask = description.node_class_mask;
        if class_mask != 0 && class_mask & node_class.mask() == 0 {
            continue;
        }

        let mut rd = ReferenceDescription {
            node_id: ExpandedNodeId::from(reference.target_id.clone()),
            ..Default::default()
        };
        if mask & result_mask::REFERENCE_TYPE != 0 {
            rd.reference_type_id = reference.reference_type_id.clone();
        }
        if mask & result_mask::IS_FORWARD != 0 {
            rd.is_forward = reference.is_forward;
        }
        if mask & result_mask::NODE_CLASS != 0 {
            rd.node_class = node_class;
        }
        if let Some(target) = &target {
            if mask & result_mask::BROWSE_NAME != 0 {
                rd.browse_name = target.browse_name.clone();
            }
            if mask & result_mask::DISPLAY_NAME != 0 {
                rd.display_name = target.display_name.clone();
            }
            if mask & result_mask::TYPE_DEFINITION != 0
                && matches!(node_class, NodeClass::Object | NodeClass::Variable)
            {
                rd.type_definition = target
                    .type_definition()
                    .cloned()
                    .map(ExpandedNodeId::from)
                    .unwrap_or_default();
            }
        }
        out.push(rd);
    }
    Ok(out)
}

/// Return the first `max` references, parking the rest in a continuation point.
fn page(
    session: &mut Session,
    mut references: Vec<ReferenceDescription>,
    max: usize,
) -> BrowseResult {
    if max == 0 || references.len() <= max {
        return BrowseResult {
            status_code: StatusCode::GOOD,
            continuation_point: ByteString::null(),
            references: Some(references),
        };
    }
    let remaining = references.split_off(max);
    match session.add_continuation_point(remaining, max) {
        Ok(id) => BrowseResult {
            status_code: StatusCode::GOOD,
            continuation_point: id,
            references: Some(references),
        },
        Err(status) => BrowseResult {
            status_code: status,
            ..Default::default()
        },
    }
}

/// Effective per-node limit: the client's request bounded by the server cap.
fn max_references(core: &ServerCore, requested: u32) -> usize {
    let cap = core.config.session.max_references_per_node;
    let max = match (requested, cap) {
        (0, cap) => cap,
        (req, 0) => req,
        (req, cap) => req.min(cap),
    };
    max as usize
}

pub(super) fn browse(
    core: &mut ServerCore,
    token: &NodeId,
    request: &BrowseRequest,
) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    if !request.view.view_id.is_null() {
        return fault(handle, StatusCode::BAD_VIEW_ID_UNKNOWN);
    }
    let descriptions = match check_operations(core, &request.nodes_to_browse) {
        Ok(items) => items,
        Err(status) => return fault(handle, status),
    };
    let max = max_references(core, request.requested_max_references_per_node);

    let Some(session) = core.sessions.get_mut(token) else {
        return fault(handle, StatusCode::BAD_SESSION_ID_INVALID);
    };
    let results = descriptions
        .iter()
        .map(|d| match matching_references(&core.node_store, d) {
            Ok(references) => page(session, references, max),
            Err(status) => BrowseResult {
                status_code: status,
                ..Default::default()
            },
        })
        .collect();

    SupportedMessage::from(BrowseResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}

pub(super) fn browse_next(
    core: &mut ServerCore,
    token: &NodeId,
    request: &BrowseNextRequest,
) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    let points = match check_operations(core, &request.continuation_points) {
        Ok(items) => items,
        Err(status) => return fault(handle, status),
    };
    let Some(session) = core.sessions.get_mut(token) else {
        return fault(handle, StatusCode::BAD_SESSION_ID_INVALID);
    };

    let results = points
        .iter()
        .map(|id| {
            let Some(mut point) = session.take_continuation_point(id) else {
                return BrowseResult {
                    status_code: StatusCode::BAD_CONTINUATION_POINT_INVALID,
                    ..Default::default()
                };
            };
            if request.release_continuation_points {
                return BrowseResult::default();
            }
            if point.remaining.len() <= point.max_references {
                return BrowseResult {
                    status_code: StatusCode::GOOD,
                    continuation_point: ByteString::null(),
                    references: Some(point.remaining),
                };
            }
            let rest = point.remaining.split_off(point.max_references);
            let references = std::mem::replace(&mut point.remaining, rest);
            let id = point.id.clone();
            session.restore_continuation_point(point);
            BrowseResult {
                status_code: StatusCode::GOOD,
                continuation_point: id,
                references: Some(references),
            }
        })
        .collect();

    SupportedMessage::from(BrowseNextResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}
