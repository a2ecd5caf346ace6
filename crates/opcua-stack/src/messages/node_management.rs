// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! AddNodes, AddReferences, DeleteNodes, DeleteReferences and node attribute sets.

use super::{NodeClass, RequestHeader, ResponseHeader};
use crate::status::StatusCode;
use crate::types::{
    DiagnosticInfo, ExpandedNodeId, ExtensionObject, LocalizedText, NodeId, QualifiedName,
    UaString, Variant,
};

/// Bits of `*Attributes::specified_attributes`.
pub mod specified {
    pub const ACCESS_LEVEL: u32 = 0x0000_0001;
    pub const ARRAY_DIMENSIONS: u32 = 0x0000_0002;
    pub const DATA_TYPE: u32 = 0x0000_0020;
    pub const DESCRIPTION: u32 = 0x0000_0040;
    pub const DISPLAY_NAME: u32 = 0x0000_0080;
    pub const EVENT_NOTIFIER: u32 = 0x0000_0100;
    pub const HISTORIZING: u32 = 0x0000_0200;
    pub const MINIMUM_SAMPLING_INTERVAL: u32 = 0x0000_1000;
    pub const USER_ACCESS_LEVEL: u32 = 0x0008_0000;
    pub const VALUE: u32 = 0x0020_0000;
    pub const VALUE_RANK: u32 = 0x0400_0000;
    pub const WRITE_MASK: u32 = 0x0040_0000;
}

ua_struct! {
    ObjectAttributes: 352, 354 {
        specified_attributes: u32,
        display_name: LocalizedText,
        description: LocalizedText,
        write_mask: u32,
        user_write_mask: u32,
        event_notifier: u8,
    }
}

ua_struct! {
    VariableAttributes: 355, 357 {
        specified_attributes: u32,
        display_name: LocalizedText,
        description: LocalizedText,
        write_mask: u32,
        user_write_mask: u32,
        value: Variant,
        data_type: NodeId,
        value_rank: i32,
        array_dimensions: Option<Vec<u32>>,
        access_level: u8,
        user_access_level: u8,
        minimum_sampling_interval: f64,
        historizing: bool,
    }
}

ua_struct! {
    AddNodesItem: 376, 378 {
        parent_node_id: ExpandedNodeId,
        reference_type_id: NodeId,
        /// Null asks the server to assign an id.
        requested_new_node_id: ExpandedNodeId,
        browse_name: QualifiedName,
        node_class: NodeClass,
        node_attributes: ExtensionObject,
        type_definition: ExpandedNodeId,
    }
}

ua_struct! {
    AddNodesResult: 483, 485 {
        status_code: StatusCode,
        added_node_id: NodeId,
    }
}

ua_struct! {
    AddNodesRequest: 486, 488 {
        request_header: RequestHeader,
        nodes_to_add: Option<Vec<AddNodesItem>>,
    }
}

ua_struct! {
    AddNodesResponse: 489, 491 {
        response_header: ResponseHeader,
        results: Option<Vec<AddNodesResult>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    AddReferencesItem: 379, 381 {
        source_node_id: NodeId,
        reference_type_id: NodeId,
        is_forward: bool,
        target_server_uri: UaString,
        target_node_id: ExpandedNodeId,
        target_node_class: NodeClass,
    }
}

ua_struct! {
    AddReferencesRequest: 492, 494 {
        request_header: RequestHeader,
        references_to_add: Option<Vec<AddReferencesItem>>,
    }
}

ua_struct! {
    AddReferencesResponse: 495, 497 {
        response_header: ResponseHeader,
        results: Option<Vec<StatusCode>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    DeleteNodesItem: 382, 384 {
        node_id: NodeId,
        delete_target_references: bool,
    }
}

ua_struct! {
    DeleteNodesRequest: 498, 500 {
        request_header: RequestHeader,
        nodes_to_delete: Option<Vec<DeleteNodesItem>>,
    }
}

ua_struct! {
    DeleteNodesResponse: 501, 503 {
        response_header: ResponseHeader,
        results: Option<Vec<StatusCode>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    DeleteReferencesItem: 385, 387 {
        source_node_id: NodeId,
        reference_type_id: NodeId,
        is_forward: bool,
        target_node_id: ExpandedNodeId,
        delete_bidirectional: bool,
    }
}

ua_struct! {
    DeleteReferencesRequest: 504, 506 {
        request_header: RequestHeader,
        references_to_delete: Option<Vec<DeleteReferencesItem>>,
    }
}

ua_struct! {
    DeleteReferencesResponse: 507, 509 {
        response_header: ResponseHeader,
        results: Option<Vec<StatusCode>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
