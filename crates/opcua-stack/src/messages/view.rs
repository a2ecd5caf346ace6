// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Browse and BrowseNext.

use super::{RequestHeader, ResponseHeader};
use crate::status::StatusCode;
use crate::types::{
    ByteString, DateTime, DiagnosticInfo, ExpandedNodeId, LocalizedText, NodeId, QualifiedName,
};

ua_enum! {
    BrowseDirection {
        Forward = 0,
        Inverse = 1,
        Both = 2,
        Invalid = 3,
    }
}

ua_enum! {
    NodeClass {
        Unspecified = 0,
        Object = 1,
        Variable = 2,
        Method = 4,
        ObjectType = 8,
        VariableType = 16,
        ReferenceType = 32,
        DataType = 64,
        View = 128,
    }
}

impl NodeClass {
    /// Bit used in `BrowseDescription::node_class_mask`.
    pub fn mask(self) -> u32 {
        self as i32 as u32
    }
}

/// Bits of `BrowseDescription::result_mask`.
pub mod result_mask {
    pub const REFERENCE_TYPE: u32 = 0x01;
    pub const IS_FORWARD: u32 = 0x02;
    pub const NODE_CLASS: u32 = 0x04;
    pub const BROWSE_NAME: u32 = 0x08;
    pub const DISPLAY_NAME: u32 = 0x10;
    pub const TYPE_DEFINITION: u32 = 0x20;
    pub const ALL: u32 = 0x3F;
}

ua_struct! {
    ViewDescription: 511, 513 {
        view_id: NodeId,
        timestamp: DateTime,
        view_version: u32,
    }
}

ua_struct! {
    BrowseDescription: 514, 516 {
        node_id: NodeId,
        browse_direction: BrowseDirection,
        /// Null means all reference types.
        reference_type_id: NodeId,
        include_subtypes: bool,
        /// 0 means all node classes.
        node_class_mask: u32,
        result_mask: u32,
    }
}

ua_struct! {
    ReferenceDescription: 518, 520 {
        reference_type_id: NodeId,
        is_forward: bool,
        node_id: ExpandedNodeId,
        browse_name: QualifiedName,
        display_name: LocalizedText,
        node_class: NodeClass,
        type_definition: ExpandedNodeId,
    }
}

ua_struct! {
    BrowseResult: 522, 524 {
        status_code: StatusCode,
        continuation_point: ByteString,
        references: Option<Vec<ReferenceDescription>>,
    }
}

ua_struct! {
    BrowseRequest: 525, 527 {
        request_header: RequestHeader,
        view: ViewDescription,
        /// 0 means no limit.
        requested_max_references_per_node: u32,
        nodes_to_browse: Option<Vec<BrowseDescription>>,
    }
}

ua_struct! {
    BrowseResponse: 528, 530 {
        response_header: ResponseHeader,
        results: Option<Vec<BrowseResult>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    BrowseNextRequest: 531, 533 {
        request_header: RequestHeader,
        release_continuation_points: bool,
        continuation_points: Option<Vec<ByteString>>,
    }
}

ua_struct! {
    BrowseNextResponse: 534, 536 {
        response_header: ResponseHeader,
        results: Option<Vec<BrowseResult>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
