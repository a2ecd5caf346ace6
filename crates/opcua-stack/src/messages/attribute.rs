// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read and Write services.

use super::{RequestHeader, ResponseHeader};
use crate::status::StatusCode;
use crate::types::{DataValue, DiagnosticInfo, NodeId, QualifiedName, UaString};

ua_enum! {
    TimestampsToReturn {
        Source = 0,
        Server = 1,
        Both = 2,
        Neither = 3,
        Invalid = 4,
    }
}

impl TimestampsToReturn {
    pub fn wants_source(self) -> bool {
        matches!(self, Self::Source | Self::Both)
    }

    pub fn wants_server(self) -> bool {
        matches!(self, Self::Server | Self::Both)
    }
}

ua_struct! {
    ReadValueId: 626, 628 {
        node_id: NodeId,
        attribute_id: u32,
        /// NumericRange text ("2", "1:4", "0:1,2:3").
        index_range: UaString,
        data_encoding: QualifiedName,
    }
}

ua_struct! {
    ReadRequest: 629, 631 {
        request_header: RequestHeader,
        /// Milliseconds; negative is invalid.
        max_age: f64,
        timestamps_to_return: TimestampsToReturn,
        nodes_to_read: Option<Vec<ReadValueId>>,
    }
}

ua_struct! {
    ReadResponse: 632, 634 {
        response_header: ResponseHeader,
        results: Option<Vec<DataValue>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    WriteValue: 668, 670 {
        node_id: NodeId,
        attribute_id: u32,
        index_range: UaString,
        value: DataValue,
    }
}

ua_struct! {
    WriteRequest: 671, 673 {
        request_header: RequestHeader,
        nodes_to_write: Option<Vec<WriteValue>>,
    }
}

ua_struct! {
    WriteResponse: 674, 676 {
        response_header: ResponseHeader,
        results: Option<Vec<StatusCode>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
