// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{RequestHeader, ResponseHeader};
use crate::status::StatusCode;
use crate::types::{DiagnosticInfo, LocalizedText, NodeId, UaString, Variant};

ua_struct! {
    /// Method argument description (value of InputArguments/OutputArguments).
    Argument: 296, 298 {
        name: UaString,
        data_type: NodeId,
        /// -1 scalar, 0 one or more dimensions, >0 fixed dimension count.
        value_rank: i32,
        array_dimensions: Option<Vec<u32>>,
        description: LocalizedText,
    }
}

ua_struct! {
    CallMethodRequest: 704, 706 {
        object_id: NodeId,
        method_id: NodeId,
        input_arguments: Option<Vec<Variant>>,
    }
}

ua_struct! {
    CallMethodResult: 707, 709 {
        status_code: StatusCode,
        input_argument_results: Option<Vec<StatusCode>>,
        input_argument_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
        output_arguments: Option<Vec<Variant>>,
    }
}

ua_struct! {
    CallRequest: 710, 712 {
        request_header: RequestHeader,
        methods_to_call: Option<Vec<CallMethodRequest>>,
    }
}

ua_struct! {
    CallResponse: 713, 715 {
        response_header: ResponseHeader,
        results: Option<Vec<CallMethodResult>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
