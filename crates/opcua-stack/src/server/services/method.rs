// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Call.

use crate::messages::{
    CallMethodRequest, CallMethodResult, CallRequest, CallResponse, ResponseHeader,
    SupportedMessage,
};
use crate::nodestore::{ns0, value_matches_data_type, NodeStore};
use crate::status::StatusCode;

use super::{check_operations, fault};
use crate::server::ServerCore;

fn failed(status: StatusCode) -> CallMethodResult {
    CallMethodResult {
        status_code: status,
        ..Default::default()
    }
}

fn call_one(store: &NodeStore, request: &CallMethodRequest) -> CallMethodResult {
    let Some(object) = store.get(&request.object_id) else {
        return failed(StatusCode::BAD_NODE_ID_UNKNOWN);
    };
    let Some(method_node) = store.get(&request.method_id) else {
        return failed(StatusCode::BAD_METHOD_INVALID);
    };
    let Some(method) = method_node.as_method() else {
        return failed(StatusCode::BAD_METHOD_INVALID);
    };
    // The method must be a component of the object it is called on.
    let is_component = object.references.iter().any(|r| {
        r.is_forward
            && r.reference_type_id == ns0::id::HAS_COMPONENT
            && r.target_id == request.method_id
    });
    if !is_component {
        return failed(StatusCode::BAD_METHOD_INVALID);
    }
    if !method.executable || !method.user_executable {
        return failed(StatusCode::BAD_NOT_EXECUTABLE);
    }

    let inputs = request.input_arguments.as_deref().unwrap_or_default();
    let expected = &method.input_arguments;
    if inputs.len() < expected.len() {
        return failed(StatusCode::BAD_ARGUMENTS_MISSING);
    }
    if inputs.len() > expected.len() {
        return failed(StatusCode::BAD_TOO_MANY_ARGUMENTS);
    }
    let argument_results: Vec<StatusCode> = inputs
        .iter()
        .zip(expected)
        .map(|(value, argument)| {
            if value_matches_data_type(store, &argument.data_type, value) {
                StatusCode::GOOD
            } else {
                StatusCode::BAD_TYPE_MISMATCH
            }
        })
        .collect();
    if argument_results.iter().any(StatusCode::is_bad) {
        return CallMethodResult {
            status_code: StatusCode::BAD_INVALID_ARGUMENT,
            input_argument_results: Some(argument_results),
            ..Default::default()
        };
    }

    let Some(callback) = &method.callback else {
        return failed(StatusCode::BAD_NOT_IMPLEMENTED);
    };
    match callback(&request.object_id, inputs) {
        Ok(outputs) => CallMethodResult {
            status_code: StatusCode::GOOD,
            input_argument_results: Some(argument_results),
            input_argument_diagnostic_infos: None,
            output_arguments: Some(outputs),
        },
        Err(status) => {
            log::debug!("[service] method {} failed: {}", request.method_id, status);
            failed(status)
        }
    }
}

pub(super) fn call(core: &ServerCore, request: &CallRequest) -> SupportedMessage {
    let calls = match check_operations(core, &request.methods_to_call) {
        Ok(items) => items,
        Err(status) => return fault(request.request_header.request_handle, status),
    };
    let results = calls
        .iter()
        .map(|c| call_one(&core.node_store, c))
        .collect();
    SupportedMessage::from(CallResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}
