// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request/response headers and ServiceFault.

use crate::status::StatusCode;
use crate::types::{DateTime, DiagnosticInfo, ExtensionObject, NodeId, UaString};

ua_struct! {
    /// Common header of every service request.
    RequestHeader: 389, 391 {
        /// Session credential; null for session-less services.
        authentication_token: NodeId,
        timestamp: DateTime,
        request_handle: u32,
        return_diagnostics: u32,
        audit_entry_id: UaString,
        /// Milliseconds; 0 means no timeout.
        timeout_hint: u32,
        additional_header: ExtensionObject,
    }
}

ua_struct! {
    /// Common header of every service response.
    ResponseHeader: 392, 394 {
        timestamp: DateTime,
        request_handle: u32,
        service_result: StatusCode,
        service_diagnostics: DiagnosticInfo,
        string_table: Option<Vec<UaString>>,
        additional_header: ExtensionObject,
    }
}

impl ResponseHeader {
    /// Header answering `request` with `service_result`.
    pub fn new(request: &RequestHeader, service_result: StatusCode) -> Self {
        Self::for_handle(request.request_handle, service_result)
    }

    pub fn for_handle(request_handle: u32, service_result: StatusCode) -> Self {
        Self {
            timestamp: DateTime::now(),
            request_handle,
            service_result,
            ..Default::default()
        }
    }

    pub fn good(request: &RequestHeader) -> Self {
        Self::new(request, StatusCode::GOOD)
    }
}

ua_struct! {
    /// Response sent instead of the expected one when a service fails as a whole.
    ServiceFault: 395, 397 {
        response_header: ResponseHeader,
    }
}

impl ServiceFault {
    pub fn new(request_handle: u32, status: StatusCode) -> Self {
        Self {
            response_header: ResponseHeader::for_handle(request_handle, status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_from_slice, encode_to_vec, BinaryEncodable, DecodingOptions};

    #[test]
    fn test_request_header_round_trip() {
        let header = RequestHeader {
            authentication_token: NodeId::numeric(1, 99),
            timestamp: DateTime(5),
            request_handle: 42,
            timeout_hint: 1000,
            ..Default::default()
        };
        let bytes = encode_to_vec(&header).unwrap();
        assert_eq!(bytes.len(), header.byte_len());
        let back: RequestHeader = decode_from_slice(&bytes, &DecodingOptions::default()).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn test_service_fault_echoes_handle() {
        let fault = ServiceFault::new(7, StatusCode::BAD_DECODING_ERROR);
        assert_eq!(fault.response_header.request_handle, 7);
        assert_eq!(
            fault.response_header.service_result,
            StatusCode::BAD_DECODING_ERROR
        );
    }
}
