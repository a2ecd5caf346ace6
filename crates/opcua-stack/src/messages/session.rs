// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{ApplicationDescription, EndpointDescription, RequestHeader, ResponseHeader};
use crate::status::StatusCode;
use crate::types::{ByteString, DiagnosticInfo, ExtensionObject, NodeId, UaString};

ua_struct! {
    SignatureData: 456, 458 {
        algorithm: UaString,
        signature: ByteString,
    }
}

ua_struct! {
    SignedSoftwareCertificate: 344, 346 {
        certificate_data: ByteString,
        signature: ByteString,
    }
}

ua_struct! {
    AnonymousIdentityToken: 319, 321 {
        policy_id: UaString,
    }
}

ua_struct! {
    UserNameIdentityToken: 322, 324 {
        policy_id: UaString,
        user_name: UaString,
        /// Plain UTF-8 password when no encryption algorithm is given.
        password: ByteString,
        encryption_algorithm: UaString,
    }
}

ua_struct! {
    CreateSessionRequest: 459, 461 {
        request_header: RequestHeader,
        client_description: ApplicationDescription,
        server_uri: UaString,
        endpoint_url: UaString,
        session_name: UaString,
        client_nonce: ByteString,
        client_certificate: ByteString,
        /// Milliseconds.
        requested_session_timeout: f64,
        max_response_message_size: u32,
    }
}

ua_struct! {
    CreateSessionResponse: 462, 464 {
        response_header: ResponseHeader,
        session_id: NodeId,
        authentication_token: NodeId,
        revised_session_timeout: f64,
        server_nonce: ByteString,
        server_certificate: ByteString,
        server_endpoints: Option<Vec<EndpointDescription>>,
        server_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
        server_signature: SignatureData,
        max_request_message_size: u32,
    }
}

ua_struct! {
    ActivateSessionRequest: 465, 467 {
        request_header: RequestHeader,
        client_signature: SignatureData,
        client_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
        locale_ids: Option<Vec<UaString>>,
        user_identity_token: ExtensionObject,
        user_token_signature: SignatureData,
    }
}

ua_struct! {
    ActivateSessionResponse: 468, 470 {
        response_header: ResponseHeader,
        server_nonce: ByteString,
        results: Option<Vec<StatusCode>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    CloseSessionRequest: 471, 473 {
        request_header: RequestHeader,
        delete_subscriptions: bool,
    }
}

ua_struct! {
    CloseSessionResponse: 474, 476 {
        response_header: ResponseHeader,
    }
}
