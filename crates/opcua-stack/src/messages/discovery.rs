// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint and application descriptions, GetEndpoints, FindServers.

use super::{MessageSecurityMode, RequestHeader, ResponseHeader};
use crate::types::{ByteString, DateTime, LocalizedText, UaString};

ua_enum! {
    ApplicationType {
        Server = 0,
        Client = 1,
        ClientAndServer = 2,
        DiscoveryServer = 3,
    }
}

ua_enum! {
    UserTokenType {
        Anonymous = 0,
        UserName = 1,
        Certificate = 2,
        IssuedToken = 3,
    }
}

ua_enum! {
    ServerState {
        Running = 0,
        Failed = 1,
        NoConfiguration = 2,
        Suspended = 3,
        Shutdown = 4,
        Test = 5,
        CommunicationFault = 6,
        Unknown = 7,
    }
}

ua_struct! {
    ApplicationDescription: 308, 310 {
        application_uri: UaString,
        product_uri: UaString,
        application_name: LocalizedText,
        application_type: ApplicationType,
        gateway_server_uri: UaString,
        discovery_profile_uri: UaString,
        discovery_urls: Option<Vec<UaString>>,
    }
}

ua_struct! {
    UserTokenPolicy: 304, 306 {
        policy_id: UaString,
        token_type: UserTokenType,
        issued_token_type: UaString,
        issuer_endpoint_url: UaString,
        security_policy_uri: UaString,
    }
}

ua_struct! {
    EndpointDescription: 312, 314 {
        endpoint_url: UaString,
        server: ApplicationDescription,
        server_certificate: ByteString,
        security_mode: MessageSecurityMode,
        security_policy_uri: UaString,
        user_identity_tokens: Option<Vec<UserTokenPolicy>>,
        transport_profile_uri: UaString,
        security_level: u8,
    }
}

ua_struct! {
    GetEndpointsRequest: 426, 428 {
        request_header: RequestHeader,
        endpoint_url: UaString,
        locale_ids: Option<Vec<UaString>>,
        profile_uris: Option<Vec<UaString>>,
    }
}

ua_struct! {
    GetEndpointsResponse: 429, 431 {
        response_header: ResponseHeader,
        endpoints: Option<Vec<EndpointDescription>>,
    }
}

ua_struct! {
    FindServersRequest: 420, 422 {
        request_header: RequestHeader,
        endpoint_url: UaString,
        locale_ids: Option<Vec<UaString>>,
        server_uris: Option<Vec<UaString>>,
    }
}

ua_struct! {
    FindServersResponse: 423, 425 {
        response_header: ResponseHeader,
        servers: Option<Vec<ApplicationDescription>>,
    }
}

ua_struct! {
    BuildInfo: 338, 340 {
        product_uri: UaString,
        manufacturer_name: UaString,
        product_name: UaString,
        software_version: UaString,
        build_number: UaString,
        build_date: DateTime,
    }
}

ua_struct! {
    /// Value of the Server_ServerStatus variable.
    ServerStatusDataType: 862, 864 {
        start_time: DateTime,
        current_time: DateTime,
        state: ServerState,
        build_info: BuildInfo,
        seconds_till_shutdown: u32,
        shutdown_reason: LocalizedText,
    }
}
