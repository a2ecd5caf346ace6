// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GetEndpoints and FindServers.

use crate::config::{
    ServerConfig, ANONYMOUS_POLICY_ID, SECURITY_POLICY_NONE_URI, TRANSPORT_PROFILE_URI,
    USERNAME_POLICY_ID,
};
use crate::messages::{
    ApplicationDescription, ApplicationType, EndpointDescription, FindServersRequest,
    FindServersResponse, GetEndpointsRequest, GetEndpointsResponse, MessageSecurityMode,
    ResponseHeader, SupportedMessage, UserTokenPolicy, UserTokenType,
};
use crate::types::{ByteString, LocalizedText, UaString};

use crate::server::ServerCore;

pub(crate) fn application_description(config: &ServerConfig) -> ApplicationDescription {
    ApplicationDescription {
        application_uri: UaString::from(config.application_uri.as_str()),
        product_uri: UaString::from(config.product_uri.as_str()),
        application_name: LocalizedText::text(&config.application_name),
        application_type: ApplicationType::Server,
        gateway_server_uri: UaString::null(),
        discovery_profile_uri: UaString::null(),
        discovery_urls: Some(vec![UaString::from(config.endpoint_url())]),
    }
}

fn user_token_policies(config: &ServerConfig) -> Vec<UserTokenPolicy> {
    let mut policies = Vec::new();
    if config.allow_anonymous {
        policies.push(UserTokenPolicy {
            policy_id: UaString::from(ANONYMOUS_POLICY_ID),
            token_type: UserTokenType::Anonymous,
            ..Default::default()
        });
    }
    if !config.users.is_empty() {
        policies.push(UserTokenPolicy {
            policy_id: UaString::from(USERNAME_POLICY_ID),
            token_type: UserTokenType::UserName,
            // password travels in plain text
            security_policy_uri: UaString::from(SECURITY_POLICY_NONE_URI),
            ..Default::default()
        });
    }
    policies
}

/// The single endpoint offered: security policy None over UA TCP.
pub(crate) fn endpoints(config: &ServerConfig) -> Vec<EndpointDescription> {
    vec![EndpointDescription {
        endpoint_url: UaString::from(config.endpoint_url()),
        server: application_description(config),
        server_certificate: ByteString::null(),
        security_mode: MessageSecurityMode::None,
        security_policy_uri: UaString::from(SECURITY_POLICY_NONE_URI),
        user_identity_tokens: Some(user_token_policies(config)),
        transport_profile_uri: UaString::from(TRANSPORT_PROFILE_URI),
        security_level: 0,
    }]
}

pub(super) fn get_endpoints(core: &ServerCore, request: &GetEndpointsRequest) -> SupportedMessage {
    let profile_matches = request.profile_uris.as_ref().map_or(true, |uris| {
        uris.is_empty() || uris.iter().any(|u| u.as_str() == Some(TRANSPORT_PROFILE_URI))
    });
    let mut endpoints = if profile_matches {
        endpoints(&core.config)
    } else {
        Vec::new()
    };
    // Echo the URL the client used so it can reconnect the same way.
    if let Some(url) = request.endpoint_url.as_str().filter(|u| !u.is_empty()) {
        for endpoint in &mut endpoints {
            endpoint.endpoint_url = UaString::from(url);
        }
    }
    SupportedMessage::from(GetEndpointsResponse {
        response_header: ResponseHeader::good(&request.request_header),
        endpoints: Some(endpoints),
    })
}

pub(super) fn find_servers(core: &ServerCore, request: &FindServersRequest) -> SupportedMessage {
    let config = &core.config;
    let wanted = request.server_uris.as_ref().map_or(true, |uris| {
        uris.is_empty()
            || uris
                .iter()
                .any(|u| u.as_str() == Some(config.application_uri.as_str()))
    });
    let servers = if wanted {
        vec![application_description(config)]
    } else {
        Vec::new()
    };
    SupportedMessage::from(FindServersResponse {
        response_header: ResponseHeader::good(&request.request_header),
        servers: Some(servers),
    })
}
