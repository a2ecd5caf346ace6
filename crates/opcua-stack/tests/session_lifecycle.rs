// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]

//! Session create/activate/close, timeouts and identity tokens.

mod common;

use std::time::{Duration, Instant};

use common::{anonymous_token, server, server_with, service_result, value_id, TestClient};
use opcua_stack::config::UserCredential;
use opcua_stack::messages::*;
use opcua_stack::nodestore::ns0;
use opcua_stack::types::{ExtensionObject, UaString, Variant};
use opcua_stack::StatusCode;

fn user_token(name: &str, password: &str) -> ExtensionObject {
    ExtensionObject::from_encodable(&UserNameIdentityToken {
        policy_id: UaString::from("username_basic"),
        user_name: UaString::from(name),
        password: password.as_bytes().into(),
        encryption_algorithm: UaString::null(),
    })
    .unwrap()
}

#[test]
fn test_create_activate_read_close() {
    let mut server = server();
    let mut client = TestClient::open(&mut server);

    let created = client.create_session(&mut server);
    assert_eq!(created.response_header.service_result, StatusCode::GOOD);
    assert!(!created.authentication_token.is_null());
    assert_ne!(created.session_id, created.authentication_token);
    assert_eq!(created.revised_session_timeout, 60_000.0);
    assert!(created.server_endpoints.is_some_and(|e| !e.is_empty()));
    client.authentication_token = created.authentication_token;

    let activated = client.activate(&mut server, anonymous_token());
    assert_eq!(activated.response_header.service_result, StatusCode::GOOD);
    assert!(!activated.server_nonce.is_empty());

    let state = client.read_value(&mut server, &ns0::id::SERVER_SERVER_STATUS_STATE);
    assert_eq!(state, Some(Variant::Int32(0)));

    let header = client.header();
    let closed = client.call(
        &mut server,
        CloseSessionRequest {
            request_header: header,
            delete_subscriptions: true,
        },
    );
    assert!(matches!(closed, SupportedMessage::CloseSessionResponse(_)));
    assert_eq!(server.session_count(), 0);

    // The token is gone.
    let response = client.read(&mut server, vec![value_id(&ns0::id::SERVER_SERVER_STATUS_STATE)]);
    assert_eq!(service_result(&response), StatusCode::BAD_SESSION_ID_INVALID);
}

#[test]
fn test_service_before_activation_is_rejected() {
    let mut server = server();
    let mut client = TestClient::open(&mut server);
    let created = client.create_session(&mut server);
    client.authentication_token = created.authentication_token;

    let response = client.read(&mut server, vec![value_id(&ns0::id::SERVER_SERVER_STATUS_STATE)]);
    assert!(matches!(response, SupportedMessage::ServiceFault(_)));
    assert_eq!(service_result(&response), StatusCode::BAD_SESSION_NOT_ACTIVATED);
}

#[test]
fn test_unknown_token_is_rejected() {
    let mut server = server();
    let mut client = TestClient::open(&mut server);
    client.authentication_token = opcua_stack::types::NodeId::numeric(1, 424_242);
    let response = client.read(&mut server, vec![value_id(&ns0::id::SERVER_SERVER_STATUS_STATE)]);
    assert_eq!(service_result(&response), StatusCode::BAD_SESSION_ID_INVALID);
}

#[test]
fn test_fault_echoes_request_handle() {
    let mut server = server();
    let mut client = TestClient::open(&mut server);
    let header = client.header();
    let handle = header.request_handle;
    let response = client.call(
        &mut server,
        ReadRequest {
            request_header: header,
            nodes_to_read: Some(vec![value_id(&ns0::id::SERVER)]),
            ..Default::default()
        },
    );
    let response_header = response.response_header().unwrap();
    assert_eq!(response_header.request_handle, handle);
    assert_eq!(response_header.service_result, StatusCode::BAD_SESSION_ID_INVALID);
}

#[test]
fn test_session_times_out() {
    let mut server = server();
    let _client = TestClient::session(&mut server);
    assert_eq!(server.session_count(), 1);

    server.run_jobs(Instant::now() + Duration::from_secs(30));
    assert_eq!(server.session_count(), 1);

    server.run_jobs(Instant::now() + Duration::from_secs(120));
    assert_eq!(server.session_count(), 0);
}

#[test]
fn test_activity_restarts_timeout() {
    let mut server = server();
    let mut client = TestClient::open(&mut server);
    let header = client.header();
    let created = match client.call(
        &mut server,
        CreateSessionRequest {
            request_header: header,
            endpoint_url: UaString::from(common::ENDPOINT),
            requested_session_timeout: 2_000.0,
            ..Default::default()
        },
    ) {
        SupportedMessage::CreateSessionResponse(r) => r,
        other => panic!("expected CreateSessionResponse, got {:?}", other),
    };
    assert_eq!(created.revised_session_timeout, 2_000.0);
    client.authentication_token = created.authentication_token;
    client.activate(&mut server, anonymous_token());

    let start = Instant::now();
    std::thread::sleep(Duration::from_millis(20));
    client.read_value(&mut server, &ns0::id::SERVER_SERVER_STATUS_STATE);

    // Two seconds after creation but not after the last request.
    server.run_jobs(start + Duration::from_millis(2_010));
    assert_eq!(server.session_count(), 1);

    server.run_jobs(start + Duration::from_secs(5));
    assert_eq!(server.session_count(), 0);
}

#[test]
fn test_reactivate_on_new_channel() {
    let mut server = server();
    let first = TestClient::session(&mut server);
    let token = first.authentication_token.clone();

    // The first connection goes away; the session survives detached.
    server.close_connection(first.connection_id);
    assert_eq!(server.session_count(), 1);

    let mut second = TestClient::open(&mut server);
    second.authentication_token = token;
    let activated = second.activate(&mut server, anonymous_token());
    assert_eq!(activated.response_header.service_result, StatusCode::GOOD);
    assert_eq!(
        second.read_value(&mut server, &ns0::id::SERVER_SERVER_STATUS_STATE),
        Some(Variant::Int32(0))
    );

    // A third channel takes it over again, and the second loses access.
    let mut third = TestClient::open(&mut server);
    third.authentication_token = second.authentication_token.clone();
    let activated = third.activate(&mut server, anonymous_token());
    assert_eq!(activated.response_header.service_result, StatusCode::GOOD);
    let response = second.read(&mut server, vec![value_id(&ns0::id::SERVER_SERVER_STATUS_STATE)]);
    assert_eq!(service_result(&response), StatusCode::BAD_SESSION_ID_INVALID);
}

#[test]
fn test_anonymous_can_be_disabled() {
    let mut server = server_with(|c| {
        c.allow_anonymous = false;
        c.users.push(UserCredential {
            username: "operator".to_string(),
            password: "secret".to_string(),
        });
    });
    let mut client = TestClient::open(&mut server);
    let created = client.create_session(&mut server);
    client.authentication_token = created.authentication_token;
    let activated = client.activate(&mut server, anonymous_token());
    assert_eq!(
        activated.response_header.service_result,
        StatusCode::BAD_IDENTITY_TOKEN_REJECTED
    );
}

#[test]
fn test_user_name_identity() {
    let mut server = server_with(|c| {
        c.users.push(UserCredential {
            username: "operator".to_string(),
            password: "secret".to_string(),
        })
    });
    let mut client = TestClient::open(&mut server);
    let created = client.create_session(&mut server);
    client.authentication_token = created.authentication_token;

    let rejected = client.activate(&mut server, user_token("operator", "wrong"));
    assert_eq!(rejected.response_header.service_result, StatusCode::BAD_USER_ACCESS_DENIED);

    let accepted = client.activate(&mut server, user_token("operator", "secret"));
    assert_eq!(accepted.response_header.service_result, StatusCode::GOOD);
}

#[test]
fn test_user_name_without_configured_users_is_invalid() {
    let mut server = server();
    let mut client = TestClient::open(&mut server);
    let created = client.create_session(&mut server);
    client.authentication_token = created.authentication_token;
    let activated = client.activate(&mut server, user_token("anyone", "pw"));
    assert_eq!(
        activated.response_header.service_result,
        StatusCode::BAD_IDENTITY_TOKEN_INVALID
    );
}

#[test]
fn test_session_limit() {
    let mut server = server_with(|c| c.session.max_sessions = 1);
    let _first = TestClient::session(&mut server);
    let mut second = TestClient::open(&mut server);
    let header = second.header();
    let response = second.call(
        &mut server,
        CreateSessionRequest {
            request_header: header,
            requested_session_timeout: 60_000.0,
            ..Default::default()
        },
    );
    assert_eq!(service_result(&response), StatusCode::BAD_TOO_MANY_SESSIONS);
}
