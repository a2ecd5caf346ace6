// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]

//! HEL/ACK negotiation, channel open/renew/close and sequence handling.

mod common;

use std::time::{Duration, Instant};

use common::{hello, server, server_with, Received, TestClient};
use opcua_stack::messages::*;
use opcua_stack::codec::{decode_from_slice, DecodingOptions};
use opcua_stack::transport::header::{frame, AcknowledgeMessage, ChunkType, MessageType};
use opcua_stack::StatusCode;

#[test]
fn test_hello_negotiates_buffer_sizes() {
    let mut server = server();
    let connection = server.open_connection();
    server.process_binary_message(connection, &hello(16_384, 32_768));
    let out = server.take_outbound(connection);
    assert_eq!(out.len(), 1);
    assert_eq!(&out[0][..3], b"ACK");
    let ack: AcknowledgeMessage =
        decode_from_slice(&out[0][8..], &DecodingOptions::default()).unwrap();
    // Each side gets the smaller of what was offered and what the peer takes.
    assert_eq!(ack.receive_buffer_size, 32_768);
    assert_eq!(ack.send_buffer_size, 16_384);

    let mut client = TestClient::connect(&mut server);
    // A second HEL on an established connection is a protocol error.
    server.process_binary_message(client.connection_id, &hello(65_535, 65_535));
    match client.pump(&mut server).as_slice() {
        [Received::Error(e)] => assert_eq!(e.error, StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID),
        other => panic!("expected ERR, got {:?}", other),
    }
    assert!(server.should_close(client.connection_id));
}

#[test]
fn test_hello_below_minimum_buffer_is_rejected() {
    let mut server = server();
    let connection = server.open_connection();
    server.process_binary_message(connection, &hello(1024, 65_535));
    let out = server.take_outbound(connection);
    assert_eq!(out.len(), 1);
    assert_eq!(&out[0][..3], b"ERR");
    assert!(server.should_close(connection));
}

#[test]
fn test_secure_message_before_hello_closes_connection() {
    let mut server = server();
    let connection = server.open_connection();
    let bogus = frame(MessageType::Message, ChunkType::Final, &[0u8; 16]);
    server.process_binary_message(connection, &bogus);
    let out = server.take_outbound(connection);
    assert_eq!(&out[0][..3], b"ERR");
    assert!(server.should_close(connection));
}

#[test]
fn test_corrupt_frame_closes_connection() {
    let mut server = server();
    let client = TestClient::connect(&mut server);
    server.process_binary_message(client.connection_id, b"XYZF\x10\x00\x00\x00garbage!");
    let out = server.take_outbound(client.connection_id);
    assert_eq!(&out[0][..3], b"ERR");
    assert!(server.should_close(client.connection_id));
}

#[test]
fn test_open_channel_issues_token() {
    let mut server = server();
    let mut client = TestClient::connect(&mut server);
    let response = client.open_channel(&mut server, SecurityTokenRequestType::Issue);
    assert_eq!(response.response_header.service_result, StatusCode::GOOD);
    assert_ne!(response.security_token.channel_id, 0);
    assert_ne!(response.security_token.token_id, 0);
    assert!(response.security_token.revised_lifetime >= 10_000);
    assert_eq!(server.channel_count(), 1);
}

#[test]
fn test_channel_pool_exhaustion_is_reported() {
    let mut server = server_with(|c| c.channel.max_channels = 1);
    let _first = TestClient::open(&mut server);
    let mut second = TestClient::connect(&mut server);
    let response = second.open_channel(&mut server, SecurityTokenRequestType::Issue);
    assert_eq!(
        response.response_header.service_result,
        StatusCode::BAD_TCP_NOT_ENOUGH_RESOURCES
    );
    // The connection stays usable.
    assert!(!server.should_close(second.connection_id));
    assert_eq!(server.channel_count(), 1);
}

#[test]
fn test_token_renewal_and_revolution() {
    let mut server = server();
    let mut client = TestClient::open(&mut server);
    let old_token = client.token_id;

    let renewed = client.open_channel(&mut server, SecurityTokenRequestType::Renew);
    let new_token = renewed.security_token.token_id;
    assert_ne!(new_token, old_token);
    assert_eq!(renewed.security_token.channel_id, client.channel_id);

    // The old token keeps working until the client switches.
    let response = client.call(&mut server, GetEndpointsRequest::default());
    assert!(matches!(response, SupportedMessage::GetEndpointsResponse(_)));

    client.token_id = new_token;
    let response = client.call(&mut server, GetEndpointsRequest::default());
    assert!(matches!(response, SupportedMessage::GetEndpointsResponse(_)));

    // Once the new token is in use the old one is rejected.
    client.token_id = old_token;
    client.send(&mut server, SupportedMessage::from(GetEndpointsRequest::default()));
    match client.pump(&mut server).as_slice() {
        [Received::Error(e)] => assert_eq!(e.error, StatusCode::BAD_SECURE_CHANNEL_TOKEN_UNKNOWN),
        other => panic!("expected ERR, got {:?}", other),
    }
}

#[test]
fn test_wrong_channel_id_is_rejected() {
    let mut server = server();
    let mut client = TestClient::open(&mut server);
    client.channel_id += 1;
    client.send(&mut server, SupportedMessage::from(GetEndpointsRequest::default()));
    match client.pump(&mut server).as_slice() {
        [Received::Error(e)] => assert_eq!(e.error, StatusCode::BAD_TCP_SECURE_CHANNEL_UNKNOWN),
        other => panic!("expected ERR, got {:?}", other),
    }
    assert_eq!(server.channel_count(), 0);
}

#[test]
fn test_response_sequence_numbers_increase() {
    let mut server = server();
    let mut client = TestClient::open(&mut server);
    for _ in 0..5 {
        client.call(&mut server, GetEndpointsRequest::default());
    }
    let seqs = &client.received_sequences;
    assert_eq!(seqs.len(), 6);
    assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1), "{:?}", seqs);
}

#[test]
fn test_strict_sequence_numbers() {
    let mut server = server_with(|c| c.channel.strict_sequence_numbers = true);
    let mut client = TestClient::open(&mut server);
    client.call(&mut server, GetEndpointsRequest::default());

    // Repeat the previous sequence number.
    client.next_sequence -= 1;
    client.send(&mut server, SupportedMessage::from(GetEndpointsRequest::default()));
    match client.pump(&mut server).as_slice() {
        [Received::Error(e)] => assert_eq!(e.error, StatusCode::BAD_SEQUENCE_NUMBER_INVALID),
        other => panic!("expected ERR, got {:?}", other),
    }
    assert!(server.should_close(client.connection_id));
}

#[test]
fn test_lenient_sequence_numbers_by_default() {
    let mut server = server();
    let mut client = TestClient::open(&mut server);
    client.call(&mut server, GetEndpointsRequest::default());

    client.next_sequence += 10;
    let response = client.call(&mut server, GetEndpointsRequest::default());
    assert!(matches!(response, SupportedMessage::GetEndpointsResponse(_)));
    assert!(!server.should_close(client.connection_id));
}

#[test]
fn test_close_secure_channel_detaches_session() {
    let mut server = server();
    let mut client = TestClient::session(&mut server);
    assert_eq!(server.session_count(), 1);

    let header = client.header();
    client.send(
        &mut server,
        SupportedMessage::from(CloseSecureChannelRequest { request_header: header }),
    );
    assert!(client.pump(&mut server).is_empty());
    assert!(server.should_close(client.connection_id));
    assert_eq!(server.channel_count(), 0);
    // The session survives until it times out or moves to a new channel.
    assert_eq!(server.session_count(), 1);
}

#[test]
fn test_expired_channel_is_swept() {
    let mut server = server();
    let client = TestClient::open(&mut server);
    server.run_jobs(Instant::now() + Duration::from_secs(3600));
    assert_eq!(server.channel_count(), 0);
    assert!(server.should_close(client.connection_id));
}
