// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process client driving a [`Server`] through raw protocol bytes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use opcua_stack::codec::{decode_from_slice, encode_to_vec, DecodingOptions};
use opcua_stack::messages::*;
use opcua_stack::transport::header::{
    frame, AcknowledgeMessage, AsymmetricSecurityHeader, ChunkType, ErrorMessage, HelloMessage,
    MessageType, SecureChunk, SecurityHeader,
};
use opcua_stack::transport::{ChunkLimits, ChunkSender};
use opcua_stack::types::{ExtensionObject, NodeId, UaString, Variant};
use opcua_stack::{Server, ServerConfig, StatusCode};

pub const ENDPOINT: &str = "opc.tcp://localhost:4840";

/// Something the server sent back.
#[derive(Debug, Clone)]
pub enum Received {
    Ack(AcknowledgeMessage),
    Error(ErrorMessage),
    Response { request_id: u32, message: SupportedMessage },
    /// An abort chunk ended a response.
    Aborted { request_id: u32, error: ErrorMessage },
}

pub fn hello(receive_buffer_size: u32, send_buffer_size: u32) -> Vec<u8> {
    let hello = HelloMessage {
        protocol_version: 0,
        receive_buffer_size,
        send_buffer_size,
        max_message_size: 0,
        max_chunk_count: 0,
        endpoint_url: UaString::from(ENDPOINT),
    };
    frame(
        MessageType::Hello,
        ChunkType::Final,
        &encode_to_vec(&hello).expect("encode HEL"),
    )
}

pub fn server() -> Server {
    Server::new(ServerConfig::default()).expect("server")
}

pub fn server_with(configure: impl FnOnce(&mut ServerConfig)) -> Server {
    let mut config = ServerConfig::default();
    configure(&mut config);
    Server::new(config).expect("server")
}

pub fn anonymous_token() -> ExtensionObject {
    ExtensionObject::from_encodable(&AnonymousIdentityToken {
        policy_id: UaString::from("anonymous"),
    })
    .expect("identity token")
}

pub struct TestClient {
    pub connection_id: u64,
    pub channel_id: u32,
    pub token_id: u32,
    pub authentication_token: NodeId,
    /// Chunk size used for requests.
    pub chunk_size: usize,
    /// Sequence number of the next chunk sent.
    pub next_sequence: u32,
    next_request_id: u32,
    next_handle: u32,
    partial: HashMap<u32, Vec<u8>>,
    /// Sequence numbers of every secure chunk received, in order.
    pub received_sequences: Vec<u32>,
}

impl TestClient {
    /// Open a connection and complete HEL/ACK.
    pub fn connect(server: &mut Server) -> Self {
        Self::connect_with(server, &hello(65_535, 65_535))
    }

    /// Open a connection and complete HEL/ACK with a prepared HEL frame.
    pub fn connect_with(server: &mut Server, hello_frame: &[u8]) -> Self {
        let connection_id = server.open_connection();
        let mut client = Self {
            connection_id,
            channel_id: 0,
            token_id: 0,
            authentication_token: NodeId::default(),
            chunk_size: 65_535,
            next_sequence: 1,
            next_request_id: 1,
            next_handle: 1,
            partial: HashMap::new(),
            received_sequences: Vec::new(),
        };
        server.process_binary_message(connection_id, hello_frame);
        match client.pump(server).as_slice() {
            [Received::Ack(_)] => {}
            other => panic!("expected ACK, got {:?}", other),
        }
        client
    }

    /// Connect and open a secure channel.
    pub fn open(server: &mut Server) -> Self {
        let client = Self::connect(server);
        client.with_channel(server)
    }

    /// Open a secure channel on an already connected client.
    pub fn with_channel(mut self, server: &mut Server) -> Self {
        let response = self.open_channel(server, SecurityTokenRequestType::Issue);
        self.channel_id = response.security_token.channel_id;
        self.token_id = response.security_token.token_id;
        self
    }

    /// Open a channel and an activated anonymous session.
    pub fn session(server: &mut Server) -> Self {
        let client = Self::open(server);
        client.with_session(server)
    }

    /// Create and activate an anonymous session on an open channel.
    pub fn with_session(mut self, server: &mut Server) -> Self {
        let created = self.create_session(server);
        self.authentication_token = created.authentication_token;
        let activated = self.activate(server, anonymous_token());
        assert_eq!(activated.response_header.service_result, StatusCode::GOOD);
        self
    }

    pub fn header(&mut self) -> RequestHeader {
        let handle = self.next_handle;
        self.next_handle += 1;
        RequestHeader {
            authentication_token: self.authentication_token.clone(),
            request_handle: handle,
            timeout_hint: 10_000,
            ..Default::default()
        }
    }

    // ------------------------------------------------------------------------
    // Raw I/O
    // ------------------------------------------------------------------------

    /// Collect and parse whatever the server queued for this connection.
    pub fn pump(&mut self, server: &mut Server) -> Vec<Received> {
        server.flush_workers(Duration::from_secs(5));
        let mut out = Vec::new();
        for chunk in server.take_outbound(self.connection_id) {
            if let Some(received) = self.parse(&chunk) {
                out.push(received);
            }
        }
        out
    }

    fn parse(&mut self, bytes: &[u8]) -> Option<Received> {
        let options = DecodingOptions::default();
        match &bytes[..3] {
            b"ACK" => Some(Received::Ack(decode_from_slice(&bytes[8..], &options).expect("ACK"))),
            b"ERR" => Some(Received::Error(decode_from_slice(&bytes[8..], &options).expect("ERR"))),
            _ => {
                let chunk = SecureChunk::parse(bytes, &options).expect("secure chunk");
                self.received_sequences.push(chunk.sequence.sequence_number);
                let request_id = chunk.sequence.request_id;
                let buffer = self.partial.entry(request_id).or_default();
                match chunk.header.chunk_type {
                    ChunkType::Intermediate => {
                        buffer.extend_from_slice(chunk.body);
                        None
                    }
                    ChunkType::Abort => {
                        self.partial.remove(&request_id);
                        let error = decode_from_slice(chunk.body, &options).expect("abort body");
                        Some(Received::Aborted { request_id, error })
                    }
                    ChunkType::Final => {
                        buffer.extend_from_slice(chunk.body);
                        let body = self.partial.remove(&request_id).unwrap_or_default();
                        let message = decode_from_slice(&body, &options).expect("response");
                        Some(Received::Response { request_id, message })
                    }
                }
            }
        }
    }

    /// Chunk `message` onto the channel without waiting for a reply.
    pub fn send(&mut self, server: &mut Server, message: SupportedMessage) -> u32 {
        let message_type = match message {
            SupportedMessage::CloseSecureChannelRequest(_) => MessageType::CloseSecureChannel,
            _ => MessageType::Message,
        };
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let mut chunks = Vec::new();
        let mut sender = ChunkSender::new(
            message_type,
            self.channel_id,
            SecurityHeader::Symmetric(self.token_id),
            request_id,
            self.next_sequence,
            ChunkLimits::new(self.chunk_size, 0, 0),
            &mut chunks,
        );
        sender.send(&message).expect("encode request");
        self.next_sequence = sender.next_sequence();
        for chunk in chunks {
            server.process_binary_message(self.connection_id, &chunk);
        }
        request_id
    }

    /// Send a request and return the response to it.
    pub fn call(
        &mut self,
        server: &mut Server,
        message: impl Into<SupportedMessage>,
    ) -> SupportedMessage {
        let request_id = self.send(server, message.into());
        self.pump(server)
            .into_iter()
            .find_map(|r| match r {
                Received::Response { request_id: id, message } if id == request_id => Some(message),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no response to request {}", request_id))
    }

    // ------------------------------------------------------------------------
    // Services
    // ------------------------------------------------------------------------

    pub fn open_channel(
        &mut self,
        server: &mut Server,
        request_type: SecurityTokenRequestType,
    ) -> OpenSecureChannelResponse {
        let request = SupportedMessage::from(OpenSecureChannelRequest {
            request_header: self.header(),
            client_protocol_version: 0,
            request_type,
            security_mode: MessageSecurityMode::None,
            client_nonce: Default::default(),
            requested_lifetime: 60_000,
        });
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let mut chunks = Vec::new();
        let mut sender = ChunkSender::new(
            MessageType::OpenSecureChannel,
            self.channel_id,
            SecurityHeader::Asymmetric(AsymmetricSecurityHeader::none()),
            request_id,
            self.next_sequence,
            ChunkLimits::new(self.chunk_size, 0, 0),
            &mut chunks,
        );
        sender.send(&request).expect("encode OPN");
        self.next_sequence = sender.next_sequence();
        for chunk in chunks {
            server.process_binary_message(self.connection_id, &chunk);
        }
        match self.pump(server).pop() {
            Some(Received::Response {
                message: SupportedMessage::OpenSecureChannelResponse(response),
                ..
            }) => *response,
            Some(Received::Response {
                message: SupportedMessage::ServiceFault(fault),
                ..
            }) => OpenSecureChannelResponse {
                response_header: fault.response_header,
                ..Default::default()
            },
            other => panic!("expected OpenSecureChannelResponse, got {:?}", other),
        }
    }

    pub fn create_session(&mut self, server: &mut Server) -> CreateSessionResponse {
        let header = self.header();
        match self.call(
            server,
            CreateSessionRequest {
                request_header: header,
                endpoint_url: UaString::from(ENDPOINT),
                session_name: UaString::from("test session"),
                requested_session_timeout: 60_000.0,
                ..Default::default()
            },
        ) {
            SupportedMessage::CreateSessionResponse(r) => *r,
            other => panic!("expected CreateSessionResponse, got {:?}", other),
        }
    }

    pub fn activate(
        &mut self,
        server: &mut Server,
        identity: ExtensionObject,
    ) -> ActivateSessionResponse {
        let header = self.header();
        match self.call(
            server,
            ActivateSessionRequest {
                request_header: header,
                user_identity_token: identity,
                ..Default::default()
            },
        ) {
            SupportedMessage::ActivateSessionResponse(r) => *r,
            SupportedMessage::ServiceFault(f) => ActivateSessionResponse {
                response_header: f.response_header,
                ..Default::default()
            },
            other => panic!("expected ActivateSessionResponse, got {:?}", other),
        }
    }

    pub fn read(&mut self, server: &mut Server, nodes: Vec<ReadValueId>) -> SupportedMessage {
        let header = self.header();
        self.call(
            server,
            ReadRequest {
                request_header: header,
                max_age: 0.0,
                timestamps_to_return: TimestampsToReturn::Both,
                nodes_to_read: Some(nodes),
            },
        )
    }

    /// Read the Value attribute of one node.
    pub fn read_value(&mut self, server: &mut Server, node_id: &NodeId) -> Option<Variant> {
        match self.read(server, vec![value_id(node_id)]) {
            SupportedMessage::ReadResponse(r) => r
                .results
                .and_then(|mut v| v.pop())
                .and_then(|dv| dv.value),
            other => panic!("expected ReadResponse, got {:?}", other),
        }
    }

    pub fn write_value(
        &mut self,
        server: &mut Server,
        node_id: &NodeId,
        value: Variant,
    ) -> StatusCode {
        let header = self.header();
        match self.call(
            server,
            WriteRequest {
                request_header: header,
                nodes_to_write: Some(vec![WriteValue {
                    node_id: node_id.clone(),
                    attribute_id: 13,
                    index_range: UaString::null(),
                    value: opcua_stack::types::DataValue::new(value),
                }]),
            },
        ) {
            SupportedMessage::WriteResponse(r) => {
                r.results.and_then(|mut v| v.pop()).unwrap_or_default()
            }
            SupportedMessage::ServiceFault(f) => f.response_header.service_result,
            other => panic!("expected WriteResponse, got {:?}", other),
        }
    }
}

pub fn value_id(node_id: &NodeId) -> ReadValueId {
    ReadValueId {
        node_id: node_id.clone(),
        attribute_id: 13,
        ..Default::default()
    }
}

/// The service result of any response.
pub fn service_result(message: &SupportedMessage) -> StatusCode {
    message
        .response_header()
        .map(|h| h.service_result)
        .unwrap_or_else(|| panic!("{} is not a response", message.type_name()))
}
