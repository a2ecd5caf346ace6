// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-connection transport state.
//!
//! Owns the reassembler, performs the HEL/ACK handshake and buffers the
//! chunks waiting to be written to the socket. The socket itself lives in
//! the network layer; this type only sees bytes.

use std::collections::VecDeque;

use crate::codec::{decode_from_slice, encode_to_vec, DecodingOptions};
use crate::config::{TransportLimits, MIN_BUFFER_SIZE, PROTOCOL_VERSION};
use crate::status::StatusCode;
use crate::transport::chunker::ChunkLimits;
use crate::transport::header::{
    frame, AcknowledgeMessage, ChunkType, ErrorMessage, HelloMessage, MessageType,
    MESSAGE_HEADER_SIZE,
};
use crate::transport::reassembler::{Reassembled, Reassembler};

use super::secure_channel::ReceiveLimits;

/// Handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for HEL.
    AwaitingHello,
    /// ACK sent; secure conversation messages accepted.
    Established,
    /// Closing; nothing more is processed.
    Closed,
}

/// Buffer sizes in effect after HEL/ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedLimits {
    /// Largest chunk we accept.
    pub receive_buffer_size: u32,
    /// Largest chunk we send.
    pub send_buffer_size: u32,
    /// Client's limits for messages we send (0 = unlimited).
    pub peer_max_message_size: u32,
    pub peer_max_chunk_count: u32,
    /// Our limits for messages we receive (0 = unlimited).
    pub local_max_message_size: u32,
    pub local_max_chunk_count: u32,
}

impl NegotiatedLimits {
    pub fn send_limits(&self) -> ChunkLimits {
        ChunkLimits::new(
            self.send_buffer_size as usize,
            self.peer_max_message_size as usize,
            self.peer_max_chunk_count as usize,
        )
    }

    pub fn receive_limits(&self) -> ReceiveLimits {
        ReceiveLimits {
            max_message_size: self.local_max_message_size as usize,
            max_chunk_count: self.local_max_chunk_count as usize,
        }
    }
}

pub struct Connection {
    id: u64,
    state: ConnectionState,
    local: TransportLimits,
    reassembler: Reassembler,
    negotiated: Option<NegotiatedLimits>,
    channel_id: Option<u32>,
    endpoint_url: String,
    outbound: VecDeque<Vec<u8>>,
}

impl Connection {
    pub fn new(id: u64, local: TransportLimits) -> Self {
        let reassembler = Reassembler::new(local.receive_buffer_size as usize);
        Self {
            id,
            state: ConnectionState::AwaitingHello,
            local,
            reassembler,
            negotiated: None,
            channel_id: None,
            endpoint_url: String::new(),
            outbound: VecDeque::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == ConnectionState::Established
    }

    pub fn negotiated(&self) -> Option<&NegotiatedLimits> {
        self.negotiated.as_ref()
    }

    /// Endpoint URL the client asked for in HEL.
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    pub fn channel_id(&self) -> Option<u32> {
        self.channel_id
    }

    pub fn set_channel_id(&mut self, channel_id: Option<u32>) {
        self.channel_id = channel_id;
    }

    /// Split inbound bytes into complete messages.
    pub fn push_bytes(&mut self, fragment: &[u8]) -> Reassembled {
        if self.state == ConnectionState::Closed {
            return Reassembled::default();
        }
        self.reassembler.push(fragment)
    }

    /// Handle a complete HEL message (header included). ACK or ERR is queued.
    pub fn process_hello(&mut self, message: &[u8]) -> Result<(), StatusCode> {
        if self.state != ConnectionState::AwaitingHello {
            self.send_error(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID, "unexpected HEL");
            return Err(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID);
        }
        let hello: HelloMessage =
            match decode_from_slice(
                message.get(MESSAGE_HEADER_SIZE..).unwrap_or_default(),
                &DecodingOptions::default(),
            ) {
                Ok(hello) => hello,
                Err(e) => {
                    self.send_error(StatusCode::BAD_DECODING_ERROR, "malformed HEL");
                    log::warn!("[connection] {} malformed HEL: {}", self.id, e);
                    return Err(StatusCode::BAD_DECODING_ERROR);
                }
            };

        if hello.protocol_version < PROTOCOL_VERSION {
            self.send_error(
                StatusCode::BAD_PROTOCOL_VERSION_UNSUPPORTED,
                "protocol version unsupported",
            );
            return Err(StatusCode::BAD_PROTOCOL_VERSION_UNSUPPORTED);
        }
        if hello.receive_buffer_size < MIN_BUFFER_SIZE || hello.send_buffer_size < MIN_BUFFER_SIZE {
            log::warn!(
                "[connection] {} HEL buffers too small (rx {}, tx {})",
                self.id,
                hello.receive_buffer_size,
                hello.send_buffer_size
            );
            self.send_error(StatusCode::BAD_CONNECTION_REJECTED, "buffer sizes below minimum");
            return Err(StatusCode::BAD_CONNECTION_REJECTED);
        }

        let negotiated = NegotiatedLimits {
            receive_buffer_size: self.local.receive_buffer_size.min(hello.send_buffer_size),
            send_buffer_size: self.local.send_buffer_size.min(hello.receive_buffer_size),
            peer_max_message_size: hello.max_message_size,
            peer_max_chunk_count: hello.max_chunk_count,
            local_max_message_size: self.local.max_message_size,
            local_max_chunk_count: self.local.max_chunk_count,
        };
        let ack = AcknowledgeMessage {
            protocol_version: PROTOCOL_VERSION,
            receive_buffer_size: negotiated.receive_buffer_size,
            send_buffer_size: negotiated.send_buffer_size,
            max_message_size: negotiated.local_max_message_size,
            max_chunk_count: negotiated.local_max_chunk_count,
        };
        let body = encode_to_vec(&ack).map_err(|e| e.status())?;
        self.outbound
            .push_back(frame(MessageType::Acknowledge, ChunkType::Final, &body));

        self.reassembler
            .set_max_message_size(negotiated.receive_buffer_size as usize);
        self.negotiated = Some(negotiated);
        self.endpoint_url = hello.endpoint_url.as_str_or_empty().to_string();
        self.state = ConnectionState::Established;
        log::debug!(
            "[connection] {} established (rx {}, tx {}, peer max message {})",
            self.id,
            negotiated.receive_buffer_size,
            negotiated.send_buffer_size,
            negotiated.peer_max_message_size
        );
        Ok(())
    }

    /// Queue an ERR message and mark the connection for closing.
    pub fn send_error(&mut self, status: StatusCode, reason: &str) {
        if self.state == ConnectionState::Closed {
            return;
        }
        match encode_to_vec(&ErrorMessage::new(status, reason)) {
            Ok(body) => self
                .outbound
                .push_back(frame(MessageType::Error, ChunkType::Final, &body)),
            Err(e) => log::error!("[connection] {} cannot encode ERR: {}", self.id, e),
        }
        log::info!("[connection] {} closing: {} ({})", self.id, status, reason);
        self.state = ConnectionState::Closed;
    }

    /// Close without sending anything further.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }

    pub fn queue(&mut self, chunk: Vec<u8>) {
        self.outbound.push_back(chunk);
    }

    pub fn queue_all(&mut self, chunks: impl IntoIterator<Item = Vec<u8>>) {
        self.outbound.extend(chunks);
    }

    /// Drain the bytes waiting to be written.
    pub fn take_outbound(&mut self) -> Vec<Vec<u8>> {
        self.outbound.drain(..).collect()
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Closed and nothing left to flush.
    pub fn should_close(&self) -> bool {
        self.state == ConnectionState::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::header::MessageHeader;
    use crate::types::UaString;

    fn hello(rx: u32, tx: u32) -> Vec<u8> {
        let hel = HelloMessage {
            protocol_version: 0,
            receive_buffer_size: rx,
            send_buffer_size: tx,
            max_message_size: 0,
            max_chunk_count: 0,
            endpoint_url: UaString::from("opc.tcp://localhost:4840"),
        };
        frame(MessageType::Hello, ChunkType::Final, &encode_to_vec(&hel).unwrap())
    }

    #[test]
    fn test_handshake_takes_minimum() {
        let mut conn = Connection::new(1, TransportLimits::default());
        let msgs = conn.push_bytes(&hello(16_384, 1_000_000)).messages;
        assert_eq!(msgs.len(), 1);
        conn.process_hello(&msgs[0]).unwrap();
        assert!(conn.is_established());
        assert_eq!(conn.endpoint_url(), "opc.tcp://localhost:4840");

        let out = conn.take_outbound();
        assert_eq!(out.len(), 1);
        let header = MessageHeader::parse(&out[0]).unwrap();
        assert_eq!(header.message_type, MessageType::Acknowledge);
        let ack: AcknowledgeMessage =
            decode_from_slice(&out[0][MESSAGE_HEADER_SIZE..], &DecodingOptions::default()).unwrap();
        assert_eq!(ack.send_buffer_size, 16_384);
        assert_eq!(ack.receive_buffer_size, 65_535);

        let limits = conn.negotiated().unwrap().send_limits();
        assert_eq!(limits.chunk_size, 16_384);
    }

    #[test]
    fn test_small_buffers_rejected_with_err() {
        let mut conn = Connection::new(2, TransportLimits::default());
        let msg = hello(1024, 65_535);
        assert_eq!(
            conn.process_hello(&msg),
            Err(StatusCode::BAD_CONNECTION_REJECTED)
        );
        assert!(conn.should_close());
        let out = conn.take_outbound();
        let header = MessageHeader::parse(&out[0]).unwrap();
        assert_eq!(header.message_type, MessageType::Error);
        let err: ErrorMessage =
            decode_from_slice(&out[0][MESSAGE_HEADER_SIZE..], &DecodingOptions::default()).unwrap();
        assert_eq!(err.error, StatusCode::BAD_CONNECTION_REJECTED);
    }

    #[test]
    fn test_second_hello_rejected() {
        let mut conn = Connection::new(3, TransportLimits::default());
        conn.process_hello(&hello(65_535, 65_535)).unwrap();
        assert!(conn.process_hello(&hello(65_535, 65_535)).is_err());
        assert!(conn.should_close());
    }
}
