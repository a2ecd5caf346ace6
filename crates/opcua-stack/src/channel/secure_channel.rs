// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One secure channel: token slots, sequence numbers, inbound chunk accumulation.
//!
//! # Token slots
//!
//! ```text
//!   OPN Issue          OPN Renew              MSG with next token id
//!  ----------> current ----------> current + next ----------------------> current := next
//! ```
//!
//! While a renewal is pending both token ids are accepted. The first message
//! tagged with the pending id (or an expired current token during the sweep)
//! revolves the pending token into the current slot; the old id is rejected
//! from then on.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::messages::ChannelSecurityToken;
use crate::status::StatusCode;
use crate::transport::chunker::next_sequence_number;
use crate::transport::header::ChunkType;
use crate::types::{ByteString, DateTime, NodeId};

// ============================================================================
// Tokens
// ============================================================================

/// Security token of a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelToken {
    pub token_id: u32,
    /// Wall-clock creation time announced to the client.
    pub created_at: DateTime,
    /// Monotonic creation time used for expiry.
    pub created: Instant,
    pub lifetime: Duration,
}

impl ChannelToken {
    pub fn new(token_id: u32, lifetime_ms: u32, now: Instant) -> Self {
        Self {
            token_id,
            created_at: DateTime::now(),
            created: now,
            lifetime: Duration::from_millis(u64::from(lifetime_ms)),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) > self.lifetime
    }

    pub fn to_wire(&self, channel_id: u32) -> ChannelSecurityToken {
        ChannelSecurityToken {
            channel_id,
            token_id: self.token_id,
            created_at: self.created_at,
            revised_lifetime: u32::try_from(self.lifetime.as_millis()).unwrap_or(u32::MAX),
        }
    }
}

// ============================================================================
// Inbound chunks
// ============================================================================

/// Limits applied to inbound chunk accumulation. Zero means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiveLimits {
    pub max_message_size: usize,
    pub max_chunk_count: usize,
}

/// Accumulator for one chunked request.
#[derive(Debug, Default)]
struct ChunkEntry {
    data: Vec<u8>,
    /// Length of the first chunk body, kept for error replies.
    first_len: usize,
    chunk_count: usize,
    /// A limit was exceeded; later chunks are dropped.
    invalid: bool,
}

/// Result of feeding one chunk body to [`SecureChannel::process_chunk`].
#[derive(Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Intermediate chunk stored.
    Pending,
    /// Final chunk received; the complete message body.
    Complete(Vec<u8>),
    /// The client aborted the message.
    Aborted,
    /// Limits were exceeded. Carries the first chunk body so the request
    /// header can still be decoded for the fault reply.
    TooLarge(Vec<u8>),
}

// ============================================================================
// SecureChannel
// ============================================================================

pub struct SecureChannel {
    channel_id: u32,
    connection_id: u64,
    current: ChannelToken,
    next: Option<ChannelToken>,
    client_nonce: ByteString,
    server_nonce: ByteString,
    /// Sequence number of the next outbound chunk.
    send_sequence: u32,
    last_received_sequence: Option<u32>,
    chunks: HashMap<u32, ChunkEntry>,
    receive_limits: ReceiveLimits,
    /// Authentication tokens of sessions bound to this channel.
    sessions: Vec<NodeId>,
}

impl SecureChannel {
    pub fn new(
        channel_id: u32,
        connection_id: u64,
        token: ChannelToken,
        client_nonce: ByteString,
        server_nonce: ByteString,
    ) -> Self {
        Self {
            channel_id,
            connection_id,
            current: token,
            next: None,
            client_nonce,
            server_nonce,
            send_sequence: 1,
            last_received_sequence: None,
            chunks: HashMap::new(),
            receive_limits: ReceiveLimits::default(),
            sessions: Vec::new(),
        }
    }

    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn current_token(&self) -> &ChannelToken {
        &self.current
    }

    pub fn next_token(&self) -> Option<&ChannelToken> {
        self.next.as_ref()
    }

    pub fn client_nonce(&self) -> &ByteString {
        &self.client_nonce
    }

    pub fn server_nonce(&self) -> &ByteString {
        &self.server_nonce
    }

    pub fn set_receive_limits(&mut self, limits: ReceiveLimits) {
        self.receive_limits = limits;
    }

    // ------------------------------------------------------------------------
    // Token lifecycle
    // ------------------------------------------------------------------------

    /// Install a pending token. Returns `false` when one is already pending.
    pub fn set_next_token(
        &mut self,
        token: ChannelToken,
        client_nonce: ByteString,
        server_nonce: ByteString,
    ) -> bool {
        if self.next.is_some() {
            return false;
        }
        self.next = Some(token);
        self.client_nonce = client_nonce;
        self.server_nonce = server_nonce;
        true
    }

    /// Promote the pending token. Returns `false` if none was pending.
    pub fn revolve(&mut self) -> bool {
        match self.next.take() {
            Some(next) => {
                log::debug!(
                    "[channel] channel {} revolved token {} -> {}",
                    self.channel_id,
                    self.current.token_id,
                    next.token_id
                );
                self.current = next;
                true
            }
            None => false,
        }
    }

    /// Accept a token id on an inbound message, revolving if it names the
    /// pending token.
    pub fn check_token(&mut self, token_id: u32) -> Result<(), StatusCode> {
        if token_id == self.current.token_id {
            return Ok(());
        }
        if self.next.as_ref().map(|t| t.token_id) == Some(token_id) {
            self.revolve();
            return Ok(());
        }
        log::warn!(
            "[channel] channel {} rejected token {} (current {})",
            self.channel_id,
            token_id,
            self.current.token_id
        );
        Err(StatusCode::BAD_SECURE_CHANNEL_TOKEN_UNKNOWN)
    }

    /// Current token expired and no renewal is pending.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.next.is_none() && self.current.is_expired(now)
    }

    // ------------------------------------------------------------------------
    // Sequence numbers
    // ------------------------------------------------------------------------

    /// Record an inbound sequence number. With `strict`, anything other than
    /// the successor of the previous one is rejected.
    pub fn check_sequence(&mut self, sequence_number: u32, strict: bool) -> Result<(), StatusCode> {
        if strict {
            if let Some(last) = self.last_received_sequence {
                if sequence_number != next_sequence_number(last) {
                    log::warn!(
                        "[channel] channel {} sequence {} after {}",
                        self.channel_id,
                        sequence_number,
                        last
                    );
                    return Err(StatusCode::BAD_SEQUENCE_NUMBER_INVALID);
                }
            }
        }
        self.last_received_sequence = Some(sequence_number);
        Ok(())
    }

    pub fn last_received_sequence(&self) -> Option<u32> {
        self.last_received_sequence
    }

    pub fn send_sequence(&self) -> u32 {
        self.send_sequence
    }

    /// Store the sequence number following a send.
    pub fn set_send_sequence(&mut self, next: u32) {
        self.send_sequence = next;
    }

    // ------------------------------------------------------------------------
    // Chunk accumulation
    // ------------------------------------------------------------------------

    /// Feed one chunk body for `request_id`.
    pub fn process_chunk(
        &mut self,
        chunk_type: ChunkType,
        request_id: u32,
        body: &[u8],
    ) -> ChunkOutcome {
        match chunk_type {
            ChunkType::Abort => {
                if self.chunks.remove(&request_id).is_some() {
                    log::debug!(
                        "[channel] channel {} request {} aborted by client",
                        self.channel_id,
                        request_id
                    );
                }
                ChunkOutcome::Aborted
            }
            ChunkType::Intermediate => {
                let limits = self.receive_limits;
                let entry = self.chunks.entry(request_id).or_default();
                if entry.chunk_count == 0 {
                    entry.first_len = body.len();
                }
                Self::append(entry, body, &limits);
                ChunkOutcome::Pending
            }
            ChunkType::Final => {
                let mut entry = self.chunks.remove(&request_id).unwrap_or_else(|| ChunkEntry {
                    first_len: body.len(),
                    ..Default::default()
                });
                Self::append(&mut entry, body, &self.receive_limits);
                Self::complete(entry)
            }
        }
    }

    fn append(entry: &mut ChunkEntry, body: &[u8], limits: &ReceiveLimits) {
        entry.chunk_count += 1;
        if entry.invalid {
            return;
        }
        let too_many = limits.max_chunk_count != 0 && entry.chunk_count > limits.max_chunk_count;
        let too_big =
            limits.max_message_size != 0 && entry.data.len() + body.len() > limits.max_message_size;
        if too_many || too_big {
            log::warn!(
                "[channel] request exceeds limits after {} chunks ({} bytes)",
                entry.chunk_count,
                entry.data.len() + body.len()
            );
            entry.invalid = true;
            // Only the first chunk is kept.
            entry.data.truncate(entry.first_len);
            if entry.chunk_count == 1 {
                entry.data.extend_from_slice(body);
            }
            return;
        }
        entry.data.extend_from_slice(body);
    }

    fn complete(mut entry: ChunkEntry) -> ChunkOutcome {
        if entry.invalid {
            entry.data.truncate(entry.first_len);
            ChunkOutcome::TooLarge(entry.data)
        } else {
            ChunkOutcome::Complete(entry.data)
        }
    }

    /// Requests with chunks still being accumulated.
    pub fn pending_requests(&self) -> usize {
        self.chunks.len()
    }

    // ------------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------------

    pub fn attach_session(&mut self, authentication_token: NodeId) {
        if !self.sessions.contains(&authentication_token) {
            self.sessions.push(authentication_token);
        }
    }

    pub fn detach_session(&mut self, authentication_token: &NodeId) {
        self.sessions.retain(|t| t != authentication_token);
    }

    pub fn has_session(&self, authentication_token: &NodeId) -> bool {
        self.sessions.contains(authentication_token)
    }

    pub fn sessions(&self) -> &[NodeId] {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> SecureChannel {
        let now = Instant::now();
        SecureChannel::new(
            7,
            1,
            ChannelToken::new(1, 60_000, now),
            ByteString::null(),
            ByteString::from(vec![0u8; 32]),
        )
    }

    #[test]
    fn test_renew_then_revolve() {
        let mut ch = channel();
        let token = |id| ChannelToken::new(id, 60_000, Instant::now());
        assert!(ch.set_next_token(token(2), ByteString::null(), ByteString::null()));
        // second renew while pending is refused
        assert!(!ch.set_next_token(token(3), ByteString::null(), ByteString::null()));

        // old token still accepted while the renewal is pending
        assert_eq!(ch.check_token(1), Ok(()));
        assert_eq!(ch.current_token().token_id, 1);

        // first use of the new token revolves it in
        assert_eq!(ch.check_token(2), Ok(()));
        assert_eq!(ch.current_token().token_id, 2);
        assert!(ch.next_token().is_none());

        assert_eq!(ch.check_token(1), Err(StatusCode::BAD_SECURE_CHANNEL_TOKEN_UNKNOWN));
        assert_eq!(ch.check_token(99), Err(StatusCode::BAD_SECURE_CHANNEL_TOKEN_UNKNOWN));
    }

    #[test]
    fn test_expiry() {
        let start = Instant::now();
        let ch = SecureChannel::new(
            1,
            1,
            ChannelToken::new(1, 1_000, start),
            ByteString::null(),
            ByteString::null(),
        );
        assert!(!ch.is_expired(start + Duration::from_millis(500)));
        assert!(ch.is_expired(start + Duration::from_millis(1_500)));
    }

    #[test]
    fn test_sequence_validation() {
        let mut ch = channel();
        ch.check_sequence(10, true).unwrap();
        ch.check_sequence(11, true).unwrap();
        assert_eq!(ch.check_sequence(13, true), Err(StatusCode::BAD_SEQUENCE_NUMBER_INVALID));
        // lenient mode only records
        ch.check_sequence(40, false).unwrap();
        assert_eq!(ch.last_received_sequence(), Some(40));
    }

    #[test]
    fn test_interleaved_chunked_requests() {
        let mut ch = channel();
        assert_eq!(ch.process_chunk(ChunkType::Intermediate, 1, b"ab"), ChunkOutcome::Pending);
        assert_eq!(ch.process_chunk(ChunkType::Intermediate, 2, b"xy"), ChunkOutcome::Pending);
        assert_eq!(ch.process_chunk(ChunkType::Intermediate, 1, b"cd"), ChunkOutcome::Pending);
        assert_eq!(ch.pending_requests(), 2);
        assert_eq!(
            ch.process_chunk(ChunkType::Final, 2, b"z"),
            ChunkOutcome::Complete(b"xyz".to_vec())
        );
        assert_eq!(
            ch.process_chunk(ChunkType::Final, 1, b"e"),
            ChunkOutcome::Complete(b"abcde".to_vec())
        );
        assert_eq!(ch.pending_requests(), 0);
    }

    #[test]
    fn test_abort_discards() {
        let mut ch = channel();
        ch.process_chunk(ChunkType::Intermediate, 5, b"part");
        assert_eq!(ch.process_chunk(ChunkType::Abort, 5, b""), ChunkOutcome::Aborted);
        assert_eq!(ch.pending_requests(), 0);
        // a final chunk afterwards starts a fresh message
        assert_eq!(
            ch.process_chunk(ChunkType::Final, 5, b"new"),
            ChunkOutcome::Complete(b"new".to_vec())
        );
    }

    #[test]
    fn test_chunk_count_limit() {
        let mut ch = channel();
        ch.set_receive_limits(ReceiveLimits {
            max_message_size: 0,
            max_chunk_count: 2,
        });
        ch.process_chunk(ChunkType::Intermediate, 3, b"first");
        ch.process_chunk(ChunkType::Intermediate, 3, b"second");
        assert_eq!(
            ch.process_chunk(ChunkType::Final, 3, b"third"),
            ChunkOutcome::TooLarge(b"first".to_vec())
        );
    }

    #[test]
    fn test_message_size_limit() {
        let mut ch = channel();
        ch.set_receive_limits(ReceiveLimits {
            max_message_size: 8,
            max_chunk_count: 0,
        });
        assert_eq!(
            ch.process_chunk(ChunkType::Final, 4, b"0123456789"),
            ChunkOutcome::TooLarge(b"0123456789".to_vec())
        );
    }

    #[test]
    fn test_session_attachment() {
        let mut ch = channel();
        let token = NodeId::numeric(1, 5);
        ch.attach_session(token.clone());
        ch.attach_session(token.clone());
        assert_eq!(ch.sessions().len(), 1);
        assert!(ch.has_session(&token));
        ch.detach_session(&token);
        assert!(!ch.has_session(&token));
    }
}
