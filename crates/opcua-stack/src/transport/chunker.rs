// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Send-side chunking.
//!
//! A [`ChunkSender`] is the [`BufferExchange`] sink behind a bounded
//! [`BinaryWriter`]: each time the encoder fills a chunk body, the sender
//! wraps it in the secure conversation headers and queues it as an
//! intermediate (`C`) chunk. The remainder becomes the final (`F`) chunk.
//!
//! Negotiated limits are enforced while encoding. When the next chunk would
//! exceed the peer's chunk count or message size, the exchange fails with
//! `BadResponseTooLarge`; if chunks already went out, an abort (`A`) chunk
//! tells the peer to discard them.

use super::header::{
    ChunkType, ErrorMessage, MessageHeader, MessageType, SecurityHeader, SequenceHeader,
    SECURE_HEADER_SIZE, SEQUENCE_HEADER_SIZE,
};
use crate::codec::{BinaryEncodable, BinaryWriter, BufferExchange, EncodingError, EncodingResult};
use crate::status::StatusCode;

/// Highest sequence number before wrap-around (`u32::MAX - 1024`).
pub const MAX_SEQUENCE_NUMBER: u32 = u32::MAX - 1024;

/// Sequence number following `current`, wrapping below 1024.
pub fn next_sequence_number(current: u32) -> u32 {
    if current >= MAX_SEQUENCE_NUMBER {
        1
    } else {
        current + 1
    }
}

/// Limits negotiated for the send direction. Zero means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    /// Size of a whole chunk, headers included (peer's receive buffer).
    pub chunk_size: usize,
    pub max_message_size: usize,
    pub max_chunk_count: usize,
}

impl ChunkLimits {
    pub fn new(chunk_size: usize, max_message_size: usize, max_chunk_count: usize) -> Self {
        Self {
            chunk_size,
            max_message_size,
            max_chunk_count,
        }
    }
}

/// Frames encoder output into secure conversation chunks.
pub struct ChunkSender<'o> {
    message_type: MessageType,
    channel_id: u32,
    security: SecurityHeader,
    request_id: u32,
    next_sequence: u32,
    limits: ChunkLimits,
    body_bytes: usize,
    chunks_sent: usize,
    out: &'o mut Vec<Vec<u8>>,
}

impl<'o> ChunkSender<'o> {
    pub fn new(
        message_type: MessageType,
        channel_id: u32,
        security: SecurityHeader,
        request_id: u32,
        first_sequence: u32,
        limits: ChunkLimits,
        out: &'o mut Vec<Vec<u8>>,
    ) -> Self {
        Self {
            message_type,
            channel_id,
            security,
            request_id,
            next_sequence: first_sequence,
            limits,
            body_bytes: 0,
            chunks_sent: 0,
            out,
        }
    }

    /// Room for message body in one chunk.
    pub fn body_limit(&self) -> usize {
        self.limits
            .chunk_size
            .saturating_sub(SECURE_HEADER_SIZE + self.security.byte_len() + SEQUENCE_HEADER_SIZE)
    }

    /// Sequence number the next chunk would carry.
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    pub fn chunks_sent(&self) -> usize {
        self.chunks_sent
    }

    /// Encode `message` and queue it as one or more chunks.
    ///
    /// On failure after intermediate chunks were queued, an abort chunk is
    /// queued as well and the error is returned.
    pub fn send<T: BinaryEncodable>(&mut self, message: &T) -> EncodingResult<()> {
        let limit = self.body_limit();
        if limit == 0 {
            return Err(EncodingError::LimitsExceeded(format!(
                "chunk size {} leaves no room for a body",
                self.limits.chunk_size
            )));
        }
        let encoded = {
            let mut w = BinaryWriter::with_exchange(limit, &mut *self);
            message.encode(&mut w).map(|()| w.into_inner())
        };
        let result = encoded.and_then(|remainder| self.finish(&remainder));
        if let Err(e) = &result {
            if self.chunks_sent > 0 {
                log::debug!(
                    "[chunker] aborting request {} after {} chunks: {}",
                    self.request_id,
                    self.chunks_sent,
                    e
                );
                self.abort(e.status(), &e.to_string())?;
            }
        }
        result
    }

    /// Queue the final chunk.
    pub fn finish(&mut self, remainder: &[u8]) -> EncodingResult<()> {
        self.check_limits(remainder.len(), true)?;
        self.emit(ChunkType::Final, remainder)
    }

    /// Queue an abort chunk carrying `status` and `reason`.
    pub fn abort(&mut self, status: StatusCode, reason: &str) -> EncodingResult<()> {
        let body = crate::codec::encode_to_vec(&ErrorMessage::new(status, reason))?;
        self.emit(ChunkType::Abort, &body)
    }

    fn check_limits(&self, len: usize, is_final: bool) -> EncodingResult<()> {
        let limits = &self.limits;
        // An intermediate chunk needs a final chunk after it.
        let needed_chunks = self.chunks_sent + if is_final { 1 } else { 2 };
        if limits.max_chunk_count != 0 && needed_chunks > limits.max_chunk_count {
            return Err(EncodingError::Aborted(StatusCode::BAD_RESPONSE_TOO_LARGE));
        }
        if limits.max_message_size != 0 && self.body_bytes + len > limits.max_message_size {
            return Err(EncodingError::Aborted(StatusCode::BAD_RESPONSE_TOO_LARGE));
        }
        Ok(())
    }

    fn emit(&mut self, chunk_type: ChunkType, body: &[u8]) -> EncodingResult<()> {
        let size =
            SECURE_HEADER_SIZE + self.security.byte_len() + SEQUENCE_HEADER_SIZE + body.len();
        let mut head = BinaryWriter::with_capacity(size - body.len());
        head.write_u32(self.channel_id)?;
        self.security.encode(&mut head)?;
        SequenceHeader {
            sequence_number: self.next_sequence,
            request_id: self.request_id,
        }
        .encode(&mut head)?;

        let mut chunk = Vec::with_capacity(size);
        MessageHeader::new(self.message_type, chunk_type, size as u32).write_to(&mut chunk);
        chunk.extend_from_slice(head.buffer());
        chunk.extend_from_slice(body);
        self.out.push(chunk);

        self.next_sequence = next_sequence_number(self.next_sequence);
        self.body_bytes += body.len();
        self.chunks_sent += 1;
        Ok(())
    }
}

impl BufferExchange for ChunkSender<'_> {
    fn exchange(&mut self, filled: &mut Vec<u8>) -> EncodingResult<()> {
        self.check_limits(filled.len(), false)?;
        let body = std::mem::take(filled);
        self.emit(ChunkType::Intermediate, &body)
    }
}
