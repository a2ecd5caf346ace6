// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Byte-stream reassembler.
//!
//! TCP delivers arbitrary fragments; the reassembler splits them into
//! complete UA TCP messages by the length field of the 8-byte header and
//! carries any trailing partial message over to the next call.
//!
//! Framing corruption (a tag outside `HEL/ACK/OPN/MSG/CLO`, a length below
//! 16 or above the receive limit) abandons everything from the corrupt
//! position on. There is no resynchronization: byte alignment is lost and
//! the connection must be closed.

use super::header::MESSAGE_HEADER_SIZE;
use crate::config::MIN_MESSAGE_SIZE;
use crate::status::StatusCode;

/// Tags a server accepts from a client.
const ACCEPTED_TAGS: [&[u8; 3]; 5] = [b"HEL", b"ACK", b"OPN", b"MSG", b"CLO"];

/// Result of feeding one fragment.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reassembled {
    /// Complete messages, in stream order.
    pub messages: Vec<Vec<u8>>,
    /// Set when framing corruption was detected; the stream is dead.
    pub error: Option<StatusCode>,
}

/// Streaming length-prefixed frame splitter.
#[derive(Debug)]
pub struct Reassembler {
    incomplete: Vec<u8>,
    max_message_size: usize,
    corrupted: bool,
}

impl Reassembler {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            incomplete: Vec::new(),
            max_message_size,
            corrupted: false,
        }
    }

    /// Change the receive limit (after HEL negotiation).
    pub fn set_max_message_size(&mut self, max_message_size: usize) {
        self.max_message_size = max_message_size;
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Bytes of a partial message waiting for more input.
    pub fn pending(&self) -> usize {
        self.incomplete.len()
    }

    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    /// Feed one fragment; returns every message it completes.
    pub fn push(&mut self, fragment: &[u8]) -> Reassembled {
        let mut out = Reassembled::default();
        if self.corrupted {
            out.error = Some(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID);
            return out;
        }

        // Fast path: nothing carried over, parse straight from the fragment.
        let owned;
        let data: &[u8] = if self.incomplete.is_empty() {
            fragment
        } else {
            let mut joined = std::mem::take(&mut self.incomplete);
            joined.extend_from_slice(fragment);
            owned = joined;
            &owned
        };

        let mut pos = 0;
        while data.len() - pos >= MESSAGE_HEADER_SIZE {
            let candidate = &data[pos..];
            let length =
                u32::from_le_bytes([candidate[4], candidate[5], candidate[6], candidate[7]])
                    as usize;
            if let Err(status) = self.check_header(&candidate[..3], length) {
                log::warn!(
                    "[reassembler] framing corrupt at offset {} ({}), dropping {} bytes",
                    pos,
                    status,
                    data.len() - pos
                );
                self.corrupted = true;
                out.error = Some(status);
                return out;
            }
            if candidate.len() < length {
                break;
            }
            out.messages.push(candidate[..length].to_vec());
            pos += length;
        }

        self.incomplete = data[pos..].to_vec();
        out
    }

    fn check_header(&self, tag: &[u8], length: usize) -> Result<(), StatusCode> {
        if !ACCEPTED_TAGS.iter().any(|t| t.as_slice() == tag) {
            return Err(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID);
        }
        if length < MIN_MESSAGE_SIZE || length > self.max_message_size {
            return Err(StatusCode::BAD_TCP_MESSAGE_TOO_LARGE);
        }
        Ok(())
    }

    /// Drop any carried-over bytes and clear the corruption flag.
    pub fn reset(&mut self) {
        self.incomplete.clear();
        self.corrupted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::header::{frame, ChunkType, MessageType};

    fn msg(body_len: usize, fill: u8) -> Vec<u8> {
        frame(MessageType::Message, ChunkType::Final, &vec![fill; body_len])
    }

    #[test]
    fn test_single_fragment_many_messages() {
        let mut r = Reassembler::new(65535);
        let mut stream = msg(8, 1);
        stream.extend(msg(20, 2));
        stream.extend(msg(8, 3));
        let out = r.push(&stream);
        assert_eq!(out.messages.len(), 3);
        assert_eq!(out.messages[1].len(), 28);
        assert!(out.error.is_none());
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn test_partial_tail_is_carried() {
        let mut r = Reassembler::new(65535);
        let a = msg(8, 1);
        let b = msg(30, 2);
        let mut stream = a.clone();
        stream.extend_from_slice(&b[..10]);
        let out = r.push(&stream);
        assert_eq!(out.messages, vec![a]);
        assert_eq!(r.pending(), 10);
        let out = r.push(&b[10..]);
        assert_eq!(out.messages, vec![b]);
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn test_one_byte_fragments_match_single_push() {
        let mut stream = msg(8, 1);
        stream.extend(msg(100, 2));
        stream.extend(msg(9, 3));

        let mut whole = Reassembler::new(65535);
        let expected = whole.push(&stream).messages;

        let mut bytewise = Reassembler::new(65535);
        let mut got = Vec::new();
        for b in &stream {
            got.extend(bytewise.push(std::slice::from_ref(b)).messages);
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn test_random_fragmentation() {
        let mut stream = Vec::new();
        for i in 0..20u8 {
            stream.extend(msg(8 + usize::from(i) * 7, i));
        }
        let mut whole = Reassembler::new(65535);
        let expected = whole.push(&stream).messages;

        let mut rng = fastrand::Rng::with_seed(7);
        let mut r = Reassembler::new(65535);
        let mut got = Vec::new();
        let mut pos = 0;
        while pos < stream.len() {
            let n = rng.usize(1..=64).min(stream.len() - pos);
            got.extend(r.push(&stream[pos..pos + n]).messages);
            pos += n;
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn test_corrupt_length_drops_rest_of_stream() {
        let mut r = Reassembler::new(1024);
        let good = msg(8, 1);
        let mut bad = msg(8, 2);
        bad[4..8].copy_from_slice(&4096u32.to_le_bytes());
        let mut stream = good.clone();
        stream.extend(bad);
        // a valid-looking message after the corruption must not be recovered
        stream.extend(msg(8, 3));
        let out = r.push(&stream);
        assert_eq!(out.messages, vec![good]);
        assert_eq!(out.error, Some(StatusCode::BAD_TCP_MESSAGE_TOO_LARGE));
        assert_eq!(r.pending(), 0);
        assert!(r.is_corrupted());
        assert!(r.push(&msg(8, 4)).messages.is_empty());
    }

    #[test]
    fn test_unknown_tag_and_short_length() {
        let mut r = Reassembler::new(1024);
        let mut bad = msg(8, 0);
        bad[..3].copy_from_slice(b"ERR");
        assert_eq!(
            r.push(&bad).error,
            Some(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID)
        );

        let mut r = Reassembler::new(1024);
        let mut short = msg(8, 0);
        short[4..8].copy_from_slice(&12u32.to_le_bytes());
        assert!(r.push(&short).error.is_some());
    }
}
