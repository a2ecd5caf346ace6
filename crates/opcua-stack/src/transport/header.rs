// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UA TCP and UA Secure Conversation headers (Part 6 Sec.6.7, Sec.7.1).
//!
//! ```text
//! +-----------+-------+-------------+
//! | Type (3B) | Chunk | Size (u32)  |   every message
//! +-----------+-------+-------------+
//! | ChannelId (u32)                 |   OPN / MSG / CLO
//! +---------------------------------+
//! | Asymmetric (OPN) or TokenId     |
//! +---------------------------------+
//! | SequenceNumber | RequestId      |
//! +---------------------------------+
//! | body ...                        |
//! ```

use crate::codec::{BinaryEncodable, BinaryReader, BinaryWriter, EncodingError, EncodingResult};
use crate::status::StatusCode;
use crate::types::{ByteString, UaString};

/// Fixed message header size.
pub const MESSAGE_HEADER_SIZE: usize = 8;
/// Channel id that follows the message header of OPN/MSG/CLO.
pub const SECURE_HEADER_SIZE: usize = MESSAGE_HEADER_SIZE + 4;
pub const SYMMETRIC_HEADER_SIZE: usize = 4;
pub const SEQUENCE_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Hello,
    Acknowledge,
    Error,
    OpenSecureChannel,
    Message,
    CloseSecureChannel,
}

impl MessageType {
    pub fn tag(self) -> &'static [u8; 3] {
        match self {
            Self::Hello => b"HEL",
            Self::Acknowledge => b"ACK",
            Self::Error => b"ERR",
            Self::OpenSecureChannel => b"OPN",
            Self::Message => b"MSG",
            Self::CloseSecureChannel => b"CLO",
        }
    }

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"HEL" => Some(Self::Hello),
            b"ACK" => Some(Self::Acknowledge),
            b"ERR" => Some(Self::Error),
            b"OPN" => Some(Self::OpenSecureChannel),
            b"MSG" => Some(Self::Message),
            b"CLO" => Some(Self::CloseSecureChannel),
            _ => None,
        }
    }

    /// Carries a channel id and sequence header.
    pub fn is_secure(self) -> bool {
        matches!(
            self,
            Self::OpenSecureChannel | Self::Message | Self::CloseSecureChannel
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkType {
    Final,
    Intermediate,
    Abort,
}

impl ChunkType {
    pub fn byte(self) -> u8 {
        match self {
            Self::Final => b'F',
            Self::Intermediate => b'C',
            Self::Abort => b'A',
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'F' => Some(Self::Final),
            b'C' => Some(Self::Intermediate),
            b'A' => Some(Self::Abort),
            _ => None,
        }
    }
}

/// The 8-byte prefix of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    pub chunk_type: ChunkType,
    /// Total size, header included.
    pub message_size: u32,
}

impl MessageHeader {
    pub fn new(message_type: MessageType, chunk_type: ChunkType, message_size: u32) -> Self {
        Self {
            message_type,
            chunk_type,
            message_size,
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.message_type.tag());
        out.push(self.chunk_type.byte());
        out.extend_from_slice(&self.message_size.to_le_bytes());
    }

    /// Parse the first 8 bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, StatusCode> {
        if bytes.len() < MESSAGE_HEADER_SIZE {
            return Err(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID);
        }
        let message_type =
            MessageType::from_tag(&bytes[..3]).ok_or(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID)?;
        let chunk_type =
            ChunkType::from_byte(bytes[3]).ok_or(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID)?;
        let message_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(Self {
            message_type,
            chunk_type,
            message_size,
        })
    }
}

/// Frame a complete single-chunk message around `body`.
pub fn frame(message_type: MessageType, chunk_type: ChunkType, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MESSAGE_HEADER_SIZE + body.len());
    MessageHeader::new(
        message_type,
        chunk_type,
        (MESSAGE_HEADER_SIZE + body.len()) as u32,
    )
    .write_to(&mut out);
    out.extend_from_slice(body);
    out
}

macro_rules! plain_struct {
    ($name:ident { $( $field:ident : $fty:ty ),* $(,)? }) => {
        impl BinaryEncodable for $name {
            fn byte_len(&self) -> usize {
                0 $( + self.$field.byte_len() )*
            }

            fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
                $( self.$field.encode(w)?; )*
                Ok(())
            }

            fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
                Ok(Self { $( $field: <$fty>::decode(r)?, )* })
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HelloMessage {
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
    pub endpoint_url: UaString,
}

plain_struct!(HelloMessage {
    protocol_version: u32,
    receive_buffer_size: u32,
    send_buffer_size: u32,
    max_message_size: u32,
    max_chunk_count: u32,
    endpoint_url: UaString,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcknowledgeMessage {
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
}

plain_struct!(AcknowledgeMessage {
    protocol_version: u32,
    receive_buffer_size: u32,
    send_buffer_size: u32,
    max_message_size: u32,
    max_chunk_count: u32,
});

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorMessage {
    pub error: StatusCode,
    pub reason: UaString,
}

plain_struct!(ErrorMessage {
    error: StatusCode,
    reason: UaString,
});

impl ErrorMessage {
    pub fn new(error: StatusCode, reason: &str) -> Self {
        Self {
            error,
            reason: UaString::from(reason),
        }
    }
}

/// Security header of OPN chunks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AsymmetricSecurityHeader {
    pub security_policy_uri: UaString,
    pub sender_certificate: ByteString,
    pub receiver_certificate_thumbprint: ByteString,
}

plain_struct!(AsymmetricSecurityHeader {
    security_policy_uri: UaString,
    sender_certificate: ByteString,
    receiver_certificate_thumbprint: ByteString,
});

impl AsymmetricSecurityHeader {
    pub fn none() -> Self {
        Self {
            security_policy_uri: UaString::from(crate::config::SECURITY_POLICY_NONE_URI),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceHeader {
    pub sequence_number: u32,
    pub request_id: u32,
}

plain_struct!(SequenceHeader {
    sequence_number: u32,
    request_id: u32,
});

/// Security header between channel id and sequence header.
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityHeader {
    Asymmetric(AsymmetricSecurityHeader),
    /// Token id.
    Symmetric(u32),
}

impl SecurityHeader {
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Asymmetric(h) => h.byte_len(),
            Self::Symmetric(_) => SYMMETRIC_HEADER_SIZE,
        }
    }

    pub fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        match self {
            Self::Asymmetric(h) => h.encode(w),
            Self::Symmetric(token_id) => token_id.encode(w),
        }
    }
}

/// Parsed OPN/MSG/CLO chunk; `body` excludes every header.
#[derive(Debug, Clone, PartialEq)]
pub struct SecureChunk<'a> {
    pub header: MessageHeader,
    pub channel_id: u32,
    pub security: SecurityHeader,
    pub sequence: SequenceHeader,
    pub body: &'a [u8],
}

impl<'a> SecureChunk<'a> {
    /// Parse a complete chunk as delivered by the reassembler.
    pub fn parse(
        bytes: &'a [u8],
        reader_options: &crate::codec::DecodingOptions,
    ) -> EncodingResult<Self> {
        let header = MessageHeader::parse(bytes)
            .map_err(|_| EncodingError::InvalidData("bad message header".to_string()))?;
        if !header.message_type.is_secure() {
            return Err(EncodingError::InvalidData(format!(
                "{:?} is not a secure conversation message",
                header.message_type
            )));
        }
        if header.message_size as usize != bytes.len() {
            return Err(EncodingError::InvalidData(format!(
                "message size {} does not match chunk length {}",
                header.message_size,
                bytes.len()
            )));
        }
        let mut r = BinaryReader::new(&bytes[MESSAGE_HEADER_SIZE..], reader_options.clone());
        let channel_id = r.read_u32()?;
        let security = if header.message_type == MessageType::OpenSecureChannel {
            SecurityHeader::Asymmetric(AsymmetricSecurityHeader::decode(&mut r)?)
        } else {
            SecurityHeader::Symmetric(r.read_u32()?)
        };
        let sequence = SequenceHeader::decode(&mut r)?;
        Ok(Self {
            header,
            channel_id,
            security,
            sequence,
            body: r.rest(),
        })
    }

    pub fn token_id(&self) -> Option<u32> {
        match self.security {
            SecurityHeader::Symmetric(id) => Some(id),
            SecurityHeader::Asymmetric(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_from_slice, encode_to_vec, DecodingOptions};

    #[test]
    fn test_message_header_layout() {
        let mut out = Vec::new();
        MessageHeader::new(MessageType::Message, ChunkType::Intermediate, 0x0102)
            .write_to(&mut out);
        assert_eq!(out, b"MSGC\x02\x01\x00\x00");
        let parsed = MessageHeader::parse(&out).unwrap();
        assert_eq!(parsed.message_type, MessageType::Message);
        assert_eq!(parsed.chunk_type, ChunkType::Intermediate);
        assert_eq!(parsed.message_size, 0x0102);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(
            MessageHeader::parse(b"XYZF\x10\x00\x00\x00"),
            Err(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID)
        );
        assert!(MessageHeader::parse(b"MSGX\x10\x00\x00\x00").is_err());
    }

    #[test]
    fn test_hello_body() {
        let hello = HelloMessage {
            protocol_version: 0,
            receive_buffer_size: 65535,
            send_buffer_size: 65535,
            max_message_size: 0,
            max_chunk_count: 0,
            endpoint_url: UaString::from("opc.tcp://h:4840"),
        };
        let bytes = encode_to_vec(&hello).unwrap();
        assert_eq!(bytes.len(), 20 + 4 + 16);
        let back: HelloMessage = decode_from_slice(&bytes, &DecodingOptions::default()).unwrap();
        assert_eq!(back, hello);
    }

    #[test]
    fn test_secure_chunk_parse() {
        let mut body = Vec::new();
        body.extend_from_slice(&7u32.to_le_bytes()); // channel id
        body.extend_from_slice(&3u32.to_le_bytes()); // token id
        body.extend_from_slice(&51u32.to_le_bytes()); // sequence number
        body.extend_from_slice(&9u32.to_le_bytes()); // request id
        body.extend_from_slice(b"payload");
        let bytes = frame(MessageType::Message, ChunkType::Final, &body);
        let chunk = SecureChunk::parse(&bytes, &DecodingOptions::default()).unwrap();
        assert_eq!(chunk.channel_id, 7);
        assert_eq!(chunk.token_id(), Some(3));
        assert_eq!(chunk.sequence.sequence_number, 51);
        assert_eq!(chunk.sequence.request_id, 9);
        assert_eq!(chunk.body, b"payload");
    }

    #[test]
    fn test_secure_chunk_size_mismatch() {
        let mut bytes = frame(MessageType::Message, ChunkType::Final, &[0u8; 16]);
        bytes.push(0);
        assert!(SecureChunk::parse(&bytes, &DecodingOptions::default()).is_err());
    }
}
