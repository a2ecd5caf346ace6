// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UA TCP transport (OPC UA Part 6 Sec.7).
//!
//! - [`header`]: message and secure conversation headers.
//! - [`reassembler`]: splits a byte stream into whole messages.
//! - [`chunker`]: splits an encoded message into outbound chunks.
//! - [`tcp`]: `mio` listener loop driving a [`Server`](crate::Server).

pub mod chunker;
pub mod header;
pub mod reassembler;
pub mod tcp;

pub use chunker::{next_sequence_number, ChunkLimits, ChunkSender, MAX_SEQUENCE_NUMBER};
pub use header::{
    AcknowledgeMessage, AsymmetricSecurityHeader, ChunkType, ErrorMessage, HelloMessage,
    MessageHeader, MessageType, SecureChunk, SecurityHeader, SequenceHeader,
};
pub use reassembler::{Reassembled, Reassembler};
pub use tcp::{StopHandle, TcpListenerLoop};
