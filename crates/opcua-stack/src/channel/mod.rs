// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Secure conversation (Part 6 Sec.6.7) on top of UA TCP connections.
//!
//! - [`Connection`]: HEL/ACK handshake, reassembly, outbound queue.
//! - [`SecureChannel`]: token slots, sequence numbers, chunk accumulation.
//! - [`ChannelManager`]: the bounded channel pool.

mod connection;
mod manager;
mod secure_channel;

pub use connection::{Connection, ConnectionState, NegotiatedLimits};
pub use manager::{ChannelManager, ClosedChannel, IssuedToken, NonceSource, NONCE_LENGTH};
pub use secure_channel::{ChannelToken, ChunkOutcome, ReceiveLimits, SecureChannel};
