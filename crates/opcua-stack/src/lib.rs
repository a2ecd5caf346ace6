// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # opcua-stack - OPC UA binary protocol stack
//!
//! The server side of OPC UA over `opc.tcp`: the binary codec, UA TCP
//! framing, secure channels (security policy None), sessions, the
//! attribute/view/method/node-management services and the
//! subscription/publish engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use opcua_stack::{Result, Server, ServerConfig, TcpListenerLoop};
//!
//! fn main() -> Result<()> {
//!     let server = Server::new(ServerConfig::default())?;
//!     let mut listener = TcpListenerLoop::bind(server)?;
//!     listener.run()
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                           Services                                  |
//! |   Discovery | Session | Attribute | View | Method | NodeMgmt | Sub  |
//! +---------------------------------------------------------------------+
//! |                   Sessions / Subscriptions                          |
//! |   SessionManager | Subscription state machine | MonitoredItems     |
//! +---------------------------------------------------------------------+
//! |                        Secure Channel                               |
//! |   ChannelManager | tokens | sequence numbers | chunk accumulation  |
//! +---------------------------------------------------------------------+
//! |                         UA TCP Transport                            |
//! |   HEL/ACK/ERR | Reassembler | ChunkSender | mio listener loop      |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`codec`] - binary encoding and type descriptors
//! - [`types`] - built-in types (NodeId, Variant, DataValue, ...)
//! - [`messages`] - service request/response structures
//! - [`transport`] - framing, chunking, TCP loop
//! - [`channel`] - connections and secure channels
//! - [`server`] - the protocol engine and service handlers
//! - [`nodestore`] - the address space
//! - [`scheduler`] - repeated jobs and the worker pool

pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod messages;
pub mod nodestore;
pub mod scheduler;
pub mod server;
pub mod status;
pub mod transport;
pub mod types;

pub use config::{ExecutionMode, ServerConfig};
pub use error::{Error, Result};
pub use nodestore::NodeStore;
pub use server::Server;
pub use status::StatusCode;
pub use transport::tcp::{StopHandle, TcpListenerLoop};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
