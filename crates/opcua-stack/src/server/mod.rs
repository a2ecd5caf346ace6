// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OPC UA server core.
//!
//! [`Server`] owns every connection, channel and session and is driven by a
//! transport loop through three calls:
//!
//! - [`Server::process_binary_message`] for bytes read from a connection,
//! - [`Server::run_jobs`] when the scheduler has due jobs,
//! - [`Server::take_outbound`] to collect the bytes to write.
//!
//! Nothing in here touches a socket, which keeps the whole protocol stack
//! testable with plain byte vectors.
//!
//! # Execution modes
//!
//! In single-threaded mode every step runs on the caller's thread. In
//! multi-threaded mode the service body decode runs on a [`DispatchPool`];
//! decoded requests are dispatched in arrival order on the caller's thread,
//! so both modes produce identical responses.

pub mod monitored_item;
mod services;
pub mod session;
pub mod subscription;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::channel::{ChannelManager, ChunkOutcome, ClosedChannel, Connection};
use crate::codec::{decode_from_slice, BinaryEncodable, BinaryReader, DecodingOptions};
use crate::config::{ExecutionMode, ServerConfig};
use crate::error::Result;
use crate::messages::{
    OpenSecureChannelResponse, RequestHeader, ResponseHeader, SecurityTokenRequestType,
    SupportedMessage,
};
use crate::nodestore::{ns0, NodeStore};
use crate::scheduler::{DispatchPool, Notify, Scheduler};
use crate::status::StatusCode;
use crate::transport::chunker::ChunkSender;
use crate::transport::header::{
    AsymmetricSecurityHeader, ChunkType, MessageHeader, MessageType, SecureChunk, SecurityHeader,
};
use crate::types::{DateTime, NodeId};

use self::services::RequestContext;
use self::session::SessionManager;
use self::subscription::PublishOutput;

/// A response waiting to be chunked onto its channel.
#[derive(Debug, Clone)]
pub(crate) struct Outgoing {
    pub channel_id: u32,
    pub request_id: u32,
    pub message: SupportedMessage,
}

impl From<PublishOutput> for Outgoing {
    fn from(output: PublishOutput) -> Self {
        Self {
            channel_id: output.channel_id,
            request_id: output.request_id,
            message: SupportedMessage::from(output.response),
        }
    }
}

/// Work registered with the repeated-job scheduler.
#[derive(Debug, Clone)]
pub(crate) enum ServerJob {
    Sample {
        token: NodeId,
        subscription_id: u32,
        item_id: u32,
    },
    Publish {
        token: NodeId,
        subscription_id: u32,
    },
    Housekeeping,
}

/// State shared by every service handler.
pub(crate) struct ServerCore {
    pub config: Arc<ServerConfig>,
    pub node_store: Arc<NodeStore>,
    pub channels: ChannelManager,
    pub sessions: SessionManager,
    pub scheduler: Scheduler<ServerJob>,
    pub outbox: Vec<Outgoing>,
}

// ============================================================================
// Body decoding
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Open,
    Service,
    Close,
    /// First chunk of a request that exceeded the receive limits.
    TooLarge,
}

/// A complete message body waiting to be decoded.
#[derive(Debug)]
struct DecodeJob {
    connection_id: u64,
    channel_id: u32,
    request_id: u32,
    kind: BodyKind,
    body: Vec<u8>,
}

#[derive(Debug)]
enum DecodeOutcome {
    Message(Box<SupportedMessage>),
    /// The body did not decode; `handle` is set when the request header did.
    Failed {
        handle: Option<u32>,
        status: StatusCode,
    },
}

#[derive(Debug)]
struct Decoded {
    connection_id: u64,
    channel_id: u32,
    request_id: u32,
    kind: BodyKind,
    outcome: DecodeOutcome,
}

/// Request handle of a body whose full decode failed.
fn request_handle_of(body: &[u8], options: &DecodingOptions) -> Option<u32> {
    let mut r = BinaryReader::new(body, options.clone());
    NodeId::decode(&mut r).ok()?;
    RequestHeader::decode(&mut r).ok().map(|h| h.request_handle)
}

fn decode_body(job: DecodeJob, options: &DecodingOptions) -> Decoded {
    let outcome = if job.kind == BodyKind::TooLarge {
        DecodeOutcome::Failed {
            handle: request_handle_of(&job.body, options),
            status: StatusCode::BAD_REQUEST_TOO_LARGE,
        }
    } else {
        match decode_from_slice::<SupportedMessage>(&job.body, options) {
            Ok(message) => DecodeOutcome::Message(Box::new(message)),
            Err(e) => {
                log::debug!("[server] request {} failed to decode: {}", job.request_id, e);
                let status = match e.status() {
                    StatusCode::BAD_DATA_TYPE_ID_UNKNOWN => StatusCode::BAD_SERVICE_UNSUPPORTED,
                    _ => StatusCode::BAD_DECODING_ERROR,
                };
                DecodeOutcome::Failed {
                    handle: request_handle_of(&job.body, options),
                    status,
                }
            }
        }
    };
    Decoded {
        connection_id: job.connection_id,
        channel_id: job.channel_id,
        request_id: job.request_id,
        kind: job.kind,
        outcome,
    }
}

// ============================================================================
// Server
// ============================================================================

/// The protocol engine. See the module documentation.
pub struct Server {
    core: ServerCore,
    connections: HashMap<u64, Connection>,
    next_connection_id: u64,
    decoding: DecodingOptions,
    workers: Option<DispatchPool<DecodeJob, Decoded>>,
}

impl Server {
    /// Validate `config`, build the address space and start housekeeping.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let node_store = Arc::new(NodeStore::new());
        ns0::populate(&node_store, &config, DateTime::now())?;

        let decoding = DecodingOptions::default();
        let workers = match config.execution {
            ExecutionMode::SingleThreaded => None,
            ExecutionMode::MultiThreaded { workers } => {
                let options = decoding.clone();
                Some(DispatchPool::new(workers, move |job| decode_body(job, &options))?)
            }
        };

        let mut scheduler = Scheduler::new();
        scheduler.register(
            config.housekeeping_interval(),
            ServerJob::Housekeeping,
            Instant::now(),
        )?;

        log::info!(
            "[server] {} ready at {} ({:?})",
            config.application_name,
            config.endpoint_url(),
            config.execution
        );
        Ok(Self {
            core: ServerCore {
                channels: ChannelManager::new(config.channel.clone()),
                sessions: SessionManager::new(config.session.clone()),
                scheduler,
                outbox: Vec::new(),
                node_store,
                config,
            },
            connections: HashMap::new(),
            next_connection_id: 1,
            decoding,
            workers,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.core.config
    }

    /// The address space. Nodes added here are visible to every client.
    pub fn node_store(&self) -> &Arc<NodeStore> {
        &self.core.node_store
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn channel_count(&self) -> usize {
        self.core.channels.len()
    }

    pub fn session_count(&self) -> usize {
        self.core.sessions.len()
    }

    pub fn is_multi_threaded(&self) -> bool {
        self.workers.is_some()
    }

    // ------------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------------

    /// Register a new transport connection and return its id.
    pub fn open_connection(&mut self) -> u64 {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        self.connections
            .insert(id, Connection::new(id, self.core.config.transport.clone()));
        log::debug!("[server] connection {} opened", id);
        id
    }

    /// Forget a connection and every channel it carried. Sessions survive,
    /// detached, until they time out or are activated elsewhere.
    pub fn close_connection(&mut self, connection_id: u64) {
        if self.connections.remove(&connection_id).is_none() {
            return;
        }
        let closed = self.core.channels.close_connection(connection_id);
        self.detach_closed(&closed);
        log::debug!("[server] connection {} closed", connection_id);
    }

    /// Bytes waiting to be written to a connection.
    pub fn take_outbound(&mut self, connection_id: u64) -> Vec<Vec<u8>> {
        self.connections
            .get_mut(&connection_id)
            .map(Connection::take_outbound)
            .unwrap_or_default()
    }

    /// The connection is finished and should be closed once flushed.
    pub fn should_close(&self, connection_id: u64) -> bool {
        self.connections
            .get(&connection_id)
            .map_or(true, Connection::should_close)
    }

    /// Feed bytes read from a connection. Responses become available through
    /// [`Server::take_outbound`]; in multi-threaded mode some may only appear
    /// after [`Server::poll_workers`].
    pub fn process_binary_message(&mut self, connection_id: u64, bytes: &[u8]) {
        let Some(connection) = self.connections.get_mut(&connection_id) else {
            log::warn!("[server] bytes for unknown connection {}", connection_id);
            return;
        };
        let reassembled = connection.push_bytes(bytes);
        for message in reassembled.messages {
            self.process_message(connection_id, &message);
        }
        if let Some(status) = reassembled.error {
            self.abort_connection(connection_id, status, "malformed message stream");
        }
        self.poll_workers();
    }

    fn process_message(&mut self, connection_id: u64, message: &[u8]) {
        let Some(connection) = self.connections.get_mut(&connection_id) else {
            return;
        };
        if connection.should_close() {
            return;
        }
        let header = match MessageHeader::parse(message) {
            Ok(header) => header,
            Err(status) => {
                self.abort_connection(connection_id, status, "bad message header");
                return;
            }
        };
        match header.message_type {
            MessageType::Hello => {
                // ACK or ERR is already queued either way.
                let _ = connection.process_hello(message);
            }
            t if t.is_secure() => {
                if !connection.is_established() {
                    self.abort_connection(
                        connection_id,
                        StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID,
                        "secure message before HEL",
                    );
                    return;
                }
                if let Err(status) = self.process_chunk(connection_id, message) {
                    self.abort_connection(connection_id, status, "secure channel failure");
                }
            }
            other => self.abort_connection(
                connection_id,
                StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID,
                &format!("unexpected {:?}", other),
            ),
        }
    }

    /// Header checks and chunk accumulation for OPN/MSG/CLO. Complete bodies
    /// are handed to the decoder.
    fn process_chunk(
        &mut self,
        connection_id: u64,
        message: &[u8],
    ) -> std::result::Result<(), StatusCode> {
        let chunk = SecureChunk::parse(message, &self.decoding).map_err(|e| {
            log::debug!("[server] connection {} bad chunk: {}", connection_id, e);
            StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID
        })?;
        let message_type = chunk.header.message_type;
        let request_id = chunk.sequence.request_id;
        let strict = self.core.config.channel.strict_sequence_numbers;
        let bound = self
            .connections
            .get(&connection_id)
            .and_then(Connection::channel_id);

        if message_type == MessageType::OpenSecureChannel {
            if chunk.header.chunk_type != ChunkType::Final {
                return Err(StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID);
            }
            // Issue arrives with channel id 0, Renew with the bound channel.
            if chunk.channel_id != 0 {
                if bound != Some(chunk.channel_id) {
                    return Err(StatusCode::BAD_TCP_SECURE_CHANNEL_UNKNOWN);
                }
                if let Some(channel) = self.core.channels.get_mut(chunk.channel_id) {
                    channel.check_sequence(chunk.sequence.sequence_number, strict)?;
                }
            }
            self.submit(DecodeJob {
                connection_id,
                channel_id: chunk.channel_id,
                request_id,
                kind: BodyKind::Open,
                body: chunk.body.to_vec(),
            });
            return Ok(());
        }

        if bound != Some(chunk.channel_id) {
            log::warn!(
                "[server] connection {} used channel {} (bound {:?})",
                connection_id,
                chunk.channel_id,
                bound
            );
            return Err(StatusCode::BAD_TCP_SECURE_CHANNEL_UNKNOWN);
        }
        let channel = self
            .core
            .channels
            .get_mut(chunk.channel_id)
            .ok_or(StatusCode::BAD_TCP_SECURE_CHANNEL_UNKNOWN)?;
        channel.check_token(chunk.token_id().unwrap_or_default())?;
        channel.check_sequence(chunk.sequence.sequence_number, strict)?;

        let (kind, body) = if message_type == MessageType::CloseSecureChannel {
            (BodyKind::Close, chunk.body.to_vec())
        } else {
            match channel.process_chunk(chunk.header.chunk_type, request_id, chunk.body) {
                ChunkOutcome::Pending | ChunkOutcome::Aborted => return Ok(()),
                ChunkOutcome::Complete(body) => (BodyKind::Service, body),
                ChunkOutcome::TooLarge(first) => (BodyKind::TooLarge, first),
            }
        };
        self.submit(DecodeJob {
            connection_id,
            channel_id: chunk.channel_id,
            request_id,
            kind,
            body,
        });
        Ok(())
    }

    fn submit(&mut self, job: DecodeJob) {
        match self.workers.as_mut() {
            None => {
                let decoded = decode_body(job, &self.decoding);
                self.handle_decoded(decoded);
            }
            Some(pool) => {
                if let Err(e) = pool.submit(job) {
                    log::error!("[server] worker pool rejected a request: {}", e);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Workers
    // ------------------------------------------------------------------------

    /// Wake the transport loop whenever a worker finishes a decode.
    pub fn set_worker_notify(&self, notify: Notify) {
        if let Some(pool) = &self.workers {
            pool.set_notify(notify);
        }
    }

    /// Decodes submitted to the worker pool that have not been dispatched.
    pub fn pending_work(&self) -> usize {
        self.workers.as_ref().map_or(0, DispatchPool::pending)
    }

    /// Dispatch every decode that completed, in arrival order.
    pub fn poll_workers(&mut self) {
        let ready = match self.workers.as_mut() {
            Some(pool) => pool.try_collect(),
            None => return,
        };
        for decoded in ready {
            self.handle_decoded(decoded);
        }
    }

    /// Wait up to `timeout` for every pending decode and dispatch it.
    pub fn flush_workers(&mut self, timeout: Duration) {
        let ready = match self.workers.as_mut() {
            Some(pool) => pool.collect_all(timeout),
            None => return,
        };
        for decoded in ready {
            self.handle_decoded(decoded);
        }
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    fn handle_decoded(&mut self, decoded: Decoded) {
        let connection_id = decoded.connection_id;
        if self
            .connections
            .get(&connection_id)
            .map_or(true, Connection::should_close)
        {
            return;
        }
        if decoded.kind == BodyKind::Close {
            self.close_channel(connection_id, decoded.channel_id);
            return;
        }
        let message = match decoded.outcome {
            DecodeOutcome::Message(message) => *message,
            DecodeOutcome::Failed { handle, status } => {
                let Some(handle) = handle else {
                    log::warn!(
                        "[server] dropping undecodable request {} on channel {}",
                        decoded.request_id,
                        decoded.channel_id
                    );
                    return;
                };
                if decoded.kind == BodyKind::Open {
                    self.abort_connection(connection_id, status, "malformed OPN");
                    return;
                }
                self.core.outbox.push(Outgoing {
                    channel_id: decoded.channel_id,
                    request_id: decoded.request_id,
                    message: services::fault(handle, status),
                });
                self.deliver();
                return;
            }
        };

        match decoded.kind {
            BodyKind::Open => self.open_channel(decoded.connection_id, decoded.request_id, message),
            BodyKind::Close | BodyKind::Service | BodyKind::TooLarge => {
                let ctx = RequestContext {
                    channel_id: decoded.channel_id,
                    request_id: decoded.request_id,
                    now: Instant::now(),
                };
                if let Some(response) = services::dispatch(&mut self.core, &ctx, message) {
                    self.core.outbox.push(Outgoing {
                        channel_id: ctx.channel_id,
                        request_id: ctx.request_id,
                        message: response,
                    });
                }
                self.deliver();
            }
        }
    }

    fn open_channel(&mut self, connection_id: u64, request_id: u32, message: SupportedMessage) {
        let SupportedMessage::OpenSecureChannelRequest(request) = message else {
            self.abort_connection(
                connection_id,
                StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID,
                "OPN without OpenSecureChannelRequest",
            );
            return;
        };
        let bound = self
            .connections
            .get(&connection_id)
            .and_then(Connection::channel_id);
        let now = Instant::now();

        let issued = match (request.request_type, bound) {
            (SecurityTokenRequestType::Issue, None) => self
                .core
                .channels
                .open(connection_id, &request, now),
            (SecurityTokenRequestType::Issue, Some(_)) => {
                Err(StatusCode::BAD_SECURE_CHANNEL_ID_INVALID)
            }
            (_, Some(channel_id)) => self
                .core
                .channels
                .renew(channel_id, connection_id, &request, now)
                .map(|issued| (channel_id, issued)),
            (_, None) => Err(StatusCode::BAD_SECURE_CHANNEL_ID_INVALID),
        };

        match issued {
            Ok((channel_id, issued)) => {
                if let Some(connection) = self.connections.get_mut(&connection_id) {
                    connection.set_channel_id(Some(channel_id));
                    let limits = connection.negotiated().map(|n| n.receive_limits());
                    if let (Some(limits), Some(channel)) =
                        (limits, self.core.channels.get_mut(channel_id))
                    {
                        channel.set_receive_limits(limits);
                    }
                }
                let response = OpenSecureChannelResponse {
                    response_header: ResponseHeader::good(&request.request_header),
                    server_protocol_version: 0,
                    security_token: issued.token,
                    server_nonce: issued.server_nonce,
                };
                self.send_open_response(
                    connection_id,
                    channel_id,
                    request_id,
                    SupportedMessage::from(response),
                );
            }
            Err(StatusCode::BAD_TCP_NOT_ENOUGH_RESOURCES) => {
                // Pool exhaustion is answered, the connection stays usable.
                let fault = services::fault(
                    request.request_header.request_handle,
                    StatusCode::BAD_TCP_NOT_ENOUGH_RESOURCES,
                );
                self.send_open_response(connection_id, 0, request_id, fault);
            }
            Err(status) => {
                self.abort_connection(connection_id, status, "OpenSecureChannel rejected")
            }
        }
    }

    fn send_open_response(
        &mut self,
        connection_id: u64,
        channel_id: u32,
        request_id: u32,
        message: SupportedMessage,
    ) {
        let Some(connection) = self.connections.get_mut(&connection_id) else {
            return;
        };
        let Some(limits) = connection.negotiated().map(|n| n.send_limits()) else {
            return;
        };
        let first_sequence = self
            .core
            .channels
            .get(channel_id)
            .map_or(1, |c| c.send_sequence());
        let mut out = Vec::new();
        let mut sender = ChunkSender::new(
            MessageType::OpenSecureChannel,
            channel_id,
            SecurityHeader::Asymmetric(AsymmetricSecurityHeader::none()),
            request_id,
            first_sequence,
            limits,
            &mut out,
        );
        let result = sender.send(&message);
        let next = sender.next_sequence();
        if let Err(e) = result {
            log::error!("[server] cannot encode OPN response: {}", e);
            connection.send_error(e.status(), "OPN response too large");
            return;
        }
        if let Some(channel) = self.core.channels.get_mut(channel_id) {
            channel.set_send_sequence(next);
        }
        connection.queue_all(out);
    }

    fn close_channel(&mut self, connection_id: u64, channel_id: u32) {
        if let Some(closed) = self.core.channels.close(channel_id) {
            self.detach_closed(std::slice::from_ref(&closed));
        }
        if let Some(connection) = self.connections.get_mut(&connection_id) {
            connection.set_channel_id(None);
            connection.close();
        }
    }

    /// Queue ERR, close the connection and drop its channels.
    fn abort_connection(&mut self, connection_id: u64, status: StatusCode, reason: &str) {
        if let Some(connection) = self.connections.get_mut(&connection_id) {
            connection.send_error(status, reason);
            connection.set_channel_id(None);
        }
        let closed = self.core.channels.close_connection(connection_id);
        self.detach_closed(&closed);
    }

    fn detach_closed(&mut self, closed: &[ClosedChannel]) {
        for channel in closed {
            for token in &channel.sessions {
                if let Some(session) = self.core.sessions.get_mut(token) {
                    if session.channel_id() == Some(channel.channel_id) {
                        session.detach_channel();
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------------

    /// Chunk every queued response onto its channel.
    fn deliver(&mut self) {
        let outbox = std::mem::take(&mut self.core.outbox);
        for outgoing in outbox {
            self.deliver_one(outgoing);
        }
    }

    fn deliver_one(&mut self, outgoing: Outgoing) {
        let Some(channel) = self.core.channels.get_mut(outgoing.channel_id) else {
            log::debug!(
                "[server] channel {} gone, dropping {}",
                outgoing.channel_id,
                outgoing.message.type_name()
            );
            return;
        };
        let Some(connection) = self.connections.get_mut(&channel.connection_id()) else {
            return;
        };
        let Some(limits) = connection.negotiated().map(|n| n.send_limits()) else {
            return;
        };
        let security = SecurityHeader::Symmetric(channel.current_token().token_id);

        let mut out = Vec::new();
        let mut sender = ChunkSender::new(
            MessageType::Message,
            outgoing.channel_id,
            security.clone(),
            outgoing.request_id,
            channel.send_sequence(),
            limits,
            &mut out,
        );
        let result = sender.send(&outgoing.message);
        let mut next = sender.next_sequence();
        if let Err(e) = result {
            log::warn!(
                "[server] {} for request {} not sent: {}",
                outgoing.message.type_name(),
                outgoing.request_id,
                e
            );
            let fault = services::fault(outgoing.message.request_handle(), e.status());
            let mut sender = ChunkSender::new(
                MessageType::Message,
                outgoing.channel_id,
                security,
                outgoing.request_id,
                next,
                limits,
                &mut out,
            );
            if let Err(e) = sender.send(&fault) {
                log::error!("[server] cannot send ServiceFault: {}", e);
            }
            next = sender.next_sequence();
        }
        channel.set_send_sequence(next);
        connection.queue_all(out);
    }

    // ------------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------------

    /// When [`Server::run_jobs`] next has something to do.
    pub fn next_job_deadline(&self) -> Option<Instant> {
        self.core.scheduler.next_deadline()
    }

    /// Run every job due at `now`: sampling, publishing and housekeeping.
    pub fn run_jobs(&mut self, now: Instant) {
        for (id, job) in self.core.scheduler.due(now) {
            // an earlier job of this tick may have cancelled it
            if !self.core.scheduler.contains(id) {
                continue;
            }
            match job {
                ServerJob::Sample {
                    token,
                    subscription_id,
                    item_id,
                } => services::run_sample_job(&mut self.core, &token, subscription_id, item_id),
                ServerJob::Publish {
                    token,
                    subscription_id,
                } => services::run_publish_job(&mut self.core, &token, subscription_id),
                ServerJob::Housekeeping => self.housekeeping(now),
            }
        }
        self.deliver();
    }

    /// Expire channels and sessions.
    fn housekeeping(&mut self, now: Instant) {
        let connections = &self.connections;
        let closed = self.core.channels.sweep(now, |id| {
            connections.get(&id).is_some_and(|c| !c.should_close())
        });
        for channel in &closed {
            if let Some(connection) = self.connections.get_mut(&channel.connection_id) {
                log::info!(
                    "[server] channel {} expired, closing connection {}",
                    channel.channel_id,
                    channel.connection_id
                );
                connection.set_channel_id(None);
                connection.close();
            }
        }
        self.detach_closed(&closed);

        for token in self.core.sessions.timed_out(now) {
            log::info!("[server] session {} timed out", token);
            services::remove_session(&mut self.core, &token, Some(StatusCode::BAD_SESSION_CLOSED));
        }
    }

    /// Stop the worker pool. Further decodes run inline.
    pub fn shutdown(&mut self) {
        if let Some(mut pool) = self.workers.take() {
            for decoded in pool.collect_all(Duration::from_millis(100)) {
                self.handle_decoded(decoded);
            }
            pool.shutdown();
        }
        log::info!("[server] shut down");
    }
}
