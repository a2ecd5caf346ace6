// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sessions and the session table.
//!
//! A session is created on one secure channel, activated (possibly on
//! another one), and owns its subscriptions, queued Publish requests and
//! Browse continuation points.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::channel::NonceSource;
use crate::config::SessionLimits;
use crate::messages::ReferenceDescription;
use crate::status::StatusCode;
use crate::types::{ByteString, Guid, NodeId};

use super::subscription::{PendingPublish, Subscription};

/// Namespace of generated session ids.
const SESSION_NAMESPACE: u16 = 1;

/// References left over from a Browse call.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationPoint {
    pub id: ByteString,
    pub remaining: Vec<ReferenceDescription>,
    /// Per-call limit carried over from the original request.
    pub max_references: usize,
}

#[derive(Debug)]
pub struct Session {
    session_id: NodeId,
    authentication_token: NodeId,
    name: String,
    channel_id: Option<u32>,
    activated: bool,
    timeout: Duration,
    valid_till: Instant,
    user: Option<String>,
    server_nonce: ByteString,
    continuation_points: VecDeque<ContinuationPoint>,
    max_continuation_points: usize,
    next_continuation_point: u32,
    pub(crate) subscriptions: BTreeMap<u32, Subscription>,
    pub(crate) publish_queue: VecDeque<PendingPublish>,
}

impl Session {
    pub fn session_id(&self) -> &NodeId {
        &self.session_id
    }

    pub fn authentication_token(&self) -> &NodeId {
        &self.authentication_token
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel_id(&self) -> Option<u32> {
        self.channel_id
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn server_nonce(&self) -> &ByteString {
        &self.server_nonce
    }

    /// Any successful service call on the session restarts its timeout.
    pub fn touch(&mut self, now: Instant) {
        self.valid_till = now + self.timeout;
    }

    pub fn is_timed_out(&self, now: Instant) -> bool {
        now >= self.valid_till
    }

    /// Bind to the calling channel and mark the session usable. Returns the
    /// channel the session was previously bound to, if different.
    pub fn activate(
        &mut self,
        channel_id: u32,
        user: Option<String>,
        server_nonce: ByteString,
    ) -> Option<u32> {
        let previous = self.channel_id.filter(|c| *c != channel_id);
        self.channel_id = Some(channel_id);
        self.activated = true;
        self.user = user;
        self.server_nonce = server_nonce;
        previous
    }

    /// The bound channel went away; the session survives until timeout.
    pub fn detach_channel(&mut self) {
        self.channel_id = None;
    }

    // ------------------------------------------------------------------------
    // Continuation points
    // ------------------------------------------------------------------------

    pub fn continuation_point_count(&self) -> usize {
        self.continuation_points.len()
    }

    /// Park the remainder of a Browse result.
    pub fn add_continuation_point(
        &mut self,
        remaining: Vec<ReferenceDescription>,
        max_references: usize,
    ) -> Result<ByteString, StatusCode> {
        if self.continuation_points.len() >= self.max_continuation_points {
            return Err(StatusCode::BAD_NO_CONTINUATION_POINTS);
        }
        self.next_continuation_point = self.next_continuation_point.wrapping_add(1);
        let id = ByteString::from(self.next_continuation_point.to_le_bytes().to_vec());
        self.continuation_points.push_back(ContinuationPoint {
            id: id.clone(),
            remaining,
            max_references,
        });
        Ok(id)
    }

    pub fn take_continuation_point(&mut self, id: &ByteString) -> Option<ContinuationPoint> {
        let pos = self.continuation_points.iter().position(|cp| &cp.id == id)?;
        self.continuation_points.remove(pos)
    }

    /// Put back a point taken by BrowseNext that still has references left.
    pub fn restore_continuation_point(&mut self, point: ContinuationPoint) {
        self.continuation_points.push_back(point);
    }

    // ------------------------------------------------------------------------
    // Subscriptions and publish credits
    // ------------------------------------------------------------------------

    pub fn subscription(&self, id: u32) -> Option<&Subscription> {
        self.subscriptions.get(&id)
    }

    pub fn subscription_mut(&mut self, id: u32) -> Option<&mut Subscription> {
        self.subscriptions.get_mut(&id)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn subscription_ids(&self) -> Vec<u32> {
        self.subscriptions.keys().copied().collect()
    }

    /// Queue a Publish request. When the queue is full the oldest request
    /// is evicted and returned so the caller can fail it.
    pub fn queue_publish(&mut self, credit: PendingPublish, max: usize) -> Option<PendingPublish> {
        let evicted = if self.publish_queue.len() >= max.max(1) {
            self.publish_queue.pop_front()
        } else {
            None
        };
        self.publish_queue.push_back(credit);
        evicted
    }

    pub fn queued_publish_requests(&self) -> usize {
        self.publish_queue.len()
    }

    /// Drain every queued Publish request.
    pub fn take_publish_queue(&mut self) -> Vec<PendingPublish> {
        self.publish_queue.drain(..).collect()
    }
}

/// All sessions, keyed by authentication token.
pub struct SessionManager {
    limits: SessionLimits,
    sessions: HashMap<NodeId, Session>,
    next_session_id: u32,
    next_subscription_id: u32,
    nonces: NonceSource,
}

impl SessionManager {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            limits,
            sessions: HashMap::new(),
            next_session_id: 1,
            next_subscription_id: 1,
            nonces: NonceSource::default(),
        }
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Revised session timeout in milliseconds.
    pub fn revise_timeout(&self, requested_ms: f64) -> f64 {
        if !requested_ms.is_finite() || requested_ms <= 0.0 {
            return self.limits.max_session_timeout_ms;
        }
        requested_ms.clamp(
            self.limits.min_session_timeout_ms,
            self.limits.max_session_timeout_ms,
        )
    }

    pub fn nonce(&mut self) -> ByteString {
        self.nonces.nonce()
    }

    fn generate_token(&mut self) -> NodeId {
        let bytes = self.nonces.bytes(16);
        let mut wire = [0u8; 16];
        wire.copy_from_slice(&bytes);
        NodeId::guid(0, Guid::from_wire(wire))
    }

    /// Create an unactivated session bound to `channel_id`.
    pub fn create(
        &mut self,
        channel_id: u32,
        name: &str,
        requested_timeout_ms: f64,
        now: Instant,
    ) -> Result<&Session, StatusCode> {
        if self.sessions.len() >= self.limits.max_sessions {
            log::warn!("[session] limit of {} sessions reached", self.limits.max_sessions);
            return Err(StatusCode::BAD_TOO_MANY_SESSIONS);
        }
        let timeout_ms = self.revise_timeout(requested_timeout_ms);
        let timeout = Duration::from_secs_f64(timeout_ms / 1000.0);

        let mut token = self.generate_token();
        while self.sessions.contains_key(&token) {
            token = self.generate_token();
        }
        let session_id = NodeId::numeric(SESSION_NAMESPACE, self.next_session_id);
        self.next_session_id = self.next_session_id.checked_add(1).unwrap_or(1);
        let server_nonce = self.nonce();

        let session = Session {
            session_id,
            authentication_token: token.clone(),
            name: name.to_string(),
            channel_id: Some(channel_id),
            activated: false,
            timeout,
            valid_till: now + timeout,
            user: None,
            server_nonce,
            continuation_points: VecDeque::new(),
            max_continuation_points: self.limits.max_continuation_points,
            next_continuation_point: 0,
            subscriptions: BTreeMap::new(),
            publish_queue: VecDeque::new(),
        };
        log::info!(
            "[session] created {} '{}' on channel {} (timeout {:.0} ms)",
            session.session_id,
            session.name,
            channel_id,
            timeout_ms
        );
        Ok(self.sessions.entry(token).or_insert(session))
    }

    pub fn get(&self, token: &NodeId) -> Option<&Session> {
        self.sessions.get(token)
    }

    pub fn get_mut(&mut self, token: &NodeId) -> Option<&mut Session> {
        self.sessions.get_mut(token)
    }

    pub fn remove(&mut self, token: &NodeId) -> Option<Session> {
        let session = self.sessions.remove(token)?;
        log::info!("[session] removed {} '{}'", session.session_id, session.name);
        Some(session)
    }

    pub fn tokens(&self) -> Vec<NodeId> {
        self.sessions.keys().cloned().collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    /// Sessions whose timeout elapsed.
    pub fn timed_out(&self, now: Instant) -> Vec<NodeId> {
        self.sessions
            .iter()
            .filter(|(_, s)| s.is_timed_out(now))
            .map(|(token, _)| token.clone())
            .collect()
    }

    /// Server-wide unique subscription id.
    pub fn allocate_subscription_id(&mut self) -> u32 {
        let id = self.next_subscription_id;
        self.next_subscription_id = self.next_subscription_id.checked_add(1).unwrap_or(1);
        id
    }
}
