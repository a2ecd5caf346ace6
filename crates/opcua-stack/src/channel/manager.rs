// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Channel table: open, renew, close and the expiry sweep.

use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::secure_channel::{ChannelToken, SecureChannel};
use crate::config::ChannelLimits;
use crate::messages::{
    ChannelSecurityToken, MessageSecurityMode, OpenSecureChannelRequest, SecurityTokenRequestType,
};
use crate::status::StatusCode;
use crate::types::{ByteString, NodeId};

/// Length of generated server nonces.
pub const NONCE_LENGTH: usize = 32;

/// Token and nonce returned to the client in an OPN response.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedToken {
    pub token: ChannelSecurityToken,
    pub server_nonce: ByteString,
}

/// A channel removed from the table, with the sessions it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedChannel {
    pub channel_id: u32,
    pub connection_id: u64,
    pub sessions: Vec<NodeId>,
}

impl From<SecureChannel> for ClosedChannel {
    fn from(channel: SecureChannel) -> Self {
        Self {
            channel_id: channel.channel_id(),
            connection_id: channel.connection_id(),
            sessions: channel.sessions().to_vec(),
        }
    }
}

/// Placeholder nonce source: splitmix64 over a time-seeded counter. Not
/// cryptographic; only security policy None is offered.
#[derive(Debug, Clone)]
pub struct NonceSource {
    state: u64,
}

impl Default for NonceSource {
    fn default() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x5EED);
        Self { state: seed }
    }
}

impl NonceSource {
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    pub fn bytes(&mut self, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len + 8);
        while out.len() < len {
            out.extend_from_slice(&self.next_u64().to_le_bytes());
        }
        out.truncate(len);
        out
    }

    pub fn nonce(&mut self) -> ByteString {
        ByteString::from(self.bytes(NONCE_LENGTH))
    }
}

pub struct ChannelManager {
    limits: ChannelLimits,
    channels: HashMap<u32, SecureChannel>,
    next_channel_id: u32,
    next_token_id: u32,
    nonces: NonceSource,
}

impl ChannelManager {
    pub fn new(limits: ChannelLimits) -> Self {
        Self {
            limits,
            channels: HashMap::new(),
            next_channel_id: 1,
            next_token_id: 1,
            nonces: NonceSource::default(),
        }
    }

    pub fn limits(&self) -> &ChannelLimits {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, channel_id: u32) -> Option<&SecureChannel> {
        self.channels.get(&channel_id)
    }

    pub fn get_mut(&mut self, channel_id: u32) -> Option<&mut SecureChannel> {
        self.channels.get_mut(&channel_id)
    }

    /// Revised lifetime: 0 asks for the maximum, everything else is clamped.
    fn revise_lifetime(&self, requested_ms: u32) -> u32 {
        if requested_ms == 0 {
            return self.limits.max_token_lifetime_ms;
        }
        requested_ms.clamp(
            self.limits.min_token_lifetime_ms,
            self.limits.max_token_lifetime_ms,
        )
    }

    fn allocate_token_id(&mut self) -> u32 {
        let id = self.next_token_id;
        self.next_token_id = self.next_token_id.checked_add(1).unwrap_or(1);
        id
    }

    fn check_security_mode(request: &OpenSecureChannelRequest) -> Result<(), StatusCode> {
        if request.security_mode != MessageSecurityMode::None {
            log::warn!(
                "[channel] security mode {:?} rejected",
                request.security_mode
            );
            return Err(StatusCode::BAD_SECURITY_MODE_REJECTED);
        }
        Ok(())
    }

    /// Handle an OPN Issue: allocate a channel on `connection_id`.
    pub fn open(
        &mut self,
        connection_id: u64,
        request: &OpenSecureChannelRequest,
        now: Instant,
    ) -> Result<(u32, IssuedToken), StatusCode> {
        if request.request_type != SecurityTokenRequestType::Issue {
            return Err(StatusCode::BAD_INVALID_ARGUMENT);
        }
        Self::check_security_mode(request)?;
        if self.channels.len() >= self.limits.max_channels {
            log::warn!(
                "[channel] pool full ({} channels), refusing connection {}",
                self.channels.len(),
                connection_id
            );
            return Err(StatusCode::BAD_TCP_NOT_ENOUGH_RESOURCES);
        }

        let mut channel_id = self.next_channel_id;
        while channel_id == 0 || self.channels.contains_key(&channel_id) {
            channel_id = channel_id.wrapping_add(1);
        }
        self.next_channel_id = channel_id.wrapping_add(1);

        let lifetime = self.revise_lifetime(request.requested_lifetime);
        let token = ChannelToken::new(self.allocate_token_id(), lifetime, now);
        let server_nonce = self.nonces.nonce();
        let issued = IssuedToken {
            token: token.to_wire(channel_id),
            server_nonce: server_nonce.clone(),
        };
        let channel = SecureChannel::new(
            channel_id,
            connection_id,
            token,
            request.client_nonce.clone(),
            server_nonce,
        );
        self.channels.insert(channel_id, channel);
        log::info!(
            "[channel] opened channel {} on connection {} (token {}, lifetime {} ms)",
            channel_id,
            connection_id,
            issued.token.token_id,
            lifetime
        );
        Ok((channel_id, issued))
    }

    /// Handle an OPN Renew on an existing channel. A renewal that is still
    /// pending is returned again instead of allocating another token.
    pub fn renew(
        &mut self,
        channel_id: u32,
        connection_id: u64,
        request: &OpenSecureChannelRequest,
        now: Instant,
    ) -> Result<IssuedToken, StatusCode> {
        if request.request_type != SecurityTokenRequestType::Renew {
            return Err(StatusCode::BAD_INVALID_ARGUMENT);
        }
        Self::check_security_mode(request)?;
        let lifetime = self.revise_lifetime(request.requested_lifetime);
        let token_id = self.allocate_token_id();
        let server_nonce = self.nonces.nonce();

        let channel = self
            .channels
            .get_mut(&channel_id)
            .filter(|c| c.connection_id() == connection_id)
            .ok_or(StatusCode::BAD_SECURE_CHANNEL_ID_INVALID)?;

        if let Some(pending) = channel.next_token() {
            return Ok(IssuedToken {
                token: pending.to_wire(channel_id),
                server_nonce: channel.server_nonce().clone(),
            });
        }
        let token = ChannelToken::new(token_id, lifetime, now);
        let issued = IssuedToken {
            token: token.to_wire(channel_id),
            server_nonce: server_nonce.clone(),
        };
        channel.set_next_token(token, request.client_nonce.clone(), server_nonce);
        log::debug!(
            "[channel] channel {} renewal pending with token {}",
            channel_id,
            token_id
        );
        Ok(issued)
    }

    /// Remove a channel. Its sessions are returned for detaching.
    pub fn close(&mut self, channel_id: u32) -> Option<ClosedChannel> {
        let closed = self.channels.remove(&channel_id).map(ClosedChannel::from);
        if closed.is_some() {
            log::info!("[channel] closed channel {}", channel_id);
        }
        closed
    }

    /// Remove every channel carried by a connection.
    pub fn close_connection(&mut self, connection_id: u64) -> Vec<ClosedChannel> {
        let ids: Vec<u32> = self
            .channels
            .values()
            .filter(|c| c.connection_id() == connection_id)
            .map(SecureChannel::channel_id)
            .collect();
        ids.into_iter().filter_map(|id| self.close(id)).collect()
    }

    /// Housekeeping: revolve pending tokens whose predecessor expired and
    /// remove channels whose token expired or whose connection is gone.
    pub fn sweep(
        &mut self,
        now: Instant,
        connection_alive: impl Fn(u64) -> bool,
    ) -> Vec<ClosedChannel> {
        let mut expired = Vec::new();
        for channel in self.channels.values_mut() {
            if channel.current_token().is_expired(now) && channel.next_token().is_some() {
                channel.revolve();
            }
            if channel.is_expired(now) || !connection_alive(channel.connection_id()) {
                expired.push(channel.channel_id());
            }
        }
        expired
            .into_iter()
            .filter_map(|id| {
                log::debug!("[channel] sweeping channel {}", id);
                self.close(id)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn issue(lifetime: u32) -> OpenSecureChannelRequest {
        OpenSecureChannelRequest {
            request_type: SecurityTokenRequestType::Issue,
            security_mode: MessageSecurityMode::None,
            requested_lifetime: lifetime,
            ..Default::default()
        }
    }

    fn renew() -> OpenSecureChannelRequest {
        OpenSecureChannelRequest {
            request_type: SecurityTokenRequestType::Renew,
            ..issue(60_000)
        }
    }

    #[test]
    fn test_open_allocates_distinct_channels() {
        let mut mgr = ChannelManager::new(ChannelLimits::default());
        let now = Instant::now();
        let (a, token_a) = mgr.open(1, &issue(60_000), now).unwrap();
        let (b, token_b) = mgr.open(2, &issue(60_000), now).unwrap();
        assert_ne!(a, b);
        assert_ne!(token_a.token.token_id, token_b.token.token_id);
        assert_eq!(token_a.server_nonce.len(), NONCE_LENGTH);
        assert_ne!(token_a.server_nonce, token_b.server_nonce);
        assert_eq!(mgr.len(), 2);
    }

    #[test]
    fn test_lifetime_revision() {
        let limits = ChannelLimits::default();
        let mut mgr = ChannelManager::new(limits.clone());
        let now = Instant::now();
        let (_, zero) = mgr.open(1, &issue(0), now).unwrap();
        assert_eq!(zero.token.revised_lifetime, limits.max_token_lifetime_ms);
        let (_, tiny) = mgr.open(1, &issue(1), now).unwrap();
        assert_eq!(tiny.token.revised_lifetime, limits.min_token_lifetime_ms);
    }

    #[test]
    fn test_pool_limit() {
        let mut mgr = ChannelManager::new(ChannelLimits {
            max_channels: 1,
            ..Default::default()
        });
        let now = Instant::now();
        mgr.open(1, &issue(60_000), now).unwrap();
        assert_eq!(
            mgr.open(2, &issue(60_000), now).unwrap_err(),
            StatusCode::BAD_TCP_NOT_ENOUGH_RESOURCES
        );
    }

    #[test]
    fn test_security_mode_rejected() {
        let mut mgr = ChannelManager::new(ChannelLimits::default());
        let request = OpenSecureChannelRequest {
            security_mode: MessageSecurityMode::SignAndEncrypt,
            ..issue(60_000)
        };
        assert_eq!(
            mgr.open(1, &request, Instant::now()).unwrap_err(),
            StatusCode::BAD_SECURITY_MODE_REJECTED
        );
    }

    #[test]
    fn test_renew_keeps_channel_id_and_repeats_pending() {
        let mut mgr = ChannelManager::new(ChannelLimits::default());
        let now = Instant::now();
        let (id, first) = mgr.open(1, &issue(60_000), now).unwrap();
        let renewed = mgr.renew(id, 1, &renew(), now).unwrap();
        assert_eq!(renewed.token.channel_id, id);
        assert_ne!(renewed.token.token_id, first.token.token_id);
        let again = mgr.renew(id, 1, &renew(), now).unwrap();
        assert_eq!(again.token.token_id, renewed.token.token_id);

        // renew from another connection is refused
        assert_eq!(
            mgr.renew(id, 2, &renew(), now).unwrap_err(),
            StatusCode::BAD_SECURE_CHANNEL_ID_INVALID
        );
    }

    #[test]
    fn test_close_returns_sessions() {
        let mut mgr = ChannelManager::new(ChannelLimits::default());
        let (id, _) = mgr.open(9, &issue(60_000), Instant::now()).unwrap();
        mgr.get_mut(id).unwrap().attach_session(NodeId::numeric(1, 3));
        let closed = mgr.close_connection(9);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].sessions, vec![NodeId::numeric(1, 3)]);
        assert!(mgr.is_empty());
    }

    #[test]
    fn test_sweep() {
        let limits = ChannelLimits {
            min_token_lifetime_ms: 100,
            ..Default::default()
        };
        let mut mgr = ChannelManager::new(limits);
        let start = Instant::now();
        let (expiring, _) = mgr.open(1, &issue(100), start).unwrap();
        let (renewed, _) = mgr.open(1, &issue(100), start).unwrap();
        let (orphan, _) = mgr.open(2, &issue(60_000), start).unwrap();
        let (healthy, _) = mgr.open(1, &issue(60_000), start).unwrap();
        mgr.renew(renewed, 1, &renew(), start).unwrap();

        let closed = mgr.sweep(start + Duration::from_millis(200), |conn| conn == 1);
        let mut ids: Vec<u32> = closed.iter().map(|c| c.channel_id).collect();
        ids.sort_unstable();
        let mut expected = vec![expiring, orphan];
        expected.sort_unstable();
        assert_eq!(ids, expected);

        // the pending token was revolved in
        assert!(mgr.get(renewed).unwrap().next_token().is_none());
        assert!(mgr.get(healthy).is_some());
    }
}
