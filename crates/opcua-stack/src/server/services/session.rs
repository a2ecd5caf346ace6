// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CreateSession, ActivateSession and CloseSession.

use crate::codec::DecodingOptions;
use crate::config::{ServerConfig, ANONYMOUS_POLICY_ID};
use crate::messages::{
    ActivateSessionRequest, ActivateSessionResponse, AnonymousIdentityToken, CloseSessionRequest,
    CloseSessionResponse, CreateSessionRequest, CreateSessionResponse, ResponseHeader,
    SignatureData, SupportedMessage, UserNameIdentityToken,
};
use crate::status::StatusCode;
use crate::types::{ByteString, ExtensionObject, NodeId};

use super::{discovery, fault, subscription, RequestContext};
use crate::server::{Outgoing, ServerCore};

pub(super) fn create_session(
    core: &mut ServerCore,
    ctx: &RequestContext,
    request: &CreateSessionRequest,
) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    let revised_timeout = core.sessions.revise_timeout(request.requested_session_timeout);
    let name = request.session_name.as_str_or_empty();
    let (session_id, token, server_nonce) =
        match core.sessions.create(ctx.channel_id, name, revised_timeout, ctx.now) {
            Ok(s) => (
                s.session_id().clone(),
                s.authentication_token().clone(),
                s.server_nonce().clone(),
            ),
            Err(status) => return fault(handle, status),
        };
    if let Some(channel) = core.channels.get_mut(ctx.channel_id) {
        channel.attach_session(token.clone());
    }

    SupportedMessage::from(CreateSessionResponse {
        response_header: ResponseHeader::good(&request.request_header),
        session_id,
        authentication_token: token,
        revised_session_timeout: revised_timeout,
        server_nonce,
        server_certificate: ByteString::null(),
        server_endpoints: Some(discovery::endpoints(&core.config)),
        server_software_certificates: None,
        server_signature: SignatureData::default(),
        max_request_message_size: core.config.transport.max_message_size,
    })
}

fn anonymous(config: &ServerConfig) -> Result<Option<String>, StatusCode> {
    if config.allow_anonymous {
        Ok(None)
    } else {
        Err(StatusCode::BAD_IDENTITY_TOKEN_REJECTED)
    }
}

/// Validate the identity token. Returns the user name, `None` for anonymous.
fn identify(config: &ServerConfig, token: &ExtensionObject) -> Result<Option<String>, StatusCode> {
    let options = DecodingOptions::default();
    let invalid = |_| StatusCode::BAD_IDENTITY_TOKEN_INVALID;
    if token.is_null() {
        return anonymous(config);
    }
    if let Some(t) = token
        .decode_inner::<AnonymousIdentityToken>(&options)
        .map_err(invalid)?
    {
        if !t.policy_id.is_empty() && t.policy_id.as_str() != Some(ANONYMOUS_POLICY_ID) {
            return Err(StatusCode::BAD_IDENTITY_TOKEN_INVALID);
        }
        return anonymous(config);
    }
    if let Some(t) = token
        .decode_inner::<UserNameIdentityToken>(&options)
        .map_err(invalid)?
    {
        if config.users.is_empty() || !t.encryption_algorithm.is_empty() {
            return Err(StatusCode::BAD_IDENTITY_TOKEN_INVALID);
        }
        let user = t.user_name.as_str_or_empty();
        if user.is_empty() {
            return Err(StatusCode::BAD_IDENTITY_TOKEN_INVALID);
        }
        if !config.check_user(user, t.password.as_bytes_or_empty()) {
            log::warn!("[session] rejected credentials for user '{}'", user);
            return Err(StatusCode::BAD_USER_ACCESS_DENIED);
        }
        return Ok(Some(user.to_string()));
    }
    Err(StatusCode::BAD_IDENTITY_TOKEN_INVALID)
}

pub(super) fn activate_session(
    core: &mut ServerCore,
    ctx: &RequestContext,
    request: &ActivateSessionRequest,
) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    let token = &request.request_header.authentication_token;
    if core.sessions.get(token).is_none() {
        return fault(handle, StatusCode::BAD_SESSION_ID_INVALID);
    }
    let user = match identify(&core.config, &request.user_identity_token) {
        Ok(user) => user,
        Err(status) => return fault(handle, status),
    };
    let server_nonce = core.sessions.nonce();
    let Some(session) = core.sessions.get_mut(token) else {
        return fault(handle, StatusCode::BAD_SESSION_ID_INVALID);
    };
    let previous = session.activate(ctx.channel_id, user, server_nonce.clone());
    session.touch(ctx.now);
    log::info!(
        "[session] {} activated on channel {} as {}",
        session.session_id(),
        ctx.channel_id,
        session.user().unwrap_or("anonymous")
    );

    if let Some(old) = previous {
        if let Some(channel) = core.channels.get_mut(old) {
            channel.detach_session(token);
        }
    }
    if let Some(channel) = core.channels.get_mut(ctx.channel_id) {
        if !channel.has_session(token) {
            channel.attach_session(token.clone());
        }
    }

    SupportedMessage::from(ActivateSessionResponse {
        response_header: ResponseHeader::good(&request.request_header),
        server_nonce,
        results: None,
        diagnostic_infos: None,
    })
}

pub(super) fn close_session(
    core: &mut ServerCore,
    ctx: &RequestContext,
    request: &CloseSessionRequest,
) -> SupportedMessage {
    let token = &request.request_header.authentication_token;
    let bound_here = core
        .sessions
        .get(token)
        .is_some_and(|s| s.channel_id() == Some(ctx.channel_id));
    if !bound_here {
        return fault(
            request.request_header.request_handle,
            StatusCode::BAD_SESSION_ID_INVALID,
        );
    }
    // Subscriptions cannot be transferred, so they go with the session
    // whatever `delete_subscriptions` says.
    remove_session(core, token, Some(StatusCode::BAD_SESSION_CLOSED));
    SupportedMessage::from(CloseSessionResponse {
        response_header: ResponseHeader::good(&request.request_header),
    })
}

/// Remove a session with its subscriptions and jobs. Queued Publish
/// requests are answered with `publish_status` when one is given.
pub(crate) fn remove_session(
    core: &mut ServerCore,
    token: &NodeId,
    publish_status: Option<StatusCode>,
) -> bool {
    let Some(mut session) = core.sessions.remove(token) else {
        return false;
    };
    for id in session.subscription_ids() {
        if let Some(sub) = session.subscriptions.remove(&id) {
            subscription::release_subscription(&mut core.scheduler, sub);
        }
    }
    let credits = session.take_publish_queue();
    if let Some(status) = publish_status {
        core.outbox.extend(credits.into_iter().map(|c| Outgoing {
            channel_id: c.channel_id,
            request_id: c.request_id,
            message: fault(c.request_handle, status),
        }));
    }
    if let Some(channel) = session.channel_id().and_then(|id| core.channels.get_mut(id)) {
        channel.detach_session(token);
    }
    true
}
