// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service handlers.
//!
//! [`dispatch`] maps a decoded request to its handler. Handlers return the
//! immediate response; Publish may return nothing and answer later through
//! the outbox.

mod attribute;
mod discovery;
mod method;
mod node_management;
mod session;
mod subscription;
mod view;

pub(crate) use attribute::read_data_value;
pub(crate) use discovery::endpoints;
pub(crate) use session::remove_session;
pub(crate) use subscription::{run_publish_job, run_sample_job};

use std::time::Instant;

use crate::messages::{RequestHeader, ServiceFault, SupportedMessage};
use crate::status::StatusCode;
use crate::types::NodeId;

use super::ServerCore;

/// Where a request came from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestContext {
    pub channel_id: u32,
    pub request_id: u32,
    pub now: Instant,
}

pub(crate) fn fault(request_handle: u32, status: StatusCode) -> SupportedMessage {
    SupportedMessage::from(ServiceFault::new(request_handle, status))
}

/// Batch size check shared by every batched service.
pub(crate) fn check_operations<'a, T>(
    core: &ServerCore,
    items: &'a Option<Vec<T>>,
) -> Result<&'a [T], StatusCode> {
    let items = items.as_deref().unwrap_or_default();
    if items.is_empty() {
        return Err(StatusCode::BAD_NOTHING_TO_DO);
    }
    if items.len() > core.config.session.max_nodes_per_request {
        return Err(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }
    Ok(items)
}

/// Resolve the session a request runs on. It must be bound to the calling
/// channel and activated; success restarts its timeout.
fn activated_session(
    core: &mut ServerCore,
    ctx: &RequestContext,
    header: &RequestHeader,
) -> Result<NodeId, StatusCode> {
    let token = &header.authentication_token;
    let session = core
        .sessions
        .get_mut(token)
        .ok_or(StatusCode::BAD_SESSION_ID_INVALID)?;
    if session.channel_id() != Some(ctx.channel_id) {
        log::debug!(
            "[session] {} used on channel {} but bound to {:?}",
            session.session_id(),
            ctx.channel_id,
            session.channel_id()
        );
        return Err(StatusCode::BAD_SESSION_ID_INVALID);
    }
    if !session.is_activated() {
        return Err(StatusCode::BAD_SESSION_NOT_ACTIVATED);
    }
    session.touch(ctx.now);
    Ok(token.clone())
}

/// Run one request. `None` means the response is deferred.
pub(crate) fn dispatch(
    core: &mut ServerCore,
    ctx: &RequestContext,
    request: SupportedMessage,
) -> Option<SupportedMessage> {
    use SupportedMessage as M;

    let handle = request.request_handle();
    log::trace!(
        "[service] {} (handle {}) on channel {}",
        request.type_name(),
        handle,
        ctx.channel_id
    );
    match request {
        M::GetEndpointsRequest(r) => return Some(discovery::get_endpoints(core, &r)),
        M::FindServersRequest(r) => return Some(discovery::find_servers(core, &r)),
        M::CreateSessionRequest(r) => return Some(session::create_session(core, ctx, &r)),
        M::ActivateSessionRequest(r) => return Some(session::activate_session(core, ctx, &r)),
        M::CloseSessionRequest(r) => return Some(session::close_session(core, ctx, &r)),
        _ => {}
    }

    let Some(header) = request.request_header() else {
        log::warn!("[service] {} is not a request", request.type_name());
        return Some(fault(handle, StatusCode::BAD_SERVICE_UNSUPPORTED));
    };
    let token = match activated_session(core, ctx, header) {
        Ok(token) => token,
        Err(status) => return Some(fault(handle, status)),
    };

    let response = match request {
        M::ReadRequest(r) => attribute::read(core, &r),
        M::WriteRequest(r) => attribute::write(core, &r),
        M::BrowseRequest(r) => view::browse(core, &token, &r),
        M::BrowseNextRequest(r) => view::browse_next(core, &token, &r),
        M::CallRequest(r) => method::call(core, &r),
        M::CreateSubscriptionRequest(r) => subscription::create_subscription(core, ctx, &token, &r),
        M::ModifySubscriptionRequest(r) => subscription::modify_subscription(core, ctx, &token, &r),
        M::SetPublishingModeRequest(r) => subscription::set_publishing_mode(core, &token, &r),
        M::DeleteSubscriptionsRequest(r) => subscription::delete_subscriptions(core, &token, &r),
        M::CreateMonitoredItemsRequest(r) => {
            subscription::create_monitored_items(core, ctx, &token, &r)
        }
        M::ModifyMonitoredItemsRequest(r) => {
            subscription::modify_monitored_items(core, ctx, &token, &r)
        }
        M::SetMonitoringModeRequest(r) => subscription::set_monitoring_mode(core, ctx, &token, &r),
        M::DeleteMonitoredItemsRequest(r) => subscription::delete_monitored_items(core, &token, &r),
        M::PublishRequest(r) => return subscription::publish(core, ctx, &token, &r),
        M::RepublishRequest(r) => subscription::republish(core, &token, &r),
        M::AddNodesRequest(r) => node_management::add_nodes(core, &r),
        M::AddReferencesRequest(r) => node_management::add_references(core, &r),
        M::DeleteNodesRequest(r) => node_management::delete_nodes(core, &r),
        M::DeleteReferencesRequest(r) => node_management::delete_references(core, &r),
        other => {
            log::debug!("[service] {} not supported", other.type_name());
            fault(handle, StatusCode::BAD_SERVICE_UNSUPPORTED)
        }
    };
    Some(response)
}
