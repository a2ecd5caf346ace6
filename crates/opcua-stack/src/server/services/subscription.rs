// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscription and MonitoredItem services, Publish and Republish, and the
//! recurring sample and publish jobs they register.

use std::time::Duration;

use crate::config::{SubscriptionLimits, MIN_JOB_INTERVAL};
use crate::messages::{
    CreateMonitoredItemsRequest, CreateMonitoredItemsResponse, CreateSubscriptionRequest,
    CreateSubscriptionResponse, DeleteMonitoredItemsRequest, DeleteMonitoredItemsResponse,
    DeleteSubscriptionsRequest, DeleteSubscriptionsResponse, ModifyMonitoredItemsRequest,
    ModifyMonitoredItemsResponse, ModifySubscriptionRequest, ModifySubscriptionResponse,
    MonitoredItemCreateRequest, MonitoredItemCreateResult, MonitoredItemModifyRequest,
    MonitoredItemModifyResult, MonitoringParameters, PublishRequest, RepublishRequest,
    RepublishResponse, ResponseHeader, SetMonitoringModeRequest, SetMonitoringModeResponse,
    SetPublishingModeRequest, SetPublishingModeResponse, SupportedMessage, TimestampsToReturn,
};
use crate::nodestore::{attribute_id, NodeStore};
use crate::scheduler::{JobId, Scheduler};
use crate::status::StatusCode;
use crate::types::{ExtensionObject, NodeId};

use super::{check_operations, fault, read_data_value, RequestContext};
use crate::server::monitored_item::{parse_filter, ItemSettings, MonitoredItem};
use crate::server::session::Session;
use crate::server::subscription::{
    PassResult, PendingPublish, PublishOutput, Subscription, SubscriptionSettings,
    SubscriptionState,
};
use crate::server::{Outgoing, ServerCore, ServerJob};

// ----------------------------------------------------------------------------
// Parameter revision
// ----------------------------------------------------------------------------

fn revise_publishing_interval(limits: &SubscriptionLimits, requested: f64) -> f64 {
    if requested.is_nan() || requested < limits.min_publishing_interval_ms {
        return limits.min_publishing_interval_ms;
    }
    requested.min(limits.max_publishing_interval_ms)
}

/// Keep-alive and lifetime counts. The lifetime is at least three
/// keep-alive periods.
fn revise_counts(limits: &SubscriptionLimits, lifetime: u32, keep_alive: u32) -> (u32, u32) {
    let max_keep_alive = limits
        .max_keep_alive_count
        .min(limits.max_lifetime_count / 3)
        .max(1);
    let min_keep_alive = limits.min_keep_alive_count.min(max_keep_alive);
    let keep_alive = keep_alive.clamp(min_keep_alive, max_keep_alive);
    let floor = keep_alive.saturating_mul(3);
    let lifetime = lifetime.max(floor).min(limits.max_lifetime_count.max(floor));
    (lifetime, keep_alive)
}

fn revise_subscription(
    limits: &SubscriptionLimits,
    interval: f64,
    lifetime: u32,
    keep_alive: u32,
    max_notifications: u32,
    priority: u8,
) -> SubscriptionSettings {
    let (lifetime_count, max_keep_alive_count) = revise_counts(limits, lifetime, keep_alive);
    let cap = limits.max_notifications_per_publish.max(1);
    SubscriptionSettings {
        publishing_interval: revise_publishing_interval(limits, interval),
        lifetime_count,
        max_keep_alive_count,
        max_notifications_per_publish: if max_notifications == 0 || max_notifications > cap {
            cap
        } else {
            max_notifications
        },
        priority,
    }
}

/// Sampling interval and queue size for a monitored item.
fn revise_item(
    limits: &SubscriptionLimits,
    publishing_interval: f64,
    node_minimum: f64,
    parameters: &MonitoringParameters,
) -> (f64, u32) {
    let mut interval = parameters.sampling_interval;
    if interval.is_nan() || interval < 0.0 {
        // -1 asks for the publishing interval
        interval = publishing_interval;
    }
    // node minimum is capped by the configured maximum; non-finite ones are ignored
    let node_minimum = if node_minimum.is_finite() {
        node_minimum.min(limits.max_sampling_interval_ms)
    } else {
        0.0
    };
    let floor = limits.min_sampling_interval_ms.max(node_minimum);
    let interval = interval.max(floor).min(limits.max_sampling_interval_ms.max(floor));
    let queue_size = parameters.queue_size.max(1).min(limits.max_queue_size.max(1));
    (interval, queue_size)
}

/// Job interval for `ms`. Values `Duration` cannot hold fall back to `max_ms`.
fn interval_duration(ms: f64, max_ms: f64) -> Duration {
    Duration::try_from_secs_f64(ms / 1000.0)
        .or_else(|_| Duration::try_from_secs_f64(max_ms / 1000.0))
        .unwrap_or(MIN_JOB_INTERVAL)
        .max(MIN_JOB_INTERVAL)
}

// ----------------------------------------------------------------------------
// Job bookkeeping
// ----------------------------------------------------------------------------

/// Cancel every job a subscription and its items hold.
pub(crate) fn release_subscription(
    scheduler: &mut Scheduler<ServerJob>,
    mut subscription: Subscription,
) {
    if let Some(job) = subscription.publish_job.take() {
        scheduler.unregister(job);
    }
    for item in subscription.take_items() {
        if let Some(job) = item.sample_job {
            scheduler.unregister(job);
        }
    }
}

/// Delete one subscription. Removing the last one answers the queued
/// Publish requests with BadNoSubscription.
fn drop_subscription(
    scheduler: &mut Scheduler<ServerJob>,
    outbox: &mut Vec<Outgoing>,
    session: &mut Session,
    subscription_id: u32,
) -> bool {
    let Some(subscription) = session.subscriptions.remove(&subscription_id) else {
        return false;
    };
    release_subscription(scheduler, subscription);
    if session.subscriptions.is_empty() {
        outbox.extend(session.take_publish_queue().into_iter().map(|c| Outgoing {
            channel_id: c.channel_id,
            request_id: c.request_id,
            message: fault(c.request_handle, StatusCode::BAD_NO_SUBSCRIPTION),
        }));
    }
    true
}

fn register_sample_job(
    scheduler: &mut Scheduler<ServerJob>,
    limits: &SubscriptionLimits,
    ctx: &RequestContext,
    token: &NodeId,
    subscription_id: u32,
    item: &mut MonitoredItem,
) {
    if let Some(job) = item.sample_job.take() {
        scheduler.unregister(job);
    }
    if !item.is_sampling() {
        return;
    }
    let job = ServerJob::Sample {
        token: token.clone(),
        subscription_id,
        item_id: item.id(),
    };
    let interval = interval_duration(
        item.settings().sampling_interval,
        limits.max_sampling_interval_ms,
    );
    match scheduler.register(interval, job, ctx.now) {
        Ok(id) => item.sample_job = Some(id),
        Err(status) => log::error!("[subscription] cannot schedule item {}: {}", item.id(), status),
    }
}

fn register_publish_job(
    scheduler: &mut Scheduler<ServerJob>,
    limits: &SubscriptionLimits,
    ctx: &RequestContext,
    token: &NodeId,
    subscription: &Subscription,
) -> Result<JobId, StatusCode> {
    let job = ServerJob::Publish {
        token: token.clone(),
        subscription_id: subscription.id(),
    };
    scheduler.register(
        interval_duration(
            subscription.settings().publishing_interval,
            limits.max_publishing_interval_ms,
        ),
        job,
        ctx.now,
    )
}

/// Move publish responses into the outbox.
fn flush_outputs(outbox: &mut Vec<Outgoing>, outputs: Vec<PublishOutput>) {
    outbox.extend(outputs.into_iter().map(Outgoing::from));
}

// ----------------------------------------------------------------------------
// Subscription services
// ----------------------------------------------------------------------------

pub(super) fn create_subscription(
    core: &mut ServerCore,
    ctx: &RequestContext,
    token: &NodeId,
    request: &CreateSubscriptionRequest,
) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    let limits = &core.config.subscription;
    let settings = revise_subscription(
        limits,
        request.requested_publishing_interval,
        request.requested_lifetime_count,
        request.requested_max_keep_alive_count,
        request.max_notifications_per_publish,
        request.priority,
    );
    let max_subscriptions = limits.max_subscriptions_per_session;
    let max_retransmission = limits.max_retransmission_queue_size;

    let id = core.sessions.allocate_subscription_id();
    let Some(session) = core.sessions.get_mut(token) else {
        return fault(handle, StatusCode::BAD_SESSION_ID_INVALID);
    };
    if session.subscription_count() >= max_subscriptions {
        return fault(handle, StatusCode::BAD_TOO_MANY_SUBSCRIPTIONS);
    }
    let mut subscription =
        Subscription::new(id, settings, request.publishing_enabled, max_retransmission);
    match register_publish_job(&mut core.scheduler, limits, ctx, token, &subscription) {
        Ok(job) => subscription.publish_job = Some(job),
        Err(status) => return fault(handle, status),
    }
    session.subscriptions.insert(id, subscription);
    log::debug!(
        "[subscription] created {} (interval {} ms, keep-alive {}, lifetime {})",
        id,
        settings.publishing_interval,
        settings.max_keep_alive_count,
        settings.lifetime_count
    );

    SupportedMessage::from(CreateSubscriptionResponse {
        response_header: ResponseHeader::good(&request.request_header),
        subscription_id: id,
        revised_publishing_interval: settings.publishing_interval,
        revised_lifetime_count: settings.lifetime_count,
        revised_max_keep_alive_count: settings.max_keep_alive_count,
    })
}

pub(super) fn modify_subscription(
    core: &mut ServerCore,
    ctx: &RequestContext,
    token: &NodeId,
    request: &ModifySubscriptionRequest,
) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    let settings = revise_subscription(
        &core.config.subscription,
        request.requested_publishing_interval,
        request.requested_lifetime_count,
        request.requested_max_keep_alive_count,
        request.max_notifications_per_publish,
        request.priority,
    );
    let Some(session) = core.sessions.get_mut(token) else {
        return fault(handle, StatusCode::BAD_SESSION_ID_INVALID);
    };
    let Some(subscription) = session.subscriptions.get_mut(&request.subscription_id) else {
        return fault(handle, StatusCode::BAD_SUBSCRIPTION_ID_INVALID);
    };
    let interval_changed =
        subscription.settings().publishing_interval != settings.publishing_interval;
    subscription.set_settings(settings);
    if interval_changed {
        if let Some(job) = subscription.publish_job.take() {
            core.scheduler.unregister(job);
        }
        let limits = &core.config.subscription;
        match register_publish_job(&mut core.scheduler, limits, ctx, token, subscription) {
            Ok(job) => subscription.publish_job = Some(job),
            Err(status) => return fault(handle, status),
        }
    }

    SupportedMessage::from(ModifySubscriptionResponse {
        response_header: ResponseHeader::good(&request.request_header),
        revised_publishing_interval: settings.publishing_interval,
        revised_lifetime_count: settings.lifetime_count,
        revised_max_keep_alive_count: settings.max_keep_alive_count,
    })
}

pub(super) fn set_publishing_mode(
    core: &mut ServerCore,
    token: &NodeId,
    request: &SetPublishingModeRequest,
) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    let ids = match check_operations(core, &request.subscription_ids) {
        Ok(ids) => ids,
        Err(status) => return fault(handle, status),
    };
    let Some(session) = core.sessions.get_mut(token) else {
        return fault(handle, StatusCode::BAD_SESSION_ID_INVALID);
    };
    let results = ids
        .iter()
        .map(|id| match session.subscription_mut(*id) {
            Some(s) => {
                s.set_publishing_enabled(request.publishing_enabled);
                StatusCode::GOOD
            }
            None => StatusCode::BAD_SUBSCRIPTION_ID_INVALID,
        })
        .collect();
    SupportedMessage::from(SetPublishingModeResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}

pub(super) fn delete_subscriptions(
    core: &mut ServerCore,
    token: &NodeId,
    request: &DeleteSubscriptionsRequest,
) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    let ids = match check_operations(core, &request.subscription_ids) {
        Ok(ids) => ids.to_vec(),
        Err(status) => return fault(handle, status),
    };
    let ServerCore {
        sessions,
        scheduler,
        outbox,
        ..
    } = core;
    let Some(session) = sessions.get_mut(token) else {
        return fault(handle, StatusCode::BAD_SESSION_ID_INVALID);
    };
    let results = ids
        .iter()
        .map(|id| {
            if drop_subscription(scheduler, outbox, session, *id) {
                log::debug!("[subscription] deleted {}", id);
                StatusCode::GOOD
            } else {
                StatusCode::BAD_SUBSCRIPTION_ID_INVALID
            }
        })
        .collect();
    SupportedMessage::from(DeleteSubscriptionsResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}

// ----------------------------------------------------------------------------
// MonitoredItem services
// ----------------------------------------------------------------------------

fn node_minimum_sampling(store: &NodeStore, node_id: &NodeId) -> f64 {
    store
        .get(node_id)
        .and_then(|n| n.as_variable().map(|v| v.minimum_sampling_interval))
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(0.0)
}

fn item_settings(
    limits: &SubscriptionLimits,
    store: &NodeStore,
    publishing_interval: f64,
    node_id: &NodeId,
    parameters: &MonitoringParameters,
) -> Result<ItemSettings, StatusCode> {
    let trigger = parse_filter(&parameters.filter)?;
    let (sampling_interval, queue_size) = revise_item(
        limits,
        publishing_interval,
        node_minimum_sampling(store, node_id),
        parameters,
    );
    Ok(ItemSettings {
        sampling_interval,
        queue_size: queue_size as usize,
        discard_oldest: parameters.discard_oldest,
        trigger,
    })
}

fn create_item(
    core: &mut ServerCore,
    ctx: &RequestContext,
    token: &NodeId,
    subscription_id: u32,
    timestamps: TimestampsToReturn,
    request: &MonitoredItemCreateRequest,
) -> Result<MonitoredItemCreateResult, StatusCode> {
    let target = &request.item_to_monitor;
    if !attribute_id::is_valid(target.attribute_id) {
        return Err(StatusCode::BAD_ATTRIBUTE_ID_INVALID);
    }
    if !core.node_store.contains(&target.node_id) {
        return Err(StatusCode::BAD_NODE_ID_UNKNOWN);
    }
    let limits = &core.config.subscription;
    let max_items = limits.max_monitored_items_per_subscription;
    let session = core
        .sessions
        .get_mut(token)
        .ok_or(StatusCode::BAD_SESSION_ID_INVALID)?;
    let subscription = session
        .subscriptions
        .get_mut(&subscription_id)
        .ok_or(StatusCode::BAD_SUBSCRIPTION_ID_INVALID)?;
    if subscription.item_count() >= max_items {
        return Err(StatusCode::BAD_TOO_MANY_MONITORED_ITEMS);
    }
    let settings = item_settings(
        limits,
        &core.node_store,
        subscription.settings().publishing_interval,
        &target.node_id,
        &request.requested_parameters,
    )?;

    let id = subscription.allocate_item_id();
    let mut item = MonitoredItem::new(
        id,
        target.clone(),
        request.monitoring_mode,
        timestamps,
        &request.requested_parameters,
        settings,
    );
    if item.is_sampling() {
        item.sample(read_data_value(&core.node_store, target, timestamps));
    }
    register_sample_job(
        &mut core.scheduler,
        limits,
        ctx,
        token,
        subscription_id,
        &mut item,
    );
    subscription.insert_item(item);

    Ok(MonitoredItemCreateResult {
        status_code: StatusCode::GOOD,
        monitored_item_id: id,
        revised_sampling_interval: settings.sampling_interval,
        revised_queue_size: settings.queue_size as u32,
        filter_result: ExtensionObject::null(),
    })
}

pub(super) fn create_monitored_items(
    core: &mut ServerCore,
    ctx: &RequestContext,
    token: &NodeId,
    request: &CreateMonitoredItemsRequest,
) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    if request.timestamps_to_return == TimestampsToReturn::Invalid {
        return fault(handle, StatusCode::BAD_TIMESTAMPS_TO_RETURN_INVALID);
    }
    let items = match check_operations(core, &request.items_to_create) {
        Ok(items) => items.to_vec(),
        Err(status) => return fault(handle, status),
    };
    let known = core
        .sessions
        .get(token)
        .is_some_and(|s| s.subscription(request.subscription_id).is_some());
    if !known {
        return fault(handle, StatusCode::BAD_SUBSCRIPTION_ID_INVALID);
    }

    let subscription_id = request.subscription_id;
    let timestamps = request.timestamps_to_return;
    let results = items
        .iter()
        .map(|item| {
            create_item(core, ctx, token, subscription_id, timestamps, item).unwrap_or_else(
                |status_code| MonitoredItemCreateResult {
                    status_code,
                    ..Default::default()
                },
            )
        })
        .collect();
    SupportedMessage::from(CreateMonitoredItemsResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}

fn modify_item(
    core: &mut ServerCore,
    ctx: &RequestContext,
    token: &NodeId,
    subscription_id: u32,
    timestamps: TimestampsToReturn,
    request: &MonitoredItemModifyRequest,
) -> Result<MonitoredItemModifyResult, StatusCode> {
    let session = core
        .sessions
        .get_mut(token)
        .ok_or(StatusCode::BAD_SESSION_ID_INVALID)?;
    let subscription = session
        .subscriptions
        .get_mut(&subscription_id)
        .ok_or(StatusCode::BAD_SUBSCRIPTION_ID_INVALID)?;
    let publishing_interval = subscription.settings().publishing_interval;
    let item = subscription
        .item_mut(request.monitored_item_id)
        .ok_or(StatusCode::BAD_MONITORED_ITEM_ID_INVALID)?;
    let settings = item_settings(
        &core.config.subscription,
        &core.node_store,
        publishing_interval,
        &item.item_to_monitor().node_id,
        &request.requested_parameters,
    )?;
    let reschedule = item.settings().sampling_interval != settings.sampling_interval;
    item.modify(&request.requested_parameters, settings);
    item.set_timestamps(timestamps);
    if reschedule {
        register_sample_job(
            &mut core.scheduler,
            &core.config.subscription,
            ctx,
            token,
            subscription_id,
            item,
        );
    }
    Ok(MonitoredItemModifyResult {
        status_code: StatusCode::GOOD,
        revised_sampling_interval: settings.sampling_interval,
        revised_queue_size: settings.queue_size as u32,
        filter_result: ExtensionObject::null(),
    })
}

pub(super) fn modify_monitored_items(
    core: &mut ServerCore,
    ctx: &RequestContext,
    token: &NodeId,
    request: &ModifyMonitoredItemsRequest,
) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    if request.timestamps_to_return == TimestampsToReturn::Invalid {
        return fault(handle, StatusCode::BAD_TIMESTAMPS_TO_RETURN_INVALID);
    }
    let items = match check_operations(core, &request.items_to_modify) {
        Ok(items) => items.to_vec(),
        Err(status) => return fault(handle, status),
    };
    let known = core
        .sessions
        .get(token)
        .is_some_and(|s| s.subscription(request.subscription_id).is_some());
    if !known {
        return fault(handle, StatusCode::BAD_SUBSCRIPTION_ID_INVALID);
    }
    let subscription_id = request.subscription_id;
    let timestamps = request.timestamps_to_return;
    let results = items
        .iter()
        .map(|item| {
            modify_item(core, ctx, token, subscription_id, timestamps, item).unwrap_or_else(
                |status_code| MonitoredItemModifyResult {
                    status_code,
                    ..Default::default()
                },
            )
        })
        .collect();
    SupportedMessage::from(ModifyMonitoredItemsResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}

pub(super) fn set_monitoring_mode(
    core: &mut ServerCore,
    ctx: &RequestContext,
    token: &NodeId,
    request: &SetMonitoringModeRequest,
) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    let ids = match check_operations(core, &request.monitored_item_ids) {
        Ok(ids) => ids.to_vec(),
        Err(status) => return fault(handle, status),
    };
    let Some(session) = core.sessions.get_mut(token) else {
        return fault(handle, StatusCode::BAD_SESSION_ID_INVALID);
    };
    let Some(subscription) = session.subscriptions.get_mut(&request.subscription_id) else {
        return fault(handle, StatusCode::BAD_SUBSCRIPTION_ID_INVALID);
    };
    let mode = request.monitoring_mode;
    let results = ids
        .iter()
        .map(|id| {
            let Some(item) = subscription.item_mut(*id) else {
                return StatusCode::BAD_MONITORED_ITEM_ID_INVALID;
            };
            let was_sampling = item.is_sampling();
            item.set_mode(mode);
            if was_sampling != item.is_sampling() {
                register_sample_job(
                    &mut core.scheduler,
                    &core.config.subscription,
                    ctx,
                    token,
                    request.subscription_id,
                    item,
                );
            }
            StatusCode::GOOD
        })
        .collect();
    SupportedMessage::from(SetMonitoringModeResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}

pub(super) fn delete_monitored_items(
    core: &mut ServerCore,
    token: &NodeId,
    request: &DeleteMonitoredItemsRequest,
) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    let ids = match check_operations(core, &request.monitored_item_ids) {
        Ok(ids) => ids.to_vec(),
        Err(status) => return fault(handle, status),
    };
    let Some(session) = core.sessions.get_mut(token) else {
        return fault(handle, StatusCode::BAD_SESSION_ID_INVALID);
    };
    let Some(subscription) = session.subscriptions.get_mut(&request.subscription_id) else {
        return fault(handle, StatusCode::BAD_SUBSCRIPTION_ID_INVALID);
    };
    let results = ids
        .iter()
        .map(|id| match subscription.remove_item(*id) {
            Some(item) => {
                if let Some(job) = item.sample_job {
                    core.scheduler.unregister(job);
                }
                StatusCode::GOOD
            }
            None => StatusCode::BAD_MONITORED_ITEM_ID_INVALID,
        })
        .collect();
    SupportedMessage::from(DeleteMonitoredItemsResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}

// ----------------------------------------------------------------------------
// Publish / Republish
// ----------------------------------------------------------------------------

/// Queue a Publish request as a send credit. The response goes out through
/// the outbox when a subscription has something to send.
pub(super) fn publish(
    core: &mut ServerCore,
    ctx: &RequestContext,
    token: &NodeId,
    request: &PublishRequest,
) -> Option<SupportedMessage> {
    let handle = request.request_header.request_handle;
    let max_queued = core.config.subscription.max_publish_requests_per_session;
    let ServerCore {
        sessions,
        scheduler,
        outbox,
        ..
    } = core;
    let Some(session) = sessions.get_mut(token) else {
        return Some(fault(handle, StatusCode::BAD_SESSION_ID_INVALID));
    };

    let ack_results = request.subscription_acknowledgements.as_ref().map(|acks| {
        acks.iter()
            .map(|ack| match session.subscription_mut(ack.subscription_id) {
                Some(s) => s.acknowledge(ack.sequence_number),
                None => StatusCode::BAD_SUBSCRIPTION_ID_INVALID,
            })
            .collect::<Vec<_>>()
    });
    if session.subscription_count() == 0 {
        return Some(fault(handle, StatusCode::BAD_NO_SUBSCRIPTION));
    }

    let credit = PendingPublish {
        channel_id: ctx.channel_id,
        request_id: ctx.request_id,
        request_handle: handle,
        ack_results,
    };
    if let Some(evicted) = session.queue_publish(credit, max_queued) {
        log::debug!(
            "[subscription] publish queue full, answering request {} early",
            evicted.request_handle
        );
        outbox.push(Outgoing {
            channel_id: evicted.channel_id,
            request_id: evicted.request_id,
            message: fault(evicted.request_handle, StatusCode::BAD_TOO_MANY_PUBLISH_REQUESTS),
        });
    }

    // Late subscriptions were waiting for exactly this credit.
    let mut outputs = Vec::new();
    let mut expired = Vec::new();
    for subscription in session.subscriptions.values_mut() {
        if subscription.state() != SubscriptionState::Late {
            continue;
        }
        if session.publish_queue.is_empty() {
            break;
        }
        let result = subscription.publish_pass(&mut session.publish_queue, &mut outputs);
        if result == PassResult::Expired {
            expired.push(subscription.id());
        }
    }
    flush_outputs(outbox, outputs);
    for id in expired {
        drop_subscription(scheduler, outbox, session, id);
    }
    None
}

pub(super) fn republish(
    core: &mut ServerCore,
    token: &NodeId,
    request: &RepublishRequest,
) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    let Some(session) = core.sessions.get(token) else {
        return fault(handle, StatusCode::BAD_SESSION_ID_INVALID);
    };
    let Some(subscription) = session.subscription(request.subscription_id) else {
        return fault(handle, StatusCode::BAD_SUBSCRIPTION_ID_INVALID);
    };
    match subscription.republish(request.retransmit_sequence_number) {
        Ok(notification_message) => SupportedMessage::from(RepublishResponse {
            response_header: ResponseHeader::good(&request.request_header),
            notification_message,
        }),
        Err(status) => fault(handle, status),
    }
}

// ----------------------------------------------------------------------------
// Recurring jobs
// ----------------------------------------------------------------------------

/// One sampling tick of a monitored item.
pub(crate) fn run_sample_job(
    core: &mut ServerCore,
    token: &NodeId,
    subscription_id: u32,
    item_id: u32,
) {
    let store = &core.node_store;
    let Some(item) = core
        .sessions
        .get_mut(token)
        .and_then(|s| s.subscriptions.get_mut(&subscription_id))
        .and_then(|s| s.item_mut(item_id))
    else {
        return;
    };
    let value = read_data_value(store, item.item_to_monitor(), item.timestamps());
    if item.sample(value) {
        log::trace!("[subscription] {}/{} queued a change", subscription_id, item_id);
    }
}

/// One publishing tick of a subscription.
pub(crate) fn run_publish_job(core: &mut ServerCore, token: &NodeId, subscription_id: u32) {
    let ServerCore {
        sessions,
        scheduler,
        outbox,
        ..
    } = core;
    let Some(session) = sessions.get_mut(token) else {
        return;
    };
    let Some(subscription) = session.subscriptions.get_mut(&subscription_id) else {
        return;
    };
    let mut outputs = Vec::new();
    let result = subscription.publish_pass(&mut session.publish_queue, &mut outputs);
    flush_outputs(outbox, outputs);
    if result == PassResult::Expired {
        drop_subscription(scheduler, outbox, session, subscription_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publishing_interval_revision() {
        let limits = SubscriptionLimits::default();
        let min = limits.min_publishing_interval_ms;
        assert_eq!(revise_publishing_interval(&limits, f64::NAN), min);
        assert_eq!(revise_publishing_interval(&limits, 0.0), min);
        assert_eq!(revise_publishing_interval(&limits, 250.0), 250.0);
        assert_eq!(
            revise_publishing_interval(&limits, f64::INFINITY),
            limits.max_publishing_interval_ms
        );
    }

    #[test]
    fn test_lifetime_at_least_three_keep_alives() {
        let limits = SubscriptionLimits::default();
        assert_eq!(revise_counts(&limits, 10, 10), (30, 10));
        assert_eq!(revise_counts(&limits, 100, 10), (100, 10));
        assert_eq!(revise_counts(&limits, 0, 0), (3, 1));

        let tight = SubscriptionLimits {
            max_lifetime_count: 30,
            ..SubscriptionLimits::default()
        };
        let (lifetime, keep_alive) = revise_counts(&tight, 1000, 1000);
        assert_eq!((lifetime, keep_alive), (30, 10));
    }

    #[test]
    fn test_notifications_per_publish_capped() {
        let limits = SubscriptionLimits::default();
        let cap = limits.max_notifications_per_publish;
        let revised = |requested| {
            revise_subscription(&limits, 100.0, 30, 10, requested, 0).max_notifications_per_publish
        };
        assert_eq!(revised(0), cap);
        assert_eq!(revised(5), 5);
        assert_eq!(revised(cap + 1), cap);
    }

    #[test]
    fn test_item_revision() {
        let limits = SubscriptionLimits::default();
        let params = |sampling_interval: f64, queue_size: u32| MonitoringParameters {
            sampling_interval,
            queue_size,
            ..Default::default()
        };
        assert_eq!(revise_item(&limits, 500.0, 0.0, &params(-1.0, 0)), (500.0, 1));
        assert_eq!(
            revise_item(&limits, 500.0, 0.0, &params(0.0, 5)),
            (limits.min_sampling_interval_ms, 5)
        );
        assert_eq!(revise_item(&limits, 500.0, 250.0, &params(100.0, 5)).0, 250.0);
        assert_eq!(
            revise_item(&limits, 500.0, 0.0, &params(100.0, 100_000)).1,
            limits.max_queue_size
        );
    }

    #[test]
    fn test_item_revision_with_unbounded_node_minimum() {
        let limits = SubscriptionLimits::default();
        let params = MonitoringParameters {
            sampling_interval: 100.0,
            queue_size: 1,
            ..Default::default()
        };
        let max = limits.max_sampling_interval_ms;
        assert_eq!(revise_item(&limits, 1000.0, f64::INFINITY, &params).0, 100.0);
        assert_eq!(revise_item(&limits, 1000.0, f64::NAN, &params).0, 100.0);
        assert_eq!(revise_item(&limits, 1000.0, 1e300, &params).0, max);
    }

    #[test]
    fn test_interval_duration_falls_back_to_maximum() {
        assert_eq!(interval_duration(250.0, 1000.0), Duration::from_millis(250));
        assert_eq!(interval_duration(0.0, 1000.0), MIN_JOB_INTERVAL);
        assert_eq!(interval_duration(f64::INFINITY, 1000.0), Duration::from_secs(1));
        assert_eq!(interval_duration(f64::NAN, 1000.0), Duration::from_secs(1));
        assert_eq!(interval_duration(1e300, 1000.0), Duration::from_secs(1));
        assert_eq!(interval_duration(f64::INFINITY, f64::INFINITY), MIN_JOB_INTERVAL);
    }
}
