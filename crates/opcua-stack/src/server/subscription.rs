// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscriptions and the publish pass.
//!
//! # Backpressure
//!
//! Publish requests queued on the session are the only credits for sending.
//! A subscription with data (or a due keep-alive) but no credit goes
//! `Late`; each further tick without credit counts toward its lifetime and
//! the subscription expires at `lifetime_count`. A newly arriving Publish
//! request immediately runs the pass for late subscriptions.
//!
//! ```text
//!            data or keep-alive due
//!   Normal ------------------------> credit? --yes--> send, Normal
//!     ^                                 |no
//!     |          credit arrives         v
//!     +--------------------------- Late (lifetime++) --> expired
//! ```

use std::collections::{BTreeMap, VecDeque};

use crate::codec::EncodingResult;
use crate::messages::{
    DataChangeNotification, MonitoredItemNotification, NotificationMessage, PublishResponse,
    ResponseHeader,
};
use crate::scheduler::JobId;
use crate::status::StatusCode;
use crate::transport::chunker::next_sequence_number;
use crate::types::{DateTime, ExtensionObject};

use super::monitored_item::MonitoredItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Normal,
    /// Data or keep-alive due but no Publish request queued.
    Late,
    /// Last message sent was a keep-alive.
    KeepAlive,
}

/// Server-revised subscription parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubscriptionSettings {
    pub publishing_interval: f64,
    pub lifetime_count: u32,
    pub max_keep_alive_count: u32,
    /// Already resolved: never 0.
    pub max_notifications_per_publish: u32,
    pub priority: u8,
}

/// A queued Publish request (a send credit).
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPublish {
    pub channel_id: u32,
    pub request_id: u32,
    pub request_handle: u32,
    /// Results of the acknowledgements carried by the request.
    pub ack_results: Option<Vec<StatusCode>>,
}

/// A publish response ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutput {
    pub channel_id: u32,
    pub request_id: u32,
    pub response: PublishResponse,
}

/// Outcome of one [`Subscription::publish_pass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassResult {
    /// Nothing due yet.
    Idle,
    /// One or more responses were produced.
    Sent(usize),
    /// Due but no credit available.
    Late,
    /// Lifetime exhausted; the caller must delete the subscription.
    Expired,
}

#[derive(Debug)]
pub struct Subscription {
    id: u32,
    settings: SubscriptionSettings,
    publishing_enabled: bool,
    state: SubscriptionState,
    current_keep_alive_count: u32,
    current_lifetime_count: u32,
    /// Last sequence number consumed by a data message (0 = none yet).
    sequence_number: u32,
    retransmission: VecDeque<NotificationMessage>,
    max_retransmission: usize,
    items: BTreeMap<u32, MonitoredItem>,
    next_item_id: u32,
    pub(crate) publish_job: Option<JobId>,
}

impl Subscription {
    pub fn new(
        id: u32,
        settings: SubscriptionSettings,
        publishing_enabled: bool,
        max_retransmission: usize,
    ) -> Self {
        Self {
            id,
            settings,
            publishing_enabled,
            state: SubscriptionState::Normal,
            current_keep_alive_count: 0,
            current_lifetime_count: 0,
            sequence_number: 0,
            retransmission: VecDeque::new(),
            max_retransmission: max_retransmission.max(1),
            items: BTreeMap::new(),
            next_item_id: 1,
            publish_job: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn settings(&self) -> &SubscriptionSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SubscriptionSettings) {
        self.settings = settings;
        // Modify resets the lifetime counter.
        self.current_lifetime_count = 0;
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }

    pub fn set_publishing_enabled(&mut self, enabled: bool) {
        self.publishing_enabled = enabled;
    }

    pub fn lifetime_counter(&self) -> u32 {
        self.current_lifetime_count
    }

    // ------------------------------------------------------------------------
    // Monitored items
    // ------------------------------------------------------------------------

    pub fn allocate_item_id(&mut self) -> u32 {
        let id = self.next_item_id;
        self.next_item_id = self.next_item_id.wrapping_add(1).max(1);
        id
    }

    pub fn insert_item(&mut self, item: MonitoredItem) {
        self.items.insert(item.id(), item);
    }

    pub fn item(&self, id: u32) -> Option<&MonitoredItem> {
        self.items.get(&id)
    }

    pub fn item_mut(&mut self, id: u32) -> Option<&mut MonitoredItem> {
        self.items.get_mut(&id)
    }

    pub fn remove_item(&mut self, id: u32) -> Option<MonitoredItem> {
        self.items.remove(&id)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> impl Iterator<Item = &MonitoredItem> {
        self.items.values()
    }

    /// Remove every item, e.g. on deletion.
    pub fn take_items(&mut self) -> Vec<MonitoredItem> {
        std::mem::take(&mut self.items).into_values().collect()
    }

    // ------------------------------------------------------------------------
    // Retransmission queue
    // ------------------------------------------------------------------------

    pub fn available_sequence_numbers(&self) -> Vec<u32> {
        self.retransmission.iter().map(|m| m.sequence_number).collect()
    }

    /// Republish lookup.
    pub fn republish(&self, sequence_number: u32) -> Result<NotificationMessage, StatusCode> {
        self.retransmission
            .iter()
            .find(|m| m.sequence_number == sequence_number)
            .cloned()
            .ok_or(StatusCode::BAD_MESSAGE_NOT_AVAILABLE)
    }

    /// Drop an acknowledged message from the retransmission queue.
    pub fn acknowledge(&mut self, sequence_number: u32) -> StatusCode {
        match self
            .retransmission
            .iter()
            .position(|m| m.sequence_number == sequence_number)
        {
            Some(pos) => {
                self.retransmission.remove(pos);
                StatusCode::GOOD
            }
            None => StatusCode::BAD_SEQUENCE_NUMBER_UNKNOWN,
        }
    }

    // ------------------------------------------------------------------------
    // Publish pass
    // ------------------------------------------------------------------------

    /// Reportable notifications, capped, and whether more remain.
    fn available_notifications(&self) -> (usize, bool) {
        if !self.publishing_enabled {
            return (0, false);
        }
        let cap = self.settings.max_notifications_per_publish as usize;
        let total: usize = self
            .items
            .values()
            .filter(|i| i.is_reporting())
            .map(MonitoredItem::queued)
            .sum();
        (total.min(cap), total > cap)
    }

    /// Take up to `count` notifications across the reporting items. Also
    /// returns how many came from each item, for [`requeue`](Self::requeue).
    fn collect_notifications(
        &mut self,
        count: usize,
    ) -> (Vec<MonitoredItemNotification>, Vec<(u32, usize)>) {
        let mut out = Vec::with_capacity(count);
        let mut taken = Vec::new();
        for item in self.items.values_mut().filter(|i| i.is_reporting()) {
            if out.len() == count {
                break;
            }
            let before = out.len();
            out.extend(item.drain(count - before));
            if out.len() > before {
                taken.push((item.id(), out.len() - before));
            }
        }
        (out, taken)
    }

    /// Put notifications back at the head of the queues they came from.
    fn requeue(&mut self, notifications: Vec<MonitoredItemNotification>, taken: &[(u32, usize)]) {
        let mut notifications = notifications.into_iter();
        for &(item_id, n) in taken {
            let batch: Vec<_> = notifications.by_ref().take(n).collect();
            if let Some(item) = self.items.get_mut(&item_id) {
                item.requeue_front(batch);
            }
        }
    }

    fn data_message(
        &mut self,
        data: &DataChangeNotification,
    ) -> EncodingResult<NotificationMessage> {
        let body = ExtensionObject::from_encodable(data)?;
        self.sequence_number = next_sequence_number(self.sequence_number);
        let message = NotificationMessage {
            sequence_number: self.sequence_number,
            publish_time: DateTime::now(),
            notification_data: Some(vec![body]),
        };
        if self.retransmission.len() >= self.max_retransmission {
            self.retransmission.pop_front();
        }
        self.retransmission.push_back(message.clone());
        Ok(message)
    }

    fn keep_alive_message(&self) -> NotificationMessage {
        NotificationMessage {
            sequence_number: next_sequence_number(self.sequence_number),
            publish_time: DateTime::now(),
            notification_data: None,
        }
    }

    /// Run the publish pass against the session's credit queue.
    ///
    /// Repeats while notifications remain beyond the per-message cap and
    /// credits are available.
    pub fn publish_pass(
        &mut self,
        credits: &mut VecDeque<PendingPublish>,
        out: &mut Vec<PublishOutput>,
    ) -> PassResult {
        let mut sent = 0;
        loop {
            let (count, more) = self.available_notifications();
            if count == 0 {
                self.current_keep_alive_count = self.current_keep_alive_count.saturating_add(1);
                if self.current_keep_alive_count < self.settings.max_keep_alive_count {
                    return if sent > 0 {
                        PassResult::Sent(sent)
                    } else {
                        PassResult::Idle
                    };
                }
            }

            let Some(credit) = credits.pop_front() else {
                if sent > 0 {
                    return PassResult::Sent(sent);
                }
                if self.state == SubscriptionState::Late {
                    self.current_lifetime_count = self.current_lifetime_count.saturating_add(1);
                    if self.current_lifetime_count >= self.settings.lifetime_count {
                        log::info!(
                            "[subscription] {} expired after {} late publishing cycles",
                            self.id,
                            self.current_lifetime_count
                        );
                        return PassResult::Expired;
                    }
                } else {
                    log::debug!("[subscription] {} is late (no publish request queued)", self.id);
                    self.state = SubscriptionState::Late;
                }
                return PassResult::Late;
            };

            self.current_keep_alive_count = 0;
            self.current_lifetime_count = 0;
            let message = if count == 0 {
                self.state = SubscriptionState::KeepAlive;
                self.keep_alive_message()
            } else {
                let (notifications, taken) = self.collect_notifications(count);
                let data = DataChangeNotification {
                    monitored_items: Some(notifications),
                    diagnostic_infos: None,
                };
                match self.data_message(&data) {
                    Ok(message) => {
                        self.state = SubscriptionState::Normal;
                        message
                    }
                    Err(e) => {
                        log::error!(
                            "[subscription] {} cannot encode notifications: {}",
                            self.id,
                            e
                        );
                        self.requeue(data.monitored_items.unwrap_or_default(), &taken);
                        credits.push_front(credit);
                        return PassResult::Idle;
                    }
                }
            };
            out.push(PublishOutput {
                channel_id: credit.channel_id,
                request_id: credit.request_id,
                response: PublishResponse {
                    response_header: ResponseHeader::for_handle(
                        credit.request_handle,
                        StatusCode::GOOD,
                    ),
                    subscription_id: self.id,
                    available_sequence_numbers: Some(self.available_sequence_numbers()),
                    more_notifications: more,
                    notification_message: message,
                    results: credit.ack_results,
                    diagnostic_infos: None,
                },
            });
            sent += 1;
            if !more {
                return PassResult::Sent(sent);
            }
        }
    }
}
