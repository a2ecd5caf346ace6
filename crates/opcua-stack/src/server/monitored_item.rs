// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Monitored items: sampling, change detection and the notification queue.

use std::collections::VecDeque;

use crate::codec::{encode_to_vec, DecodingOptions};
use crate::messages::{
    deadband_type, DataChangeFilter, DataChangeTrigger, MonitoredItemNotification, MonitoringMode,
    MonitoringParameters, ReadValueId, TimestampsToReturn,
};
use crate::scheduler::JobId;
use crate::status::StatusCode;
use crate::types::{DataValue, ExtensionObject};

/// Parsed monitoring filter.
///
/// Only data change filters are supported; the trigger selects which
/// DataValue fields take part in change detection.
pub fn parse_filter(filter: &ExtensionObject) -> Result<DataChangeTrigger, StatusCode> {
    if filter.is_null() {
        return Ok(DataChangeTrigger::StatusValue);
    }
    match filter.decode_inner::<DataChangeFilter>(&DecodingOptions::default()) {
        Ok(Some(f)) => {
            if f.deadband_type != deadband_type::NONE {
                log::debug!("[subscription] deadband {} ignored", f.deadband_type);
            }
            Ok(f.trigger)
        }
        Ok(None) => Err(StatusCode::BAD_MONITORED_ITEM_FILTER_UNSUPPORTED),
        Err(_) => Err(StatusCode::BAD_MONITORED_ITEM_FILTER_INVALID),
    }
}

/// Server-revised item parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemSettings {
    pub sampling_interval: f64,
    pub queue_size: usize,
    pub discard_oldest: bool,
    pub trigger: DataChangeTrigger,
}

#[derive(Debug)]
pub struct MonitoredItem {
    id: u32,
    client_handle: u32,
    item_to_monitor: ReadValueId,
    mode: MonitoringMode,
    timestamps: TimestampsToReturn,
    settings: ItemSettings,
    /// Encoding of the trigger-relevant fields of the last sample.
    last_sample: Option<Vec<u8>>,
    queue: VecDeque<MonitoredItemNotification>,
    pub(crate) sample_job: Option<JobId>,
}

impl MonitoredItem {
    pub fn new(
        id: u32,
        item_to_monitor: ReadValueId,
        mode: MonitoringMode,
        timestamps: TimestampsToReturn,
        parameters: &MonitoringParameters,
        settings: ItemSettings,
    ) -> Self {
        Self {
            id,
            client_handle: parameters.client_handle,
            item_to_monitor,
            mode,
            timestamps,
            settings,
            last_sample: None,
            queue: VecDeque::with_capacity(settings.queue_size.min(64)),
            sample_job: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    pub fn item_to_monitor(&self) -> &ReadValueId {
        &self.item_to_monitor
    }

    pub fn mode(&self) -> MonitoringMode {
        self.mode
    }

    pub fn timestamps(&self) -> TimestampsToReturn {
        self.timestamps
    }

    pub fn settings(&self) -> &ItemSettings {
        &self.settings
    }

    pub fn is_reporting(&self) -> bool {
        self.mode == MonitoringMode::Reporting
    }

    pub fn is_sampling(&self) -> bool {
        self.mode != MonitoringMode::Disabled
    }

    /// Apply ModifyMonitoredItems. Queue contents beyond the new size are
    /// trimmed from the discard end.
    pub fn modify(&mut self, parameters: &MonitoringParameters, settings: ItemSettings) {
        self.client_handle = parameters.client_handle;
        self.settings = settings;
        self.trim_queue();
    }

    pub fn set_timestamps(&mut self, timestamps: TimestampsToReturn) {
        self.timestamps = timestamps;
    }

    /// Switch monitoring mode. Disabling drops queued values and the
    /// change-detection state.
    pub fn set_mode(&mut self, mode: MonitoringMode) {
        if mode == MonitoringMode::Disabled {
            self.queue.clear();
            self.last_sample = None;
        }
        self.mode = mode;
    }

    fn change_key(&self, value: &DataValue) -> Vec<u8> {
        let mut relevant = DataValue {
            status: value.status,
            ..Default::default()
        };
        if matches!(
            self.settings.trigger,
            DataChangeTrigger::StatusValue | DataChangeTrigger::StatusValueTimestamp
        ) {
            relevant.value = value.value.clone();
        }
        if self.settings.trigger == DataChangeTrigger::StatusValueTimestamp {
            relevant.source_timestamp = value.source_timestamp;
            relevant.source_picoseconds = value.source_picoseconds;
        }
        encode_to_vec(&relevant).unwrap_or_default()
    }

    /// Offer a freshly read value. Returns `true` when it was queued.
    pub fn sample(&mut self, value: DataValue) -> bool {
        if !self.is_sampling() {
            return false;
        }
        let key = self.change_key(&value);
        if self.last_sample.as_deref() == Some(key.as_slice()) {
            return false;
        }
        if self.queue.len() >= self.settings.queue_size {
            if !self.settings.discard_oldest {
                log::trace!("[subscription] item {} queue full, sample dropped", self.id);
                return false;
            }
            self.queue.pop_front();
        }
        // only queued values become the change baseline
        self.last_sample = Some(key);
        self.queue.push_back(MonitoredItemNotification {
            client_handle: self.client_handle,
            value,
        });
        true
    }

    fn trim_queue(&mut self) {
        while self.queue.len() > self.settings.queue_size {
            if self.settings.discard_oldest {
                self.queue.pop_front();
            } else {
                self.queue.pop_back();
            }
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Take up to `max` queued notifications, oldest first.
    pub fn drain(&mut self, max: usize) -> impl Iterator<Item = MonitoredItemNotification> + '_ {
        let n = max.min(self.queue.len());
        self.queue.drain(..n)
    }

    /// Return drained notifications to the head of the queue, keeping their order.
    pub fn requeue_front(&mut self, notifications: Vec<MonitoredItemNotification>) {
        for n in notifications.into_iter().rev() {
            self.queue.push_front(n);
        }
    }

    #[cfg(test)]
    pub(crate) fn queue_snapshot(&self) -> Vec<MonitoredItemNotification> {
        self.queue.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DateTime, NodeId, Variant};

    fn item(queue_size: usize, discard_oldest: bool, trigger: DataChangeTrigger) -> MonitoredItem {
        MonitoredItem::new(
            1,
            ReadValueId {
                node_id: NodeId::numeric(1, 1),
                attribute_id: 13,
                ..Default::default()
            },
            MonitoringMode::Reporting,
            TimestampsToReturn::Both,
            &MonitoringParameters {
                client_handle: 77,
                ..Default::default()
            },
            ItemSettings {
                sampling_interval: 100.0,
                queue_size,
                discard_oldest,
                trigger,
            },
        )
    }

    fn value(v: i32) -> DataValue {
        DataValue::new(Variant::Int32(v))
    }

    fn values(item: &MonitoredItem) -> Vec<Option<Variant>> {
        item.queue_snapshot().into_iter().map(|n| n.value.value).collect()
    }

    #[test]
    fn test_identical_samples_deduplicated() {
        let mut it = item(10, true, DataChangeTrigger::StatusValue);
        assert!(it.sample(value(1)));
        assert!(!it.sample(value(1)));
        assert!(it.sample(value(2)));
        assert_eq!(it.queued(), 2);
        assert_eq!(it.queue_snapshot()[0].client_handle, 77);
    }

    #[test]
    fn test_discard_oldest() {
        let mut it = item(2, true, DataChangeTrigger::StatusValue);
        it.sample(value(1));
        it.sample(value(2));
        assert!(it.sample(value(3)));
        assert_eq!(
            values(&it),
            vec![Some(Variant::Int32(2)), Some(Variant::Int32(3))]
        );
    }

    #[test]
    fn test_discard_newest() {
        let mut it = item(2, false, DataChangeTrigger::StatusValue);
        it.sample(value(1));
        it.sample(value(2));
        assert!(!it.sample(value(3)));
        assert_eq!(
            values(&it),
            vec![Some(Variant::Int32(1)), Some(Variant::Int32(2))]
        );
    }

    #[test]
    fn test_dropped_sample_is_not_the_change_baseline() {
        let mut it = item(2, false, DataChangeTrigger::StatusValue);
        it.sample(value(1));
        it.sample(value(2));
        assert!(!it.sample(value(3)));
        assert_eq!(it.drain(2).count(), 2);
        assert!(it.sample(value(3)));
        assert_eq!(values(&it), vec![Some(Variant::Int32(3))]);
    }

    #[test]
    fn test_status_trigger_ignores_value_changes() {
        let mut it = item(10, true, DataChangeTrigger::Status);
        assert!(it.sample(value(1)));
        assert!(!it.sample(value(2)));
        assert!(it.sample(DataValue::from_status(StatusCode::BAD_NOT_READABLE)));
    }

    #[test]
    fn test_timestamp_trigger() {
        let mut it = item(10, true, DataChangeTrigger::StatusValueTimestamp);
        let mut a = value(1);
        a.source_timestamp = Some(DateTime(10));
        let mut b = value(1);
        b.source_timestamp = Some(DateTime(20));
        assert!(it.sample(a));
        assert!(it.sample(b));
    }

    #[test]
    fn test_disabled_items_do_not_sample() {
        let mut it = item(10, true, DataChangeTrigger::StatusValue);
        it.sample(value(1));
        it.set_mode(MonitoringMode::Disabled);
        assert_eq!(it.queued(), 0);
        assert!(!it.sample(value(2)));
        it.set_mode(MonitoringMode::Sampling);
        assert!(it.sample(value(1)));
        assert!(!it.is_reporting());
    }

    #[test]
    fn test_drain_partial() {
        let mut it = item(10, true, DataChangeTrigger::StatusValue);
        for v in 0..5 {
            it.sample(value(v));
        }
        assert_eq!(it.drain(3).count(), 3);
        assert_eq!(it.queued(), 2);
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!(parse_filter(&ExtensionObject::null()), Ok(DataChangeTrigger::StatusValue));
        let f = ExtensionObject::from_encodable(&DataChangeFilter {
            trigger: DataChangeTrigger::Status,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(parse_filter(&f), Ok(DataChangeTrigger::Status));
        let other = ExtensionObject::from_encodable(&ReadValueId::default()).unwrap();
        assert_eq!(
            parse_filter(&other),
            Err(StatusCode::BAD_MONITORED_ITEM_FILTER_UNSUPPORTED)
        );
    }
}
