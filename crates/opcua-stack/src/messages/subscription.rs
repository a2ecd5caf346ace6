// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscription and MonitoredItem services, notification payloads.

use super::{ReadValueId, RequestHeader, ResponseHeader, TimestampsToReturn};
use crate::status::StatusCode;
use crate::types::{DataValue, DateTime, DiagnosticInfo, ExtensionObject};

ua_enum! {
    MonitoringMode {
        Disabled = 0,
        Sampling = 1,
        Reporting = 2,
    }
}

ua_enum! {
    DataChangeTrigger {
        Status = 0,
        StatusValue = 1,
        StatusValueTimestamp = 2,
    }
}

/// `DataChangeFilter::deadband_type` values.
pub mod deadband_type {
    pub const NONE: u32 = 0;
    pub const ABSOLUTE: u32 = 1;
    pub const PERCENT: u32 = 2;
}

ua_struct! {
    DataChangeFilter: 722, 724 {
        trigger: DataChangeTrigger,
        deadband_type: u32,
        deadband_value: f64,
    }
}

ua_struct! {
    MonitoringParameters: 740, 742 {
        client_handle: u32,
        /// Milliseconds; -1 means the publishing interval, 0 the fastest rate.
        sampling_interval: f64,
        filter: ExtensionObject,
        queue_size: u32,
        discard_oldest: bool,
    }
}

ua_struct! {
    MonitoredItemCreateRequest: 743, 745 {
        item_to_monitor: ReadValueId,
        monitoring_mode: MonitoringMode,
        requested_parameters: MonitoringParameters,
    }
}

ua_struct! {
    MonitoredItemCreateResult: 746, 748 {
        status_code: StatusCode,
        monitored_item_id: u32,
        revised_sampling_interval: f64,
        revised_queue_size: u32,
        filter_result: ExtensionObject,
    }
}

ua_struct! {
    MonitoredItemModifyRequest: 755, 757 {
        monitored_item_id: u32,
        requested_parameters: MonitoringParameters,
    }
}

ua_struct! {
    MonitoredItemModifyResult: 758, 760 {
        status_code: StatusCode,
        revised_sampling_interval: f64,
        revised_queue_size: u32,
        filter_result: ExtensionObject,
    }
}

ua_struct! {
    CreateSubscriptionRequest: 785, 787 {
        request_header: RequestHeader,
        requested_publishing_interval: f64,
        requested_lifetime_count: u32,
        requested_max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        publishing_enabled: bool,
        priority: u8,
    }
}

ua_struct! {
    CreateSubscriptionResponse: 788, 790 {
        response_header: ResponseHeader,
        subscription_id: u32,
        revised_publishing_interval: f64,
        revised_lifetime_count: u32,
        revised_max_keep_alive_count: u32,
    }
}

ua_struct! {
    ModifySubscriptionRequest: 791, 793 {
        request_header: RequestHeader,
        subscription_id: u32,
        requested_publishing_interval: f64,
        requested_lifetime_count: u32,
        requested_max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        priority: u8,
    }
}

ua_struct! {
    ModifySubscriptionResponse: 794, 796 {
        response_header: ResponseHeader,
        revised_publishing_interval: f64,
        revised_lifetime_count: u32,
        revised_max_keep_alive_count: u32,
    }
}

ua_struct! {
    SetPublishingModeRequest: 797, 799 {
        request_header: RequestHeader,
        publishing_enabled: bool,
        subscription_ids: Option<Vec<u32>>,
    }
}

ua_struct! {
    SetPublishingModeResponse: 800, 802 {
        response_header: ResponseHeader,
        results: Option<Vec<StatusCode>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    DeleteSubscriptionsRequest: 845, 847 {
        request_header: RequestHeader,
        subscription_ids: Option<Vec<u32>>,
    }
}

ua_struct! {
    DeleteSubscriptionsResponse: 848, 850 {
        response_header: ResponseHeader,
        results: Option<Vec<StatusCode>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    CreateMonitoredItemsRequest: 749, 751 {
        request_header: RequestHeader,
        subscription_id: u32,
        timestamps_to_return: TimestampsToReturn,
        items_to_create: Option<Vec<MonitoredItemCreateRequest>>,
    }
}

ua_struct! {
    CreateMonitoredItemsResponse: 752, 754 {
        response_header: ResponseHeader,
        results: Option<Vec<MonitoredItemCreateResult>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    ModifyMonitoredItemsRequest: 761, 763 {
        request_header: RequestHeader,
        subscription_id: u32,
        timestamps_to_return: TimestampsToReturn,
        items_to_modify: Option<Vec<MonitoredItemModifyRequest>>,
    }
}

ua_struct! {
    ModifyMonitoredItemsResponse: 764, 766 {
        response_header: ResponseHeader,
        results: Option<Vec<MonitoredItemModifyResult>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    SetMonitoringModeRequest: 767, 769 {
        request_header: RequestHeader,
        subscription_id: u32,
        monitoring_mode: MonitoringMode,
        monitored_item_ids: Option<Vec<u32>>,
    }
}

ua_struct! {
    SetMonitoringModeResponse: 770, 772 {
        response_header: ResponseHeader,
        results: Option<Vec<StatusCode>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    DeleteMonitoredItemsRequest: 779, 781 {
        request_header: RequestHeader,
        subscription_id: u32,
        monitored_item_ids: Option<Vec<u32>>,
    }
}

ua_struct! {
    DeleteMonitoredItemsResponse: 782, 784 {
        response_header: ResponseHeader,
        results: Option<Vec<StatusCode>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    SubscriptionAcknowledgement: 821, 823 {
        subscription_id: u32,
        sequence_number: u32,
    }
}

ua_struct! {
    NotificationMessage: 803, 805 {
        sequence_number: u32,
        publish_time: DateTime,
        /// DataChangeNotification / StatusChangeNotification bodies; empty for keep-alives.
        notification_data: Option<Vec<ExtensionObject>>,
    }
}

impl NotificationMessage {
    pub fn is_keep_alive(&self) -> bool {
        self.notification_data
            .as_ref()
            .map_or(true, |data| data.is_empty())
    }
}

ua_struct! {
    PublishRequest: 824, 826 {
        request_header: RequestHeader,
        subscription_acknowledgements: Option<Vec<SubscriptionAcknowledgement>>,
    }
}

ua_struct! {
    PublishResponse: 827, 829 {
        response_header: ResponseHeader,
        subscription_id: u32,
        available_sequence_numbers: Option<Vec<u32>>,
        more_notifications: bool,
        notification_message: NotificationMessage,
        /// One per acknowledgement, in request order.
        results: Option<Vec<StatusCode>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    RepublishRequest: 830, 832 {
        request_header: RequestHeader,
        subscription_id: u32,
        retransmit_sequence_number: u32,
    }
}

ua_struct! {
    RepublishResponse: 833, 835 {
        response_header: ResponseHeader,
        notification_message: NotificationMessage,
    }
}

ua_struct! {
    MonitoredItemNotification: 806, 808 {
        client_handle: u32,
        value: DataValue,
    }
}

ua_struct! {
    DataChangeNotification: 809, 811 {
        monitored_items: Option<Vec<MonitoredItemNotification>>,
        diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    StatusChangeNotification: 818, 820 {
        status: StatusCode,
        diagnostic_info: DiagnosticInfo,
    }
}
