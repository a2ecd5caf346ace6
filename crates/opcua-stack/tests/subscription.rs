// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]

//! Subscriptions driven by explicit scheduler ticks.

mod common;

use std::time::{Duration, Instant};

use common::{server_with, service_result, value_id, Received, TestClient};
use opcua_stack::codec::DecodingOptions;
use opcua_stack::messages::*;
use opcua_stack::nodestore::{ns0, Node};
use opcua_stack::types::{NodeId, Variant};
use opcua_stack::{Server, StatusCode};

const INTERVAL_MS: u64 = 100;
const NODE: NodeId = NodeId::numeric(1, 4000);

/// Advances scheduler time one publishing interval per tick.
struct Clock {
    now: Instant,
}

impl Clock {
    fn start() -> Self {
        Self { now: Instant::now() }
    }

    fn tick(&mut self, server: &mut Server) {
        self.now += Duration::from_millis(INTERVAL_MS);
        server.run_jobs(self.now);
    }
}

fn setup() -> (Server, TestClient) {
    setup_with(|_| {})
}

fn setup_with(configure: impl FnOnce(&mut opcua_stack::ServerConfig)) -> (Server, TestClient) {
    let mut server = server_with(configure);
    let store = server.node_store();
    store
        .insert(Node::variable(NODE, "Level", NodeId::ns0(6), Variant::Int32(1)))
        .unwrap();
    store
        .add_bidirectional(&ns0::id::OBJECTS_FOLDER, &ns0::id::ORGANIZES, &NODE)
        .unwrap();
    let client = TestClient::session(&mut server);
    (server, client)
}

fn create_subscription(
    client: &mut TestClient,
    server: &mut Server,
    keep_alive: u32,
    lifetime: u32,
) -> CreateSubscriptionResponse {
    let header = client.header();
    match client.call(
        server,
        CreateSubscriptionRequest {
            request_header: header,
            requested_publishing_interval: INTERVAL_MS as f64,
            requested_lifetime_count: lifetime,
            requested_max_keep_alive_count: keep_alive,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        },
    ) {
        SupportedMessage::CreateSubscriptionResponse(r) => *r,
        other => panic!("expected CreateSubscriptionResponse, got {:?}", other),
    }
}

fn monitor(
    client: &mut TestClient,
    server: &mut Server,
    subscription_id: u32,
    client_handle: u32,
) -> u32 {
    let header = client.header();
    match client.call(
        server,
        CreateMonitoredItemsRequest {
            request_header: header,
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: Some(vec![MonitoredItemCreateRequest {
                item_to_monitor: value_id(&NODE),
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle,
                    sampling_interval: -1.0,
                    queue_size: 10,
                    discard_oldest: true,
                    ..Default::default()
                },
            }]),
        },
    ) {
        SupportedMessage::CreateMonitoredItemsResponse(r) => {
            let result = r.results.and_then(|mut v| v.pop()).unwrap();
            assert_eq!(result.status_code, StatusCode::GOOD);
            assert_eq!(result.revised_sampling_interval, INTERVAL_MS as f64);
            result.monitored_item_id
        }
        other => panic!("expected CreateMonitoredItemsResponse, got {:?}", other),
    }
}

fn publish(
    client: &mut TestClient,
    server: &mut Server,
    acks: Vec<SubscriptionAcknowledgement>,
) -> u32 {
    let header = client.header();
    client.send(
        server,
        SupportedMessage::from(PublishRequest {
            request_header: header,
            subscription_acknowledgements: Some(acks),
        }),
    )
}

/// Tick until a response to a Publish request shows up.
fn await_publish(
    client: &mut TestClient,
    server: &mut Server,
    clock: &mut Clock,
    max_ticks: usize,
) -> SupportedMessage {
    for _ in 0..=max_ticks {
        let received = client.pump(server);
        if let Some(message) = received.into_iter().find_map(|r| match r {
            Received::Response { message, .. } => Some(message),
            _ => None,
        }) {
            return message;
        }
        clock.tick(server);
    }
    panic!("no publish response within {} ticks", max_ticks);
}

fn publish_response(message: SupportedMessage) -> PublishResponse {
    match message {
        SupportedMessage::PublishResponse(r) => *r,
        other => panic!("expected PublishResponse, got {:?}", other),
    }
}

fn data_changes(response: &PublishResponse) -> Vec<MonitoredItemNotification> {
    let options = DecodingOptions::default();
    response
        .notification_message
        .notification_data
        .iter()
        .flatten()
        .filter_map(|body| body.decode_inner::<DataChangeNotification>(&options).unwrap())
        .flat_map(|n| n.monitored_items.unwrap_or_default())
        .collect()
}

#[test]
fn test_initial_value_then_change() {
    let (mut server, mut client) = setup();
    let sub = create_subscription(&mut client, &mut server, 10, 30);
    assert_eq!(sub.revised_publishing_interval, INTERVAL_MS as f64);
    monitor(&mut client, &mut server, sub.subscription_id, 7);
    let mut clock = Clock::start();

    publish(&mut client, &mut server, Vec::new());
    let response = publish_response(await_publish(&mut client, &mut server, &mut clock, 3));
    assert_eq!(response.subscription_id, sub.subscription_id);
    assert_eq!(response.notification_message.sequence_number, 1);
    let changes = data_changes(&response);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].client_handle, 7);
    assert_eq!(changes[0].value.value, Some(Variant::Int32(1)));
    assert_eq!(response.available_sequence_numbers, Some(vec![1]));

    assert_eq!(client.write_value(&mut server, &NODE, Variant::Int32(2)), StatusCode::GOOD);
    publish(&mut client, &mut server, Vec::new());
    let response = publish_response(await_publish(&mut client, &mut server, &mut clock, 5));
    assert_eq!(response.notification_message.sequence_number, 2);
    let changes = data_changes(&response);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].value.value, Some(Variant::Int32(2)));
}

#[test]
fn test_unchanged_value_is_not_reported_again() {
    let (mut server, mut client) = setup();
    let sub = create_subscription(&mut client, &mut server, 4, 40);
    monitor(&mut client, &mut server, sub.subscription_id, 1);
    let mut clock = Clock::start();

    publish(&mut client, &mut server, Vec::new());
    let first = publish_response(await_publish(&mut client, &mut server, &mut clock, 3));
    assert!(!first.notification_message.is_keep_alive());

    // Nothing changes: the next message is a keep-alive.
    publish(&mut client, &mut server, Vec::new());
    let second = publish_response(await_publish(&mut client, &mut server, &mut clock, 10));
    assert!(second.notification_message.is_keep_alive());
}

#[test]
fn test_keep_alive_does_not_consume_sequence_number() {
    let (mut server, mut client) = setup();
    let sub = create_subscription(&mut client, &mut server, 3, 30);
    assert_eq!(sub.revised_max_keep_alive_count, 3);
    let mut clock = Clock::start();

    publish(&mut client, &mut server, Vec::new());
    let mut ticks = 0;
    let keep_alive = loop {
        clock.tick(&mut server);
        ticks += 1;
        if let Some(Received::Response { message, .. }) = client.pump(&mut server).pop() {
            break publish_response(message);
        }
        assert!(ticks < 10, "no keep-alive");
    };
    assert_eq!(ticks, 3);
    assert!(keep_alive.notification_message.is_keep_alive());
    assert_eq!(keep_alive.notification_message.sequence_number, 1);
    assert_eq!(keep_alive.available_sequence_numbers, Some(Vec::new()));

    monitor(&mut client, &mut server, sub.subscription_id, 1);
    publish(&mut client, &mut server, Vec::new());
    let data = publish_response(await_publish(&mut client, &mut server, &mut clock, 3));
    assert!(!data.notification_message.is_keep_alive());
    assert_eq!(data.notification_message.sequence_number, 1);
}

#[test]
fn test_publish_without_subscription() {
    let (mut server, mut client) = setup();
    let header = client.header();
    let response = client.call(
        &mut server,
        PublishRequest {
            request_header: header,
            subscription_acknowledgements: None,
        },
    );
    assert_eq!(service_result(&response), StatusCode::BAD_NO_SUBSCRIPTION);
}

#[test]
fn test_too_many_publish_requests() {
    let (mut server, mut client) =
        setup_with(|c| c.subscription.max_publish_requests_per_session = 2);
    create_subscription(&mut client, &mut server, 10, 30);

    let first = publish(&mut client, &mut server, Vec::new());
    publish(&mut client, &mut server, Vec::new());
    assert!(client.pump(&mut server).is_empty());

    publish(&mut client, &mut server, Vec::new());
    match client.pump(&mut server).as_slice() {
        [Received::Response { request_id, message }] => {
            assert_eq!(*request_id, first);
            assert_eq!(service_result(message), StatusCode::BAD_TOO_MANY_PUBLISH_REQUESTS);
        }
        other => panic!("expected one fault, got {:?}", other),
    }
}

#[test]
fn test_acknowledge_and_republish() {
    let (mut server, mut client) = setup();
    let sub = create_subscription(&mut client, &mut server, 10, 30);
    monitor(&mut client, &mut server, sub.subscription_id, 1);
    let mut clock = Clock::start();

    publish(&mut client, &mut server, Vec::new());
    let response = publish_response(await_publish(&mut client, &mut server, &mut clock, 3));
    let sequence_number = response.notification_message.sequence_number;

    let republish = |client: &mut TestClient, server: &mut Server| {
        let header = client.header();
        client.call(
            server,
            RepublishRequest {
                request_header: header,
                subscription_id: sub.subscription_id,
                retransmit_sequence_number: sequence_number,
            },
        )
    };
    match republish(&mut client, &mut server) {
        SupportedMessage::RepublishResponse(r) => {
            assert_eq!(r.notification_message, response.notification_message)
        }
        other => panic!("expected RepublishResponse, got {:?}", other),
    }

    let acks = vec![
        SubscriptionAcknowledgement {
            subscription_id: sub.subscription_id,
            sequence_number,
        },
        SubscriptionAcknowledgement {
            subscription_id: sub.subscription_id,
            sequence_number: 99,
        },
        SubscriptionAcknowledgement {
            subscription_id: 12345,
            sequence_number: 1,
        },
    ];
    publish(&mut client, &mut server, acks);
    client.write_value(&mut server, &NODE, Variant::Int32(5));
    let next = publish_response(await_publish(&mut client, &mut server, &mut clock, 5));
    assert_eq!(
        next.results,
        Some(vec![
            StatusCode::GOOD,
            StatusCode::BAD_SEQUENCE_NUMBER_UNKNOWN,
            StatusCode::BAD_SUBSCRIPTION_ID_INVALID,
        ])
    );
    assert!(!next.available_sequence_numbers.unwrap().contains(&sequence_number));

    let response = republish(&mut client, &mut server);
    assert_eq!(service_result(&response), StatusCode::BAD_MESSAGE_NOT_AVAILABLE);
}

#[test]
fn test_late_subscription_answers_next_publish_immediately() {
    let (mut server, mut client) = setup();
    let sub = create_subscription(&mut client, &mut server, 10, 30);
    monitor(&mut client, &mut server, sub.subscription_id, 1);
    let mut clock = Clock::start();

    // Data is due but no Publish request is queued.
    clock.tick(&mut server);
    clock.tick(&mut server);
    assert!(client.pump(&mut server).is_empty());

    publish(&mut client, &mut server, Vec::new());
    match client.pump(&mut server).pop() {
        Some(Received::Response { message, .. }) => {
            let response = publish_response(message);
            assert_eq!(data_changes(&response).len(), 1);
        }
        other => panic!("expected an immediate publish response, got {:?}", other),
    }
}

#[test]
fn test_subscription_expires_without_publish_requests() {
    let (mut server, mut client) = setup();
    let sub = create_subscription(&mut client, &mut server, 1, 3);
    assert_eq!(sub.revised_lifetime_count, 3);
    let mut clock = Clock::start();

    for _ in 0..6 {
        clock.tick(&mut server);
    }
    let header = client.header();
    let response = client.call(
        &mut server,
        PublishRequest {
            request_header: header,
            subscription_acknowledgements: None,
        },
    );
    assert_eq!(service_result(&response), StatusCode::BAD_NO_SUBSCRIPTION);
    assert_eq!(server.session_count(), 1);
}

#[test]
fn test_publishing_disabled_sends_keep_alives() {
    let (mut server, mut client) = setup();
    let sub = create_subscription(&mut client, &mut server, 2, 30);
    monitor(&mut client, &mut server, sub.subscription_id, 1);
    let mut clock = Clock::start();

    let header = client.header();
    match client.call(
        &mut server,
        SetPublishingModeRequest {
            request_header: header,
            publishing_enabled: false,
            subscription_ids: Some(vec![sub.subscription_id, 999]),
        },
    ) {
        SupportedMessage::SetPublishingModeResponse(r) => assert_eq!(
            r.results,
            Some(vec![StatusCode::GOOD, StatusCode::BAD_SUBSCRIPTION_ID_INVALID])
        ),
        other => panic!("expected SetPublishingModeResponse, got {:?}", other),
    }

    publish(&mut client, &mut server, Vec::new());
    let response = publish_response(await_publish(&mut client, &mut server, &mut clock, 5));
    assert!(response.notification_message.is_keep_alive());
}

#[test]
fn test_disabled_item_stops_reporting() {
    let (mut server, mut client) = setup();
    let sub = create_subscription(&mut client, &mut server, 3, 30);
    let item = monitor(&mut client, &mut server, sub.subscription_id, 1);
    let mut clock = Clock::start();

    publish(&mut client, &mut server, Vec::new());
    let first = publish_response(await_publish(&mut client, &mut server, &mut clock, 3));
    assert_eq!(data_changes(&first).len(), 1);

    let header = client.header();
    match client.call(
        &mut server,
        SetMonitoringModeRequest {
            request_header: header,
            subscription_id: sub.subscription_id,
            monitoring_mode: MonitoringMode::Disabled,
            monitored_item_ids: Some(vec![item, item + 100]),
        },
    ) {
        SupportedMessage::SetMonitoringModeResponse(r) => assert_eq!(
            r.results,
            Some(vec![StatusCode::GOOD, StatusCode::BAD_MONITORED_ITEM_ID_INVALID])
        ),
        other => panic!("expected SetMonitoringModeResponse, got {:?}", other),
    }

    client.write_value(&mut server, &NODE, Variant::Int32(9));
    publish(&mut client, &mut server, Vec::new());
    let next = publish_response(await_publish(&mut client, &mut server, &mut clock, 6));
    assert!(next.notification_message.is_keep_alive());
}

#[test]
fn test_delete_last_subscription_fails_queued_publish() {
    let (mut server, mut client) = setup();
    let sub = create_subscription(&mut client, &mut server, 10, 30);
    let queued = publish(&mut client, &mut server, Vec::new());
    assert!(client.pump(&mut server).is_empty());

    let header = client.header();
    let delete = client.send(
        &mut server,
        SupportedMessage::from(DeleteSubscriptionsRequest {
            request_header: header,
            subscription_ids: Some(vec![sub.subscription_id]),
        }),
    );
    let received = client.pump(&mut server);
    let status_of = |id: u32| {
        received
            .iter()
            .find_map(|r| match r {
                Received::Response { request_id, message } if *request_id == id => {
                    Some(message.clone())
                }
                _ => None,
            })
            .unwrap_or_else(|| panic!("no response to request {}", id))
    };
    match status_of(delete) {
        SupportedMessage::DeleteSubscriptionsResponse(r) => {
            assert_eq!(r.results, Some(vec![StatusCode::GOOD]))
        }
        other => panic!("expected DeleteSubscriptionsResponse, got {:?}", other),
    }
    assert_eq!(service_result(&status_of(queued)), StatusCode::BAD_NO_SUBSCRIPTION);
}

#[test]
fn test_close_session_fails_queued_publish() {
    let (mut server, mut client) = setup();
    create_subscription(&mut client, &mut server, 10, 30);
    let queued = publish(&mut client, &mut server, Vec::new());

    let header = client.header();
    client.send(
        &mut server,
        SupportedMessage::from(CloseSessionRequest {
            request_header: header,
            delete_subscriptions: true,
        }),
    );
    let received = client.pump(&mut server);
    let fault = received
        .iter()
        .find_map(|r| match r {
            Received::Response { request_id, message } if *request_id == queued => Some(message),
            _ => None,
        })
        .expect("queued publish answered");
    assert_eq!(service_result(fault), StatusCode::BAD_SESSION_CLOSED);
    assert_eq!(server.session_count(), 0);
}

#[test]
fn test_monitored_item_on_unknown_node() {
    let (mut server, mut client) = setup();
    let sub = create_subscription(&mut client, &mut server, 10, 30);
    let header = client.header();
    match client.call(
        &mut server,
        CreateMonitoredItemsRequest {
            request_header: header,
            subscription_id: sub.subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: Some(vec![MonitoredItemCreateRequest {
                item_to_monitor: value_id(&NodeId::numeric(1, 31337)),
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters::default(),
            }]),
        },
    ) {
        SupportedMessage::CreateMonitoredItemsResponse(r) => {
            let result = r.results.and_then(|mut v| v.pop()).unwrap();
            assert_eq!(result.status_code, StatusCode::BAD_NODE_ID_UNKNOWN);
        }
        other => panic!("expected CreateMonitoredItemsResponse, got {:?}", other),
    }

    let header = client.header();
    let response = client.call(
        &mut server,
        CreateMonitoredItemsRequest {
            request_header: header,
            subscription_id: sub.subscription_id + 1,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: Some(vec![MonitoredItemCreateRequest::default()]),
        },
    );
    assert_eq!(service_result(&response), StatusCode::BAD_SUBSCRIPTION_ID_INVALID);
}

#[test]
fn test_subscription_limit_per_session() {
    let (mut server, mut client) = setup_with(|c| c.subscription.max_subscriptions_per_session = 1);
    create_subscription(&mut client, &mut server, 10, 30);
    let header = client.header();
    let response = client.call(
        &mut server,
        CreateSubscriptionRequest {
            request_header: header,
            requested_publishing_interval: 100.0,
            requested_lifetime_count: 30,
            requested_max_keep_alive_count: 10,
            publishing_enabled: true,
            ..Default::default()
        },
    );
    assert_eq!(service_result(&response), StatusCode::BAD_TOO_MANY_SUBSCRIPTIONS);
}
