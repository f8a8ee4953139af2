// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The request / response structures of the subscription services. These are
//! the decoded forms; binary encoding is handled outside this crate.

use crate::types::{data_value::DataValue, date_time::DateTime, status_code::StatusCode};

/// The `ResponseHeader` contains information common to every response from
/// server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseHeader {
    pub timestamp: DateTime,
    pub service_result: StatusCode,
}

impl ResponseHeader {
    pub fn new_timestamped_service_result(
        timestamp: DateTime,
        service_result: StatusCode,
    ) -> ResponseHeader {
        ResponseHeader {
            timestamp,
            service_result,
        }
    }

    /// A placeholder header, filled in when the response is sent
    pub fn null() -> ResponseHeader {
        ResponseHeader {
            timestamp: DateTime::epoch(),
            service_result: StatusCode::Good,
        }
    }
}

/// A fault sent in place of the service response when a request cannot be
/// honored at all, e.g. a publish request that timed out in the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceFault {
    pub response_header: ResponseHeader,
}

impl ServiceFault {
    pub fn new(timestamp: DateTime, service_result: StatusCode) -> ServiceFault {
        ServiceFault {
            response_header: ResponseHeader::new_timestamped_service_result(
                timestamp,
                service_result,
            ),
        }
    }
}

/// Diagnostic information carried alongside service results. The publish path
/// always sends this empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosticInfo {
    pub symbolic_id: Option<i32>,
    pub localized_text: Option<i32>,
    pub additional_info: Option<String>,
}

/// A single value change of a monitored item, tagged with the handle the
/// client assigned to the item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoredItemNotification {
    pub client_handle: u32,
    pub value: DataValue,
}

/// The batch of value changes inside one notification message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataChangeNotification {
    pub monitored_items: Option<Vec<MonitoredItemNotification>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

/// A single batched delivery with a sequence number, publish time and zero or
/// one data change notifications. Constructors live in
/// `notification_message.rs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationMessage {
    pub sequence_number: u32,
    pub publish_time: DateTime,
    pub notification_data: Option<Vec<DataChangeNotification>>,
}

/// The response to a queued publish request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishResponse {
    pub response_header: ResponseHeader,
    pub subscription_id: u32,
    /// Snapshot of the sequence numbers sitting in the retransmission queue,
    /// newest first, at the moment this response was sent.
    pub available_sequence_numbers: Option<Vec<u32>>,
    pub more_notifications: bool,
    pub notification_message: NotificationMessage,
    pub results: Option<Vec<StatusCode>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl PublishResponse {
    /// The empty shell a session pre-allocates when the client's publish
    /// request arrives. Every field is filled in when the response is paired
    /// with a notification message or drained with an error.
    pub fn shell() -> PublishResponse {
        PublishResponse {
            response_header: ResponseHeader::null(),
            subscription_id: 0,
            available_sequence_numbers: None,
            more_notifications: false,
            notification_message: NotificationMessage {
                sequence_number: 0,
                publish_time: DateTime::epoch(),
                notification_data: None,
            },
            results: None,
            diagnostic_infos: None,
        }
    }
}

/// An acknowledgment of a received notification message, sent by the client
/// piggybacked on its next publish request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionAcknowledgement {
    pub subscription_id: u32,
    pub sequence_number: u32,
}

/// Client parameters for CreateSubscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub requested_publishing_interval: f64,
    pub requested_lifetime_count: u32,
    pub requested_max_keep_alive_count: u32,
    pub max_notifications_per_publish: u32,
    pub publishing_enabled: bool,
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateSubscriptionResponse {
    pub subscription_id: u32,
    pub revised_publishing_interval: f64,
    pub revised_lifetime_count: u32,
    pub revised_max_keep_alive_count: u32,
}

/// Client parameters for ModifySubscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifySubscriptionRequest {
    pub subscription_id: u32,
    pub requested_publishing_interval: f64,
    pub requested_lifetime_count: u32,
    pub requested_max_keep_alive_count: u32,
    pub max_notifications_per_publish: u32,
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifySubscriptionResponse {
    pub revised_publishing_interval: f64,
    pub revised_lifetime_count: u32,
    pub revised_max_keep_alive_count: u32,
}

/// Client parameters for one monitored item in a CreateMonitoredItems call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredItemCreateRequest {
    /// The handle the client uses to correlate notifications with the item
    pub client_handle: u32,
    /// Requested queue depth, revised against server limits
    pub queue_size: u32,
    /// Whether the oldest or the newest value is dropped on overflow
    pub discard_oldest: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoredItemCreateResult {
    pub status_code: StatusCode,
    pub monitored_item_id: u32,
    pub revised_queue_size: u32,
}
