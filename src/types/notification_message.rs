// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Helpers for NotificationMessage types

use crate::types::{
    date_time::DateTime,
    service_types::{DataChangeNotification, MonitoredItemNotification, NotificationMessage},
};

impl NotificationMessage {
    /// Create a notification message containing the supplied data change
    /// notifications. Calling this with no notifications will panic.
    pub fn data_change(
        sequence_number: u32,
        publish_time: DateTime,
        monitored_items: Vec<MonitoredItemNotification>,
    ) -> NotificationMessage {
        if monitored_items.is_empty() {
            panic!("No notifications supplied to data_change()");
        }
        let data_change_notification = DataChangeNotification {
            monitored_items: Some(monitored_items),
            diagnostic_infos: None,
        };
        trace!("data change notification = {:?}", data_change_notification);
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Some(vec![data_change_notification]),
        }
    }

    /// Create a keep-alive notification message
    pub fn keep_alive(sequence_number: u32, publish_time: DateTime) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: None,
        }
    }

    /// The number of notifications batched in the message, 0 for a keep-alive
    pub fn notification_count(&self) -> usize {
        self.notification_data
            .iter()
            .flatten()
            .map(|d| d.monitored_items.as_ref().map_or(0, |m| m.len()))
            .sum()
    }
}
