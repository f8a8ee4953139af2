// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::collections::VecDeque;

use crate::server::constants;
use crate::types::{DataValue, MonitoredItemCreateRequest};

/// A sampled value waiting to be published, tagged with the client handle of
/// the item that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedValue {
    pub client_handle: u32,
    pub value: DataValue,
}

/// A monitored item inside a subscription. The sampling machinery that
/// produces values lives outside the engine; it feeds `notify_data_value`
/// and the publish tick drains the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItem {
    monitored_item_id: u32,
    client_handle: u32,
    queue_size: usize,
    discard_oldest: bool,
    queue: VecDeque<QueuedValue>,
    queue_overflow: bool,
}

impl MonitoredItem {
    pub fn new(monitored_item_id: u32, request: &MonitoredItemCreateRequest) -> MonitoredItem {
        let queue_size = Self::sanitize_queue_size(request.queue_size as usize);
        MonitoredItem {
            monitored_item_id,
            client_handle: request.client_handle,
            queue_size,
            discard_oldest: request.discard_oldest,
            queue: VecDeque::with_capacity(queue_size),
            queue_overflow: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.monitored_item_id
    }

    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    /// Number of values currently queued
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// True if the queue dropped a value since the last time it was drained
    pub fn queue_overflow(&self) -> bool {
        self.queue_overflow
    }

    /// Enqueues a sampled value, applying the overflow policy when the queue
    /// is at capacity.
    pub fn notify_data_value(&mut self, value: DataValue) {
        self.queue_overflow = if self.queue.len() == self.queue_size {
            trace!("Data change overflow on monitored item {}", self.monitored_item_id);
            if self.discard_oldest {
                // Throw away the oldest value to make space at the back
                let _ = self.queue.pop_front();
            } else {
                let _ = self.queue.pop_back();
            }
            // Overflow only affects queues deeper than one element
            self.queue_size > 1
        } else {
            false
        };
        self.queue.push_back(QueuedValue {
            client_handle: self.client_handle,
            value,
        });
    }

    /// Removes and returns the oldest queued value. Called by the publish
    /// tick while assembling a notification message.
    pub(crate) fn pop_queued_value(&mut self) -> Option<QueuedValue> {
        let value = self.queue.pop_front();
        if value.is_some() {
            self.queue_overflow = false;
        }
        value
    }

    /// Takes the requested queue size and ensures it is within the range supported by the server
    fn sanitize_queue_size(requested_queue_size: usize) -> usize {
        if requested_queue_size == 0 {
            constants::DEFAULT_DATA_CHANGE_QUEUE_SIZE
        } else if requested_queue_size < constants::MIN_DATA_CHANGE_QUEUE_SIZE {
            constants::MIN_DATA_CHANGE_QUEUE_SIZE
        } else if requested_queue_size > constants::MAX_DATA_CHANGE_QUEUE_SIZE {
            constants::MAX_DATA_CHANGE_QUEUE_SIZE
        } else {
            requested_queue_size
        }
    }
}
