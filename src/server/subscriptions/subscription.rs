// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::collections::VecDeque;

use crate::core::comms::SecureChannel;
use crate::server::config::SubscriptionLimits;
use crate::server::scheduler::CallbackId;
use crate::types::{
    DateTime, DateTimeUtc, MonitoredItemCreateRequest, MonitoredItemCreateResult,
    MonitoredItemNotification, NotificationMessage, ResponseHeader, StatusCode,
};

use super::monitored_item::MonitoredItem;
use super::retransmission::RetransmissionQueue;
use super::PublishResponseEntry;

/// The state of the subscription. `Late` is entered on the first tick that
/// cannot deliver for want of a publish request and persists until a send
/// succeeds or the lifetime runs out.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    Normal,
    Late,
    KeepAlive,
}

/// What a publish tick did, as seen by the dispatcher.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TickResult {
    /// Nothing was sent
    None,
    /// At least one response went out
    Sent,
    /// The lifetime count was exceeded; the subscription must be deleted
    /// before the dispatch completes
    Expired,
}

impl TickResult {
    fn quiet(sent: bool) -> TickResult {
        if sent {
            TickResult::Sent
        } else {
            TickResult::None
        }
    }
}

/// A subscription periodically drains the notification queues of its
/// monitored items into notification messages and pairs them with publish
/// request envelopes queued on the owning session.
#[derive(Debug)]
pub struct Subscription {
    subscription_id: u32,
    /// Publishing interval in milliseconds
    publishing_interval: f64,
    /// The number of consecutive starved publishing intervals after which the
    /// subscription is terminated
    lifetime_count: u32,
    /// The number of silent publishing intervals after which an empty
    /// keep-alive message is sent
    max_keep_alive_count: u32,
    /// Maximum notifications batched into one publish response, 0 for no limit
    notifications_per_publish: usize,
    /// The parameter that requests publishing to be enabled or disabled
    publishing_enabled: bool,
    /// Relative priority of the subscription. When more than one subscription
    /// needs to send notifications the highest priority subscription is sent
    /// first.
    priority: u8,
    state: SubscriptionState,
    current_keep_alive_count: u32,
    current_lifetime_count: u32,
    /// The sequence number of the last notification message that was sent
    sequence_number: u32,
    /// Monitored items in creation order; the order is observable in the
    /// concatenation of their queues at publish time. Lookup is a linear
    /// scan - item counts are small, a map keyed by id is a drop-in change
    /// if they stop being small.
    monitored_items: Vec<MonitoredItem>,
    retransmission_queue: RetransmissionQueue,
    last_monitored_item_id: u32,
    /// Handle of the repeated publish callback while one is registered
    publish_callback_id: Option<CallbackId>,
}

impl Subscription {
    pub fn new(
        subscription_id: u32,
        publishing_enabled: bool,
        publishing_interval: f64,
        lifetime_count: u32,
        max_keep_alive_count: u32,
        priority: u8,
        notifications_per_publish: usize,
    ) -> Subscription {
        Subscription {
            subscription_id,
            publishing_interval,
            lifetime_count,
            max_keep_alive_count,
            notifications_per_publish,
            publishing_enabled,
            priority,
            // The first publish response is sent immediately
            state: SubscriptionState::Normal,
            current_keep_alive_count: 0,
            current_lifetime_count: 0,
            sequence_number: 0,
            monitored_items: Vec::new(),
            retransmission_queue: RetransmissionQueue::new(),
            last_monitored_item_id: 0,
            publish_callback_id: None,
        }
    }

    pub fn subscription_id(&self) -> u32 {
        self.subscription_id
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn publishing_interval(&self) -> f64 {
        self.publishing_interval
    }

    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn current_keep_alive_count(&self) -> u32 {
        self.current_keep_alive_count
    }

    pub fn current_lifetime_count(&self) -> u32 {
        self.current_lifetime_count
    }

    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    pub fn monitored_item_count(&self) -> usize {
        self.monitored_items.len()
    }

    pub(crate) fn publish_callback_id(&self) -> Option<CallbackId> {
        self.publish_callback_id
    }

    pub(crate) fn set_publish_callback_id(&mut self, callback_id: Option<CallbackId>) {
        self.publish_callback_id = callback_id;
    }

    pub(crate) fn set_publishing_interval(&mut self, publishing_interval: f64) {
        self.publishing_interval = publishing_interval;
    }

    pub(crate) fn set_lifetime_count(&mut self, lifetime_count: u32) {
        self.lifetime_count = lifetime_count;
    }

    pub(crate) fn set_max_keep_alive_count(&mut self, max_keep_alive_count: u32) {
        self.max_keep_alive_count = max_keep_alive_count;
    }

    pub(crate) fn set_notifications_per_publish(&mut self, notifications_per_publish: usize) {
        self.notifications_per_publish = notifications_per_publish;
    }

    pub(crate) fn set_priority(&mut self, priority: u8) {
        self.priority = priority;
    }

    pub(crate) fn set_publishing_enabled(&mut self, publishing_enabled: bool) {
        self.publishing_enabled = publishing_enabled;
    }

    /// Reset the keep-alive counter, done whenever a message is sent.
    pub(crate) fn reset_keep_alive_counter(&mut self) {
        self.current_keep_alive_count = 0;
    }

    /// Reset the lifetime counter, done whenever a message is sent or the
    /// client reconfigures the subscription.
    pub(crate) fn reset_lifetime_counter(&mut self) {
        self.current_lifetime_count = 0;
    }

    /// Creates monitored items on the subscription, returning the creation
    /// results in request order.
    pub fn create_monitored_items(
        &mut self,
        limits: &SubscriptionLimits,
        items_to_create: &[MonitoredItemCreateRequest],
    ) -> Vec<MonitoredItemCreateResult> {
        let mut results = Vec::with_capacity(items_to_create.len());
        for item_to_create in items_to_create {
            if limits.max_monitored_items_per_sub > 0
                && self.monitored_items.len() >= limits.max_monitored_items_per_sub
            {
                results.push(MonitoredItemCreateResult {
                    status_code: StatusCode::BadTooManyMonitoredItems,
                    monitored_item_id: 0,
                    revised_queue_size: 0,
                });
                continue;
            }
            self.last_monitored_item_id += 1;
            let monitored_item = MonitoredItem::new(self.last_monitored_item_id, item_to_create);
            results.push(MonitoredItemCreateResult {
                status_code: StatusCode::Good,
                monitored_item_id: monitored_item.id(),
                revised_queue_size: monitored_item.queue_size() as u32,
            });
            self.monitored_items.push(monitored_item);
        }
        results
    }

    /// Delete the specified monitored items by id, returning a status code
    /// for each.
    pub fn delete_monitored_items(&mut self, items_to_delete: &[u32]) -> Vec<StatusCode> {
        items_to_delete
            .iter()
            .map(|id| {
                match self.monitored_items.iter().position(|m| m.id() == *id) {
                    Some(idx) => {
                        let _ = self.monitored_items.remove(idx);
                        StatusCode::Good
                    }
                    None => StatusCode::BadMonitoredItemIdInvalid,
                }
            })
            .collect()
    }

    pub fn find_monitored_item(&self, monitored_item_id: u32) -> Option<&MonitoredItem> {
        self.monitored_items
            .iter()
            .find(|m| m.id() == monitored_item_id)
    }

    /// Feeds a sampled value into a monitored item's queue. Unknown item ids
    /// are ignored; the sampler may race item deletion.
    pub fn notify_data_value(&mut self, monitored_item_id: u32, value: crate::types::DataValue) {
        if let Some(item) = self
            .monitored_items
            .iter_mut()
            .find(|m| m.id() == monitored_item_id)
        {
            item.notify_data_value(value);
        }
    }

    /// Removes the notification message the client acknowledged from the
    /// retransmission queue.
    pub fn acknowledge_notification(&mut self, sequence_number: u32) -> StatusCode {
        match self.retransmission_queue.remove(sequence_number) {
            Ok(()) => StatusCode::Good,
            Err(status) => status,
        }
    }

    /// Looks up a buffered notification message for republish.
    pub fn find_notification_message(
        &self,
        sequence_number: u32,
    ) -> Result<NotificationMessage, StatusCode> {
        self.retransmission_queue
            .find(sequence_number)
            .cloned()
            .ok_or(StatusCode::BadMessageNotAvailable)
    }

    pub fn retransmission_queue_len(&self) -> usize {
        self.retransmission_queue.len()
    }

    /// The sequence number the next non-empty notification message will
    /// carry. Sequence numbers wrap to 1, the protocol reserves 0.
    fn next_sequence_number(&self) -> u32 {
        if self.sequence_number == u32::MAX {
            1
        } else {
            self.sequence_number + 1
        }
    }

    /// Counts the values queued across the monitored items, capped at the
    /// per-publish maximum. The flag is set when values beyond the cap
    /// remain.
    fn count_queued_notifications(&self) -> (usize, bool) {
        if !self.publishing_enabled {
            return (0, false);
        }
        let queued: usize = self.monitored_items.iter().map(|m| m.queued_len()).sum();
        if self.notifications_per_publish > 0 && queued > self.notifications_per_publish {
            (self.notifications_per_publish, true)
        } else {
            (queued, false)
        }
    }

    /// Moves exactly `notifications` values out of the monitored item queues
    /// into notification order: items in creation order, each item's queue in
    /// FIFO order. The destination is reserved up front - an allocation
    /// failure must leave every queue untouched, because the first removal is
    /// the point of no return.
    fn prepare_notification_message(
        &mut self,
        notifications: usize,
    ) -> Result<Vec<MonitoredItemNotification>, StatusCode> {
        let mut monitored_item_notifications = Vec::new();
        monitored_item_notifications
            .try_reserve_exact(notifications)
            .map_err(|_| StatusCode::BadOutOfMemory)?;
        for item in self.monitored_items.iter_mut() {
            while monitored_item_notifications.len() < notifications {
                let Some(queued_value) = item.pop_queued_value() else {
                    break;
                };
                monitored_item_notifications.push(MonitoredItemNotification {
                    client_handle: queued_value.client_handle,
                    value: queued_value.value,
                });
            }
            if monitored_item_notifications.len() == notifications {
                break;
            }
        }
        Ok(monitored_item_notifications)
    }

    /// The publish callback, run by the dispatcher every publishing interval.
    /// Pairs pending notifications (or a due keep-alive) with the next queued
    /// publish request envelope and sends the response, then repeats while
    /// more notifications remain. Every pass either consumes a publish
    /// request or returns, so the repetition is bounded by the envelope
    /// queue.
    pub(crate) fn publish_tick(
        &mut self,
        limits: &SubscriptionLimits,
        response_queue: &mut VecDeque<PublishResponseEntry>,
        channel: Option<&SecureChannel>,
        now: &DateTimeUtc,
    ) -> TickResult {
        let mut sent = false;
        loop {
            trace!("Subscription {} | publish callback", self.subscription_id);

            let (notifications, more_notifications) = self.count_queued_notifications();

            if notifications == 0 {
                // Keep quiet until the keep-alive falls due. The counter
                // saturates at the maximum so it holds its bound even while
                // the subscription is starved of envelopes.
                if self.current_keep_alive_count < self.max_keep_alive_count {
                    self.current_keep_alive_count += 1;
                    if self.current_keep_alive_count < self.max_keep_alive_count {
                        return TickResult::quiet(sent);
                    }
                }
                debug!(
                    "Subscription {} | sending a keep-alive",
                    self.subscription_id
                );
            }

            // The session may not have a channel attached yet
            let Some(channel) = channel else {
                return TickResult::quiet(sent);
            };

            // Cannot publish without a response envelope
            if response_queue.is_empty() {
                debug!(
                    "Subscription {} | cannot send a publish response since the publish queue is empty",
                    self.subscription_id
                );
                if self.state != SubscriptionState::Late {
                    self.state = SubscriptionState::Late;
                } else {
                    self.current_lifetime_count += 1;
                    if self.current_lifetime_count > self.lifetime_count {
                        debug!(
                            "Subscription {} | end of lifetime for subscription",
                            self.subscription_id
                        );
                        return TickResult::Expired;
                    }
                }
                return TickResult::quiet(sent);
            }

            let mut monitored_item_notifications = None;
            if notifications > 0 {
                // Reserve every fallible allocation before touching the item
                // queues; past the first removal nothing may fail.
                if let Err(status) = self
                    .retransmission_queue
                    .try_reserve(limits.max_retransmission_queue_size)
                {
                    warn!(
                        "Subscription {} | could not allocate memory for retransmission: {}",
                        self.subscription_id, status
                    );
                    return TickResult::quiet(sent);
                }
                match self.prepare_notification_message(notifications) {
                    Ok(n) => monitored_item_notifications = Some(n),
                    Err(status) => {
                        warn!(
                            "Subscription {} | could not prepare the notification message: {}",
                            self.subscription_id, status
                        );
                        return TickResult::quiet(sent);
                    }
                }
            }

            // <-- the point of no return -->

            let entry = response_queue.pop_front().unwrap();
            let timestamp = DateTime::from(*now);

            let message = match monitored_item_notifications {
                Some(monitored_item_notifications) => {
                    self.sequence_number = self.next_sequence_number();
                    let message = NotificationMessage::data_change(
                        self.sequence_number,
                        timestamp,
                        monitored_item_notifications,
                    );
                    // Inserted before the available list is snapshotted so
                    // the message appears in its own acknowledgeable list
                    self.retransmission_queue
                        .insert(message.clone(), limits.max_retransmission_queue_size);
                    message
                }
                // A keep-alive carries the next sequence number without
                // consuming it; the next data change reuses the same number
                None => NotificationMessage::keep_alive(self.next_sequence_number(), timestamp),
            };

            let mut response = entry.response;
            response.response_header =
                ResponseHeader::new_timestamped_service_result(timestamp, StatusCode::Good);
            response.subscription_id = self.subscription_id;
            response.more_notifications = more_notifications;
            response.available_sequence_numbers =
                self.retransmission_queue.available_sequence_numbers();
            response.notification_message = message;

            debug!(
                "Subscription {} | sending out a publish response with {} notifications",
                self.subscription_id, notifications
            );
            // Fire and forget. If the transport died past the point of no
            // return the retransmission entry stays put and the client
            // recovers through republish.
            let _ = channel.send_symmetric_message(entry.request_id, response.into());

            self.state = SubscriptionState::Normal;
            self.current_keep_alive_count = 0;
            self.current_lifetime_count = 0;
            sent = true;

            if !more_notifications {
                return TickResult::Sent;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::comms::{SecureChannel, SentMessage};
    use crate::types::{DataValue, PublishResponse, Variant};
    use chrono::Utc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn limits() -> SubscriptionLimits {
        SubscriptionLimits::default()
    }

    fn new_subscription(notifications_per_publish: usize) -> Subscription {
        Subscription::new(42, true, 100.0, 30, 5, 0, notifications_per_publish)
    }

    fn add_item(sub: &mut Subscription, client_handle: u32) -> u32 {
        let results = sub.create_monitored_items(
            &limits(),
            &[MonitoredItemCreateRequest {
                client_handle,
                queue_size: 10,
                discard_oldest: true,
            }],
        );
        assert_eq!(results[0].status_code, StatusCode::Good);
        results[0].monitored_item_id
    }

    fn entry(request_id: u32) -> PublishResponseEntry {
        PublishResponseEntry {
            request_id,
            deadline: Utc::now() + chrono::Duration::seconds(30),
            response: PublishResponse::shell(),
        }
    }

    fn recv_response(receiver: &mut UnboundedReceiver<SentMessage>) -> (u32, PublishResponse) {
        let sent = receiver.try_recv().expect("expected a sent response");
        match sent.message {
            crate::core::supported_message::SupportedMessage::PublishResponse(r) => {
                (sent.request_id, r)
            }
            other => panic!("expected a publish response, got {:?}", other),
        }
    }

    #[test]
    fn count_ignores_disabled_publishing() {
        let mut sub = new_subscription(10);
        let item = add_item(&mut sub, 1);
        sub.notify_data_value(item, DataValue::new_now(1));
        sub.set_publishing_enabled(false);
        assert_eq!(sub.count_queued_notifications(), (0, false));
        sub.set_publishing_enabled(true);
        assert_eq!(sub.count_queued_notifications(), (1, false));
    }

    #[test]
    fn count_caps_at_notifications_per_publish() {
        let mut sub = new_subscription(2);
        let item = add_item(&mut sub, 1);
        for v in 0..5 {
            sub.notify_data_value(item, DataValue::new_now(v));
        }
        assert_eq!(sub.count_queued_notifications(), (2, true));

        // 0 means no cap
        sub.set_notifications_per_publish(0);
        assert_eq!(sub.count_queued_notifications(), (5, false));
    }

    #[test]
    fn prepare_concatenates_item_queues_in_order() {
        let mut sub = new_subscription(10);
        let first = add_item(&mut sub, 1);
        let second = add_item(&mut sub, 2);
        sub.notify_data_value(first, DataValue::new_now(10));
        sub.notify_data_value(second, DataValue::new_now(20));
        sub.notify_data_value(first, DataValue::new_now(11));

        let notifications = sub.prepare_notification_message(3).unwrap();
        let handles: Vec<u32> = notifications.iter().map(|n| n.client_handle).collect();
        let values: Vec<Variant> = notifications
            .iter()
            .map(|n| n.value.value.clone().unwrap())
            .collect();
        // First item's queue drains completely before the second's
        assert_eq!(handles, vec![1, 1, 2]);
        assert_eq!(
            values,
            vec![Variant::Int32(10), Variant::Int32(11), Variant::Int32(20)]
        );
        assert_eq!(sub.find_monitored_item(first).unwrap().queued_len(), 0);
        assert_eq!(sub.find_monitored_item(second).unwrap().queued_len(), 0);
    }

    #[test]
    fn prepare_leaves_uncounted_values_queued() {
        let mut sub = new_subscription(2);
        let item = add_item(&mut sub, 1);
        for v in 0..5 {
            sub.notify_data_value(item, DataValue::new_now(v));
        }
        let notifications = sub.prepare_notification_message(2).unwrap();
        assert_eq!(notifications.len(), 2);
        assert_eq!(sub.find_monitored_item(item).unwrap().queued_len(), 3);
    }

    #[test]
    fn keep_alive_counts_silent_intervals() {
        // Scenario: nothing queued, an envelope is waiting. Four silent
        // ticks, then the fifth sends an empty keep-alive.
        let mut sub = new_subscription(10);
        let (channel, mut receiver) = SecureChannel::unbounded();
        let mut response_queue = VecDeque::from([entry(1)]);
        let now = Utc::now();

        for expected in 1..=4 {
            let result = sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now);
            assert_eq!(result, TickResult::None);
            assert_eq!(sub.current_keep_alive_count(), expected);
            assert!(receiver.try_recv().is_err());
        }

        let result = sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now);
        assert_eq!(result, TickResult::Sent);
        let (request_id, response) = recv_response(&mut receiver);
        assert_eq!(request_id, 1);
        // Counter not advanced, no retransmission entry
        assert_eq!(response.notification_message.sequence_number, 1);
        assert_eq!(response.notification_message.notification_count(), 0);
        assert_eq!(response.available_sequence_numbers, None);
        assert!(!response.more_notifications);
        assert_eq!(sub.sequence_number(), 0);
        assert_eq!(sub.current_keep_alive_count(), 0);
        assert_eq!(sub.state(), SubscriptionState::Normal);
    }

    #[test]
    fn keep_alive_runs_even_with_publishing_disabled() {
        let mut sub = new_subscription(10);
        sub.set_publishing_enabled(false);
        let item = add_item(&mut sub, 1);
        sub.notify_data_value(item, DataValue::new_now(1));

        let (channel, mut receiver) = SecureChannel::unbounded();
        let mut response_queue = VecDeque::from([entry(1)]);
        let now = Utc::now();
        for _ in 1..=4 {
            sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now);
        }
        let result = sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now);
        assert_eq!(result, TickResult::Sent);
        let (_, response) = recv_response(&mut receiver);
        // The queued value stays where it is, the keep-alive is empty
        assert_eq!(response.notification_message.notification_count(), 0);
        assert_eq!(sub.find_monitored_item(item).unwrap().queued_len(), 1);
    }

    #[test]
    fn keep_alive_counter_saturates_at_the_maximum() {
        // No envelope available: once the keep-alive falls due the counter
        // must hold at the bound while the subscription waits
        let mut sub = new_subscription(10);
        let (channel, _receiver) = SecureChannel::unbounded();
        let mut response_queue = VecDeque::new();
        let now = Utc::now();
        for _ in 0..20 {
            let result = sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now);
            assert_ne!(result, TickResult::Sent);
            assert!(sub.current_keep_alive_count() <= 5);
        }
    }

    #[test]
    fn late_state_and_lifetime_expiry() {
        // Scenario: data pending, no publish request ever queued,
        // lifetime count of 3
        let mut sub = Subscription::new(42, true, 100.0, 3, 5, 0, 10);
        let item = {
            let results = sub.create_monitored_items(
                &limits(),
                &[MonitoredItemCreateRequest {
                    client_handle: 1,
                    queue_size: 10,
                    discard_oldest: true,
                }],
            );
            results[0].monitored_item_id
        };
        sub.notify_data_value(item, DataValue::new_now(1));

        let (channel, _receiver) = SecureChannel::unbounded();
        let mut response_queue = VecDeque::new();
        let now = Utc::now();

        // Tick 1 turns the subscription late without counting
        assert_eq!(
            sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now),
            TickResult::None
        );
        assert_eq!(sub.state(), SubscriptionState::Late);
        assert_eq!(sub.current_lifetime_count(), 0);

        // Ticks 2..4 count up to the limit without expiring
        for expected in 1..=3 {
            assert_eq!(
                sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now),
                TickResult::None
            );
            assert_eq!(sub.current_lifetime_count(), expected);
        }

        // Tick 5 exceeds the lifetime count
        assert_eq!(
            sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now),
            TickResult::Expired
        );
    }

    #[test]
    fn successful_send_resets_late_state() {
        let mut sub = new_subscription(10);
        let item = add_item(&mut sub, 1);
        sub.notify_data_value(item, DataValue::new_now(1));

        let (channel, mut receiver) = SecureChannel::unbounded();
        let mut response_queue = VecDeque::new();
        let now = Utc::now();
        sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now);
        sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now);
        assert_eq!(sub.state(), SubscriptionState::Late);
        assert_eq!(sub.current_lifetime_count(), 1);

        // An envelope arrives and the next tick delivers
        response_queue.push_back(entry(1));
        assert_eq!(
            sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now),
            TickResult::Sent
        );
        let (_, response) = recv_response(&mut receiver);
        assert_eq!(response.notification_message.notification_count(), 1);
        assert_eq!(sub.state(), SubscriptionState::Normal);
        assert_eq!(sub.current_lifetime_count(), 0);
    }

    #[test]
    fn missing_channel_is_a_no_op() {
        let mut sub = new_subscription(10);
        let item = add_item(&mut sub, 1);
        sub.notify_data_value(item, DataValue::new_now(1));
        let mut response_queue = VecDeque::from([entry(1)]);
        let now = Utc::now();
        assert_eq!(
            sub.publish_tick(&limits(), &mut response_queue, None, &now),
            TickResult::None
        );
        // Nothing consumed, nothing counted against the lifetime
        assert_eq!(response_queue.len(), 1);
        assert_eq!(sub.find_monitored_item(item).unwrap().queued_len(), 1);
        assert_eq!(sub.current_lifetime_count(), 0);
    }

    #[test]
    fn more_notifications_sends_within_one_tick() {
        // Scenario: 5 values, 2 per publish, 2 envelopes queued. One tick
        // sends two responses and leaves the rest for the next interval.
        let mut sub = new_subscription(2);
        let item = add_item(&mut sub, 1);
        for v in 1..=5 {
            sub.notify_data_value(item, DataValue::new_now(v));
        }

        let (channel, mut receiver) = SecureChannel::unbounded();
        let mut response_queue = VecDeque::from([entry(1), entry(2)]);
        let now = Utc::now();

        assert_eq!(
            sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now),
            TickResult::Sent
        );

        let (request_id, first) = recv_response(&mut receiver);
        assert_eq!(request_id, 1);
        assert_eq!(first.notification_message.sequence_number, 1);
        assert_eq!(first.notification_message.notification_count(), 2);
        assert!(first.more_notifications);

        let (request_id, second) = recv_response(&mut receiver);
        assert_eq!(request_id, 2);
        assert_eq!(second.notification_message.sequence_number, 2);
        assert_eq!(second.notification_message.notification_count(), 2);
        assert!(second.more_notifications);

        // No third response; the last value waits for the next tick
        assert!(receiver.try_recv().is_err());
        assert!(response_queue.is_empty());
        assert_eq!(sub.find_monitored_item(item).unwrap().queued_len(), 1);
    }

    #[test]
    fn sent_sequence_numbers_strictly_increase_and_self_acknowledge() {
        let mut sub = new_subscription(10);
        let item = add_item(&mut sub, 1);
        let (channel, mut receiver) = SecureChannel::unbounded();
        let now = Utc::now();

        let mut last_sequence = 0;
        for round in 0..20u32 {
            sub.notify_data_value(item, DataValue::new_now(round));
            let mut response_queue = VecDeque::from([entry(round)]);
            sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now);
            let (_, response) = recv_response(&mut receiver);
            let sequence = response.notification_message.sequence_number;
            assert_eq!(sequence, last_sequence + 1);
            // The just-sent message is in its own available list
            assert!(response
                .available_sequence_numbers
                .as_ref()
                .unwrap()
                .contains(&sequence));
            last_sequence = sequence;
        }
    }

    #[test]
    fn keep_alive_reuses_the_next_sequence_number() {
        let mut sub = new_subscription(10);
        let item = add_item(&mut sub, 1);
        let (channel, mut receiver) = SecureChannel::unbounded();
        let now = Utc::now();

        // First a data change with sequence 1
        sub.notify_data_value(item, DataValue::new_now(1));
        let mut response_queue = VecDeque::from([entry(1)]);
        sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now);
        let (_, response) = recv_response(&mut receiver);
        assert_eq!(response.notification_message.sequence_number, 1);

        // Keep-alive falls due and announces 2 without consuming it
        let mut response_queue = VecDeque::from([entry(2)]);
        for _ in 0..5 {
            sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now);
        }
        let (_, response) = recv_response(&mut receiver);
        assert_eq!(response.notification_message.sequence_number, 2);
        assert_eq!(response.notification_message.notification_count(), 0);

        // The next data change actually uses 2
        sub.notify_data_value(item, DataValue::new_now(2));
        let mut response_queue = VecDeque::from([entry(3)]);
        sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now);
        let (_, response) = recv_response(&mut receiver);
        assert_eq!(response.notification_message.sequence_number, 2);
        assert_eq!(response.notification_message.notification_count(), 1);
    }

    #[test]
    fn sequence_number_wraps_to_one() {
        let mut sub = new_subscription(10);
        let item = add_item(&mut sub, 1);
        sub.sequence_number = u32::MAX;
        sub.notify_data_value(item, DataValue::new_now(1));

        let (channel, mut receiver) = SecureChannel::unbounded();
        let mut response_queue = VecDeque::from([entry(1)]);
        let now = Utc::now();
        sub.publish_tick(&limits(), &mut response_queue, Some(&channel), &now);
        let (_, response) = recv_response(&mut receiver);
        assert_eq!(response.notification_message.sequence_number, 1);
        assert_eq!(sub.sequence_number(), 1);
    }

    #[test]
    fn retransmission_queue_is_bounded_by_the_cap() {
        // Scenario: cap of 2, three unacknowledged sends; the first sequence
        // number is evicted
        let limits = SubscriptionLimits {
            max_retransmission_queue_size: 2,
            ..Default::default()
        };
        let mut sub = new_subscription(10);
        let item = add_item(&mut sub, 1);
        let (channel, mut receiver) = SecureChannel::unbounded();
        let now = Utc::now();

        for round in 1..=3 {
            sub.notify_data_value(item, DataValue::new_now(round));
            let mut response_queue = VecDeque::from([entry(round as u32)]);
            sub.publish_tick(&limits, &mut response_queue, Some(&channel), &now);
        }
        for _ in 0..2 {
            let _ = recv_response(&mut receiver);
        }
        let (_, third) = recv_response(&mut receiver);
        assert_eq!(sub.retransmission_queue_len(), 2);
        assert_eq!(third.available_sequence_numbers, Some(vec![3, 2]));
        assert_eq!(
            sub.acknowledge_notification(1),
            StatusCode::BadSequenceNumberUnknown
        );
    }

    #[test]
    fn monitored_item_delete_reports_unknown_ids() {
        let mut sub = new_subscription(10);
        let item = add_item(&mut sub, 1);
        let results = sub.delete_monitored_items(&[item, 999]);
        assert_eq!(
            results,
            vec![StatusCode::Good, StatusCode::BadMonitoredItemIdInvalid]
        );
        assert_eq!(sub.monitored_item_count(), 0);
    }

    #[test]
    fn monitored_item_cap_is_enforced() {
        let limits = SubscriptionLimits {
            max_monitored_items_per_sub: 1,
            ..Default::default()
        };
        let mut sub = new_subscription(10);
        let request = MonitoredItemCreateRequest {
            client_handle: 1,
            queue_size: 10,
            discard_oldest: true,
        };
        let results = sub.create_monitored_items(&limits, &[request.clone(), request]);
        assert_eq!(results[0].status_code, StatusCode::Good);
        assert_eq!(results[1].status_code, StatusCode::BadTooManyMonitoredItems);
    }
}
