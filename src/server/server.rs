// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::handle::AtomicHandle;
use crate::server::config::{ServerConfig, SubscriptionLimits};
use crate::server::scheduler::{ScheduledAction, Scheduler};
use crate::server::session::Session;
use crate::server::subscriptions::subscription::{Subscription, TickResult};
use crate::types::{
    CreateSubscriptionRequest, CreateSubscriptionResponse, DateTimeUtc,
    ModifySubscriptionRequest, ModifySubscriptionResponse, MonitoredItemCreateRequest,
    MonitoredItemCreateResult, StatusCode,
};

/// The publish engine itself: the sessions it serves, the scheduler driving
/// their subscriptions' publish callbacks and the configured limits. All of
/// it runs on the server's single event loop - the request handling layer
/// and the timer both call in from the same dispatcher, which is what keeps
/// ticks for one subscription serialized.
pub struct Server {
    config: ServerConfig,
    scheduler: Scheduler,
    sessions: HashMap<u32, Arc<RwLock<Session>>>,
    session_ids: AtomicHandle,
    subscription_ids: AtomicHandle,
}

impl Server {
    pub fn new(config: ServerConfig) -> Server {
        if !config.is_valid() {
            warn!("Server configuration is invalid, limits may misbehave");
        }
        Server {
            config,
            scheduler: Scheduler::new(),
            sessions: HashMap::new(),
            session_ids: AtomicHandle::new(1),
            subscription_ids: AtomicHandle::new(1),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registers a new session with the engine. The caller attaches the
    /// secure channel once the transport provides one.
    pub fn add_session(&mut self) -> Arc<RwLock<Session>> {
        let session_id = self.session_ids.next();
        let session = Arc::new(RwLock::new(Session::new(session_id)));
        self.sessions.insert(session_id, session.clone());
        session
    }

    pub fn session(&self, session_id: u32) -> Option<Arc<RwLock<Session>>> {
        self.sessions.get(&session_id).cloned()
    }

    /// Removes a session, unhooking the publish callbacks of every
    /// subscription it still owns.
    pub fn remove_session(&mut self, session_id: u32) -> StatusCode {
        let Some(session) = self.sessions.remove(&session_id) else {
            return StatusCode::BadSessionIdInvalid;
        };
        let mut session = trace_write_lock!(session);
        for subscription_id in session.subscriptions().subscription_ids() {
            if let Some(mut subscription) = session.subscriptions_mut().remove(subscription_id) {
                let _ = self.unregister_publish_callback(&mut subscription);
            }
        }
        StatusCode::Good
    }

    /// Handles a CreateSubscription request - revises the requested values
    /// against the server limits, registers the publish callback and hands
    /// the subscription to the session.
    pub fn create_subscription(
        &mut self,
        session_id: u32,
        request: &CreateSubscriptionRequest,
        now: &DateTimeUtc,
    ) -> Result<CreateSubscriptionResponse, StatusCode> {
        let session = self
            .session(session_id)
            .ok_or(StatusCode::BadSessionIdInvalid)?;
        let mut session = trace_write_lock!(session);
        let limits = self.config.subscriptions;
        if limits.max_subscriptions_per_session > 0
            && session.subscriptions().len() >= limits.max_subscriptions_per_session
        {
            return Err(StatusCode::BadTooManySubscriptions);
        }

        let (revised_publishing_interval, revised_max_keep_alive_count, revised_lifetime_count) =
            Self::revise_subscription_values(
                &limits,
                request.requested_publishing_interval,
                request.requested_max_keep_alive_count,
                request.requested_lifetime_count,
            );

        let subscription_id = self.subscription_ids.next();
        let mut subscription = Subscription::new(
            subscription_id,
            request.publishing_enabled,
            revised_publishing_interval,
            revised_lifetime_count,
            revised_max_keep_alive_count,
            request.priority,
            self.revise_max_notifications_per_publish(request.max_notifications_per_publish),
        );
        let status = self.register_publish_callback(session_id, &mut subscription, now);
        if status.is_bad() {
            return Err(status);
        }
        session.subscriptions_mut().insert(subscription);

        Ok(CreateSubscriptionResponse {
            subscription_id,
            revised_publishing_interval,
            revised_lifetime_count,
            revised_max_keep_alive_count,
        })
    }

    /// Handles a ModifySubscription request. A changed publishing interval
    /// re-registers the publish callback at the new rate.
    pub fn modify_subscription(
        &mut self,
        session_id: u32,
        request: &ModifySubscriptionRequest,
        now: &DateTimeUtc,
    ) -> Result<ModifySubscriptionResponse, StatusCode> {
        let session = self
            .session(session_id)
            .ok_or(StatusCode::BadSessionIdInvalid)?;
        let mut session = trace_write_lock!(session);
        let limits = self.config.subscriptions;
        let notifications_per_publish =
            self.revise_max_notifications_per_publish(request.max_notifications_per_publish);
        let Some(subscription) = session.subscriptions_mut().get_mut(request.subscription_id)
        else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };

        let (revised_publishing_interval, revised_max_keep_alive_count, revised_lifetime_count) =
            Self::revise_subscription_values(
                &limits,
                request.requested_publishing_interval,
                request.requested_max_keep_alive_count,
                request.requested_lifetime_count,
            );

        if revised_publishing_interval != subscription.publishing_interval() {
            if let Some(callback_id) = subscription.publish_callback_id() {
                let _ = self.scheduler.remove_repeated_callback(callback_id);
                subscription.set_publish_callback_id(None);
            }
        }
        subscription.set_publishing_interval(revised_publishing_interval);
        subscription.set_max_keep_alive_count(revised_max_keep_alive_count);
        subscription.set_lifetime_count(revised_lifetime_count);
        subscription.set_priority(request.priority);
        subscription.set_notifications_per_publish(notifications_per_publish);
        subscription.reset_lifetime_counter();
        subscription.reset_keep_alive_counter();
        let status = self.register_publish_callback(session_id, subscription, now);
        if status.is_bad() {
            return Err(status);
        }

        Ok(ModifySubscriptionResponse {
            revised_publishing_interval,
            revised_lifetime_count,
            revised_max_keep_alive_count,
        })
    }

    /// Handles a SetPublishingMode request, returning one status per
    /// subscription id.
    pub fn set_publishing_mode(
        &mut self,
        session_id: u32,
        publishing_enabled: bool,
        subscription_ids: &[u32],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        if subscription_ids.is_empty() {
            return Err(StatusCode::BadNothingToDo);
        }
        let session = self
            .session(session_id)
            .ok_or(StatusCode::BadSessionIdInvalid)?;
        let mut session = trace_write_lock!(session);
        Ok(subscription_ids
            .iter()
            .map(
                |id| match session.subscriptions_mut().get_mut(*id) {
                    Some(subscription) => {
                        subscription.set_publishing_enabled(publishing_enabled);
                        subscription.reset_lifetime_counter();
                        StatusCode::Good
                    }
                    None => StatusCode::BadSubscriptionIdInvalid,
                },
            )
            .collect())
    }

    /// Deletes a subscription: the registry entry, its monitored items and
    /// retransmission queue, and its publish callback. If that was the
    /// session's last subscription any queued publish requests are answered
    /// with `BadNoSubscription`.
    pub fn delete_subscription(
        &mut self,
        session_id: u32,
        subscription_id: u32,
        now: &DateTimeUtc,
    ) -> StatusCode {
        let Some(session) = self.session(session_id) else {
            return StatusCode::BadSessionIdInvalid;
        };
        let mut session = trace_write_lock!(session);
        let Some(mut subscription) = session.subscriptions_mut().remove(subscription_id) else {
            return StatusCode::BadSubscriptionIdInvalid;
        };
        let _ = self.unregister_publish_callback(&mut subscription);
        debug!("Subscription {} | deleted", subscription_id);
        // Dropping the subscription frees its monitored items and its
        // retransmission queue
        drop(subscription);
        session.answer_publish_requests_no_subscription(now);
        StatusCode::Good
    }

    pub fn create_monitored_items(
        &mut self,
        session_id: u32,
        subscription_id: u32,
        items_to_create: &[MonitoredItemCreateRequest],
    ) -> Result<Vec<MonitoredItemCreateResult>, StatusCode> {
        let session = self
            .session(session_id)
            .ok_or(StatusCode::BadSessionIdInvalid)?;
        let mut session = trace_write_lock!(session);
        let limits = self.config.subscriptions;
        let Some(subscription) = session.subscriptions_mut().get_mut(subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        Ok(subscription.create_monitored_items(&limits, items_to_create))
    }

    pub fn delete_monitored_items(
        &mut self,
        session_id: u32,
        subscription_id: u32,
        items_to_delete: &[u32],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        let session = self
            .session(session_id)
            .ok_or(StatusCode::BadSessionIdInvalid)?;
        let mut session = trace_write_lock!(session);
        let Some(subscription) = session.subscriptions_mut().get_mut(subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        Ok(subscription.delete_monitored_items(items_to_delete))
    }

    /// Runs every publish callback due at `now`. Called from the server's
    /// event loop.
    pub fn run_pending(&mut self, now: &DateTimeUtc) {
        for action in self.scheduler.pop_due(now) {
            match action {
                ScheduledAction::PublishTick {
                    session_id,
                    subscription_id,
                } => self.publish_tick(session_id, subscription_id, now),
            }
        }
    }

    fn publish_tick(&mut self, session_id: u32, subscription_id: u32, now: &DateTimeUtc) {
        let Some(session) = self.session(session_id) else {
            return;
        };
        let result = {
            let mut session = trace_write_lock!(session);
            session.expire_stale_publish_requests(now);
            session.publish_tick(&self.config.subscriptions, subscription_id, now)
        };
        if result == TickResult::Expired {
            info!(
                "Subscription {} has expired and will be removed",
                subscription_id
            );
            let _ = self.delete_subscription(session_id, subscription_id, now);
        }
    }

    /// Registers the repeated publish callback for a subscription. Already
    /// registered subscriptions are left alone.
    fn register_publish_callback(
        &mut self,
        session_id: u32,
        subscription: &mut Subscription,
        now: &DateTimeUtc,
    ) -> StatusCode {
        debug!(
            "Subscription {} | register subscription publishing callback",
            subscription.subscription_id()
        );
        if subscription.publish_callback_id().is_some() {
            return StatusCode::Good;
        }
        match self.scheduler.add_repeated_callback(
            ScheduledAction::PublishTick {
                session_id,
                subscription_id: subscription.subscription_id(),
            },
            subscription.publishing_interval(),
            now,
        ) {
            Ok(callback_id) => {
                subscription.set_publish_callback_id(Some(callback_id));
                StatusCode::Good
            }
            Err(status) => status,
        }
    }

    /// Removes the repeated publish callback of a subscription. Subscriptions
    /// without one are left alone.
    fn unregister_publish_callback(&mut self, subscription: &mut Subscription) -> StatusCode {
        debug!(
            "Subscription {} | unregister subscription publishing callback",
            subscription.subscription_id()
        );
        let Some(callback_id) = subscription.publish_callback_id() else {
            return StatusCode::Good;
        };
        let status = self.scheduler.remove_repeated_callback(callback_id);
        if status.is_bad() {
            return status;
        }
        subscription.set_publish_callback_id(None);
        StatusCode::Good
    }

    /// This function takes the requested values passed in a create / modify
    /// and returns revised values that conform to the server's limits. For
    /// simplicity the return type is a tuple.
    fn revise_subscription_values(
        limits: &SubscriptionLimits,
        requested_publishing_interval: f64,
        requested_max_keep_alive_count: u32,
        requested_lifetime_count: u32,
    ) -> (f64, u32, u32) {
        let revised_publishing_interval = f64::max(
            requested_publishing_interval,
            limits.min_publishing_interval_ms,
        );
        let revised_max_keep_alive_count =
            if requested_max_keep_alive_count > limits.max_keep_alive_count {
                limits.max_keep_alive_count
            } else if requested_max_keep_alive_count == 0 {
                limits.default_keep_alive_count
            } else {
                requested_max_keep_alive_count
            };
        // Lifetime count must exceed the keep alive count by at least a multiple of
        let min_lifetime_count = revised_max_keep_alive_count * 3;
        let revised_lifetime_count = if requested_lifetime_count < min_lifetime_count {
            min_lifetime_count
        } else if requested_lifetime_count > limits.max_lifetime_count {
            limits.max_lifetime_count
        } else {
            requested_lifetime_count
        };
        (
            revised_publishing_interval,
            revised_max_keep_alive_count,
            revised_lifetime_count,
        )
    }

    fn revise_max_notifications_per_publish(&self, requested: u32) -> usize {
        let limit = self.config.subscriptions.max_notifications_per_publish;
        if limit == 0 {
            requested as usize
        } else if requested == 0 || requested as usize > limit {
            limit
        } else {
            requested as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::comms::{SecureChannel, SentMessage};
    use crate::core::supported_message::SupportedMessage;
    use crate::server::constants;
    use crate::types::DataValue;
    use chrono::{Duration, Utc};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn create_request(
        publishing_interval: f64,
        lifetime_count: u32,
        keep_alive_count: u32,
    ) -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            requested_publishing_interval: publishing_interval,
            requested_lifetime_count: lifetime_count,
            requested_max_keep_alive_count: keep_alive_count,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        }
    }

    fn server_with_session() -> (Server, u32, UnboundedReceiver<SentMessage>) {
        let mut server = Server::new(ServerConfig::default());
        let session = server.add_session();
        let (channel, receiver) = SecureChannel::unbounded();
        let session_id = {
            let mut session = session.write();
            session.set_secure_channel(channel);
            session.session_id()
        };
        (server, session_id, receiver)
    }

    fn recv_publish_response(
        receiver: &mut UnboundedReceiver<SentMessage>,
    ) -> crate::types::PublishResponse {
        match receiver.try_recv().expect("expected a sent message").message {
            SupportedMessage::PublishResponse(r) => r,
            other => panic!("expected a publish response, got {:?}", other),
        }
    }

    #[test]
    fn create_subscription_revises_requested_values() {
        let (mut server, session_id, _receiver) = server_with_session();
        let now = Utc::now();
        // Everything requested below / above the limits gets revised
        let response = server
            .create_subscription(session_id, &create_request(1.0, 0, 0), &now)
            .unwrap();
        assert_eq!(
            response.revised_publishing_interval,
            constants::MIN_PUBLISHING_INTERVAL_MS
        );
        assert_eq!(
            response.revised_max_keep_alive_count,
            constants::DEFAULT_KEEP_ALIVE_COUNT
        );
        assert_eq!(
            response.revised_lifetime_count,
            3 * constants::DEFAULT_KEEP_ALIVE_COUNT
        );

        // The publish callback is registered for the new subscription
        assert_eq!(server.scheduler.len(), 1);
        let session = server.session(session_id).unwrap();
        let session = session.read();
        let subscription = session.subscriptions().get(response.subscription_id).unwrap();
        assert!(subscription.publish_callback_id().is_some());
    }

    #[test]
    fn subscription_cap_is_enforced() {
        let mut config = ServerConfig::default();
        config.subscriptions.max_subscriptions_per_session = 1;
        let mut server = Server::new(config);
        let session = server.add_session();
        let session_id = session.read().session_id();
        let now = Utc::now();
        assert!(server
            .create_subscription(session_id, &create_request(100.0, 30, 10), &now)
            .is_ok());
        assert_eq!(
            server
                .create_subscription(session_id, &create_request(100.0, 30, 10), &now)
                .unwrap_err(),
            StatusCode::BadTooManySubscriptions
        );
    }

    #[test]
    fn modify_subscription_reregisters_on_interval_change() {
        let (mut server, session_id, _receiver) = server_with_session();
        let now = Utc::now();
        let created = server
            .create_subscription(session_id, &create_request(100.0, 30, 10), &now)
            .unwrap();
        let first_callback_id = {
            let session = server.session(session_id).unwrap();
            let session = session.read();
            session
                .subscriptions()
                .get(created.subscription_id)
                .unwrap()
                .publish_callback_id()
                .unwrap()
        };

        // Same interval keeps the callback
        let response = server
            .modify_subscription(
                session_id,
                &ModifySubscriptionRequest {
                    subscription_id: created.subscription_id,
                    requested_publishing_interval: 100.0,
                    requested_lifetime_count: 60,
                    requested_max_keep_alive_count: 20,
                    max_notifications_per_publish: 0,
                    priority: 1,
                },
                &now,
            )
            .unwrap();
        assert_eq!(response.revised_max_keep_alive_count, 20);
        {
            let session = server.session(session_id).unwrap();
            let session = session.read();
            assert_eq!(
                session
                    .subscriptions()
                    .get(created.subscription_id)
                    .unwrap()
                    .publish_callback_id(),
                Some(first_callback_id)
            );
        }

        // A new interval re-registers it
        server
            .modify_subscription(
                session_id,
                &ModifySubscriptionRequest {
                    subscription_id: created.subscription_id,
                    requested_publishing_interval: 250.0,
                    requested_lifetime_count: 60,
                    requested_max_keep_alive_count: 20,
                    max_notifications_per_publish: 0,
                    priority: 1,
                },
                &now,
            )
            .unwrap();
        let session = server.session(session_id).unwrap();
        let session = session.read();
        let callback_id = session
            .subscriptions()
            .get(created.subscription_id)
            .unwrap()
            .publish_callback_id()
            .unwrap();
        assert_ne!(callback_id, first_callback_id);
        assert_eq!(server.scheduler.len(), 1);
    }

    #[test]
    fn set_publishing_mode_reports_per_subscription() {
        let (mut server, session_id, _receiver) = server_with_session();
        let now = Utc::now();
        let created = server
            .create_subscription(session_id, &create_request(100.0, 30, 10), &now)
            .unwrap();
        assert_eq!(
            server
                .set_publishing_mode(session_id, false, &[])
                .unwrap_err(),
            StatusCode::BadNothingToDo
        );
        let results = server
            .set_publishing_mode(session_id, false, &[created.subscription_id, 999])
            .unwrap();
        assert_eq!(
            results,
            vec![StatusCode::Good, StatusCode::BadSubscriptionIdInvalid]
        );
        let session = server.session(session_id).unwrap();
        let session = session.read();
        assert!(!session
            .subscriptions()
            .get(created.subscription_id)
            .unwrap()
            .publishing_enabled());
    }

    #[test]
    fn keep_alive_flows_through_the_scheduler() {
        let (mut server, session_id, mut receiver) = server_with_session();
        let start = Utc::now();
        let created = server
            .create_subscription(session_id, &create_request(100.0, 3, 1), &start)
            .unwrap();
        {
            let session = server.session(session_id).unwrap();
            let mut session = session.write();
            let limits = server.config().subscriptions;
            session.enqueue_publish_request(&limits, 1, 0, &start);
        }

        // Keep alive count of 1 falls due on the first silent interval
        server.run_pending(&(start + Duration::milliseconds(100)));
        let response = recv_publish_response(&mut receiver);
        assert_eq!(response.subscription_id, created.subscription_id);
        assert_eq!(response.notification_message.notification_count(), 0);
        assert_eq!(response.notification_message.sequence_number, 1);
    }

    #[test]
    fn lifetime_expiry_deletes_the_subscription() {
        // Data is pending the whole time but no publish request ever
        // arrives; after lifetime count + 2 intervals the subscription is
        // gone
        let (mut server, session_id, _receiver) = server_with_session();
        let start = Utc::now();
        let created = server
            .create_subscription(session_id, &create_request(100.0, 3, 1), &start)
            .unwrap();
        let item = server
            .create_monitored_items(
                session_id,
                created.subscription_id,
                &[MonitoredItemCreateRequest {
                    client_handle: 1,
                    queue_size: 10,
                    discard_oldest: true,
                }],
            )
            .unwrap()[0]
            .monitored_item_id;
        {
            let session = server.session(session_id).unwrap();
            let mut session = session.write();
            session
                .subscriptions_mut()
                .get_mut(created.subscription_id)
                .unwrap()
                .notify_data_value(item, DataValue::new_now(1));
        }

        // Tick 1 marks the subscription late, ticks 2..4 count the lifetime
        // up to its limit without deleting
        for tick in 1..=4 {
            server.run_pending(&(start + Duration::milliseconds(100 * tick)));
            let session = server.session(session_id).unwrap();
            let session = session.read();
            assert!(session.subscriptions().contains(created.subscription_id));
        }

        // Tick 5 exceeds the lifetime and deletes
        server.run_pending(&(start + Duration::milliseconds(500)));
        let session = server.session(session_id).unwrap();
        let session = session.read();
        assert!(!session.subscriptions().contains(created.subscription_id));
        drop(session);
        assert!(server.scheduler.is_empty());
    }

    #[test]
    fn delete_subscription_fans_out_no_subscription() {
        let (mut server, session_id, mut receiver) = server_with_session();
        let now = Utc::now();
        let created = server
            .create_subscription(session_id, &create_request(100.0, 30, 10), &now)
            .unwrap();
        {
            let session = server.session(session_id).unwrap();
            let mut session = session.write();
            let limits = server.config().subscriptions;
            session.enqueue_publish_request(&limits, 1, 0, &now);
            session.enqueue_publish_request(&limits, 2, 0, &now);
        }

        assert_eq!(
            server.delete_subscription(session_id, created.subscription_id, &now),
            StatusCode::Good
        );
        assert!(server.scheduler.is_empty());
        for _ in 0..2 {
            let response = recv_publish_response(&mut receiver);
            assert_eq!(
                response.response_header.service_result,
                StatusCode::BadNoSubscription
            );
        }
        assert_eq!(
            server.delete_subscription(session_id, created.subscription_id, &now),
            StatusCode::BadSubscriptionIdInvalid
        );
    }

    #[test]
    fn remove_session_unhooks_publish_callbacks() {
        let (mut server, session_id, _receiver) = server_with_session();
        let now = Utc::now();
        server
            .create_subscription(session_id, &create_request(100.0, 30, 10), &now)
            .unwrap();
        server
            .create_subscription(session_id, &create_request(200.0, 30, 10), &now)
            .unwrap();
        assert_eq!(server.scheduler.len(), 2);

        assert_eq!(server.remove_session(session_id), StatusCode::Good);
        assert!(server.scheduler.is_empty());
        assert!(server.session(session_id).is_none());
        assert_eq!(
            server.remove_session(session_id),
            StatusCode::BadSessionIdInvalid
        );
    }

    #[test]
    fn operations_on_unknown_sessions_fail() {
        let mut server = Server::new(ServerConfig::default());
        let now = Utc::now();
        assert_eq!(
            server
                .create_subscription(99, &create_request(100.0, 30, 10), &now)
                .unwrap_err(),
            StatusCode::BadSessionIdInvalid
        );
        assert_eq!(
            server.delete_subscription(99, 1, &now),
            StatusCode::BadSessionIdInvalid
        );
    }
}
