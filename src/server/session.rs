// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::collections::VecDeque;

use crate::core::comms::SecureChannel;
use crate::server::config::SubscriptionLimits;
use crate::server::subscriptions::subscription::TickResult;
use crate::server::subscriptions::subscriptions::Subscriptions;
use crate::server::subscriptions::PublishResponseEntry;
use crate::types::{
    DateTime, DateTimeUtc, NotificationMessage, PublishResponse, ResponseHeader, ServiceFault,
    StatusCode, SubscriptionAcknowledgement,
};

/// The server side state of one client session, as far as the publish engine
/// is concerned: the subscriptions the session owns, the queue of publish
/// request envelopes the client has pre-queued, and the send half of the
/// secure channel the responses go out on. Establishment, authentication and
/// the rest of session state live in the layer above.
pub struct Session {
    session_id: u32,
    /// Secure channel state. Absent until the transport attaches one, in
    /// which case publishing silently stands still.
    secure_channel: Option<SecureChannel>,
    /// Publish request envelopes, oldest first
    response_queue: VecDeque<PublishResponseEntry>,
    /// Subscriptions associated with the session
    subscriptions: Subscriptions,
}

impl Session {
    pub fn new(session_id: u32) -> Session {
        Session {
            session_id,
            secure_channel: None,
            response_queue: VecDeque::new(),
            subscriptions: Subscriptions::new(),
        }
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn set_secure_channel(&mut self, secure_channel: SecureChannel) {
        self.secure_channel = Some(secure_channel);
    }

    /// Detaches the channel, e.g. when the transport drops. Queued requests
    /// and subscriptions stay; publishing resumes when a channel returns.
    pub fn clear_secure_channel(&mut self) {
        self.secure_channel = None;
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub fn subscriptions_mut(&mut self) -> &mut Subscriptions {
        &mut self.subscriptions
    }

    pub fn publish_request_queue_len(&self) -> usize {
        self.response_queue.len()
    }

    /// Queues the envelope for a publish request the client just sent. The
    /// response shell is allocated here, up front, so the publish tick always
    /// has one ready to fill in.
    pub fn enqueue_publish_request(
        &mut self,
        limits: &SubscriptionLimits,
        request_id: u32,
        timeout_hint: u32,
        now: &DateTimeUtc,
    ) -> StatusCode {
        if self.response_queue.len() >= limits.max_pending_publish_requests {
            error!(
                "Session {} | too many publish requests, throwing it away",
                self.session_id
            );
            return StatusCode::BadTooManyPublishRequests;
        }
        let timeout = if timeout_hint > 0 && (timeout_hint as i64) < limits.max_request_timeout_ms {
            timeout_hint as i64
        } else {
            limits.max_request_timeout_ms
        };
        self.response_queue.push_back(PublishResponseEntry {
            request_id,
            deadline: *now + chrono::Duration::milliseconds(timeout),
            response: PublishResponse::shell(),
        });
        StatusCode::Good
    }

    /// Deletes the acknowledged notifications, returning a status for each
    /// acknowledgement according to whether it was found or not.
    pub fn acknowledge_notifications(
        &mut self,
        acknowledgements: &[SubscriptionAcknowledgement],
    ) -> Option<Vec<StatusCode>> {
        if acknowledgements.is_empty() {
            return None;
        }
        trace!(
            "Session {} | processing {} subscription acknowledgements",
            self.session_id,
            acknowledgements.len()
        );
        Some(
            acknowledgements
                .iter()
                .map(|ack| {
                    match self.subscriptions.get_mut(ack.subscription_id) {
                        Some(subscription) => {
                            subscription.acknowledge_notification(ack.sequence_number)
                        }
                        None => StatusCode::BadSubscriptionIdInvalid,
                    }
                })
                .collect(),
        )
    }

    /// Answers queued publish requests that outlived their timeout hint with
    /// a timeout fault and removes them.
    pub fn expire_stale_publish_requests(&mut self, now: &DateTimeUtc) {
        let Some(channel) = self.secure_channel.as_ref() else {
            return;
        };
        while let Some(idx) = self.response_queue.iter().position(|e| e.deadline <= *now) {
            let entry = self.response_queue.remove(idx).unwrap();
            debug!(
                "Session {} | publish request {} has expired",
                self.session_id, entry.request_id
            );
            let fault = ServiceFault::new(DateTime::from(*now), StatusCode::BadRequestTimeout);
            let _ = channel.send_symmetric_message(entry.request_id, fault.into());
        }
    }

    /// Runs the publish tick of one subscription against this session's
    /// envelope queue and channel.
    pub(crate) fn publish_tick(
        &mut self,
        limits: &SubscriptionLimits,
        subscription_id: u32,
        now: &DateTimeUtc,
    ) -> TickResult {
        let channel = self.secure_channel.as_ref();
        let Some(subscription) = self.subscriptions.get_mut(subscription_id) else {
            return TickResult::None;
        };
        subscription.publish_tick(limits, &mut self.response_queue, channel, now)
    }

    /// When the session has publish requests queued but its last subscription
    /// was deleted, every queued request is answered with an empty response
    /// carrying `BadNoSubscription`.
    pub fn answer_publish_requests_no_subscription(&mut self, now: &DateTimeUtc) {
        if !self.subscriptions.is_empty() {
            return;
        }
        while let Some(entry) = self.response_queue.pop_front() {
            debug!(
                "Session {} | answering publish request {} with no-subscription",
                self.session_id, entry.request_id
            );
            let mut response = entry.response;
            response.response_header = ResponseHeader::new_timestamped_service_result(
                DateTime::from(*now),
                StatusCode::BadNoSubscription,
            );
            if let Some(channel) = self.secure_channel.as_ref() {
                let _ = channel.send_symmetric_message(entry.request_id, response.into());
            }
        }
    }

    /// Returns the retained notification message a client asked to be sent
    /// again.
    pub fn republish(
        &self,
        subscription_id: u32,
        sequence_number: u32,
    ) -> Result<NotificationMessage, StatusCode> {
        let subscription = self
            .subscriptions
            .get(subscription_id)
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        subscription.find_notification_message(sequence_number)
    }
}
