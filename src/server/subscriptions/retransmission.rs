// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::collections::VecDeque;

use crate::types::{NotificationMessage, StatusCode};

/// A sent notification message retained until the client acknowledges it or
/// it is evicted. The sequence number is duplicated out of the message so
/// scans don't reach into it.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessageEntry {
    pub sequence_number: u32,
    pub message: NotificationMessage,
}

/// The retransmission queue of a subscription. Newest entries sit at the
/// front; when the queue is at capacity the oldest entry at the back is
/// evicted, on the assumption that an old unacknowledged message is stale.
///
/// Lookups are linear scans. The queue is bounded by a small configured cap
/// so a map keyed by sequence number would be a drop-in change if that ever
/// stops holding.
#[derive(Debug, Default)]
pub struct RetransmissionQueue {
    entries: VecDeque<NotificationMessageEntry>,
}

impl RetransmissionQueue {
    pub fn new() -> RetransmissionQueue {
        RetransmissionQueue {
            entries: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ensures the next `insert` cannot allocate. Called before notification
    /// assembly starts so an allocation failure leaves the monitored item
    /// queues untouched.
    pub(crate) fn try_reserve(&mut self, cap: usize) -> Result<(), StatusCode> {
        if cap > 0 && self.entries.len() >= cap {
            // Insertion will evict rather than grow
            Ok(())
        } else {
            self.entries
                .try_reserve(1)
                .map_err(|_| StatusCode::BadOutOfMemory)
        }
    }

    /// Adds a sent message at the front. If the queue is at a non-zero cap
    /// the oldest entry is evicted first; a cap of 0 means unbounded.
    pub fn insert(&mut self, message: NotificationMessage, cap: usize) {
        if cap > 0 && self.entries.len() >= cap {
            if let Some(evicted) = self.entries.pop_back() {
                debug!(
                    "Evicting unacknowledged notification {} from the retransmission queue",
                    evicted.sequence_number
                );
            }
        }
        self.entries.push_front(NotificationMessageEntry {
            sequence_number: message.sequence_number,
            message,
        });
    }

    /// Removes the entry acknowledged by the client. Sequence numbers wrap,
    /// so matching is by equality only.
    pub fn remove(&mut self, sequence_number: u32) -> Result<(), StatusCode> {
        let Some(idx) = self
            .entries
            .iter()
            .position(|e| e.sequence_number == sequence_number)
        else {
            return Err(StatusCode::BadSequenceNumberUnknown);
        };
        let _ = self.entries.remove(idx);
        Ok(())
    }

    /// Finds a buffered message by sequence number, for republish.
    pub fn find(&self, sequence_number: u32) -> Option<&NotificationMessage> {
        self.entries
            .iter()
            .find(|e| e.sequence_number == sequence_number)
            .map(|e| &e.message)
    }

    /// The sequence numbers currently buffered, in queue order (newest
    /// first), as sent in `available_sequence_numbers`. `None` when empty.
    pub fn available_sequence_numbers(&self) -> Option<Vec<u32>> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.iter().map(|e| e.sequence_number).collect())
        }
    }

    /// Drops every entry. Called when the subscription is deleted.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
