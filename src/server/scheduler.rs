// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The repeated callback scheduler that drives publish ticks. The server's
//! event loop polls it with the current time; callbacks registered for the
//! same subscription can therefore never run concurrently.

use chrono::Duration;

use crate::core::handle::Handle;
use crate::server::subscriptions::duration_from_ms;
use crate::types::{DateTimeUtc, StatusCode};

pub type CallbackId = u32;

/// What a repeated callback does when it fires. Actions are data rather than
/// closures so the server dispatches them against its own state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledAction {
    /// Run the publish tick of one subscription
    PublishTick {
        session_id: u32,
        subscription_id: u32,
    },
}

#[derive(Debug)]
struct RepeatedCallback {
    callback_id: CallbackId,
    interval: Duration,
    next_due: DateTimeUtc,
    action: ScheduledAction,
}

/// Repeated callbacks in registration order. Registration is cheap and the
/// set is small (one entry per live subscription), so firing is a linear
/// sweep.
#[derive(Debug)]
pub struct Scheduler {
    callbacks: Vec<RepeatedCallback>,
    callback_ids: Handle,
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler {
            callbacks: Vec::new(),
            callback_ids: Handle::new(1),
        }
    }

    /// Registers a callback fired every `interval_ms` starting one interval
    /// from `now`, returning its handle.
    pub fn add_repeated_callback(
        &mut self,
        action: ScheduledAction,
        interval_ms: f64,
        now: &DateTimeUtc,
    ) -> Result<CallbackId, StatusCode> {
        if interval_ms <= 0.0 {
            error!("Repeated callback interval {} is invalid", interval_ms);
            return Err(StatusCode::BadInvalidArgument);
        }
        let interval = duration_from_ms(interval_ms);
        let callback_id = self.callback_ids.next();
        self.callbacks.push(RepeatedCallback {
            callback_id,
            interval,
            next_due: *now + interval,
            action,
        });
        Ok(callback_id)
    }

    /// Removes a repeated callback by handle.
    pub fn remove_repeated_callback(&mut self, callback_id: CallbackId) -> StatusCode {
        let before = self.callbacks.len();
        self.callbacks.retain(|c| c.callback_id != callback_id);
        if self.callbacks.len() == before {
            debug!("Repeated callback {} is not registered", callback_id);
            StatusCode::BadInvalidArgument
        } else {
            StatusCode::Good
        }
    }

    /// Returns the actions due at `now`, in registration order, re-arming
    /// each at `now + interval`. A poll that arrives late fires the callback
    /// once rather than replaying missed intervals.
    pub fn pop_due(&mut self, now: &DateTimeUtc) -> Vec<ScheduledAction> {
        let mut due = Vec::new();
        for callback in self.callbacks.iter_mut() {
            if callback.next_due <= *now {
                callback.next_due = *now + callback.interval;
                due.push(callback.action);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}
