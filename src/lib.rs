// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The server-side subscription publishing engine of an OPC UA style
//! monitoring service. A subscription periodically samples the notification
//! queues of its monitored items, batches value changes into notification
//! messages, pairs each message with a publish request envelope queued by the
//! client and delivers it over the session's secure channel, maintaining
//! sequence numbering, a bounded retransmission queue, keep-alive and
//! lifetime expiry along the way.
//!
//! Wire encoding, secure channel encryption and session establishment live
//! outside this crate; the engine consumes the session's publish request
//! queue and channel send half and the scheduler's repeated callback
//! contract.

#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::float_cmp)]

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

/// Tracing macro for obtaining a read lock on a `RwLock`. Sometimes deadlocks
/// can happen in code, and if they do, this macro is useful for finding out
/// where they happened.
#[macro_export]
macro_rules! trace_read_lock {
    ( $x:expr ) => {{
        let v = $x.read();
        v
    }};
}

/// Tracing macro for obtaining a write lock on a `RwLock`.
#[macro_export]
macro_rules! trace_write_lock {
    ( $x:expr ) => {{
        let v = $x.write();
        v
    }};
}

pub mod core;
pub mod server;
pub mod types;

pub mod prelude {
    pub use crate::core::comms::{SecureChannel, SentMessage};
    pub use crate::core::supported_message::SupportedMessage;
    pub use crate::server::config::{ServerConfig, SubscriptionLimits};
    pub use crate::server::server::Server;
    pub use crate::server::session::Session;
    pub use crate::server::subscriptions::monitored_item::{MonitoredItem, QueuedValue};
    pub use crate::server::subscriptions::retransmission::RetransmissionQueue;
    pub use crate::server::subscriptions::subscription::{Subscription, SubscriptionState};
    pub use crate::server::subscriptions::PublishResponseEntry;
    pub use crate::types::*;
}
