// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Constants that govern the internal workings of the server impl. The
//! configurable limits default to these values.

/// Minimum publishing interval for subscriptions in milliseconds. Requested
/// intervals below this are revised up.
pub const MIN_PUBLISHING_INTERVAL_MS: f64 = 50.0;
/// Default keep alive count, used when the client requests 0
pub const DEFAULT_KEEP_ALIVE_COUNT: u32 = 10;
/// Maximum keep alive count
pub const MAX_KEEP_ALIVE_COUNT: u32 = 30000;
/// Maximum lifetime count (the protocol requires at least 3 times the keep alive count)
pub const MAX_LIFETIME_COUNT: u32 = 3 * MAX_KEEP_ALIVE_COUNT;
/// Maximum number of notifications in a single publish response, 0 for no limit
pub const MAX_NOTIFICATIONS_PER_PUBLISH: usize = 0;
/// Default maximum number of subscriptions in a session
pub const MAX_SUBSCRIPTIONS_PER_SESSION: usize = 100;
/// Default maximum number of monitored items in a subscription, 0 for no limit
pub const MAX_MONITORED_ITEMS_PER_SUB: usize = 1000;
/// Maximum number of publish requests a session may hold queued
pub const MAX_PENDING_PUBLISH_REQUESTS: usize = 100;
/// Maximum time in milliseconds a queued publish request is honored before it
/// is answered with a timeout fault. Client supplied hints are clamped to this.
pub const MAX_REQUEST_TIMEOUT_MS: i64 = 30000;
/// Maximum number of sent notification messages retained for retransmission
/// per subscription, 0 for no limit
pub const MAX_RETRANSMISSION_QUEUE_SIZE: usize = 32;
/// Maximum data change queue allowed by clients on monitored items
pub const MAX_DATA_CHANGE_QUEUE_SIZE: usize = 10;
/// Minimum data change queue size
pub const MIN_DATA_CHANGE_QUEUE_SIZE: usize = 1;
/// Queue size assigned when the client requests 0
pub const DEFAULT_DATA_CHANGE_QUEUE_SIZE: usize = 1;
