// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{DateTimeUtc, PublishResponse};

/// A queued publish request. The entry preserves the request_id which is part
/// of the chunk layer but clients are fickle about receiving responses for
/// the request they sent. Requests and responses are normally synchronous but
/// publish requests are async, so the id is kept so that the response paired
/// with the envelope later carries the proper request id.
#[derive(Debug)]
pub struct PublishResponseEntry {
    /// The request id
    pub request_id: u32,
    /// When the queued request stops being honored and is answered with a
    /// timeout fault instead
    pub deadline: DateTimeUtc,
    /// The pre-allocated response shell filled in at publish time
    pub response: PublishResponse,
}

/// Converts an interval in milliseconds into a time duration. Intervals are
/// floating point millis, so work in microseconds for greater accuracy.
pub(crate) fn duration_from_ms(d: f64) -> chrono::Duration {
    chrono::Duration::microseconds((d * 1000f64) as i64)
}

pub mod monitored_item;
pub mod retransmission;
pub mod subscription;
pub mod subscriptions;
