// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `DateTime`.

use std::fmt;

use chrono::{TimeZone, Utc};

pub type DateTimeUtc = chrono::DateTime<Utc>;

/// A date/time value. This is a thin wrapper around the chrono type used in
/// message fields - publish times, response timestamps.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct DateTime {
    date_time: DateTimeUtc,
}

impl DateTime {
    /// The current time
    pub fn now() -> DateTime {
        DateTime {
            date_time: Utc::now(),
        }
    }

    /// The unix epoch, used as the null value of an unset timestamp
    pub fn epoch() -> DateTime {
        DateTime {
            date_time: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    /// The time as the underlying chrono type
    pub fn as_chrono(&self) -> DateTimeUtc {
        self.date_time
    }
}

impl Default for DateTime {
    fn default() -> Self {
        DateTime::epoch()
    }
}

impl From<DateTimeUtc> for DateTime {
    fn from(date_time: DateTimeUtc) -> Self {
        DateTime { date_time }
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.date_time.to_rfc3339())
    }
}
