// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `DataValue`.

use crate::types::{date_time::DateTime, status_code::StatusCode, variant::Variant};

/// A data value is a value of a variable in the server and contains
/// information about its value, status and change timestamps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataValue {
    /// The value. Not present if the value is null.
    pub value: Option<Variant>,
    /// The status associated with the value. Not present when Good.
    pub status: Option<StatusCode>,
    /// The source timestamp associated with the value.
    pub source_timestamp: Option<DateTime>,
    /// The server timestamp associated with the value.
    pub server_timestamp: Option<DateTime>,
}

impl DataValue {
    /// Creates a data value given the supplied value, stamped with the current time
    pub fn new_now<V>(value: V) -> DataValue
    where
        V: Into<Variant>,
    {
        let now = DateTime::now();
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(now),
            server_timestamp: Some(now),
        }
    }

    /// Creates a data value given the supplied value and timestamp
    pub fn new_at<V>(value: V, time: DateTime) -> DataValue
    where
        V: Into<Variant>,
    {
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(time),
            server_timestamp: Some(time),
        }
    }

    /// The status of the value, `Good` when unset
    pub fn status(&self) -> StatusCode {
        self.status.map_or(StatusCode::Good, |s| s.status())
    }
}
