// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Types shared between the engine and its consumers - status codes, values
//! and the service request / response structures of the publish path.

pub mod data_value;
pub mod date_time;
pub mod notification_message;
pub mod service_types;
pub mod status_code;
pub mod variant;

pub use self::data_value::DataValue;
pub use self::date_time::{DateTime, DateTimeUtc};
pub use self::service_types::*;
pub use self::status_code::StatusCode;
pub use self::variant::Variant;
