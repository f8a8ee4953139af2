// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Defines the messages the engine can push down a secure channel. The full
//! protocol has many more; the publish path only ever emits these two.

use crate::types::service_types::{PublishResponse, ServiceFault};

#[derive(Debug, Clone, PartialEq)]
pub enum SupportedMessage {
    PublishResponse(PublishResponse),
    ServiceFault(ServiceFault),
}

impl From<PublishResponse> for SupportedMessage {
    fn from(value: PublishResponse) -> Self {
        SupportedMessage::PublishResponse(value)
    }
}

impl From<ServiceFault> for SupportedMessage {
    fn from(value: ServiceFault) -> Self {
        SupportedMessage::ServiceFault(value)
    }
}

impl SupportedMessage {
    /// The service result carried in the message's response header.
    pub fn service_result(&self) -> crate::types::StatusCode {
        match self {
            SupportedMessage::PublishResponse(r) => r.response_header.service_result,
            SupportedMessage::ServiceFault(f) => f.response_header.service_result,
        }
    }
}
