// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the `StatusCode` type. Only the codes the engine can produce or
//! receive are defined; the numeric values are the protocol's.

#![allow(non_upper_case_globals)]

use std::{
    error::Error,
    fmt,
    fmt::Formatter,
    io,
};

use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

bitflags! {
    pub struct StatusCode: u32 {
        const Good = 0x0000_0000;
        const BadUnexpectedError = 0x8001_0000;
        const BadInternalError = 0x8002_0000;
        const BadOutOfMemory = 0x8003_0000;
        const BadCommunicationError = 0x8005_0000;
        const BadTimeout = 0x800A_0000;
        const BadNothingToDo = 0x800F_0000;
        const BadSessionIdInvalid = 0x8025_0000;
        const BadSubscriptionIdInvalid = 0x8028_0000;
        const BadMonitoredItemIdInvalid = 0x8042_0000;
        const BadTooManyPublishRequests = 0x806D_0000;
        const BadNoSubscription = 0x806E_0000;
        const BadTooManySubscriptions = 0x8077_0000;
        const BadMessageNotAvailable = 0x8079_0000;
        const BadSequenceNumberUnknown = 0x807A_0000;
        const BadInvalidArgument = 0x80AB_0000;
        const BadRequestTimeout = 0x80AC_0000;
        const BadTooManyMonitoredItems = 0x80DB_0000;

        // Mask for the status code section
        const STATUS_MASK = 0xFFFF_0000;
        // Mask for the bits section
        const BIT_MASK = 0x0000_FFFF;

        const IS_ERROR = 0x8000_0000;
        const IS_UNCERTAIN = 0x4000_0000;
    }
}

impl StatusCode {
    /// Returns the status only, i.e. it masks out any bit flags that come with the status code
    pub fn status(&self) -> StatusCode {
        *self & StatusCode::STATUS_MASK
    }

    /// Returns the bit flags of the status code, i.e. it masks out the actual status code value
    pub fn bitflags(&self) -> StatusCode {
        *self & StatusCode::BIT_MASK
    }

    /// Tests if the status code is bad
    pub fn is_bad(&self) -> bool {
        self.contains(StatusCode::IS_ERROR)
    }

    /// Tests if the status code is uncertain
    pub fn is_uncertain(&self) -> bool {
        self.contains(StatusCode::IS_UNCERTAIN)
    }

    /// Tests if the status code is good (i.e. not bad or uncertain)
    pub fn is_good(&self) -> bool {
        !self.is_bad() && !self.is_uncertain()
    }

    pub fn name(&self) -> &'static str {
        let status = self.status();
        if status == StatusCode::Good {
            "Good"
        } else if status == StatusCode::BadUnexpectedError {
            "BadUnexpectedError"
        } else if status == StatusCode::BadInternalError {
            "BadInternalError"
        } else if status == StatusCode::BadOutOfMemory {
            "BadOutOfMemory"
        } else if status == StatusCode::BadCommunicationError {
            "BadCommunicationError"
        } else if status == StatusCode::BadTimeout {
            "BadTimeout"
        } else if status == StatusCode::BadNothingToDo {
            "BadNothingToDo"
        } else if status == StatusCode::BadSessionIdInvalid {
            "BadSessionIdInvalid"
        } else if status == StatusCode::BadSubscriptionIdInvalid {
            "BadSubscriptionIdInvalid"
        } else if status == StatusCode::BadMonitoredItemIdInvalid {
            "BadMonitoredItemIdInvalid"
        } else if status == StatusCode::BadTooManyPublishRequests {
            "BadTooManyPublishRequests"
        } else if status == StatusCode::BadNoSubscription {
            "BadNoSubscription"
        } else if status == StatusCode::BadTooManySubscriptions {
            "BadTooManySubscriptions"
        } else if status == StatusCode::BadMessageNotAvailable {
            "BadMessageNotAvailable"
        } else if status == StatusCode::BadSequenceNumberUnknown {
            "BadSequenceNumberUnknown"
        } else if status == StatusCode::BadInvalidArgument {
            "BadInvalidArgument"
        } else if status == StatusCode::BadRequestTimeout {
            "BadRequestTimeout"
        } else if status == StatusCode::BadTooManyMonitoredItems {
            "BadTooManyMonitoredItems"
        } else {
            "Unknown"
        }
    }
}

// The bitflags! macro implements Debug for StatusCode but it fouls the display because status
// codes are a combination of bits and unique values.

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let bits = self.bitflags();
        if bits.is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}+{:?}", self.name(), bits)
        }
    }
}

impl Error for StatusCode {}

impl From<StatusCode> for io::Error {
    fn from(e: StatusCode) -> io::Error {
        io::Error::new(io::ErrorKind::Other, format!("StatusCode {}", e))
    }
}

// Serialize / Deserialize are manually implemented because bitflags! doesn't do it.

impl Serialize for StatusCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

struct StatusCodeVisitor;

impl<'de> Visitor<'de> for StatusCodeVisitor {
    type Value = u32;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an unsigned 32-bit integer")
    }

    fn visit_u32<E>(self, value: u32) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value)
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, <D as Deserializer<'de>>::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(StatusCode::from_bits_truncate(
            deserializer.deserialize_u32(StatusCodeVisitor)?,
        ))
    }
}

#[test]
fn status_code() {
    assert!(StatusCode::Good.is_good());
    assert!(!StatusCode::Good.is_bad());
    assert!(!StatusCode::Good.is_uncertain());

    assert!(StatusCode::BadSequenceNumberUnknown.is_bad());
    assert!(!StatusCode::BadSequenceNumberUnknown.is_uncertain());
    assert!(!StatusCode::BadSequenceNumberUnknown.is_good());

    assert_eq!(StatusCode::BadNoSubscription.name(), "BadNoSubscription");
    assert_eq!(format!("{}", StatusCode::BadOutOfMemory), "BadOutOfMemory");
}
