// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The send half of a secure channel. Chunking, signing and encryption happen
//! in the transport underneath the receiver; from the engine's point of view
//! a send is fire-and-forget.

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::core::supported_message::SupportedMessage;
use crate::types::status_code::StatusCode;

/// A message handed to the transport, tagged with the request id of the
/// publish request it answers so the client can correlate them.
#[derive(Debug)]
pub struct SentMessage {
    pub request_id: u32,
    pub message: SupportedMessage,
}

/// The engine-facing handle of a secure channel.
#[derive(Debug, Clone)]
pub struct SecureChannel {
    sender: UnboundedSender<SentMessage>,
}

impl SecureChannel {
    pub fn new(sender: UnboundedSender<SentMessage>) -> SecureChannel {
        SecureChannel { sender }
    }

    /// Creates a channel pair, returning the engine half and the receiver the
    /// transport (or a test) drains.
    pub fn unbounded() -> (SecureChannel, UnboundedReceiver<SentMessage>) {
        let (sender, receiver) = unbounded_channel();
        (SecureChannel { sender }, receiver)
    }

    /// Sends a message type MSG symmetrically secured message. The engine
    /// ignores the result on the publish path - a torn down transport just
    /// drops the message.
    pub fn send_symmetric_message(&self, request_id: u32, message: SupportedMessage) -> StatusCode {
        match self.sender.send(SentMessage {
            request_id,
            message,
        }) {
            Ok(()) => StatusCode::Good,
            Err(_) => {
                debug!(
                    "Secure channel receiver is gone, dropping response for request {}",
                    request_id
                );
                StatusCode::BadCommunicationError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::service_types::{ResponseHeader, ServiceFault};
    use crate::types::DateTime;

    fn fault() -> SupportedMessage {
        ServiceFault {
            response_header: ResponseHeader::new_timestamped_service_result(
                DateTime::now(),
                StatusCode::BadRequestTimeout,
            ),
        }
        .into()
    }

    #[test]
    fn send_and_receive() {
        let (channel, mut receiver) = SecureChannel::unbounded();
        assert_eq!(channel.send_symmetric_message(55, fault()), StatusCode::Good);
        let sent = receiver.try_recv().unwrap();
        assert_eq!(sent.request_id, 55);
        assert_eq!(sent.message.service_result(), StatusCode::BadRequestTimeout);
    }

    #[test]
    fn send_after_receiver_dropped() {
        let (channel, receiver) = SecureChannel::unbounded();
        drop(receiver);
        assert_eq!(
            channel.send_symmetric_message(1, fault()),
            StatusCode::BadCommunicationError
        );
    }
}
