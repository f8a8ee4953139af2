// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Server configuration. Every limit has a server default so a partial
//! config deserializes into something usable.

/// Limits specific to subscriptions and the publish path.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionLimits {
    #[serde(default = "defaults::max_subscriptions_per_session")]
    pub max_subscriptions_per_session: usize,
    /// Maximum number of monitored items per subscription, 0 for no limit
    #[serde(default = "defaults::max_monitored_items_per_sub")]
    pub max_monitored_items_per_sub: usize,
    #[serde(default = "defaults::max_pending_publish_requests")]
    pub max_pending_publish_requests: usize,
    /// Specifies the minimum publishing interval for this server in milliseconds
    #[serde(default = "defaults::min_publishing_interval_ms")]
    pub min_publishing_interval_ms: f64,
    #[serde(default = "defaults::max_keep_alive_count")]
    pub max_keep_alive_count: u32,
    #[serde(default = "defaults::default_keep_alive_count")]
    pub default_keep_alive_count: u32,
    /// Maximum lifetime count (3 times as large as max keep alive)
    #[serde(default = "defaults::max_lifetime_count")]
    pub max_lifetime_count: u32,
    /// Maximum number of notifications per publish message, 0 for no limit
    #[serde(default = "defaults::max_notifications_per_publish")]
    pub max_notifications_per_publish: usize,
    /// Maximum number of values in a monitored item queue
    #[serde(default = "defaults::max_monitored_item_queue_size")]
    pub max_monitored_item_queue_size: usize,
    /// Maximum number of sent notifications retained for retransmission per
    /// subscription, 0 for no limit
    #[serde(default = "defaults::max_retransmission_queue_size")]
    pub max_retransmission_queue_size: usize,
    /// Ceiling in milliseconds on the timeout hint of queued publish requests
    #[serde(default = "defaults::max_request_timeout_ms")]
    pub max_request_timeout_ms: i64,
}

impl Default for SubscriptionLimits {
    fn default() -> Self {
        Self {
            max_subscriptions_per_session: defaults::max_subscriptions_per_session(),
            max_monitored_items_per_sub: defaults::max_monitored_items_per_sub(),
            max_pending_publish_requests: defaults::max_pending_publish_requests(),
            min_publishing_interval_ms: defaults::min_publishing_interval_ms(),
            max_keep_alive_count: defaults::max_keep_alive_count(),
            default_keep_alive_count: defaults::default_keep_alive_count(),
            max_lifetime_count: defaults::max_lifetime_count(),
            max_notifications_per_publish: defaults::max_notifications_per_publish(),
            max_monitored_item_queue_size: defaults::max_monitored_item_queue_size(),
            max_retransmission_queue_size: defaults::max_retransmission_queue_size(),
            max_request_timeout_ms: defaults::max_request_timeout_ms(),
        }
    }
}

/// Configuration of the publish engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub subscriptions: SubscriptionLimits,
}

impl ServerConfig {
    /// Tests the configuration for values that cannot work, logging each
    /// problem found.
    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        let limits = &self.subscriptions;
        if limits.min_publishing_interval_ms <= 0.0 {
            error!("Server config minimum publishing interval must be > 0");
            valid = false;
        }
        if limits.default_keep_alive_count == 0 {
            error!("Server config default keep alive count must be > 0");
            valid = false;
        }
        if limits.max_keep_alive_count < limits.default_keep_alive_count {
            error!("Server config max keep alive count is below the default");
            valid = false;
        }
        if limits.max_request_timeout_ms <= 0 {
            error!("Server config max request timeout must be > 0");
            valid = false;
        }
        valid
    }
}

mod defaults {
    use crate::server::constants;

    pub fn max_subscriptions_per_session() -> usize {
        constants::MAX_SUBSCRIPTIONS_PER_SESSION
    }
    pub fn max_monitored_items_per_sub() -> usize {
        constants::MAX_MONITORED_ITEMS_PER_SUB
    }
    pub fn max_pending_publish_requests() -> usize {
        constants::MAX_PENDING_PUBLISH_REQUESTS
    }
    pub fn min_publishing_interval_ms() -> f64 {
        constants::MIN_PUBLISHING_INTERVAL_MS
    }
    pub fn max_keep_alive_count() -> u32 {
        constants::MAX_KEEP_ALIVE_COUNT
    }
    pub fn default_keep_alive_count() -> u32 {
        constants::DEFAULT_KEEP_ALIVE_COUNT
    }
    pub fn max_lifetime_count() -> u32 {
        constants::MAX_LIFETIME_COUNT
    }
    pub fn max_notifications_per_publish() -> usize {
        constants::MAX_NOTIFICATIONS_PER_PUBLISH
    }
    pub fn max_monitored_item_queue_size() -> usize {
        constants::MAX_DATA_CHANGE_QUEUE_SIZE
    }
    pub fn max_retransmission_queue_size() -> usize {
        constants::MAX_RETRANSMISSION_QUEUE_SIZE
    }
    pub fn max_request_timeout_ms() -> i64 {
        constants::MAX_REQUEST_TIMEOUT_MS
    }
}
