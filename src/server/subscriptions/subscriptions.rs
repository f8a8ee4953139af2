// UAMon for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::server::subscriptions::subscription::Subscription;

/// The subscriptions belonging to a single session, in creation order.
/// Lookup is a linear scan; sessions hold few subscriptions in practice and
/// a map keyed by id would be a drop-in change otherwise.
#[derive(Debug, Default)]
pub struct Subscriptions {
    subscriptions: Vec<Subscription>,
}

impl Subscriptions {
    pub fn new() -> Subscriptions {
        Subscriptions {
            subscriptions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn contains(&self, subscription_id: u32) -> bool {
        self.subscriptions
            .iter()
            .any(|s| s.subscription_id() == subscription_id)
    }

    pub fn subscription_ids(&self) -> Vec<u32> {
        self.subscriptions
            .iter()
            .map(|s| s.subscription_id())
            .collect()
    }

    pub fn insert(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn remove(&mut self, subscription_id: u32) -> Option<Subscription> {
        let idx = self
            .subscriptions
            .iter()
            .position(|s| s.subscription_id() == subscription_id)?;
        Some(self.subscriptions.remove(idx))
    }

    pub fn get(&self, subscription_id: u32) -> Option<&Subscription> {
        self.subscriptions
            .iter()
            .find(|s| s.subscription_id() == subscription_id)
    }

    pub fn get_mut(&mut self, subscription_id: u32) -> Option<&mut Subscription> {
        self.subscriptions
            .iter_mut()
            .find(|s| s.subscription_id() == subscription_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.iter()
    }
}
