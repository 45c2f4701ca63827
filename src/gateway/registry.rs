use dashmap::DashMap;
use uuid::Uuid;

use super::session::ConnectionHandle;
use crate::error::DeliveryError;

/// Outcome of a targeted send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    NotConnected,
    /// The handle was stale; its entry has been removed.
    Failed,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Identities whose entries were pruned after failing delivery.
    pub pruned: Vec<String>,
}

/// Maps each authenticated user to its single live connection.
///
/// Shard locks are held only for the map operation itself; handles are
/// cloned out before anything is sent through them.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handle` for `user_id`, returning the handle it replaced.
    pub fn register(&self, user_id: &str, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.connections.insert(user_id.to_string(), handle)
    }

    pub fn unregister(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.connections.remove(user_id).map(|(_, handle)| handle)
    }

    /// Remove the entry for `user_id` only if it still belongs to
    /// `connection_id`.
    pub fn unregister_connection(&self, user_id: &str, connection_id: Uuid) -> bool {
        self.connections
            .remove_if(user_id, |_, handle| handle.id() == connection_id)
            .is_some()
    }

    pub fn get(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.connections.get(user_id).map(|entry| entry.value().clone())
    }

    pub fn is_connected(&self, user_id: &str) -> bool {
        self.connections.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn send_to(&self, user_id: &str, text: String) -> Delivery {
        let Some(handle) = self.get(user_id) else {
            return Delivery::NotConnected;
        };
        match handle.deliver(text) {
            Ok(()) => Delivery::Delivered,
            Err(DeliveryError) => {
                self.prune(user_id, &handle);
                Delivery::Failed
            }
        }
    }

    /// Deliver `text` to every registered connection. Failed entries are
    /// pruned once the whole sweep has finished.
    pub fn broadcast(&self, text: &str) -> BroadcastReport {
        let snapshot: Vec<(String, ConnectionHandle)> = self
            .connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for (user_id, handle) in snapshot {
            match handle.deliver(text.to_string()) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError) => failed.push((user_id, handle)),
            }
        }

        for (user_id, handle) in failed {
            if self.prune(&user_id, &handle) {
                report.pruned.push(user_id);
            }
        }
        report
    }

    fn prune(&self, user_id: &str, stale: &ConnectionHandle) -> bool {
        let removed = self.unregister_connection(user_id, stale.id());
        if removed {
            tracing::debug!(user_id, connection_id = %stale.id(), "pruned stale connection");
        }
        removed
    }
}
