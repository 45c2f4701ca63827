use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use super::events::{Notification, ServerEvent};
use super::registry::{BroadcastReport, ConnectionRegistry, Delivery};

/// Builds stamped envelopes and hands them to the registry. Cloneable, so
/// request handlers can hold one to push live notifications.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Fan a chat payload from `sender` out to every connection, the
    /// sender's own included.
    pub fn relay(&self, sender: &str, data: Value) -> BroadcastReport {
        let event = ServerEvent::message(sender, data, Utc::now());
        let report = self.registry.broadcast(&event.to_json());
        if !report.pruned.is_empty() {
            tracing::debug!(
                sender,
                pruned = report.pruned.len(),
                "dropped stale connections during relay"
            );
        }
        report
    }

    pub fn notify(&self, user_id: &str, kind: &str, data: Value) -> Delivery {
        let note = Notification::new(kind, data, Utc::now());
        self.registry.send_to(user_id, note.to_json())
    }

    pub fn notify_all(&self, kind: &str, data: Value) -> BroadcastReport {
        let note = Notification::new(kind, data, Utc::now());
        self.registry.broadcast(&note.to_json())
    }
}
