use tokio::sync::mpsc;
use uuid::Uuid;

use super::registry::ConnectionRegistry;
use crate::error::DeliveryError;

/// Frames queued for a connection's writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    /// Ask the owning gateway to close its socket.
    Close,
}

/// Send capability for one live connection. Cloning shares the same
/// underlying queue; the owning gateway holds the receiving end.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a text frame. Never blocks; fails once the owning gateway has
    /// dropped its receiver.
    pub fn deliver(&self, text: String) -> Result<(), DeliveryError> {
        self.tx.send(Outbound::Text(text)).map_err(|_| DeliveryError)
    }

    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    AwaitingAuth,
    Authenticated { user_id: String },
    Closed,
}

/// Per-connection lifecycle. Owns the connection's handle and, once
/// authenticated, its single registry entry.
#[derive(Debug)]
pub struct GatewaySession {
    handle: ConnectionHandle,
    state: SessionState,
}

impl GatewaySession {
    pub fn new(handle: ConnectionHandle) -> Self {
        Self {
            handle,
            state: SessionState::Accepted,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.handle.id()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user_id(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { user_id } => Some(user_id),
            _ => None,
        }
    }

    pub fn await_auth(&mut self) {
        if self.state == SessionState::Accepted {
            self.state = SessionState::AwaitingAuth;
        }
    }

    /// Register this connection under `user_id`. Returns the handle it
    /// displaced, if the identity was already connected elsewhere.
    pub fn authenticate(
        &mut self,
        registry: &ConnectionRegistry,
        user_id: String,
    ) -> Option<ConnectionHandle> {
        if self.state != SessionState::AwaitingAuth {
            return None;
        }
        let superseded = registry.register(&user_id, self.handle.clone());
        self.state = SessionState::Authenticated { user_id };
        superseded
    }

    /// Idempotent teardown. Only an authenticated session owns a registry
    /// entry, and only the entry still pointing at this connection is removed.
    pub fn close(&mut self, registry: &ConnectionRegistry) {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        if let SessionState::Authenticated { user_id } = previous {
            registry.unregister_connection(&user_id, self.handle.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (GatewaySession, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (GatewaySession::new(ConnectionHandle::new(tx)), rx)
    }

    #[test]
    fn test_handshake_transitions() {
        let registry = ConnectionRegistry::new();
        let (mut session, _rx) = session();
        assert_eq!(session.state(), &SessionState::Accepted);

        session.await_auth();
        assert_eq!(session.state(), &SessionState::AwaitingAuth);

        session.authenticate(&registry, "alice".to_string());
        assert_eq!(session.user_id(), Some("alice"));
        assert_eq!(
            registry.get("alice").map(|h| h.id()),
            Some(session.connection_id())
        );
    }

    #[test]
    fn test_cannot_authenticate_without_awaiting_auth() {
        let registry = ConnectionRegistry::new();
        let (mut session, _rx) = session();
        session.authenticate(&registry, "alice".to_string());
        assert_eq!(session.state(), &SessionState::Accepted);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_close_before_auth_never_touches_registry() {
        let registry = ConnectionRegistry::new();
        let (other_tx, _other_rx) = mpsc::unbounded_channel();
        registry.register("dave", ConnectionHandle::new(other_tx));

        let (mut session, _rx) = session();
        session.await_auth();
        session.close(&registry);

        assert_eq!(session.state(), &SessionState::Closed);
        assert!(registry.is_connected("dave"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (mut carol, _rx) = session();
        carol.await_auth();
        carol.authenticate(&registry, "carol".to_string());

        let (other_tx, _other_rx) = mpsc::unbounded_channel();
        registry.register("erin", ConnectionHandle::new(other_tx));

        carol.close(&registry);
        carol.close(&registry);

        assert!(!registry.is_connected("carol"));
        assert!(registry.is_connected("erin"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_superseded_session_close_keeps_replacement() {
        let registry = ConnectionRegistry::new();
        let (mut first, _rx1) = session();
        first.await_auth();
        assert!(first.authenticate(&registry, "alice".to_string()).is_none());

        let (mut second, _rx2) = session();
        second.await_auth();
        let displaced = second.authenticate(&registry, "alice".to_string());
        assert_eq!(displaced.map(|h| h.id()), Some(first.connection_id()));

        first.close(&registry);
        assert_eq!(
            registry.get("alice").map(|h| h.id()),
            Some(second.connection_id())
        );
    }

    #[test]
    fn test_deliver_fails_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(tx);
        assert!(handle.deliver("one".to_string()).is_ok());
        drop(rx);
        assert!(handle.is_closed());
        assert_eq!(handle.deliver("two".to_string()), Err(DeliveryError));
    }
}
