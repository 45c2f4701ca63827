use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{SqliteTokenVerifier, TokenVerifier};
use crate::gateway::broadcaster::Broadcaster;
use crate::gateway::registry::ConnectionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Broadcaster,
    pub verifier: Arc<dyn TokenVerifier>,
    pub auth_timeout: Option<Duration>,
}

impl AppState {
    /// State backed by `db` for both credentials and the gateway.
    pub fn new(db: SqlitePool, auth_timeout: Option<Duration>) -> Self {
        let verifier = Arc::new(SqliteTokenVerifier::new(db.clone()));
        Self::with_verifier(db, verifier, auth_timeout)
    }

    pub fn with_verifier(
        db: SqlitePool,
        verifier: Arc<dyn TokenVerifier>,
        auth_timeout: Option<Duration>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            db,
            broadcaster: Broadcaster::new(Arc::clone(&registry)),
            registry,
            verifier,
            auth_timeout,
        }
    }
}
