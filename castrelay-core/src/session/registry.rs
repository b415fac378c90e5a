//! Process-wide session registry.
//!
//! Maps caster connection ids to their [`Session`]. The host constructs
//! one registry and shares it (`Arc<SessionRegistry>`) with every router.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::session::state::Session;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh session for `connection_id`.
    ///
    /// A live entry for the same id means the transport reused a
    /// connection id; the stale session is replaced.
    pub fn create(&self, connection_id: &str) -> Arc<Session> {
        let session = Arc::new(Session::new(connection_id));
        let previous = self
            .sessions
            .write()
            .insert(connection_id.to_owned(), Arc::clone(&session));
        if previous.is_some() {
            warn!(connection_id, "session already registered; replacing it");
        } else {
            debug!(connection_id, "session registered");
        }
        session
    }

    pub fn get(&self, connection_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(connection_id).cloned()
    }

    /// Atomically remove and return the session.
    pub fn remove(&self, connection_id: &str) -> Option<Arc<Session>> {
        self.sessions.write().remove(connection_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────
