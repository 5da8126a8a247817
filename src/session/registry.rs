use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use tracing::{info, warn};

use super::{SessionId, SessionTransport};

/// Live sessions keyed by id. Entries are inserted once a handshake completes and
/// removed when their transport reports closure; there is no idle eviction.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, Arc<SessionTransport>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<SessionTransport>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Registers a transport under its own id. Returns `false` and keeps the existing
    /// entry if that id is already live.
    pub fn insert(&self, transport: Arc<SessionTransport>) -> bool {
        match self.sessions.entry(transport.id().clone()) {
            Entry::Occupied(_) => {
                warn!(session_id = %transport.id(), "session id already registered");
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(transport);
                true
            }
        }
    }

    pub fn remove(&self, id: &SessionId) -> Option<Arc<SessionTransport>> {
        self.sessions.remove(id).map(|(_, transport)| transport)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Closes and removes every session. Used at shutdown so open SSE streams end.
    pub async fn close_all(&self) {
        let ids: Vec<SessionId> = self
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for id in ids {
            if let Some(transport) = self.remove(&id) {
                transport.close().await;
            }
        }

        info!("all sessions closed");
    }
}
