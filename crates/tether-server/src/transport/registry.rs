//! Table of open channels, keyed by session id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};
use tether_core::SessionId;
use tracing::debug;

use super::channel::{Channel, CloseReason};
use crate::errors::TransportError;

/// Tracks every open channel.
///
/// An id is present iff its channel is open. The table lock is never held
/// across an `.await`; [`Channel::close`] removes its entry while holding the
/// write lock, so a concurrent [`lookup`](Self::lookup) sees either the open
/// channel or nothing.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Channel>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Generate a fresh id, build the channel for it, and store it.
    ///
    /// Fails with `SessionLimitReached` when `limit` channels are already open.
    pub fn register<F>(&self, limit: usize, make: F) -> Result<Arc<Channel>, TransportError>
    where
        F: FnOnce(SessionId) -> Channel,
    {
        let mut sessions = self.sessions.write();
        if sessions.len() >= limit {
            return Err(TransportError::SessionLimitReached(limit));
        }
        let id = loop {
            let candidate = SessionId::new();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let channel = Arc::new(make(id.clone()));
        let _ = sessions.insert(id, Arc::clone(&channel));
        debug!(session_id = %channel.id(), open = sessions.len(), "session registered");
        Ok(channel)
    }

    /// Find an open channel.
    pub fn lookup(&self, id: &str) -> Result<Arc<Channel>, TransportError> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| TransportError::UnknownSession(id.to_owned()))
    }

    /// Close and remove the channel for `id`. Idempotent: an absent id is a
    /// no-op returning `false`.
    pub fn remove(&self, id: &str) -> bool {
        match self.lookup(id) {
            Ok(channel) => channel.close(CloseReason::Explicit),
            Err(_) => false,
        }
    }

    /// Number of open channels.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no channel is open.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Ids of all open channels, sorted.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Close every open channel. Returns how many this call closed.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let channels: Vec<Arc<Channel>> = self.sessions.read().values().cloned().collect();
        channels.iter().filter(|c| c.close(reason)).count()
    }

    pub(super) fn table(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, Arc<Channel>>> {
        self.sessions.write()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
