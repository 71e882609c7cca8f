//! Live connections and the delivery seam used to reach them.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use uuid::Uuid;

use crate::action::Action;

/// Opaque identity of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConnectionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Delivery failed because the receiving side is gone.
#[derive(Debug, Error)]
#[error("Connection closed")]
pub struct DeliveryError;

/// Outbound half of a connection.
///
/// `deliver` must not block: implementations enqueue the action and return.
/// The relay calls it while holding its dispatch lock.
pub trait ActionSink: Send + Sync {
    fn deliver(&self, action: &Action) -> Result<(), DeliveryError>;
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connection already registered: {0}")]
    AlreadyRegistered(ConnectionId),
}

/// The set of currently connected participants.
#[derive(Default)]
pub struct SessionRegistry {
    connections: DashMap<ConnectionId, Arc<dyn ActionSink>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Registering the same id twice is a caller bug and
    /// leaves the first registration in place.
    pub fn register(&self, id: ConnectionId, sink: Arc<dyn ActionSink>) -> Result<(), SessionError> {
        match self.connections.entry(id) {
            Entry::Occupied(_) => Err(SessionError::AlreadyRegistered(id)),
            Entry::Vacant(slot) => {
                slot.insert(sink);
                Ok(())
            }
        }
    }

    /// Remove a connection. Unknown ids are ignored.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }

    /// Every live connection except `excluding`, as of this call.
    pub fn broadcast_targets(&self, excluding: ConnectionId) -> Vec<(ConnectionId, Arc<dyn ActionSink>)> {
        self.connections
            .iter()
            .filter(|entry| *entry.key() != excluding)
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
