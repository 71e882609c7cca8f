//! Broadcast relay and snapshot endpoint.
//!
//! The relay is the only writer of the action log. For every inbound action it
//! first updates the log and then fans the action out to every other live
//! connection, so a peer that has seen a broadcast always finds it in a
//! snapshot taken afterwards.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::action::{Action, ActionError};
use crate::history::{ActionLog, HistoryLimit, Snapshot};
use crate::session::{ActionSink, ConnectionId, SessionError, SessionRegistry};

/// Outcome of relaying one action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fanout {
    /// Connections the action was handed to.
    pub delivered: usize,
    /// Connections that were already gone. Their failures are dropped.
    pub failed: usize,
}

/// Applies inbound actions to the log and forwards them to peers.
pub struct BroadcastRelay {
    history: Arc<ActionLog>,
    sessions: Arc<SessionRegistry>,
    /// Held across "mutate log + enqueue to peers" so every outbound queue
    /// sees actions in log order. Never held across an await or a blocking send.
    dispatch: Mutex<()>,
}

impl BroadcastRelay {
    pub fn new(history: Arc<ActionLog>, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            history,
            sessions,
            dispatch: Mutex::new(()),
        }
    }

    /// Relay over a fresh log and registry.
    pub fn with_limit(limit: HistoryLimit) -> Self {
        Self::new(
            Arc::new(ActionLog::with_limit(limit)),
            Arc::new(SessionRegistry::new()),
        )
    }

    pub fn history(&self) -> &Arc<ActionLog> {
        &self.history
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Read-only endpoint over this relay's log.
    pub fn snapshot_endpoint(&self) -> SnapshotEndpoint {
        SnapshotEndpoint::new(Arc::clone(&self.history))
    }

    /// Register a connection and return the history it must apply before any
    /// live action. Everything missing from the snapshot arrives through `sink`.
    pub fn attach(&self, id: ConnectionId, sink: Arc<dyn ActionSink>) -> Result<Snapshot, SessionError> {
        let _order = self.lock_dispatch();
        self.sessions.register(id, sink)?;
        let snapshot = self.history.snapshot();
        log::info!(
            "Connection {id} attached ({} live, {} actions in history)",
            self.sessions.len(),
            snapshot.len()
        );
        Ok(snapshot)
    }

    /// Drop a connection. Safe to call for ids that were never attached.
    pub fn detach(&self, id: ConnectionId) {
        if self.sessions.unregister(id) {
            log::info!("Connection {id} detached ({} live)", self.sessions.len());
        }
    }

    /// Parse a raw frame and relay it. Malformed frames are dropped without
    /// touching the log or any peer.
    pub fn on_frame(&self, source: ConnectionId, frame: &[u8]) -> Result<Fanout, ActionError> {
        let action = Action::from_slice(frame)
            .inspect_err(|e| log::warn!("Dropping malformed action from {source}: {e}"))?;
        Ok(self.on_action(source, action))
    }

    /// Apply `action` to the log, then forward it unchanged to every live
    /// connection except `source`.
    pub fn on_action(&self, source: ConnectionId, action: Action) -> Fanout {
        let _order = self.lock_dispatch();

        if action.is_clear() {
            self.history.clear();
            log::info!("History cleared by {source}");
        } else {
            log::debug!("Appending `{}` action from {source}", action.type_tag());
            self.history.append(action.clone());
        }

        let mut fanout = Fanout::default();
        for (target, sink) in self.sessions.broadcast_targets(source) {
            match sink.deliver(&action) {
                Ok(()) => fanout.delivered += 1,
                Err(e) => {
                    fanout.failed += 1;
                    log::debug!("Dropped delivery to {target}: {e}");
                }
            }
        }
        fanout
    }

    /// Current history, as served to catching-up clients.
    pub fn snapshot(&self) -> Snapshot {
        self.history.snapshot()
    }

    fn lock_dispatch(&self) -> MutexGuard<'_, ()> {
        self.dispatch.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Synchronous read path for newly joined or reconnecting clients.
///
/// The result is a point-in-time value; callers still need the live stream
/// and must apply the snapshot before any action received after the call.
#[derive(Clone)]
pub struct SnapshotEndpoint {
    history: Arc<ActionLog>,
}

impl SnapshotEndpoint {
    pub fn new(history: Arc<ActionLog>) -> Self {
        Self { history }
    }

    pub fn get_snapshot(&self) -> Snapshot {
        self.history.snapshot()
    }
}
