//! SharedInk Core Library
//!
//! Synchronization core for the SharedInk whiteboard: the authoritative action
//! history of a board, the registry of live connections, and the relay that
//! keeps them consistent. Transport-agnostic; the server crate plugs sockets in
//! through [`ActionSink`].

pub mod action;
pub mod history;
pub mod relay;
pub mod session;

pub use action::{Action, ActionError, ActionKind};
pub use history::{ActionLog, HistoryLimit, Snapshot, GROWTH_WARN_INTERVAL};
pub use relay::{BroadcastRelay, Fanout, SnapshotEndpoint};
pub use session::{ActionSink, ConnectionId, DeliveryError, SessionError, SessionRegistry};
