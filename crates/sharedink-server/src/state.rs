//! Shared application state.

use std::sync::Arc;

use sharedink_core::{BroadcastRelay, HistoryLimit, SnapshotEndpoint};

/// State for the single shared board served by this process.
pub struct AppState {
    /// Sole writer of the board history.
    pub relay: BroadcastRelay,
    /// Read path behind `GET /history`.
    pub snapshots: SnapshotEndpoint,
    /// Relayed actions buffered per socket before the peer is dropped.
    pub outbound_capacity: usize,
}

impl AppState {
    pub fn new(limit: HistoryLimit, outbound_capacity: usize) -> Arc<Self> {
        let relay = BroadcastRelay::with_limit(limit);
        let snapshots = relay.snapshot_endpoint();
        Arc::new(Self {
            relay,
            snapshots,
            outbound_capacity,
        })
    }
}
