//! Per-connection WebSocket task.
//!
//! Every frame carries exactly one action as a JSON object, in both
//! directions. Inbound frames go to the relay; actions relayed from peers are
//! queued on a bounded channel and written out by a separate writer task. A
//! peer whose queue overflows has stopped reading and is dropped.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use sharedink_core::{Action, ActionSink, ConnectionId, DeliveryError, Snapshot};
use tokio::sync::{Notify, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Default number of relayed actions buffered per socket.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Outbound queue of one socket. Enqueueing never blocks, so the relay can
/// call it while keeping its dispatch order.
struct ChannelSink {
    tx: mpsc::Sender<Action>,
    /// Signalled when the queue is full.
    stalled: Arc<Notify>,
}

impl ActionSink for ChannelSink {
    fn deliver(&self, action: &Action) -> Result<(), DeliveryError> {
        match self.tx.try_send(action.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.stalled.notify_one();
                Err(DeliveryError)
            }
            Err(TrySendError::Closed(_)) => Err(DeliveryError),
        }
    }
}

type WsSender = SplitSink<WebSocket, Message>;

async fn send_action(sender: &mut WsSender, action: &Action) -> Result<(), axum::Error> {
    sender.send(Message::Text(action.to_json().into())).await
}

/// Bring a reconnecting client to the current state: reset, then every
/// recorded action in order.
async fn send_replay(sender: &mut WsSender, snapshot: &Snapshot) -> Result<(), axum::Error> {
    send_action(sender, &Action::clear()).await?;
    for action in snapshot {
        send_action(sender, action).await?;
    }
    Ok(())
}

/// Write the optional replay, then every relayed action, until the socket or
/// the queue closes.
async fn write_outbound(
    mut sender: WsSender,
    mut rx: mpsc::Receiver<Action>,
    replay: Option<Snapshot>,
    conn_id: ConnectionId,
) {
    // Live actions queue up in `rx` meanwhile and follow the replay in order.
    if let Some(snapshot) = replay {
        if let Err(e) = send_replay(&mut sender, &snapshot).await {
            warn!("Replay to {} failed: {}", conn_id, e);
            return;
        }
        debug!("Replayed {} actions to {}", snapshot.len(), conn_id);
    }

    while let Some(action) = rx.recv().await {
        if send_action(&mut sender, &action).await.is_err() {
            break;
        }
    }
}

/// Hand one inbound frame, text or binary, to the relay.
fn relay_frame(state: &AppState, conn_id: ConnectionId, frame: &[u8]) {
    if let Ok(fanout) = state.relay.on_frame(conn_id, frame) {
        debug!(
            "Relayed action from {} to {} peers ({} gone)",
            conn_id, fanout.delivered, fanout.failed
        );
    }
}

/// Handle a WebSocket connection
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>, replay: bool) {
    let conn_id = ConnectionId::new();
    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Action>(state.outbound_capacity.max(1));
    let stalled = Arc::new(Notify::new());

    let sink = ChannelSink {
        tx,
        stalled: Arc::clone(&stalled),
    };
    let snapshot = match state.relay.attach(conn_id, Arc::new(sink)) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Rejecting connection: {}", e);
            return;
        }
    };
    info!("New connection: {} (replay: {})", conn_id, replay);

    let replay = replay.then_some(snapshot);
    let mut writer = tokio::spawn(write_outbound(sender, rx, replay, conn_id));

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        relay_frame(&state, conn_id, text.as_str().as_bytes());
                    }
                    Some(Ok(Message::Binary(data))) => {
                        // Binary frames are accepted as UTF-8 JSON
                        relay_frame(&state, conn_id, &data);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", conn_id, e);
                        break;
                    }
                }
            }

            // Outbound queue overflowed: the peer stopped reading
            _ = stalled.notified() => {
                warn!("Dropping {}: outbound queue full", conn_id);
                break;
            }

            // Writer ended because the socket failed
            _ = &mut writer => {
                break;
            }
        }
    }

    // Cleanup on disconnect
    state.relay.detach(conn_id);
    writer.abort();
    info!("Connection closed: {}", conn_id);
}
