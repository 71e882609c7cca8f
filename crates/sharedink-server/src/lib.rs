//! SharedInk WebSocket Relay Server
//!
//! Keeps every participant of one shared board in sync: actions received on a
//! socket are recorded and relayed to all other sockets, and newcomers catch up
//! from `GET /history` (or `/ws?replay=true`).
//!
//! ## Protocol
//!
//! Each WebSocket frame is one action, a JSON object tagged by `type`:
//! ```json
//! { "type": "draw", "x0": 0, "y0": 0, "x1": 5, "y1": 5, "color": "#000", "size": 2 }
//! { "type": "rect", "x": 1, "y": 1, "width": 10, "height": 10, "color": "#f00" }
//! { "type": "clear" }
//! ```

pub mod config;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::Config;
pub use routes::build_router;
pub use state::AppState;
pub use ws::OUTBOUND_CAPACITY;
