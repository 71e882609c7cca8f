//! Server configuration from command-line flags and environment variables.

use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use sharedink_core::HistoryLimit;

use crate::ws::OUTBOUND_CAPACITY;

/// SharedInk relay server
#[derive(Parser, Clone, Debug)]
#[command(name = "sharedink-server", version, about = "WebSocket relay server for SharedInk whiteboards")]
pub struct Config {
    /// Address to bind to
    #[arg(long, env = "SHAREDINK_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: IpAddr,

    /// Port to listen on
    #[arg(long, env = "SHAREDINK_PORT", default_value_t = 3001)]
    pub port: u16,

    /// Maximum number of actions kept for late joiners; oldest are evicted first.
    /// Unbounded when unset.
    #[arg(long, env = "SHAREDINK_MAX_HISTORY")]
    pub max_history: Option<usize>,

    /// Relayed actions buffered per connection; a peer that falls further
    /// behind is disconnected.
    #[arg(long, env = "SHAREDINK_OUTBOUND_CAPACITY", default_value_t = OUTBOUND_CAPACITY)]
    pub outbound_capacity: usize,

    /// Emit structured JSON logs
    #[arg(long, env = "SHAREDINK_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn history_limit(&self) -> HistoryLimit {
        HistoryLimit::from_option(self.max_history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["sharedink-server"]).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:3001");
        assert_eq!(config.history_limit(), HistoryLimit::Unbounded);
        assert_eq!(config.outbound_capacity, OUTBOUND_CAPACITY);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "sharedink-server",
            "--bind-address",
            "127.0.0.1",
            "--port",
            "8080",
            "--max-history",
            "500",
            "--outbound-capacity",
            "32",
            "--json-logs",
        ])
        .unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.history_limit(), HistoryLimit::MaxActions(500));
        assert_eq!(config.outbound_capacity, 32);
        assert!(config.json_logs);
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Config::try_parse_from(["sharedink-server", "--port", "not-a-port"]).is_err());
    }
}
