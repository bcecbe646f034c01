//! SSH tunnel supervision module
//!
//! Maintains one active SOCKS5 endpoint on a loopback port, backed by an
//! `ssh -D` dynamic port forward to a configured remote box, so the browser
//! can route its traffic through a rotating set of egress IPs.

mod config;
mod supervisor;

pub use config::{load_tunnel_config, TunnelEntry};
pub use supervisor::{probe_port, ProxyEndpoint, TunnelStatus, TunnelSupervisor};

use thiserror::Error;

/// Errors that can occur during tunnel operations
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tunnel config error: {0}")]
    Config(String),

    #[error("Failed to parse tunnel config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No tunnel '{0}' configured")]
    NotConfigured(String),

    #[error("No usable tunnel available")]
    NoTunnels,

    #[error("Tunnel '{name}' did not open local port {port} in time")]
    EstablishTimeout { name: String, port: u16 },

    #[error("SSH process for tunnel '{name}' exited early")]
    ExitedEarly { name: String },
}
