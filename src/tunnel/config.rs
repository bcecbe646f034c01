//! Tunnel configuration file handling
//!
//! The config file is a JSON object mapping tunnel names to endpoint
//! records, one per remote proxy box.

use crate::tunnel::TunnelError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

fn default_ssh_port() -> u16 {
    22
}

/// One configured SSH tunnel endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TunnelEntry {
    /// Tunnel name (the JSON key; filled in after parsing)
    #[serde(skip)]
    pub name: String,

    /// Remote SSH host
    pub host: String,

    /// Remote SSH port
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    /// SSH user on the remote host
    pub user: String,

    /// Path to the private key for this host
    pub key_path: PathBuf,

    /// Loopback port the SOCKS5 endpoint listens on
    pub local_port: u16,
}

/// Loads tunnel entries from a JSON config file
///
/// Entries come back sorted by name so the round-robin order is stable
/// across runs.
///
/// # Arguments
///
/// * `path` - Path to the JSON config file
///
/// # Returns
///
/// * `Ok(Vec<TunnelEntry>)` - Parsed entries (may be empty)
/// * `Err(TunnelError)` - File unreadable or JSON malformed
pub fn load_tunnel_config(path: &Path) -> Result<Vec<TunnelEntry>, TunnelError> {
    let content = std::fs::read_to_string(path)?;

    // BTreeMap gives deterministic name ordering for free
    let raw: BTreeMap<String, TunnelEntry> = serde_json::from_str(&content)?;

    let mut entries: Vec<TunnelEntry> = raw
        .into_iter()
        .map(|(name, mut entry)| {
            entry.name = name;
            entry
        })
        .collect();

    for entry in &entries {
        if entry.local_port == 0 {
            return Err(TunnelError::Config(format!(
                "tunnel '{}' has local_port 0",
                entry.name
            )));
        }
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
