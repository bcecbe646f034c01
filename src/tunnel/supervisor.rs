//! SSH tunnel supervisor
//!
//! Spawns and watches `ssh -D` dynamic port forwards. At most one tunnel is
//! current at any moment; the supervisor owns every child process it spawns
//! and tears them all down on close.

use crate::tunnel::config::TunnelEntry;
use crate::tunnel::TunnelError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

/// How long to wait for the loopback port after spawning ssh
const ESTABLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval while waiting for the loopback port
const ESTABLISH_POLL: Duration = Duration::from_millis(500);

/// Health probe timeout for the loopback port
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Status of a tunnel endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelStatus {
    Down,
    Connecting,
    Up,
    Failed,
}

/// A SOCKS5 proxy endpoint published to the browser layer
///
/// The browser reads this at driver construction only; a rotation
/// invalidates any driver built against the previous endpoint.
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    pub local_port: u16,
    pub remote_host: String,
    pub ssh_user: String,
    pub ssh_key_path: PathBuf,
    pub status: TunnelStatus,
}

impl ProxyEndpoint {
    /// The proxy URL to hand to the browser
    pub fn socks_url(&self) -> String {
        format!("socks5://127.0.0.1:{}", self.local_port)
    }
}

/// Probes a loopback port with the standard 2s deadline
///
/// # Arguments
///
/// * `port` - The loopback port to probe
pub async fn probe_port(port: u16) -> bool {
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(("127.0.0.1", port))).await,
        Ok(Ok(_))
    )
}

/// Supervises SSH tunnels and exposes the current SOCKS endpoint
pub struct TunnelSupervisor {
    entries: Vec<TunnelEntry>,
    current: Option<usize>,
    child: Option<Child>,
}

impl TunnelSupervisor {
    /// Creates a supervisor over a fixed set of tunnel entries
    pub fn new(entries: Vec<TunnelEntry>) -> Self {
        Self {
            entries,
            current: None,
            child: None,
        }
    }

    /// Number of configured tunnels
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no tunnels are configured
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Establishes the named tunnel, replacing any current one
    ///
    /// Spawns the ssh process in the background and polls the loopback port
    /// until it accepts TCP connections or the 10s deadline passes.
    pub async fn establish(&mut self, name: &str) -> Result<ProxyEndpoint, TunnelError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| TunnelError::NotConfigured(name.to_string()))?;
        self.establish_index(index).await
    }

    /// Establishes the first configured tunnel
    pub async fn establish_first(&mut self) -> Result<ProxyEndpoint, TunnelError> {
        if self.entries.is_empty() {
            return Err(TunnelError::NoTunnels);
        }
        self.establish_index(0).await
    }

    async fn establish_index(&mut self, index: usize) -> Result<ProxyEndpoint, TunnelError> {
        self.close_current().await;

        let entry = self.entries[index].clone();
        tracing::info!(
            "Establishing tunnel '{}' to {}@{}:{} (SOCKS on 127.0.0.1:{})",
            entry.name,
            entry.user,
            entry.host,
            entry.ssh_port,
            entry.local_port
        );

        let mut child = Self::spawn_ssh(&entry)?;

        let deadline = tokio::time::Instant::now() + ESTABLISH_TIMEOUT;
        loop {
            // An early exit means the forward failed (bad key, unreachable host)
            if let Some(status) = child.try_wait()? {
                tracing::warn!("Tunnel '{}' ssh exited early: {}", entry.name, status);
                return Err(TunnelError::ExitedEarly {
                    name: entry.name.clone(),
                });
            }

            if probe_port(entry.local_port).await {
                break;
            }

            if tokio::time::Instant::now() >= deadline {
                child.start_kill().ok();
                return Err(TunnelError::EstablishTimeout {
                    name: entry.name.clone(),
                    port: entry.local_port,
                });
            }

            tokio::time::sleep(ESTABLISH_POLL).await;
        }

        tracing::info!("Tunnel '{}' is up", entry.name);
        self.child = Some(child);
        self.current = Some(index);
        Ok(self.endpoint_for(index, TunnelStatus::Up))
    }

    fn spawn_ssh(entry: &TunnelEntry) -> Result<Child, TunnelError> {
        let child = Command::new("ssh")
            .arg("-N")
            .arg("-T")
            .arg("-C")
            .args(["-o", "StrictHostKeyChecking=no"])
            .args(["-o", "UserKnownHostsFile=/dev/null"])
            .args(["-o", "IdentitiesOnly=yes"])
            .args(["-o", "ServerAliveInterval=60"])
            .args(["-o", "ServerAliveCountMax=3"])
            .args(["-o", "ExitOnForwardFailure=yes"])
            .arg("-D")
            .arg(entry.local_port.to_string())
            .arg("-p")
            .arg(entry.ssh_port.to_string())
            .arg("-i")
            .arg(&entry.key_path)
            .arg(format!("{}@{}", entry.user, entry.host))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        Ok(child)
    }

    fn endpoint_for(&self, index: usize, status: TunnelStatus) -> ProxyEndpoint {
        let entry = &self.entries[index];
        ProxyEndpoint {
            local_port: entry.local_port,
            remote_host: entry.host.clone(),
            ssh_user: entry.user.clone(),
            ssh_key_path: entry.key_path.clone(),
            status,
        }
    }

    /// Returns the in-use endpoint if it passes the health probe
    pub async fn current(&mut self) -> Option<ProxyEndpoint> {
        let index = self.current?;

        if let Some(child) = self.child.as_mut() {
            if child.try_wait().ok().flatten().is_some() {
                tracing::warn!("Current tunnel's ssh process has died");
                self.current = None;
                self.child = None;
                return None;
            }
        }

        if probe_port(self.entries[index].local_port).await {
            Some(self.endpoint_for(index, TunnelStatus::Up))
        } else {
            tracing::warn!(
                "Tunnel '{}' failed its health probe",
                self.entries[index].name
            );
            Some(self.endpoint_for(index, TunnelStatus::Failed))
        }
    }

    /// Closes the current tunnel and establishes the next in round-robin order
    ///
    /// Tries every other configured entry once before giving up.
    pub async fn rotate(&mut self) -> Result<ProxyEndpoint, TunnelError> {
        if self.entries.is_empty() {
            return Err(TunnelError::NoTunnels);
        }

        let start = self.current.map(|i| i + 1).unwrap_or(0);
        let candidates = self.rotation_order(start);

        self.close_current().await;

        for index in candidates {
            match self.establish_index(index).await {
                Ok(endpoint) => return Ok(endpoint),
                Err(e) => {
                    tracing::warn!(
                        "Rotation candidate '{}' failed: {}",
                        self.entries[index].name,
                        e
                    );
                }
            }
        }

        Err(TunnelError::NoTunnels)
    }

    /// Round-robin candidate order starting at `start`, excluding the current index
    fn rotation_order(&self, start: usize) -> Vec<usize> {
        let n = self.entries.len();
        (0..n)
            .map(|offset| (start + offset) % n)
            .filter(|&i| Some(i) != self.current)
            .collect()
    }

    async fn close_current(&mut self) {
        if let Some(mut child) = self.child.take() {
            child.start_kill().ok();
            let _ = child.wait().await;
        }
        self.current = None;
    }

    /// Tears down every tunnel this supervisor spawned
    ///
    /// Called from the run's cleanup path; kill_on_drop covers abnormal exits.
    pub async fn close_all(&mut self) {
        self.close_current().await;
        tracing::info!("All tunnels closed");
    }
}
