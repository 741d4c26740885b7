// Transport capability: one session against one host

pub mod ssh;

pub use ssh::SshConnector;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::output::errors::FleetError;
use crate::registry::Host;

/// Fixed per-host transport settings for the whole engine
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Connection timeout (also applied to blocking session calls)
    pub connect_timeout: Duration,
    /// Connection attempts before a host is given up on
    pub connection_attempts: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        TransportSettings {
            connect_timeout: Duration::from_secs(2),
            connection_attempts: 1,
        }
    }
}

/// An established session to a single host.
///
/// Remote command failures are warn-only: a non-zero exit status is still a
/// successful call whose output is returned. Only connection and session
/// errors surface as `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run a command unprivileged and return its output
    async fn run(&self, command: &str) -> Result<String, FleetError>;

    /// Run a command with elevated privileges and return its output
    async fn run_privileged(&self, command: &str) -> Result<String, FleetError>;

    /// Upload a local file, applying the given file mode
    async fn upload(&self, local: &Path, remote: &str, mode: i32) -> Result<(), FleetError>;

    /// Download a remote file to a local path
    async fn download(&self, remote: &str, local: &Path) -> Result<(), FleetError>;

    /// Issue a command without a pty and without waiting for it to finish.
    /// Success means the launch request was accepted, nothing more.
    async fn spawn(&self, command: &str) -> Result<(), FleetError>;
}

/// Opens sessions to hosts
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &Host) -> Result<Box<dyn Transport>, FleetError>;

    /// Open a direct interactive shell to one host, bridging the local
    /// terminal until the remote side closes. Bypasses the dispatcher.
    async fn open_shell(&self, host: &Host) -> Result<(), FleetError>;
}
