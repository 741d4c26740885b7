// Flotilla - Parallel SSH Fleet Command Console
//
// Runs shell commands, transfers files, and launches detached background
// processes across many hosts concurrently, with per-host failure
// isolation and stable, registry-ordered results.

pub mod console;
pub mod engine;
pub mod output;
pub mod registry;
pub mod transport;

pub use engine::{
    Batch, ConnectionExecutor, ExecutionOutcome, ExecutionTask, FleetDispatcher, LivenessProber,
};
pub use output::{FleetError, TerminalOutput};
pub use registry::{load_credentials, Host, HostRegistry, HostStatus, RegistryError};
pub use transport::{Connector, SshConnector, Transport, TransportSettings};

/// Version of the Flotilla tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::console::Console;
    pub use crate::engine::{ConnectionExecutor, ExecutionTask, FleetDispatcher, LivenessProber};
    pub use crate::output::{FleetError, TerminalOutput};
    pub use crate::registry::{Host, HostRegistry, HostStatus};
    pub use crate::transport::{Connector, SshConnector, TransportSettings};
}
