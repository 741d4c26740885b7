// Fleet execution engine: fan one unit of work out across many hosts

pub mod aggregate;
pub mod dispatcher;
pub mod executor;
pub mod probe;

pub use aggregate::{present, PresentedOutcome};
pub use dispatcher::FleetDispatcher;
pub use executor::ConnectionExecutor;
pub use probe::{LivenessProber, UptimeEntry};

use std::path::PathBuf;

use crate::registry::Host;

/// One unit of work to fan out across a host subset
#[derive(Debug, Clone)]
pub enum ExecutionTask {
    /// Run a shell command; a leading `sudo` selects the privileged path
    RunCommand(String),
    /// Upload a local file, applying the given mode remotely
    UploadFile {
        local: PathBuf,
        remote: String,
        mode: i32,
    },
    /// Download a remote file
    DownloadFile { remote: String, local: PathBuf },
    /// Launch a command as a detached background process that survives
    /// the session closing
    LaunchDetached(String),
}

/// Result of one task against one host.
///
/// Failures never unwind out of the engine; they arrive here as data with
/// `succeeded == false` and a diagnostic in `output`.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub host: Host,
    pub succeeded: bool,
    pub output: String,
}

impl ExecutionOutcome {
    pub fn success(host: Host, output: impl Into<String>) -> Self {
        ExecutionOutcome {
            host,
            succeeded: true,
            output: output.into(),
        }
    }

    pub fn failure(host: Host) -> Self {
        ExecutionOutcome {
            host,
            succeeded: false,
            output: "Error".to_string(),
        }
    }
}

/// The complete set of per-host outcomes from one dispatch call.
///
/// Holds exactly one outcome per requested host, in the input host order;
/// no host is dropped on timeout or connection failure.
#[derive(Debug, Default)]
pub struct Batch {
    outcomes: Vec<ExecutionOutcome>,
}

impl Batch {
    pub fn new(outcomes: Vec<ExecutionOutcome>) -> Self {
        Batch { outcomes }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionOutcome> {
        self.outcomes.iter()
    }

    pub fn get(&self, target: &str) -> Option<&ExecutionOutcome> {
        self.outcomes.iter().find(|o| o.host.target() == target)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// True when every host in the batch failed ("no active hosts")
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| !o.succeeded)
    }
}
