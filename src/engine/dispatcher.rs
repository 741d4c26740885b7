// Fleet dispatcher: parallel fan-out of one task across a host subset

use std::sync::Arc;

use super::{Batch, ConnectionExecutor, ExecutionOutcome, ExecutionTask};
use crate::registry::Host;

/// Fans one task out to a host subset, one worker per host, and collects
/// a complete batch.
///
/// Workers are all launched up front and joined before the call returns;
/// a slow or hung host delays only its own slot, never a sibling's
/// content. There is no overall timeout beyond what the transport
/// enforces per host.
pub struct FleetDispatcher {
    executor: Arc<ConnectionExecutor>,
}

impl FleetDispatcher {
    pub fn new(executor: Arc<ConnectionExecutor>) -> Self {
        FleetDispatcher { executor }
    }

    pub async fn dispatch(&self, hosts: &[Host], task: &ExecutionTask) -> Batch {
        tracing::debug!(hosts = hosts.len(), ?task, "dispatching");

        let handles: Vec<_> = hosts
            .iter()
            .map(|host| {
                let executor = self.executor.clone();
                let host = host.clone();
                let task = task.clone();
                tokio::spawn(async move { executor.execute(&host, &task).await })
            })
            .collect();

        // Fan-in: each worker's outcome is its own join-handle slot, merged
        // here in input order. A panicked worker still produces an entry.
        let mut outcomes = Vec::with_capacity(hosts.len());
        for (host, handle) in hosts.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(_) => ExecutionOutcome::failure(host.clone()),
            };
            outcomes.push(outcome);
        }

        Batch::new(outcomes)
    }
}
