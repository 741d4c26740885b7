// Result aggregation: batch outcomes in stable registry order

use super::{Batch, ExecutionOutcome};
use crate::registry::{Host, HostRegistry};

/// One displayable row: the registry index operators reference, the host,
/// and its outcome
#[derive(Debug, Clone)]
pub struct PresentedOutcome {
    pub index: usize,
    pub host: Host,
    pub outcome: ExecutionOutcome,
}

/// Re-impose registry order on a batch for presentation.
///
/// Pure transform, no failure modes. Outcomes for hosts that are not in
/// the registry (never the case for console-driven batches) are dropped.
pub fn present(batch: &Batch, registry: &HostRegistry) -> Vec<PresentedOutcome> {
    let mut rows: Vec<PresentedOutcome> = batch
        .iter()
        .filter_map(|outcome| {
            registry
                .index_of(&outcome.host.target())
                .map(|index| PresentedOutcome {
                    index,
                    host: outcome.host.clone(),
                    outcome: outcome.clone(),
                })
        })
        .collect();

    rows.sort_by_key(|row| row.index);
    rows
}
