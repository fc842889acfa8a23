// src/queue/queue_step.rs

//! Result types for queue steps.

use std::time::Duration;

use crate::engine::LoadReport;
use crate::queue::item::{FetchJob, ItemState, MaterializeJob};

/// Structured result of one queue "step" (admission, fetch settle,
/// materialize settle, timeout).
///
/// The queue itself performs no IO; whoever drives it turns these into
/// fetch tasks, materializer calls and timers.
#[derive(Debug, Clone, Default)]
pub struct QueueStep {
    /// Fetches to start now, in dispatch order.
    pub fetches: Vec<FetchJob>,
    /// Materialization batches, one per release pass that found work.
    pub batches: Vec<Vec<MaterializeJob>>,
    /// Materialization timeouts to arm, `(index, after)`.
    pub timers_armed: Vec<(usize, Duration)>,
    /// Items whose materialization timeout must be cleared.
    pub timers_cleared: Vec<usize>,
    /// Items resolved during this step, in callback order.
    pub resolved: Vec<LoadReport>,
    /// The fetcher reported it has no capability at all.
    pub fetch_capability_lost: bool,
}

impl QueueStep {
    pub fn is_empty(&self) -> bool {
        self.fetches.is_empty()
            && self.batches.is_empty()
            && self.timers_armed.is_empty()
            && self.timers_cleared.is_empty()
            && self.resolved.is_empty()
    }
}

/// Read-only copy of the queue bookkeeping, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub states: Vec<ItemState>,
    pub commit_pointer: usize,
    pub active_fetches: usize,
    pub pending_fetches: Vec<usize>,
    pub blockers: Vec<usize>,
}

impl QueueSnapshot {
    pub fn count_in(&self, state: ItemState) -> usize {
        self.states.iter().filter(|s| **s == state).count()
    }
}
