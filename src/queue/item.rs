// src/queue/item.rs

//! Queue items, their lifecycle states, and the jobs handed to collaborators.

use std::time::Duration;

use tracing::warn;

use crate::engine::{LoadFailure, MaterializedHandle};
use crate::settings::{Attributes, LoadSettings};
use crate::types::{FetchMode, ResourceKind};

/// Lifecycle of a queue item. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// In the queue with an index; may be waiting for a fetch slot.
    Admitted,
    /// A fetch is in flight.
    FetchPending,
    /// Fetch outcome received (or no fetch needed); waiting for release.
    FetchSettled,
    /// Picked by the release algorithm.
    ReleaseEligible,
    /// Handed to the materializer, guarded by the item timeout.
    Materializing,
    Committed,
    Failed,
}

impl ItemState {
    fn rank(self) -> u8 {
        match self {
            ItemState::Admitted => 0,
            ItemState::FetchPending => 1,
            ItemState::FetchSettled => 2,
            ItemState::ReleaseEligible => 3,
            ItemState::Materializing => 4,
            ItemState::Committed | ItemState::Failed => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Committed | ItemState::Failed)
    }
}

/// Scheduling state for one submitted request.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub index: usize,
    pub settings: LoadSettings,
    /// Current load mode; starts from admission rules and may flip to
    /// `Direct` on the fetch-denied fallback.
    pub mode: FetchMode,
    pub fetched_content: Option<String>,
    pub materialized: Option<MaterializedHandle>,
    pub failure: Option<LoadFailure>,
    state: ItemState,
}

impl QueueItem {
    pub fn new(index: usize, settings: LoadSettings, mode: FetchMode) -> Self {
        Self {
            index,
            settings,
            mode,
            fetched_content: None,
            materialized: None,
            failure: None,
            state: ItemState::Admitted,
        }
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    /// Move to `next`. Backward moves and moves out of a terminal state are
    /// refused (and logged); returns whether the transition happened.
    pub fn advance(&mut self, next: ItemState) -> bool {
        if self.state.is_terminal() || next.rank() < self.state.rank() {
            warn!(
                index = self.index,
                from = ?self.state,
                to = ?next,
                "refusing backward item state transition"
            );
            return false;
        }
        self.state = next;
        true
    }
}

/// A fetch the engine wants started now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub index: usize,
    pub locator: String,
    pub timeout: Duration,
}

impl FetchJob {
    pub fn from_item(item: &QueueItem) -> Self {
        Self {
            index: item.index,
            locator: item.settings.locator.clone(),
            timeout: item.settings.timeout,
        }
    }
}

/// One entry of a materialization batch.
///
/// `content` is set when the resource was fetched; otherwise the
/// materializer loads it by reference through `locator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeJob {
    pub index: usize,
    pub locator: String,
    pub kind: ResourceKind,
    pub mode: FetchMode,
    pub content: Option<String>,
    pub attributes: Attributes,
}

impl MaterializeJob {
    pub fn from_item(item: &QueueItem) -> Self {
        Self {
            index: item.index,
            locator: item.settings.locator.clone(),
            kind: item.settings.kind,
            mode: item.mode,
            content: match item.mode {
                FetchMode::Fetch => item.fetched_content.clone(),
                FetchMode::Direct => None,
            },
            attributes: item.settings.attributes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_only_move_forward() {
        let mut item = QueueItem::new(0, LoadSettings::default(), FetchMode::Fetch);
        assert!(item.advance(ItemState::FetchPending));
        assert!(item.advance(ItemState::FetchSettled));
        assert!(!item.advance(ItemState::Admitted));
        assert_eq!(item.state(), ItemState::FetchSettled);

        assert!(item.advance(ItemState::Failed));
        assert!(!item.advance(ItemState::Committed));
        assert_eq!(item.state(), ItemState::Failed);
    }
}
