// src/queue/load_queue.rs

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::engine::{
    DenialReason, FetchOutcome, ItemHandle, LoadFailure, LoadReport, MaterializeOutcome,
    MaterializedHandle,
};
use crate::queue::item::{FetchJob, ItemState, MaterializeJob, QueueItem};
use crate::queue::origin::{is_same_origin, Origin};
use crate::queue::queue_step::{QueueSnapshot, QueueStep};
use crate::settings::LoadSettings;
use crate::types::{FetchMode, ResourceKind};

/// The ordering engine.
///
/// It owns the append-only list of items plus the bookkeeping that decides:
/// - which items may start a fetch now (bounded by the concurrency limit)
/// - which settled items may be handed to the materializer (release)
/// - when the commit pointer can move
///
/// Blocking items cut the queue: nothing after the earliest unresolved
/// blocker is released until that blocker commits or fails. Items in front of
/// every blocker release as soon as their fetch settles, so they commit in
/// fetch-completion order.
#[derive(Debug)]
pub struct LoadQueue {
    items: Vec<QueueItem>,
    /// Lowest index not yet committed or failed.
    commit_pointer: usize,
    /// Unresolved blocking items, in submission order.
    blockers: Vec<usize>,
    active_fetches: usize,
    /// Admitted fetch items waiting for a free slot.
    pending_fetches: VecDeque<usize>,
    page_origin: Option<Origin>,
}

impl LoadQueue {
    pub fn new(page_origin: Option<Origin>) -> Self {
        Self {
            items: Vec::new(),
            commit_pointer: 0,
            blockers: Vec::new(),
            active_fetches: 0,
            pending_fetches: VecDeque::new(),
            page_origin,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `true` once every admitted item has committed or failed.
    pub fn is_idle(&self) -> bool {
        self.commit_pointer == self.items.len()
    }

    pub fn commit_pointer(&self) -> usize {
        self.commit_pointer
    }

    pub fn active_fetches(&self) -> usize {
        self.active_fetches
    }

    pub fn blockers(&self) -> &[usize] {
        &self.blockers
    }

    pub fn state_of(&self, index: usize) -> Option<ItemState> {
        self.items.get(index).map(QueueItem::state)
    }

    pub fn item(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            states: self.items.iter().map(QueueItem::state).collect(),
            commit_pointer: self.commit_pointer,
            active_fetches: self.active_fetches,
            pending_fetches: self.pending_fetches.iter().copied().collect(),
            blockers: self.blockers.clone(),
        }
    }

    /// Admit a resolved request at the end of the queue.
    pub fn admit(&mut self, settings: LoadSettings) -> (ItemHandle, QueueStep) {
        let index = self.items.len();
        let mode = self.admission_mode(&settings);
        let blocking = settings.blocking;

        info!(
            index,
            locator = %settings.locator,
            kind = %settings.kind,
            ?mode,
            blocking,
            "admitted load request"
        );

        self.items.push(QueueItem::new(index, settings, mode));
        if blocking {
            self.blockers.push(index);
        }

        let mut step = QueueStep::default();
        match mode {
            FetchMode::Direct => {
                self.items[index].advance(ItemState::FetchSettled);
                self.release(Some(index), &mut step);
            }
            FetchMode::Fetch => {
                let limit = self.items[index].settings.fetch_concurrency;
                if self.pending_fetches.is_empty() && self.active_fetches < limit {
                    self.start_fetch(index, &mut step);
                } else {
                    debug!(
                        index,
                        active = self.active_fetches,
                        limit,
                        "fetch limit reached; deferring fetch"
                    );
                    self.pending_fetches.push_back(index);
                }
            }
        }

        (ItemHandle(index), step)
    }

    /// Record the outcome of a fetch started by this queue.
    pub fn fetch_settled(&mut self, index: usize, outcome: FetchOutcome) -> QueueStep {
        let mut step = QueueStep::default();

        let Some(item) = self.items.get_mut(index) else {
            warn!(index, "fetch outcome for unknown item; ignoring");
            return step;
        };
        if item.state() != ItemState::FetchPending {
            debug!(index, state = ?item.state(), "late fetch outcome; ignoring");
            return step;
        }

        match outcome {
            FetchOutcome::Success(content) => {
                debug!(index, bytes = content.len(), "fetch succeeded");
                item.fetched_content = Some(content);
            }
            FetchOutcome::Denied(reason) => {
                if reason == DenialReason::NoCapability {
                    step.fetch_capability_lost = true;
                }
                if item.settings.fetch_pinned() {
                    warn!(index, locator = %item.settings.locator, ?reason, "fetch denied and use_fetch pinned; failing item");
                    item.failure = Some(LoadFailure::FetchDenied);
                } else {
                    info!(index, locator = %item.settings.locator, ?reason, "fetch denied; falling back to direct reference");
                    item.mode = FetchMode::Direct;
                }
            }
            FetchOutcome::TransportError(detail) => {
                warn!(index, locator = %item.settings.locator, %detail, "fetch failed");
                item.failure = Some(LoadFailure::Transport(detail));
            }
            FetchOutcome::TimedOut(after) => {
                warn!(index, locator = %item.settings.locator, ?after, "fetch timed out");
                item.failure = Some(LoadFailure::Timeout(after));
            }
        }
        item.advance(ItemState::FetchSettled);

        self.active_fetches = self.active_fetches.saturating_sub(1);
        self.dispatch_pending(&mut step);
        self.release(Some(index), &mut step);

        step
    }

    /// Record the materializer's report for one item.
    pub fn materialize_settled(&mut self, index: usize, outcome: MaterializeOutcome) -> QueueStep {
        let mut step = QueueStep::default();

        if self.state_of(index) != Some(ItemState::Materializing) {
            debug!(index, state = ?self.state_of(index), "materialize outcome for item not materializing; ignoring");
            return step;
        }
        step.timers_cleared.push(index);

        let head_released = match outcome {
            MaterializeOutcome::Applied(handle) => self.commit(index, handle, &mut step),
            MaterializeOutcome::Failed(reason) => {
                self.fail(index, LoadFailure::Materialization(reason), &mut step)
            }
        };
        if head_released {
            self.release(None, &mut step);
        }

        step
    }

    /// The materialization timeout of `index` fired.
    pub fn materialize_timed_out(&mut self, index: usize) -> QueueStep {
        let mut step = QueueStep::default();

        let Some(item) = self.items.get(index) else {
            warn!(index, "timeout for unknown item; ignoring");
            return step;
        };
        if item.state() != ItemState::Materializing {
            debug!(index, state = ?item.state(), "stale materialization timeout; ignoring");
            return step;
        }

        let after = item.settings.timeout;
        warn!(index, locator = %item.settings.locator, ?after, "materialization timed out");
        step.timers_cleared.push(index);
        if self.fail(index, LoadFailure::Timeout(after), &mut step) {
            self.release(None, &mut step);
        }

        step
    }

    /// Decide the initial load mode of a request.
    fn admission_mode(&self, settings: &LoadSettings) -> FetchMode {
        if settings.locator.is_empty() || settings.kind == ResourceKind::Barrier {
            return FetchMode::Direct;
        }
        if settings.use_fetch.is_none()
            && !is_same_origin(self.page_origin.as_ref(), &settings.locator)
        {
            debug!(locator = %settings.locator, "cross-origin locator; loading by direct reference");
            return FetchMode::Direct;
        }
        if settings.wants_fetch() {
            FetchMode::Fetch
        } else {
            FetchMode::Direct
        }
    }

    fn start_fetch(&mut self, index: usize, step: &mut QueueStep) {
        let item = &mut self.items[index];
        item.advance(ItemState::FetchPending);
        self.active_fetches += 1;
        debug!(index, active = self.active_fetches, "dispatching fetch");
        step.fetches.push(FetchJob::from_item(item));
    }

    /// Start deferred fetches while slots are free.
    fn dispatch_pending(&mut self, step: &mut QueueStep) {
        while let Some(&next) = self.pending_fetches.front() {
            if self.active_fetches >= self.items[next].settings.fetch_concurrency {
                break;
            }
            self.pending_fetches.pop_front();
            self.start_fetch(next, step);
        }
    }

    /// Hand every settled item between the commit pointer and the nearest
    /// ceiling (earliest blocker, `from`) to materialization.
    ///
    /// Runs again without `from` whenever a blocker at the head resolves
    /// during the pass, since that lifts the ceiling.
    fn release(&mut self, from: Option<usize>, step: &mut QueueStep) {
        let mut from = from;

        loop {
            if self.items.is_empty() {
                return;
            }

            let mut upper = self.items.len() - 1;
            if let Some(&head) = self.blockers.first() {
                upper = upper.min(head);
            }
            if let Some(from) = from {
                upper = upper.min(from);
            }

            let mut batch = Vec::new();
            let mut head_released = false;

            for index in self.commit_pointer..=upper {
                if self.items[index].state() != ItemState::FetchSettled {
                    continue;
                }
                self.items[index].advance(ItemState::ReleaseEligible);

                if let Some(failure) = self.items[index].failure.clone() {
                    head_released |= self.fail(index, failure, step);
                    continue;
                }

                self.items[index].advance(ItemState::Materializing);
                if self.items[index].settings.kind == ResourceKind::Barrier {
                    head_released |= self.commit(index, MaterializedHandle(index), step);
                    continue;
                }

                let item = &self.items[index];
                step.timers_armed.push((index, item.settings.timeout));
                batch.push(MaterializeJob::from_item(item));
            }

            if !batch.is_empty() {
                let indices: Vec<usize> = batch.iter().map(|j| j.index).collect();
                debug!(?indices, upper, "releasing batch to materializer");
                step.batches.push(batch);
            }

            if !head_released {
                return;
            }
            from = None;
        }
    }

    fn commit(&mut self, index: usize, handle: MaterializedHandle, step: &mut QueueStep) -> bool {
        let item = &mut self.items[index];
        item.advance(ItemState::Committed);
        item.materialized = Some(handle);
        info!(index, locator = %item.settings.locator, "item committed");
        self.finish_item(index, step)
    }

    fn fail(&mut self, index: usize, failure: LoadFailure, step: &mut QueueStep) -> bool {
        let item = &mut self.items[index];
        item.advance(ItemState::Failed);
        warn!(
            index,
            locator = %item.settings.locator,
            failure = failure.tag(),
            error = %failure,
            "item failed"
        );
        item.failure = Some(failure);
        self.finish_item(index, step)
    }

    /// Bookkeeping shared by commit and fail: callback, blockers, pointer.
    ///
    /// Returns `true` if the item was the earliest unresolved blocker.
    fn finish_item(&mut self, index: usize, step: &mut QueueStep) -> bool {
        let item = &self.items[index];
        let report = LoadReport::new(index, &item.settings, item.mode, item.failure.clone());
        let callback = if report.is_success() {
            item.settings.on_success.clone()
        } else {
            item.settings.on_failure.clone()
        };
        callback(&report);
        step.resolved.push(report);

        let head_released = match self.blockers.iter().position(|&b| b == index) {
            Some(0) => {
                self.blockers.remove(0);
                debug!(index, "head blocker resolved");
                true
            }
            Some(pos) => {
                self.blockers.remove(pos);
                false
            }
            None => false,
        };

        while self.commit_pointer < self.items.len()
            && self.items[self.commit_pointer].state().is_terminal()
        {
            self.commit_pointer += 1;
        }

        head_released
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::settings::{resolve, LoadOptions};

    fn queue() -> LoadQueue {
        LoadQueue::new(Origin::parse("https://page.test"))
    }

    fn settings(options: LoadOptions) -> LoadSettings {
        resolve(&LoadSettings::default(), &options)
    }

    fn applied(index: usize) -> MaterializeOutcome {
        MaterializeOutcome::Applied(MaterializedHandle(index))
    }

    fn released_indices(step: &QueueStep) -> Vec<usize> {
        step.batches.iter().flatten().map(|j| j.index).collect()
    }

    fn resolved_indices(step: &QueueStep) -> Vec<usize> {
        step.resolved.iter().map(|r| r.handle.index()).collect()
    }

    #[test]
    fn same_origin_item_is_fetched_then_released() {
        let mut q = queue();
        let (handle, step) = q.admit(settings(LoadOptions::new("js/a.js")));

        assert_eq!(handle, ItemHandle(0));
        assert_eq!(step.fetches.len(), 1);
        assert_eq!(q.state_of(0), Some(ItemState::FetchPending));
        assert_eq!(q.active_fetches(), 1);

        let step = q.fetch_settled(0, FetchOutcome::Success("var a;".into()));
        assert_eq!(q.active_fetches(), 0);
        assert_eq!(released_indices(&step), vec![0]);
        assert_eq!(step.batches[0][0].content.as_deref(), Some("var a;"));
        assert_eq!(step.timers_armed, vec![(0, Duration::from_millis(5000))]);
        assert_eq!(q.state_of(0), Some(ItemState::Materializing));

        let step = q.materialize_settled(0, applied(0));
        assert_eq!(step.timers_cleared, vec![0]);
        assert_eq!(resolved_indices(&step), vec![0]);
        assert_eq!(q.state_of(0), Some(ItemState::Committed));
        assert!(q.is_idle());
    }

    #[test]
    fn cross_origin_item_defaults_to_direct_mode() {
        let mut q = queue();
        let (_, step) = q.admit(settings(LoadOptions::new("https://cdn.test/lib.js")));

        assert!(step.fetches.is_empty());
        assert_eq!(released_indices(&step), vec![0]);
        assert_eq!(step.batches[0][0].mode, FetchMode::Direct);
        assert_eq!(step.batches[0][0].content, None);
    }

    #[test]
    fn pinned_fetch_ignores_origin() {
        let mut q = queue();
        let (_, step) =
            q.admit(settings(LoadOptions::new("https://cdn.test/lib.js").use_fetch(true)));
        assert_eq!(step.fetches.len(), 1);
    }

    #[test]
    fn empty_locator_never_fetches() {
        let mut q = queue();
        let (_, step) = q.admit(settings(LoadOptions::default().use_fetch(true)));
        assert!(step.fetches.is_empty());
        assert_eq!(released_indices(&step), vec![0]);
    }

    #[test]
    fn denied_fetch_falls_back_when_not_pinned() {
        let mut q = queue();
        q.admit(settings(LoadOptions::new("a.js")));

        let step = q.fetch_settled(0, FetchOutcome::Denied(DenialReason::Refused));
        assert_eq!(released_indices(&step), vec![0]);
        assert_eq!(step.batches[0][0].mode, FetchMode::Direct);
        assert!(step.resolved.is_empty());
        assert!(!step.fetch_capability_lost);
    }

    #[test]
    fn denied_fetch_fails_when_pinned() {
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();
        let mut q = queue();
        q.admit(settings(
            LoadOptions::new("a.js")
                .use_fetch(true)
                .on_failure(move |r| sink.lock().unwrap().push(r.failure.clone())),
        ));

        let step = q.fetch_settled(0, FetchOutcome::Denied(DenialReason::Refused));
        assert!(step.batches.is_empty());
        assert_eq!(q.state_of(0), Some(ItemState::Failed));
        assert_eq!(*failures.lock().unwrap(), vec![Some(LoadFailure::FetchDenied)]);
        assert!(q.is_idle());
    }

    #[test]
    fn no_capability_is_reported_upwards() {
        let mut q = queue();
        q.admit(settings(LoadOptions::new("a.js")));
        let step = q.fetch_settled(0, FetchOutcome::Denied(DenialReason::NoCapability));
        assert!(step.fetch_capability_lost);
        assert_eq!(released_indices(&step), vec![0]);
    }

    #[test]
    fn concurrency_limit_defers_extra_fetches() {
        let mut q = queue();
        for name in ["a.js", "b.js", "c.js"] {
            q.admit(settings(LoadOptions::new(name).fetch_concurrency(2)));
        }

        let snap = q.snapshot();
        assert_eq!(snap.count_in(ItemState::FetchPending), 2);
        assert_eq!(snap.pending_fetches, vec![2]);
        assert_eq!(q.state_of(2), Some(ItemState::Admitted));

        let step = q.fetch_settled(1, FetchOutcome::Success(String::new()));
        assert_eq!(step.fetches.len(), 1);
        assert_eq!(step.fetches[0].index, 2);
        assert_eq!(q.active_fetches(), 2);
        assert_eq!(q.state_of(2), Some(ItemState::FetchPending));
    }

    #[test]
    fn larger_limit_does_not_overtake_deferred_fetch() {
        let mut q = queue();
        q.admit(settings(LoadOptions::new("a.js").fetch_concurrency(1)));
        q.admit(settings(LoadOptions::new("b.js").fetch_concurrency(1)));
        let (_, step) = q.admit(settings(LoadOptions::new("c.js").fetch_concurrency(4)));

        assert!(step.fetches.is_empty());
        assert_eq!(q.snapshot().pending_fetches, vec![1, 2]);

        let step = q.fetch_settled(0, FetchOutcome::Success(String::new()));
        let started: Vec<_> = step.fetches.iter().map(|f| f.index).collect();
        assert_eq!(started, vec![1, 2]);
    }

    #[test]
    fn blocker_holds_back_later_items() {
        let mut q = queue();
        q.admit(settings(LoadOptions::new("a.js")));
        q.admit(settings(LoadOptions::new("b.js").blocking(true)));
        q.admit(settings(LoadOptions::new("c.js")));

        // C lands first but sits behind blocker B.
        let step = q.fetch_settled(2, FetchOutcome::Success(String::new()));
        assert!(step.batches.is_empty());
        assert_eq!(q.state_of(2), Some(ItemState::FetchSettled));

        let step = q.fetch_settled(1, FetchOutcome::Success(String::new()));
        assert_eq!(released_indices(&step), vec![1]);

        let step = q.materialize_settled(1, applied(1));
        assert_eq!(resolved_indices(&step), vec![1]);
        assert_eq!(released_indices(&step), vec![2]);
        assert!(q.blockers().is_empty());

        q.materialize_settled(2, applied(2));
        assert_eq!(q.commit_pointer(), 0);

        let step = q.fetch_settled(0, FetchOutcome::Success(String::new()));
        assert_eq!(released_indices(&step), vec![0]);
        q.materialize_settled(0, applied(0));
        assert_eq!(q.commit_pointer(), 3);
    }

    #[test]
    fn failed_blocker_releases_the_block() {
        let mut q = queue();
        q.admit(settings(LoadOptions::new("b.js").blocking(true)));
        q.admit(settings(LoadOptions::new("c.js")));

        q.fetch_settled(1, FetchOutcome::Success(String::new()));
        let step = q.fetch_settled(0, FetchOutcome::TransportError("HTTP 404".into()));

        assert_eq!(resolved_indices(&step), vec![0]);
        assert_eq!(released_indices(&step), vec![1]);
        assert_eq!(q.state_of(0), Some(ItemState::Failed));
        assert!(q.blockers().is_empty());
    }

    #[test]
    fn blocking_barrier_commits_synchronously_and_unblocks() {
        let mut q = queue();
        q.admit(settings(LoadOptions::new("a.js")));
        let (_, step) = q.admit(settings(LoadOptions::barrier()));
        assert_eq!(resolved_indices(&step), vec![1]);
        assert_eq!(q.state_of(1), Some(ItemState::Committed));
        assert!(q.blockers().is_empty());
        assert_eq!(q.commit_pointer(), 0);
    }

    #[test]
    fn fetch_failure_waits_for_earlier_blocker() {
        let mut q = queue();
        q.admit(settings(LoadOptions::new("b.js").blocking(true)));
        q.admit(settings(LoadOptions::new("c.js")));

        let step = q.fetch_settled(1, FetchOutcome::TimedOut(Duration::from_millis(5)));
        assert!(step.resolved.is_empty());
        assert_eq!(q.state_of(1), Some(ItemState::FetchSettled));

        q.fetch_settled(0, FetchOutcome::Success(String::new()));
        let step = q.materialize_settled(0, applied(0));
        assert_eq!(resolved_indices(&step), vec![0, 1]);
        assert_eq!(
            step.resolved[1].failure,
            Some(LoadFailure::Timeout(Duration::from_millis(5)))
        );
    }

    #[test]
    fn non_head_blocker_failure_does_not_deadlock() {
        let mut q = queue();
        q.admit(settings(LoadOptions::new("a.js").blocking(true)));
        q.admit(settings(LoadOptions::new("b.js").blocking(true).use_fetch(true)));
        q.admit(settings(LoadOptions::new("c.js")));

        q.fetch_settled(1, FetchOutcome::Denied(DenialReason::Refused));
        q.fetch_settled(2, FetchOutcome::Success(String::new()));
        assert_eq!(q.blockers(), &[0, 1]);

        q.fetch_settled(0, FetchOutcome::Success(String::new()));
        let step = q.materialize_settled(0, applied(0));

        assert_eq!(resolved_indices(&step), vec![0, 1]);
        assert_eq!(released_indices(&step), vec![2]);
        assert!(q.blockers().is_empty());
    }

    #[test]
    fn materialization_timeout_fails_item_once() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let mut q = queue();
        q.admit(settings(
            LoadOptions::new("https://cdn.test/x.css")
                .on_failure(move |_| *counter.lock().unwrap() += 1),
        ));

        let step = q.materialize_timed_out(0);
        assert_eq!(resolved_indices(&step), vec![0]);
        assert_eq!(q.state_of(0), Some(ItemState::Failed));

        // A late report and a second timer are both ignored.
        assert!(q.materialize_settled(0, applied(0)).is_empty());
        assert!(q.materialize_timed_out(0).is_empty());
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn late_fetch_outcome_is_ignored() {
        let mut q = queue();
        q.admit(settings(LoadOptions::new("a.js")));
        q.fetch_settled(0, FetchOutcome::Success(String::new()));
        let step = q.fetch_settled(0, FetchOutcome::TransportError("dup".into()));
        assert!(step.is_empty());
        assert_eq!(q.active_fetches(), 0);
    }
}
