// tests/ordering_properties.rs

use std::collections::VecDeque;

use proptest::prelude::*;

use lazyload::engine::{FetchOutcome, MaterializeOutcome, MaterializedHandle};
use lazyload::queue::{LoadQueue, Origin, QueueStep};
use lazyload::settings::{resolve, LoadOptions, LoadSettings};

#[derive(Debug, Clone)]
struct Plan {
    blocking: Vec<bool>,
    failing: Vec<bool>,
    limit: usize,
    /// Scheduling choices: `(settle_a_fetch, which)`.
    choices: Vec<(bool, usize)>,
}

fn plan_strategy() -> impl Strategy<Value = Plan> {
    (1..10usize).prop_flat_map(|n| {
        (
            proptest::collection::vec(any::<bool>(), n),
            proptest::collection::vec(prop::bool::weighted(0.2), n),
            1..4usize,
            proptest::collection::vec((any::<bool>(), any::<usize>()), 0..40),
        )
            .prop_map(|(blocking, failing, limit, choices)| Plan {
                blocking,
                failing,
                limit,
                choices,
            })
    })
}

/// Drives a queue to completion, recording the resolution order.
struct Driver {
    queue: LoadQueue,
    in_flight: Vec<usize>,
    materializing: VecDeque<usize>,
    resolved: Vec<usize>,
    limit: usize,
}

impl Driver {
    fn absorb(&mut self, step: QueueStep) {
        self.in_flight.extend(step.fetches.iter().map(|j| j.index));
        self.materializing
            .extend(step.batches.iter().flatten().map(|j| j.index));
        self.resolved
            .extend(step.resolved.iter().map(|r| r.handle.index()));
        assert!(self.queue.active_fetches() <= self.limit);
    }

    fn settle_fetch(&mut self, which: usize, failing: &[bool]) {
        let index = self.in_flight.remove(which % self.in_flight.len());
        let outcome = if failing[index] {
            FetchOutcome::TransportError("HTTP 503".into())
        } else {
            FetchOutcome::Success(String::new())
        };
        let step = self.queue.fetch_settled(index, outcome);
        self.absorb(step);
    }

    fn settle_materialize(&mut self) {
        if let Some(index) = self.materializing.pop_front() {
            let step = self
                .queue
                .materialize_settled(index, MaterializeOutcome::Applied(MaterializedHandle(index)));
            self.absorb(step);
        }
    }
}

proptest! {
    #[test]
    fn ordering_invariants_hold(plan in plan_strategy()) {
        let mut driver = Driver {
            queue: LoadQueue::new(Origin::parse("https://page.test")),
            in_flight: Vec::new(),
            materializing: VecDeque::new(),
            resolved: Vec::new(),
            limit: plan.limit,
        };

        for (i, blocking) in plan.blocking.iter().enumerate() {
            let options = LoadOptions::new(format!("r{i}.js"))
                .blocking(*blocking)
                .fetch_concurrency(plan.limit);
            let (_, step) = driver.queue.admit(resolve(&LoadSettings::default(), &options));
            driver.absorb(step);
        }

        let mut pointer = driver.queue.commit_pointer();
        let mut choices = plan.choices.iter().copied();
        while !driver.queue.is_idle() {
            let (prefer_fetch, which) = choices.next().unwrap_or((true, 0));
            let can_fetch = !driver.in_flight.is_empty();
            let can_materialize = !driver.materializing.is_empty();
            prop_assert!(can_fetch || can_materialize, "queue stalled: {:?}", driver.queue.snapshot());

            if can_fetch && (prefer_fetch || !can_materialize) {
                driver.settle_fetch(which, &plan.failing);
            } else {
                driver.settle_materialize();
            }

            prop_assert!(driver.queue.commit_pointer() >= pointer);
            pointer = driver.queue.commit_pointer();
        }

        // Every item resolved exactly once.
        let mut sorted = driver.resolved.clone();
        sorted.sort_unstable();
        prop_assert_eq!(sorted, (0..plan.blocking.len()).collect::<Vec<_>>());

        // Nothing after a blocker resolves before it.
        for (position, &index) in driver.resolved.iter().enumerate() {
            for blocker in (0..index).filter(|&i| plan.blocking[i]) {
                let blocker_position = driver.resolved.iter().position(|&r| r == blocker);
                prop_assert!(blocker_position.is_some_and(|p| p < position));
            }
        }
        prop_assert!(driver.queue.blockers().is_empty());
    }
}
