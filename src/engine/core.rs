// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`LoaderEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from the channel
//! - running fetches and the materializer
//! - owning the materialization timers
//!
//! User callbacks fire from inside [`CoreRuntime::step`], synchronously, at
//! the moment their item resolves.

use tracing::{debug, info, warn};

use crate::engine::event_handlers::{
    handle_fetch_settled, handle_materialize_settled, handle_materialize_timeout,
    handle_set_defaults, handle_submit, CoreCommand, CoreStep,
};
use crate::engine::{LoaderEvent, RuntimeOptions};
use crate::queue::{LoadQueue, Origin, QueueSnapshot};
use crate::settings::{resolve_defaults, LoadSettings};

/// Pure core runtime state.
///
/// This owns:
/// - the load queue (ordering engine)
/// - the current loader defaults
/// - whether the owner announced that no more submissions follow
///
/// It has **no** channels, no Tokio tasks, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    queue: LoadQueue,
    defaults: LoadSettings,
    finishing: bool,
}

impl CoreRuntime {
    pub fn new(options: &RuntimeOptions) -> Self {
        let page_origin = match options.page_origin.as_deref() {
            Some(raw) => {
                let parsed = Origin::parse(raw);
                if parsed.is_none() {
                    warn!(origin = %raw, "page origin is not an http(s) URL; treating every absolute locator as cross-origin");
                }
                parsed
            }
            None => None,
        };
        let defaults = resolve_defaults(&LoadSettings::default(), &options.defaults);

        Self {
            queue: LoadQueue::new(page_origin),
            defaults,
            finishing: false,
        }
    }

    /// Whether every admitted item has resolved.
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    pub fn queue(&self) -> &LoadQueue {
        &self.queue
    }

    pub fn defaults(&self) -> &LoadSettings {
        &self.defaults
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.queue.snapshot()
    }

    /// Handle a single loader event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: LoaderEvent) -> CoreStep {
        let mut step = match event {
            LoaderEvent::Submit { options, reply } => {
                handle_submit(&mut self.queue, &self.defaults, options, reply)
            }
            LoaderEvent::SetDefaults { options } => {
                handle_set_defaults(&mut self.defaults, options)
            }
            LoaderEvent::FetchSettled { index, outcome } => {
                handle_fetch_settled(&mut self.queue, &mut self.defaults, index, outcome)
            }
            LoaderEvent::MaterializeSettled { index, outcome } => {
                handle_materialize_settled(&mut self.queue, index, outcome)
            }
            LoaderEvent::MaterializeTimedOut { index } => {
                handle_materialize_timeout(&mut self.queue, index)
            }
            LoaderEvent::Snapshot { reply } => {
                if reply.send(self.queue.snapshot()).is_err() {
                    debug!("snapshot requester went away");
                }
                CoreStep::running(Vec::new())
            }
            LoaderEvent::Finish => {
                info!(items = self.queue.len(), "no more submissions; draining queue");
                self.finishing = true;
                CoreStep::running(Vec::new())
            }
            LoaderEvent::ShutdownRequested => {
                if !self.queue.is_idle() {
                    warn!(
                        unresolved = self.queue.len() - self.queue.commit_pointer(),
                        "shutdown requested with unresolved items"
                    );
                }
                return CoreStep {
                    commands: Vec::new(),
                    keep_running: false,
                };
            }
        };

        if self.finishing && self.queue.is_idle() {
            step.keep_running = false;
            step.commands.push(CoreCommand::RequestExit);
        }

        step
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::engine::{DenialReason, FetchOutcome, ItemHandle, MaterializeOutcome, MaterializedHandle};
    use crate::settings::LoadOptions;
    use crate::types::FetchMode;

    fn core() -> CoreRuntime {
        CoreRuntime::new(&RuntimeOptions {
            page_origin: Some("https://page.test".to_string()),
            defaults: LoadOptions::default(),
        })
    }

    fn submit(core: &mut CoreRuntime, options: LoadOptions) -> CoreStep {
        core.step(LoaderEvent::Submit {
            options,
            reply: None,
        })
    }

    #[test]
    fn submit_replies_with_sequential_handles() {
        let mut core = core();
        let (tx, mut rx) = oneshot::channel();
        core.step(LoaderEvent::Submit {
            options: LoadOptions::new("a.js"),
            reply: Some(tx),
        });
        assert_eq!(rx.try_recv().ok(), Some(ItemHandle(0)));

        let (tx, mut rx) = oneshot::channel();
        core.step(LoaderEvent::Submit {
            options: LoadOptions::new("b.js"),
            reply: Some(tx),
        });
        assert_eq!(rx.try_recv().ok(), Some(ItemHandle(1)));
    }

    #[test]
    fn fetch_then_materialize_produces_timer_commands() {
        let mut core = core();
        let step = submit(&mut core, LoadOptions::new("a.js").timeout(Duration::from_millis(40)));
        assert!(matches!(step.commands.as_slice(), [CoreCommand::StartFetches(jobs)] if jobs.len() == 1));

        let step = core.step(LoaderEvent::FetchSettled {
            index: 0,
            outcome: FetchOutcome::Success("x".into()),
        });
        assert!(matches!(
            step.commands.as_slice(),
            [CoreCommand::ArmTimeout { index: 0, after }, CoreCommand::Materialize(batch)]
                if *after == Duration::from_millis(40) && batch.len() == 1
        ));

        let step = core.step(LoaderEvent::MaterializeSettled {
            index: 0,
            outcome: MaterializeOutcome::Applied(MaterializedHandle(0)),
        });
        assert!(matches!(step.commands.as_slice(), [CoreCommand::ClearTimeout { index: 0 }]));
        assert!(step.keep_running);
    }

    #[test]
    fn finish_exits_once_idle() {
        let mut core = core();
        submit(&mut core, LoadOptions::new("a.js"));

        let step = core.step(LoaderEvent::Finish);
        assert!(step.keep_running);

        let step = core.step(LoaderEvent::FetchSettled {
            index: 0,
            outcome: FetchOutcome::TransportError("HTTP 500".into()),
        });
        assert!(core.is_idle());
        assert!(!step.keep_running);
        assert!(matches!(step.commands.last(), Some(CoreCommand::RequestExit)));
    }

    #[test]
    fn finish_on_empty_queue_exits_immediately() {
        let mut core = core();
        let step = core.step(LoaderEvent::Finish);
        assert!(!step.keep_running);
    }

    #[test]
    fn missing_fetch_capability_flips_defaults() {
        let mut core = core();
        submit(&mut core, LoadOptions::new("a.js"));
        core.step(LoaderEvent::FetchSettled {
            index: 0,
            outcome: FetchOutcome::Denied(DenialReason::NoCapability),
        });
        assert!(!core.defaults().fetch_by_default);

        let step = submit(&mut core, LoadOptions::new("b.js"));
        let released: Vec<_> = step
            .commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::Materialize(batch) => Some(batch[0].mode),
                _ => None,
            })
            .collect();
        assert_eq!(released, vec![FetchMode::Direct]);
    }

    #[test]
    fn set_defaults_applies_to_later_submissions() {
        let mut core = core();
        core.step(LoaderEvent::SetDefaults {
            options: LoadOptions::default().timeout(Duration::from_millis(75)),
        });
        let step = submit(&mut core, LoadOptions::new("https://cdn.test/a.css"));
        assert!(step
            .commands
            .iter()
            .any(|c| matches!(c, CoreCommand::ArmTimeout { after, .. } if *after == Duration::from_millis(75))));
    }

    #[test]
    fn shutdown_stops_immediately() {
        let mut core = core();
        submit(&mut core, LoadOptions::new("a.js"));
        let step = core.step(LoaderEvent::ShutdownRequested);
        assert!(!step.keep_running);
    }
}
