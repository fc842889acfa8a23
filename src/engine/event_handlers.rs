// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::engine::{FetchOutcome, ItemHandle, MaterializeOutcome};
use crate::queue::{FetchJob, LoadQueue, MaterializeJob, QueueStep};
use crate::settings::{resolve, resolve_defaults, LoadOptions, LoadSettings};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Start these fetches, each guarded by its own timeout.
    StartFetches(Vec<FetchJob>),
    /// Hand this batch to the materializer as one unit.
    Materialize(Vec<MaterializeJob>),
    /// Start the materialization timer for an item.
    ArmTimeout { index: usize, after: Duration },
    /// Cancel the materialization timer for an item.
    ClearTimeout { index: usize },
    /// Everything is resolved and no more submissions will come.
    RequestExit,
}

/// Decision returned by the core after handling a single `LoaderEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Translate a queue step into shell commands.
///
/// Timers are cleared before anything else so a stale timer never outlives
/// the outcome it guarded.
pub fn commands_from_queue_step(step: QueueStep) -> Vec<CoreCommand> {
    let mut commands = Vec::new();

    for index in step.timers_cleared {
        commands.push(CoreCommand::ClearTimeout { index });
    }
    if !step.fetches.is_empty() {
        commands.push(CoreCommand::StartFetches(step.fetches));
    }
    for (index, after) in step.timers_armed {
        commands.push(CoreCommand::ArmTimeout { index, after });
    }
    for batch in step.batches {
        commands.push(CoreCommand::Materialize(batch));
    }

    commands
}

/// Handle a submission: resolve settings, admit, reply with the handle.
pub fn handle_submit(
    queue: &mut LoadQueue,
    defaults: &LoadSettings,
    options: LoadOptions,
    reply: Option<oneshot::Sender<ItemHandle>>,
) -> CoreStep {
    let settings = resolve(defaults, &options);
    let (handle, step) = queue.admit(settings);

    if let Some(reply) = reply {
        if reply.send(handle).is_err() {
            debug!(index = handle.index(), "submitter dropped before receiving its handle");
        }
    }

    CoreStep::running(commands_from_queue_step(step))
}

/// Handle `set_defaults`: later submissions resolve against the new defaults.
pub fn handle_set_defaults(defaults: &mut LoadSettings, options: LoadOptions) -> CoreStep {
    if options.locator.is_some() {
        debug!("set_defaults ignores the locator field");
    }
    *defaults = resolve_defaults(defaults, &options);
    info!(?defaults, "loader defaults replaced");

    CoreStep::running(Vec::new())
}

/// Handle the terminal outcome of a fetch.
pub fn handle_fetch_settled(
    queue: &mut LoadQueue,
    defaults: &mut LoadSettings,
    index: usize,
    outcome: FetchOutcome,
) -> CoreStep {
    let step = queue.fetch_settled(index, outcome);

    if step.fetch_capability_lost && defaults.fetch_by_default {
        warn!("no fetch capability on this host; later requests default to direct loading");
        defaults.fetch_by_default = false;
    }

    CoreStep::running(commands_from_queue_step(step))
}

/// Handle the materializer's report for one item.
pub fn handle_materialize_settled(
    queue: &mut LoadQueue,
    index: usize,
    outcome: MaterializeOutcome,
) -> CoreStep {
    let step = queue.materialize_settled(index, outcome);
    CoreStep::running(commands_from_queue_step(step))
}

/// Handle a fired materialization timer.
pub fn handle_materialize_timeout(queue: &mut LoadQueue, index: usize) -> CoreStep {
    let step = queue.materialize_timed_out(index);
    CoreStep::running(commands_from_queue_step(step))
}
