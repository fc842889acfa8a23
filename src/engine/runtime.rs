// src/engine/runtime.rs

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::fetch::{dispatch_fetch, ResourceFetcher};
use crate::materialize::MaterializerBackend;
use crate::queue::{FetchJob, MaterializeJob};

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, LoaderEvent, MaterializeOutcome};

/// Drives the load queue in response to `LoaderEvent`s, delegating fetches
/// to a `ResourceFetcher` and released batches to a `MaterializerBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// ordering semantics. This struct handles async IO: reading events from
/// the channel, spawning fetch tasks and owning materialization timers.
pub struct Runtime<F: ResourceFetcher, M: MaterializerBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<LoaderEvent>,
    /// Handed to fetch tasks and timers so they can report back.
    event_tx: mpsc::Sender<LoaderEvent>,
    /// Resolves (or errors) once the last loader handle is gone.
    handles_gone: oneshot::Receiver<()>,
    fetcher: Arc<F>,
    materializer: M,
    timers: HashMap<usize, JoinHandle<()>>,
}

impl<F: ResourceFetcher, M: MaterializerBackend> fmt::Debug for Runtime<F, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}

impl<F: ResourceFetcher, M: MaterializerBackend> Runtime<F, M> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<LoaderEvent>,
        event_tx: mpsc::Sender<LoaderEvent>,
        handles_gone: oneshot::Receiver<()>,
        fetcher: Arc<F>,
        materializer: M,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            handles_gone,
            fetcher,
            materializer,
            timers: HashMap::new(),
        }
    }

    /// Main event loop.
    ///
    /// - Consumes `LoaderEvent`s from `event_rx`.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core (fetch, materialize, timers).
    ///
    /// Queued events are drained before the loss of the last handle is
    /// noticed; that loss then acts as `LoaderEvent::Finish`.
    pub async fn run(mut self) -> Result<()> {
        info!("lazyload runtime started");
        let mut handles_dropped = false;

        loop {
            let event = tokio::select! {
                biased;
                event = self.event_rx.recv() => match event {
                    Some(e) => e,
                    None => {
                        info!("loader event channel closed; exiting");
                        break;
                    }
                },
                _ = &mut self.handles_gone, if !handles_dropped => {
                    handles_dropped = true;
                    info!("last loader handle dropped; draining queue");
                    LoaderEvent::Finish
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            let mut keep_running = step.keep_running;
            let mut commands: VecDeque<_> = step.commands.into();

            while let Some(command) = commands.pop_front() {
                if let Some(followup) = self.execute_command(command).await {
                    keep_running &= followup.keep_running;
                    commands.extend(followup.commands);
                }
            }

            if !keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        self.cancel_timers();
        info!(
            items = self.core.queue().len(),
            resolved = self.core.queue().commit_pointer(),
            "runtime exiting"
        );
        Ok(())
    }

    /// Execute one command. Returns the core's follow-up step when the
    /// command had to be settled in place.
    async fn execute_command(&mut self, command: CoreCommand) -> Option<CoreStep> {
        match command {
            CoreCommand::StartFetches(jobs) => self.start_fetches(jobs),
            CoreCommand::Materialize(batch) => return self.materialize(batch).await,
            CoreCommand::ArmTimeout { index, after } => self.arm_timeout(index, after),
            CoreCommand::ClearTimeout { index } => self.clear_timeout(index),
            CoreCommand::RequestExit => {
                // keep_running is already false; nothing left to drive.
                info!("core issued RequestExit command");
            }
        }
        None
    }

    fn start_fetches(&mut self, jobs: Vec<FetchJob>) {
        for job in jobs {
            // Completion is reported through the channel; the task handle is
            // not needed.
            let _ = dispatch_fetch(Arc::clone(&self.fetcher), job, self.event_tx.clone());
        }
    }

    /// Hand a batch to the materializer. If the backend rejects the whole
    /// batch, every item in it fails through the core so its callback fires.
    async fn materialize(&mut self, batch: Vec<MaterializeJob>) -> Option<CoreStep> {
        if batch.is_empty() {
            return None;
        }
        let indices: Vec<_> = batch.iter().map(|j| j.index).collect();
        debug!(?indices, "handing batch to materializer");

        let err = match self.materializer.materialize_batch(batch).await {
            Ok(()) => return None,
            Err(err) => err,
        };
        warn!(?indices, error = %err, "materializer rejected batch; failing its items");

        let mut merged = CoreStep::running(Vec::new());
        for index in indices {
            let step = self.core.step(LoaderEvent::MaterializeSettled {
                index,
                outcome: MaterializeOutcome::Failed(err.to_string()),
            });
            merged.keep_running &= step.keep_running;
            merged.commands.extend(step.commands);
        }
        Some(merged)
    }

    fn arm_timeout(&mut self, index: usize, after: Duration) {
        let tx = self.event_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if tx.send(LoaderEvent::MaterializeTimedOut { index }).await.is_err() {
                debug!(index, "runtime gone before materialization timeout fired");
            }
        });

        if let Some(previous) = self.timers.insert(index, timer) {
            warn!(index, "materialization timer armed twice; replacing");
            previous.abort();
        }
    }

    fn clear_timeout(&mut self, index: usize) {
        if let Some(timer) = self.timers.remove(&index) {
            timer.abort();
        }
    }

    fn cancel_timers(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }
}
