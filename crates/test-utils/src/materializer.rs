use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use lazyload::engine::{LoaderEvent, MaterializeOutcome, MaterializedHandle};
use lazyload::errors::{LazyloadError, Result};
use lazyload::materialize::backend::report_outcomes;
use lazyload::materialize::MaterializerBackend;
use lazyload::queue::MaterializeJob;

/// What the recording materializer saw.
#[derive(Debug, Clone, Default)]
pub struct MaterializeLog {
    batches: Arc<Mutex<Vec<Vec<MaterializeJob>>>>,
}

impl MaterializeLog {
    /// Released batches, as item indices.
    pub fn batches(&self) -> Vec<Vec<usize>> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.iter().map(|j| j.index).collect())
            .collect()
    }

    /// Every job handed over, in release order.
    pub fn jobs(&self) -> Vec<MaterializeJob> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    /// Locators in release order.
    pub fn released(&self) -> Vec<String> {
        self.jobs().into_iter().map(|j| j.locator).collect()
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Fail(String),
    Hang,
}

/// A fake materializer that:
/// - records every batch it receives
/// - reports `Applied` for each item unless told to fail or hang on it.
pub struct RecordingMaterializer {
    runtime_tx: mpsc::Sender<LoaderEvent>,
    scripted: HashMap<String, Scripted>,
    reject_batches: Option<String>,
    log: MaterializeLog,
}

impl RecordingMaterializer {
    pub fn new(runtime_tx: mpsc::Sender<LoaderEvent>, log: MaterializeLog) -> Self {
        Self {
            runtime_tx,
            scripted: HashMap::new(),
            reject_batches: None,
            log,
        }
    }

    pub fn fail_on(mut self, locator: &str, reason: &str) -> Self {
        self.scripted
            .insert(locator.to_string(), Scripted::Fail(reason.to_string()));
        self
    }

    /// Record every batch, then reject it as a whole with `reason`.
    pub fn reject_batches(mut self, reason: &str) -> Self {
        self.reject_batches = Some(reason.to_string());
        self
    }

    /// Never report an outcome for `locator`.
    pub fn hang_on(mut self, locator: &str) -> Self {
        self.scripted.insert(locator.to_string(), Scripted::Hang);
        self
    }
}

impl MaterializerBackend for RecordingMaterializer {
    fn materialize_batch(
        &mut self,
        batch: Vec<MaterializeJob>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        if let Some(reason) = &self.reject_batches {
            let err = LazyloadError::ConfigError(reason.clone());
            self.log.batches.lock().unwrap().push(batch);
            return Box::pin(async move { Err(err) });
        }

        let outcomes = batch
            .iter()
            .filter_map(|job| match self.scripted.get(&job.locator) {
                None => Some((
                    job.index,
                    MaterializeOutcome::Applied(MaterializedHandle(job.index)),
                )),
                Some(Scripted::Fail(reason)) => {
                    Some((job.index, MaterializeOutcome::Failed(reason.clone())))
                }
                Some(Scripted::Hang) => None,
            })
            .collect();

        self.log.batches.lock().unwrap().push(batch);
        report_outcomes(&self.runtime_tx, outcomes);

        Box::pin(async { Ok(()) })
    }
}
