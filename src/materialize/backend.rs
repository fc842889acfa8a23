// src/materialize/backend.rs

//! Pluggable materializer backend abstraction.
//!
//! The runtime hands every released batch to a `MaterializerBackend`. The
//! backend reports one `MaterializeSettled` event per item back to the
//! runtime, at most once, on the sender it was built with.
//!
//! Reports must not be sent from inside the returned future while awaiting
//! channel capacity: the runtime awaits that future from its own loop, so
//! backends hand the reports to a separate task instead.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::warn;

use crate::engine::{LoaderEvent, MaterializeOutcome};
use crate::errors::Result;
use crate::queue::MaterializeJob;

/// Trait abstracting how released items become observable.
pub trait MaterializerBackend: Send {
    /// Materialize a released batch as one unit.
    ///
    /// Returning an error fails every item in the batch without reporting
    /// anything; the runtime delivers those failures itself. Per-item
    /// problems are reported as `MaterializeOutcome::Failed` instead.
    fn materialize_batch(
        &mut self,
        batch: Vec<MaterializeJob>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Send per-item outcomes to the runtime from a detached task, in order.
pub fn report_outcomes(
    runtime_tx: &mpsc::Sender<LoaderEvent>,
    outcomes: Vec<(usize, MaterializeOutcome)>,
) {
    if outcomes.is_empty() {
        return;
    }
    let tx = runtime_tx.clone();
    tokio::spawn(async move {
        for (index, outcome) in outcomes {
            if tx
                .send(LoaderEvent::MaterializeSettled { index, outcome })
                .await
                .is_err()
            {
                warn!(index, "runtime gone; dropping materialization outcome");
                return;
            }
        }
    });
}
