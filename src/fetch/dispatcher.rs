// src/fetch/dispatcher.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::{DenialReason, FetchOutcome, LoaderEvent};
use crate::fetch::ResourceFetcher;
use crate::queue::FetchJob;

/// Fetch `locator`, giving up after `timeout`.
///
/// On timeout the in-flight fetch future is dropped, which cancels it.
pub async fn fetch_with_timeout<F>(fetcher: &F, locator: String, timeout: Duration) -> FetchOutcome
where
    F: ResourceFetcher + ?Sized,
{
    if !fetcher.is_available() {
        return FetchOutcome::Denied(DenialReason::NoCapability);
    }

    match tokio::time::timeout(timeout, fetcher.fetch(locator)).await {
        Ok(outcome) => outcome,
        Err(_) => FetchOutcome::TimedOut(timeout),
    }
}

/// Run one fetch job on its own task and report the outcome as a
/// `FetchSettled` event.
pub fn dispatch_fetch<F>(
    fetcher: Arc<F>,
    job: FetchJob,
    runtime_tx: mpsc::Sender<LoaderEvent>,
) -> JoinHandle<()>
where
    F: ResourceFetcher + ?Sized,
{
    tokio::spawn(async move {
        let FetchJob {
            index,
            locator,
            timeout,
        } = job;
        debug!(index, %locator, ?timeout, "fetch started");

        let outcome = fetch_with_timeout(fetcher.as_ref(), locator, timeout).await;

        if runtime_tx
            .send(LoaderEvent::FetchSettled { index, outcome })
            .await
            .is_err()
        {
            warn!(index, "runtime gone; dropping fetch outcome");
        }
    })
}
