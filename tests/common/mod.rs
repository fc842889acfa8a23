#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use lazyload::engine::RuntimeOptions;
use lazyload::handle::Loader;
use lazyload::settings::LoadOptions;
use lazyload::LoadReport;
use lazyload_test_utils::fetcher::ScriptedFetcher;
use lazyload_test_utils::materializer::{MaterializeLog, RecordingMaterializer};

pub use lazyload_test_utils::{init_tracing, with_timeout};

pub const PAGE_ORIGIN: &str = "https://page.test";

/// Callback order as observed by the caller.
#[derive(Debug, Clone, Default)]
pub struct Resolutions {
    reports: Arc<Mutex<Vec<LoadReport>>>,
}

impl Resolutions {
    /// Attach success and failure callbacks that record into this log.
    pub fn track(&self, options: LoadOptions) -> LoadOptions {
        let ok = Arc::clone(&self.reports);
        let failed = Arc::clone(&self.reports);
        options
            .on_success(move |r| ok.lock().unwrap().push(r.clone()))
            .on_failure(move |r| failed.lock().unwrap().push(r.clone()))
    }

    pub fn reports(&self) -> Vec<LoadReport> {
        self.reports.lock().unwrap().clone()
    }

    pub fn locators(&self) -> Vec<String> {
        self.reports().into_iter().map(|r| r.locator).collect()
    }
}

pub fn options() -> RuntimeOptions {
    RuntimeOptions {
        page_origin: Some(PAGE_ORIGIN.to_string()),
        defaults: LoadOptions::default(),
    }
}

/// Spawn a loader over a scripted fetcher and a recording materializer.
pub fn spawn_recording(
    fetcher: ScriptedFetcher,
    options: RuntimeOptions,
    configure: impl FnOnce(RecordingMaterializer) -> RecordingMaterializer,
) -> (
    Loader,
    tokio::task::JoinHandle<lazyload::errors::Result<()>>,
    MaterializeLog,
) {
    let log = MaterializeLog::default();
    let materializer_log = log.clone();
    let (loader, task) = Loader::spawn(
        fetcher,
        move |tx| configure(RecordingMaterializer::new(tx, materializer_log)),
        options,
    );
    (loader, task, log)
}
