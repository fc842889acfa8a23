use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lazyload::engine::FetchOutcome;
use lazyload::fetch::ResourceFetcher;

/// Shared counters of a [`ScriptedFetcher`], readable after the fetcher was
/// moved into a loader.
#[derive(Debug, Clone, Default)]
pub struct FetchProbe {
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl FetchProbe {
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Locators in the order their fetches started.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

/// Decrements the in-flight counter even when the fetch future is dropped
/// by a timeout.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A fake fetcher that:
/// - answers each locator after a scripted latency with a scripted outcome
/// - records how many fetches ran at once.
#[derive(Debug, Clone)]
pub struct ScriptedFetcher {
    responses: HashMap<String, (Duration, FetchOutcome)>,
    fallback: (Duration, FetchOutcome),
    available: bool,
    probe: FetchProbe,
}

impl ScriptedFetcher {
    /// Every unscripted locator succeeds immediately with empty content.
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            fallback: (Duration::ZERO, FetchOutcome::Success(String::new())),
            available: true,
            probe: FetchProbe::default(),
        }
    }

    pub fn respond(mut self, locator: &str, after: Duration, outcome: FetchOutcome) -> Self {
        self.responses.insert(locator.to_string(), (after, outcome));
        self
    }

    /// Succeed with `content` after `after`.
    pub fn succeed(self, locator: &str, after: Duration, content: &str) -> Self {
        self.respond(locator, after, FetchOutcome::Success(content.to_string()))
    }

    /// Never answer (the dispatcher's timeout decides).
    pub fn hang(self, locator: &str) -> Self {
        self.respond(
            locator,
            Duration::from_secs(24 * 60 * 60),
            FetchOutcome::TransportError("never answered".to_string()),
        )
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn probe(&self) -> FetchProbe {
        self.probe.clone()
    }
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceFetcher for ScriptedFetcher {
    fn is_available(&self) -> bool {
        self.available
    }

    fn fetch(&self, locator: String) -> Pin<Box<dyn Future<Output = FetchOutcome> + Send + '_>> {
        let (after, outcome) = self
            .responses
            .get(&locator)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());
        let probe = self.probe.clone();

        Box::pin(async move {
            probe.requested.lock().unwrap().push(locator);
            let now = probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlight(Arc::clone(&probe.in_flight));

            tokio::time::sleep(after).await;
            outcome
        })
    }
}
