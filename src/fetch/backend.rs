// src/fetch/backend.rs

//! Pluggable fetch backend abstraction.
//!
//! The runtime talks to a `ResourceFetcher` instead of a raw HTTP client.
//! Tests provide their own fetcher with scripted latencies and outcomes.

use std::future::Future;
use std::pin::Pin;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::engine::{DenialReason, FetchOutcome};
use crate::errors::{LazyloadError, Result};
use crate::queue::origin::{absolutize, Origin};

/// Trait abstracting how a locator's content is retrieved.
///
/// Implementations report every terminal condition through
/// [`FetchOutcome`]; they never error. Timeouts are applied by the
/// dispatcher, so `fetch` may take as long as it likes.
pub trait ResourceFetcher: Send + Sync + 'static {
    /// Whether this host can fetch at all.
    fn is_available(&self) -> bool {
        true
    }

    fn fetch(&self, locator: String) -> Pin<Box<dyn Future<Output = FetchOutcome> + Send + '_>>;
}

/// Production fetcher: one GET per locator through a shared reqwest client.
///
/// Relative locators are resolved against the page origin. Without a page
/// origin they cannot be requested and are reported as denied, which lets
/// unpinned items fall back to a direct reference.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    page_origin: Option<Origin>,
}

impl HttpFetcher {
    pub fn new(page_origin: Option<Origin>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("lazyload/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LazyloadError::Other(e.into()))?;
        Ok(Self { client, page_origin })
    }

    async fn get(&self, locator: String) -> FetchOutcome {
        let Some(url) = absolutize(self.page_origin.as_ref(), &locator) else {
            debug!(%locator, "relative locator without page origin; refusing fetch");
            return FetchOutcome::Denied(DenialReason::Refused);
        };

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(err) if err.is_connect() || err.is_builder() => {
                debug!(%url, error = %err, "request refused before any status");
                return FetchOutcome::Denied(DenialReason::Refused);
            }
            Err(err) => {
                warn!(%url, error = %err, "request failed");
                return FetchOutcome::TransportError(err.to_string());
            }
        };

        let status = response.status();
        if !(status.is_success() || status == StatusCode::NOT_MODIFIED) {
            return FetchOutcome::TransportError(format!("HTTP {}", status.as_u16()));
        }

        match response.text().await {
            Ok(body) => FetchOutcome::Success(body),
            Err(err) => FetchOutcome::TransportError(format!("reading body: {err}")),
        }
    }
}

impl ResourceFetcher for HttpFetcher {
    fn fetch(&self, locator: String) -> Pin<Box<dyn Future<Output = FetchOutcome> + Send + '_>> {
        Box::pin(self.get(locator))
    }
}

/// Fetcher for hosts with no fetch capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableFetcher;

impl ResourceFetcher for UnavailableFetcher {
    fn is_available(&self) -> bool {
        false
    }

    fn fetch(&self, _locator: String) -> Pin<Box<dyn Future<Output = FetchOutcome> + Send + '_>> {
        Box::pin(async { FetchOutcome::Denied(DenialReason::NoCapability) })
    }
}
