// src/settings/options.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::LoadReport;
use crate::types::ResourceKind;

/// Platform-passthrough attributes (`id`, `charset`, `media`, ...).
pub type Attributes = BTreeMap<String, String>;

/// User callback fired exactly once when an item resolves.
pub type Callback = Arc<dyn Fn(&LoadReport) + Send + Sync>;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;
pub const SCRIPT_CONTENT_TYPE: &str = "text/javascript";
pub const STYLESHEET_CONTENT_TYPE: &str = "text/css";

/// Attribute keys a request may carry. Anything else is dropped by
/// [`crate::settings::resolve`].
pub const ATTRIBUTE_ALLOWLIST: [&str; 5] = ["id", "type", "charset", "media", "title"];

fn noop_callback() -> Callback {
    Arc::new(|_report: &LoadReport| {})
}

/// Caller-supplied options for one request (or for `set_defaults`).
///
/// Every field is optional; unset fields inherit from the loader's current
/// defaults when resolved.
#[derive(Clone, Default)]
pub struct LoadOptions {
    pub locator: Option<String>,
    pub kind: Option<ResourceKind>,
    pub blocking: Option<bool>,
    /// `Some(_)` pins the fetch mode; `None` lets the engine decide.
    pub use_fetch: Option<bool>,
    pub attributes: Attributes,
    pub timeout: Option<Duration>,
    pub fetch_concurrency: Option<usize>,
    pub on_success: Option<Callback>,
    pub on_failure: Option<Callback>,
}

impl LoadOptions {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: Some(locator.into()),
            ..Self::default()
        }
    }

    /// Options for a barrier: no locator, gates everything submitted after it.
    pub fn barrier() -> Self {
        Self {
            kind: Some(ResourceKind::Barrier),
            blocking: Some(true),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: ResourceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = Some(blocking);
        self
    }

    pub fn use_fetch(mut self, use_fetch: bool) -> Self {
        self.use_fetch = Some(use_fetch);
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn fetch_concurrency(mut self, limit: usize) -> Self {
        self.fetch_concurrency = Some(limit);
        self
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&LoadReport) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&LoadReport) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("locator", &self.locator)
            .field("kind", &self.kind)
            .field("blocking", &self.blocking)
            .field("use_fetch", &self.use_fetch)
            .field("attributes", &self.attributes)
            .field("timeout", &self.timeout)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .finish_non_exhaustive()
    }
}

/// Immutable configuration snapshot of one queued request.
#[derive(Clone)]
pub struct LoadSettings {
    /// Empty means "no network identity".
    pub locator: String,
    pub kind: ResourceKind,
    /// When true, nothing submitted later may materialize before this item
    /// has resolved.
    pub blocking: bool,
    /// Caller pin. `None` means the engine may pick the mode and apply the
    /// fallback-to-direct policy.
    pub use_fetch: Option<bool>,
    /// Unpinned default mode inherited from the loader defaults.
    pub fetch_by_default: bool,
    pub attributes: Attributes,
    pub timeout: Duration,
    pub fetch_concurrency: usize,
    pub on_success: Callback,
    pub on_failure: Callback,
}

impl LoadSettings {
    /// Whether the request asks for a programmatic fetch before origin checks.
    pub fn wants_fetch(&self) -> bool {
        self.use_fetch.unwrap_or(self.fetch_by_default)
    }

    /// Whether the caller pinned `use_fetch` explicitly.
    pub fn fetch_pinned(&self) -> bool {
        self.use_fetch.is_some()
    }
}

impl Default for LoadSettings {
    fn default() -> Self {
        let mut attributes = Attributes::new();
        for key in ATTRIBUTE_ALLOWLIST {
            attributes.insert(key.to_string(), String::new());
        }
        attributes.insert("type".to_string(), SCRIPT_CONTENT_TYPE.to_string());

        Self {
            locator: String::new(),
            kind: ResourceKind::Script,
            blocking: false,
            use_fetch: None,
            fetch_by_default: true,
            attributes,
            timeout: DEFAULT_TIMEOUT,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            on_success: noop_callback(),
            on_failure: noop_callback(),
        }
    }
}

impl fmt::Debug for LoadSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadSettings")
            .field("locator", &self.locator)
            .field("kind", &self.kind)
            .field("blocking", &self.blocking)
            .field("use_fetch", &self.use_fetch)
            .field("fetch_by_default", &self.fetch_by_default)
            .field("attributes", &self.attributes)
            .field("timeout", &self.timeout)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .finish_non_exhaustive()
    }
}
