// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::engine::RuntimeOptions;
use crate::settings::{Attributes, LoadOptions};
use crate::types::ResourceKind;

/// Manifest as read from a TOML file, before validation.
///
/// ```toml
/// [page]
/// origin = "https://example.com"
///
/// [defaults]
/// timeout_ms = 5000
/// fetch_concurrency = 4
///
/// [[resource]]
/// locator = "/js/app.js"
/// blocking = true
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawManifest {
    #[serde(default)]
    pub page: PageSection,

    #[serde(default)]
    pub defaults: DefaultsSection,

    /// `[[resource]]` entries, in submission order.
    #[serde(default)]
    pub resource: Vec<ResourceEntry>,
}

/// `[page]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageSection {
    /// Origin of the page resources are loaded into. Relative locators are
    /// resolved against it.
    #[serde(default)]
    pub origin: Option<String>,
}

/// `[defaults]` section: initial loader defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsSection {
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub fetch_concurrency: Option<usize>,

    /// Whether unpinned resources are fetched when possible.
    #[serde(default)]
    pub use_fetch: Option<bool>,

    #[serde(default)]
    pub attributes: Attributes,
}

impl DefaultsSection {
    pub fn to_options(&self) -> LoadOptions {
        LoadOptions {
            use_fetch: self.use_fetch,
            attributes: self.attributes.clone(),
            timeout: self.timeout_ms.map(Duration::from_millis),
            fetch_concurrency: self.fetch_concurrency,
            ..LoadOptions::default()
        }
    }
}

/// One `[[resource]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceEntry {
    #[serde(default)]
    pub locator: Option<String>,

    #[serde(default)]
    pub kind: ResourceKind,

    #[serde(default)]
    pub blocking: bool,

    /// `Some(_)` pins the fetch mode for this resource.
    #[serde(default)]
    pub use_fetch: Option<bool>,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub attributes: Attributes,
}

impl ResourceEntry {
    pub fn to_options(&self) -> LoadOptions {
        LoadOptions {
            locator: self.locator.clone(),
            kind: Some(self.kind),
            blocking: Some(self.blocking),
            use_fetch: self.use_fetch,
            attributes: self.attributes.clone(),
            timeout: self.timeout_ms.map(Duration::from_millis),
            ..LoadOptions::default()
        }
    }

    /// Human-readable name for summaries.
    pub fn label(&self) -> String {
        match self.locator.as_deref() {
            Some(locator) if !locator.trim().is_empty() => locator.trim().to_string(),
            _ => format!("<{}>", self.kind),
        }
    }
}

/// A validated manifest. Construct through `Manifest::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub page: PageSection,
    pub defaults: DefaultsSection,
    pub resource: Vec<ResourceEntry>,
}

impl Manifest {
    pub(crate) fn new_unchecked(raw: RawManifest) -> Self {
        Self {
            page: raw.page,
            defaults: raw.defaults,
            resource: raw.resource,
        }
    }

    /// Runtime options for a loader driven by this manifest.
    ///
    /// `origin_override` (e.g. from the command line) wins over `[page]`.
    pub fn runtime_options(&self, origin_override: Option<&str>) -> RuntimeOptions {
        RuntimeOptions {
            page_origin: origin_override
                .map(str::to_string)
                .or_else(|| self.page.origin.clone()),
            defaults: self.defaults.to_options(),
        }
    }
}
