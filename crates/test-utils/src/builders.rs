#![allow(dead_code)]

use lazyload::config::{Manifest, RawManifest, ResourceEntry};
use lazyload::types::ResourceKind;

/// Builder for `Manifest` to simplify test setup.
pub struct ManifestBuilder {
    manifest: RawManifest,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            manifest: RawManifest::default(),
        }
    }

    pub fn origin(mut self, origin: &str) -> Self {
        self.manifest.page.origin = Some(origin.to_string());
        self
    }

    pub fn default_timeout_ms(mut self, ms: u64) -> Self {
        self.manifest.defaults.timeout_ms = Some(ms);
        self
    }

    pub fn fetch_concurrency(mut self, limit: usize) -> Self {
        self.manifest.defaults.fetch_concurrency = Some(limit);
        self
    }

    pub fn with_resource(mut self, entry: ResourceEntry) -> Self {
        self.manifest.resource.push(entry);
        self
    }

    pub fn build_raw(self) -> RawManifest {
        self.manifest
    }

    pub fn build(self) -> Manifest {
        Manifest::try_from(self.manifest).expect("Failed to build valid manifest from builder")
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ResourceEntry`.
pub struct ResourceBuilder {
    entry: ResourceEntry,
}

impl ResourceBuilder {
    pub fn new(locator: &str) -> Self {
        Self {
            entry: ResourceEntry {
                locator: Some(locator.to_string()),
                ..ResourceEntry::default()
            },
        }
    }

    pub fn barrier() -> Self {
        Self {
            entry: ResourceEntry {
                kind: ResourceKind::Barrier,
                blocking: true,
                ..ResourceEntry::default()
            },
        }
    }

    pub fn kind(mut self, kind: ResourceKind) -> Self {
        self.entry.kind = kind;
        self
    }

    pub fn blocking(mut self, val: bool) -> Self {
        self.entry.blocking = val;
        self
    }

    pub fn use_fetch(mut self, val: bool) -> Self {
        self.entry.use_fetch = Some(val);
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.entry.timeout_ms = Some(ms);
        self
    }

    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.entry.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> ResourceEntry {
        self.entry
    }
}
