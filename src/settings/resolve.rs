// src/settings/resolve.rs

//! Allowlist merge of caller options over loader defaults.
//!
//! Only fields the defaults know about can be overridden, and an override is
//! taken only when it is valid for that field. Everything else is dropped
//! silently, field by field; resolving never fails.

use tracing::debug;

use crate::settings::options::{Attributes, LoadOptions, LoadSettings};

/// Resolve the configuration snapshot for one request.
pub fn resolve(defaults: &LoadSettings, overrides: &LoadOptions) -> LoadSettings {
    let mut settings = merge_common(defaults, overrides);

    if let Some(ref locator) = overrides.locator {
        settings.locator = locator.trim().to_string();
    }
    // A per-request `use_fetch` is a pin; the defaults never pin.
    settings.use_fetch = overrides.use_fetch;

    settings
}

/// Resolve new loader defaults (`set_defaults`).
///
/// The locator is ignored, and `use_fetch` only changes the unpinned default
/// mode so items inheriting it stay eligible for the direct-load fallback.
pub fn resolve_defaults(defaults: &LoadSettings, overrides: &LoadOptions) -> LoadSettings {
    let mut settings = merge_common(defaults, overrides);

    settings.locator = String::new();
    settings.use_fetch = None;
    if let Some(use_fetch) = overrides.use_fetch {
        settings.fetch_by_default = use_fetch;
    }

    settings
}

fn merge_common(defaults: &LoadSettings, overrides: &LoadOptions) -> LoadSettings {
    let mut settings = defaults.clone();

    if let Some(kind) = overrides.kind {
        settings.kind = kind;
    }
    if let Some(blocking) = overrides.blocking {
        settings.blocking = blocking;
    }
    match overrides.timeout {
        Some(timeout) if !timeout.is_zero() => settings.timeout = timeout,
        Some(_) => debug!("ignoring zero timeout override"),
        None => {}
    }
    match overrides.fetch_concurrency {
        Some(limit) if limit > 0 => settings.fetch_concurrency = limit,
        Some(_) => debug!("ignoring zero fetch_concurrency override"),
        None => {}
    }
    if let Some(ref cb) = overrides.on_success {
        settings.on_success = cb.clone();
    }
    if let Some(ref cb) = overrides.on_failure {
        settings.on_failure = cb.clone();
    }

    settings.attributes = merge_attributes(&defaults.attributes, &overrides.attributes);
    settings
}

fn merge_attributes(defaults: &Attributes, overrides: &Attributes) -> Attributes {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        match merged.get_mut(key) {
            Some(slot) => *slot = value.clone(),
            None => debug!(attribute = %key, "dropping attribute not present in defaults"),
        }
    }
    merged
}
