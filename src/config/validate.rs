// src/config/validate.rs

use crate::config::model::{Manifest, RawManifest};
use crate::errors::{LazyloadError, Result};
use crate::queue::Origin;
use crate::types::ResourceKind;

impl TryFrom<RawManifest> for Manifest {
    type Error = LazyloadError;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        validate_raw_manifest(&raw)?;
        Ok(Manifest::new_unchecked(raw))
    }
}

fn validate_raw_manifest(manifest: &RawManifest) -> Result<()> {
    ensure_has_resources(manifest)?;
    validate_page(manifest)?;
    validate_defaults(manifest)?;
    validate_resources(manifest)?;
    Ok(())
}

fn ensure_has_resources(manifest: &RawManifest) -> Result<()> {
    if manifest.resource.is_empty() {
        return Err(LazyloadError::ConfigError(
            "manifest must contain at least one [[resource]] entry".to_string(),
        ));
    }
    Ok(())
}

/// Check that `origin` is an `http(s)://host` URL.
pub fn validate_origin(origin: &str) -> Result<()> {
    if Origin::parse(origin).is_none() {
        return Err(LazyloadError::ConfigError(format!(
            "page origin must be an http(s)://host URL (got '{origin}')"
        )));
    }
    Ok(())
}

fn validate_page(manifest: &RawManifest) -> Result<()> {
    match manifest.page.origin.as_deref() {
        Some(origin) => validate_origin(origin),
        None => Ok(()),
    }
}

fn validate_defaults(manifest: &RawManifest) -> Result<()> {
    if manifest.defaults.timeout_ms == Some(0) {
        return Err(LazyloadError::ConfigError(
            "[defaults].timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if manifest.defaults.fetch_concurrency == Some(0) {
        return Err(LazyloadError::ConfigError(
            "[defaults].fetch_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_resources(manifest: &RawManifest) -> Result<()> {
    for (position, entry) in manifest.resource.iter().enumerate() {
        let has_locator = entry
            .locator
            .as_deref()
            .is_some_and(|l| !l.trim().is_empty());

        if entry.kind != ResourceKind::Barrier && !has_locator {
            return Err(LazyloadError::ConfigError(format!(
                "resource #{} ({}) needs a non-empty locator",
                position + 1,
                entry.kind
            )));
        }
        if entry.timeout_ms == Some(0) {
            return Err(LazyloadError::ConfigError(format!(
                "resource #{} ({}) has timeout_ms = 0; must be >= 1",
                position + 1,
                entry.label()
            )));
        }
    }
    Ok(())
}
