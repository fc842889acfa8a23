// src/config/mod.rs

//! Manifest loading and validation for lazyload.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a manifest from disk (`loader.rs`).
//! - Validate basic invariants like locators and origins (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_manifest_path, load_and_validate, load_from_path};
pub use model::{DefaultsSection, Manifest, PageSection, RawManifest, ResourceEntry};
