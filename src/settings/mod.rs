// src/settings/mod.rs

//! Per-request configuration.
//!
//! - [`options`] defines the caller-facing [`LoadOptions`] and the resolved,
//!   immutable [`LoadSettings`] snapshot.
//! - [`resolve`] merges options over the loader's defaults.

pub mod options;
pub mod resolve;

pub use options::{Attributes, Callback, LoadOptions, LoadSettings};
pub use resolve::{resolve, resolve_defaults};
