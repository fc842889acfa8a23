// src/materialize/mod.rs

//! Materialization layer: turning released items into observable effects.
//!
//! - [`backend`] provides the `MaterializerBackend` trait the runtime hands
//!   released batches to.
//! - [`document`] contains `DocumentMaterializer`, which renders items into
//!   an in-memory HTML `<head>` the way a browser page would receive them.

pub mod backend;
pub mod document;

pub use backend::MaterializerBackend;
pub use document::{Document, DocumentMaterializer, Node};
