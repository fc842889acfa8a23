// src/fetch/mod.rs

//! Network fetch layer.
//!
//! - [`backend`] provides the `ResourceFetcher` trait, the reqwest-backed
//!   `HttpFetcher` used in production, and `UnavailableFetcher` for hosts
//!   without any fetch capability.
//! - [`dispatcher`] runs one fetch per job on its own task, guarded by the
//!   job's timeout, and reports the outcome back to the runtime.

pub mod backend;
pub mod dispatcher;

pub use backend::{HttpFetcher, ResourceFetcher, UnavailableFetcher};
pub use dispatcher::{dispatch_fetch, fetch_with_timeout};
