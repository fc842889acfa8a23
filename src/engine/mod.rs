// src/engine/mod.rs

//! Orchestration engine for the loader.
//!
//! This module ties together:
//! - the ordering queue (admission, bounded fetch dispatch, ordered release)
//! - the loader defaults that new submissions are resolved against
//! - the main runtime event loop that reacts to:
//!   - submissions and default changes from [`crate::handle::Loader`]
//!   - fetch outcomes
//!   - materialization outcomes and materialization timeouts
//!   - finish / shutdown requests
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::queue::QueueSnapshot;
use crate::settings::{LoadOptions, LoadSettings};
use crate::types::{FetchMode, ResourceKind};

/// Identity of one submitted request: its position in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemHandle(pub usize);

impl ItemHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Opaque reference into the materializer's domain (e.g. a document node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterializedHandle(pub usize);

/// Why a programmatic fetch was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The platform refused the request (cross-origin policy, connection
    /// refused before any HTTP status existed).
    Refused,
    /// The host has no fetch capability at all.
    NoCapability,
}

/// Terminal outcome of one fetch, reported exactly once per dispatched job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 2xx or 304; carries the response body.
    Success(String),
    Denied(DenialReason),
    /// Any other status, or a failure after the request was accepted.
    TransportError(String),
    /// The fetch timeout elapsed and the request was cancelled.
    TimedOut(Duration),
}

/// Terminal outcome of materializing one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Applied(MaterializedHandle),
    Failed(String),
}

/// Why an item failed. Delivered to the failure callback, never raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    #[error("fetch denied")]
    FetchDenied,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("materialization error: {0}")]
    Materialization(String),
}

impl LoadFailure {
    /// Stable short tag, used in logs and the CLI summary.
    pub fn tag(&self) -> &'static str {
        match self {
            LoadFailure::FetchDenied => "fetch-denied",
            LoadFailure::Transport(_) => "transport-error",
            LoadFailure::Timeout(_) => "timeout",
            LoadFailure::Materialization(_) => "materialization-error",
        }
    }
}

/// What a callback receives when its item resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub handle: ItemHandle,
    pub locator: String,
    pub kind: ResourceKind,
    /// Mode the item was finally loaded with (after any fallback).
    pub mode: FetchMode,
    /// `None` on success.
    pub failure: Option<LoadFailure>,
}

impl LoadReport {
    pub(crate) fn new(
        index: usize,
        settings: &LoadSettings,
        mode: FetchMode,
        failure: Option<LoadFailure>,
    ) -> Self {
        Self {
            handle: ItemHandle(index),
            locator: settings.locator.clone(),
            kind: settings.kind,
            mode,
            failure,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Options fixed for the lifetime of one loader.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// Origin of the page resources are loaded into, e.g.
    /// `https://example.com`. Locators on any other origin default to direct
    /// loading.
    pub page_origin: Option<String>,
    /// Initial loader defaults, applied like a first `set_defaults` call.
    pub defaults: LoadOptions,
}

/// Events flowing into the runtime from the loader handle, fetch tasks,
/// the materializer and timers.
#[derive(Debug)]
pub enum LoaderEvent {
    /// A new request. The assigned handle is sent back on `reply`, if any.
    Submit {
        options: LoadOptions,
        reply: Option<oneshot::Sender<ItemHandle>>,
    },
    /// Replace the loader defaults for later submissions.
    SetDefaults { options: LoadOptions },
    /// A dispatched fetch reached its terminal outcome.
    FetchSettled { index: usize, outcome: FetchOutcome },
    /// The materializer finished one item.
    MaterializeSettled {
        index: usize,
        outcome: MaterializeOutcome,
    },
    /// The materialization timer for an item fired.
    MaterializeTimedOut { index: usize },
    /// Diagnostics: send back a copy of the queue state.
    Snapshot { reply: oneshot::Sender<QueueSnapshot> },
    /// No further submissions will arrive; exit once everything resolved.
    Finish,
    /// Stop immediately, abandoning unresolved items.
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
