// src/queue/mod.rs

//! Ordered load queue.
//!
//! - [`item`] holds queue items, their state machine, and the jobs handed to
//!   the fetcher and the materializer.
//! - [`load_queue`] is the ordering engine: admission, bounded fetch
//!   dispatch, blockers and the release algorithm.
//! - [`origin`] decides whether a locator is same-origin with the page.
//! - [`queue_step`] defines the result and snapshot types.

pub mod item;
pub mod load_queue;
pub mod origin;
pub mod queue_step;

pub use item::{FetchJob, ItemState, MaterializeJob, QueueItem};
pub use load_queue::LoadQueue;
pub use origin::{absolutize, is_same_origin, Origin};
pub use queue_step::{QueueSnapshot, QueueStep};
