//! # swipelink-runtime
//!
//! Tokio actor that owns an [`EventSynchronizer`](swipelink_sync::EventSynchronizer)
//! and feeds it engine notifications, surface signals, and paint reports in
//! arrival order, firing its timers on the tokio clock.

#![deny(unsafe_code)]

pub mod actor;
pub mod errors;

pub use actor::{SyncHandle, SyncRuntime};
pub use errors::RuntimeError;
