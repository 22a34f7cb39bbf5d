//! # swipelink-sync
//!
//! Keeps the input text shown in a conversation in step with whichever
//! output variant the user is looking at.
//!
//! - [`store`]: bounded `(exchange, variant) → input text` map with FIFO eviction
//! - [`resolver`]: which variant is on screen, record counter over surface attribute
//! - [`lifecycle`]: session identity tracking and backfill capture
//! - [`interceptor`]: generation capture and the outgoing-request patch
//! - [`render`]: pushes mapped text and the linked marker to the display surface
//! - [`detection`]: native or observed variant-switch detection
//! - [`synchronizer`]: the dispatcher tying it together
//!
//! The engine and display surface are reached only through the traits in
//! [`host`] and [`render`]; [`test_utils`] has in-memory fakes for both.

#![deny(unsafe_code)]

pub mod detection;
pub mod events;
pub mod host;
pub mod interceptor;
pub mod lifecycle;
pub mod render;
pub mod resolver;
pub mod store;
pub mod synchronizer;
pub mod test_utils;

pub use detection::{DetectorKind, VariantSwitchDetector, select_detector};
pub use events::{EngineEvent, SurfaceSignal};
pub use host::{ConversationSource, EngineCapabilities, OutgoingRequest};
pub use render::{RenderSurface, RenderingSynchronizer};
pub use store::MappingStore;
pub use synchronizer::{DebugSnapshot, EventSynchronizer, PaintTask, SessionState};
