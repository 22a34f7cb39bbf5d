//! # swipelink-core
//!
//! Foundation types, errors, record ids, and logging for swipelink.
//!
//! This crate provides the shared vocabulary the synchronizer crates depend on:
//!
//! - **Ids**: `RecordId`, `ExchangeId` (numeric) and `SessionId` (opaque) newtypes
//! - **Keys**: `MappingKey`, the `(exchange, variant)` pair with its `"5:1"` text form
//! - **Records**: `ConversationRecord` and the `Conversation` snapshot with its lookups
//! - **Normalization**: the single boundary that turns raw engine payloads into ids/records
//! - **Errors**: `SyncError` taxonomy via `thiserror`
//! - **Logging**: `tracing` subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod key;
pub mod logging;
pub mod normalize;
pub mod records;

pub use errors::{Result, SyncError};
pub use ids::{ExchangeId, RecordId, SessionId};
pub use key::MappingKey;
pub use records::{Conversation, ConversationRecord, Role};
