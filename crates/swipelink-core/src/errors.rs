//! Error types for the synchronization core.
//!
//! [`SyncError`] describes why a single reconciliation step was abandoned.
//! None of these are fatal: the dispatcher logs them at `debug` level and
//! leaves prior state untouched, so the visible effect of any failure is
//! only that the displayed input text stops following the selected variant.

use thiserror::Error;

use crate::ids::{ExchangeId, RecordId};

/// Reasons a synchronization step was aborted.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The exchange is not present in the current conversation.
    #[error("exchange not found in conversation: {0}")]
    UnresolvableExchange(ExchangeId),

    /// A record id from a notification is not present in the conversation.
    #[error("record not found in conversation: {0}")]
    UnresolvableRecord(RecordId),

    /// The conversation has no output record to attach a mapping to.
    #[error("conversation has no output record")]
    NoOutputRecord,

    /// No input record precedes the given position.
    #[error("no input record before position {before}")]
    NoInputRecord {
        /// Position of the record the search started from.
        before: usize,
    },

    /// The rendering surface has no element for the record.
    #[error("no rendered element for record {0}")]
    ElementMissing(RecordId),

    /// A key string did not have the `<exchange>:<variant>` shape.
    #[error("malformed mapping key: {0:?}")]
    MalformedKey(String),

    /// A completion arrived with no captured input text.
    #[error("no captured input text for this generation")]
    MissingInput,

    /// An interceptor patch outlived its safety window.
    #[error("interceptor patch timed out")]
    PatchTimedOut,

    /// A raw engine payload could not be normalized.
    #[error("unrecognized payload: {0}")]
    Payload(String),
}

impl SyncError {
    /// Category string used as a structured log field.
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnresolvableExchange(_)
            | Self::UnresolvableRecord(_)
            | Self::NoOutputRecord
            | Self::NoInputRecord { .. }
            | Self::ElementMissing(_) => "unresolvable_reference",
            Self::MalformedKey(_) => "malformed_key",
            Self::MissingInput => "missing_input",
            Self::PatchTimedOut => "timeout",
            Self::Payload(_) => "payload",
        }
    }

    /// Whether the failure is swallowed (logged at debug level only).
    ///
    /// Every variant is: the core degrades to "no mapping applied" instead
    /// of surfacing errors to the engine.
    #[allow(clippy::unused_self)]
    pub fn is_silent(&self) -> bool {
        true
    }
}

/// Convenience type alias for synchronization results.
pub type Result<T> = std::result::Result<T, SyncError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
