//! Canonical notifications consumed by the synchronizer.
//!
//! [`EngineEvent::from_raw`] is the boundary: raw notification names and JSON
//! payloads are normalized here, once, and the synchronizer only ever sees
//! the typed form.

use serde_json::Value;
use swipelink_core::RecordId;
use swipelink_core::normalize::{is_dry_run, non_negative_integer, record_ref};

/// Lifecycle notification from the conversation engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// The loaded conversation may have changed identity.
    SessionChanged,
    /// A generation is about to start.
    GenerationAboutToStart {
        /// Dry runs never dispatch a request.
        dry_run: bool,
    },
    /// Secondary generation-start signal.
    GenerationStarted {
        /// Dry runs never dispatch a request.
        dry_run: bool,
    },
    /// An output record received its generated text.
    OutputReceived {
        /// The output record.
        record: Option<RecordId>,
    },
    /// An output record was painted.
    OutputRendered {
        /// The output record.
        record: Option<RecordId>,
    },
    /// The generation finished normally.
    GenerationEnded,
    /// The generation was stopped by the user.
    GenerationStopped,
    /// The shown variant of an exchange changed.
    VariantSwitched {
        /// The output record whose variant changed.
        record: Option<RecordId>,
    },
    /// A record's content changed.
    RecordUpdated {
        /// The changed record.
        record: Option<RecordId>,
    },
    /// A record was edited by the user.
    RecordEdited {
        /// The edited record.
        record: Option<RecordId>,
    },
    /// Some record was deleted; only the remaining count is known.
    RecordDeleted {
        /// Records left in the conversation.
        remaining: usize,
    },
    /// One variant of an output record was deleted.
    VariantDeleted {
        /// Position of the output record.
        position: usize,
        /// Index of the deleted variant.
        variant: usize,
    },
    /// The user sent a new input record.
    InputSent {
        /// The new input record.
        record: Option<RecordId>,
    },
    /// The dispatched request's consumer is done with the input record.
    RequestConsumed,
}

impl EngineEvent {
    /// Stable snake_case name, used for logging and raw decoding.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionChanged => "session_changed",
            Self::GenerationAboutToStart { .. } => "generation_about_to_start",
            Self::GenerationStarted { .. } => "generation_started",
            Self::OutputReceived { .. } => "output_received",
            Self::OutputRendered { .. } => "output_rendered",
            Self::GenerationEnded => "generation_ended",
            Self::GenerationStopped => "generation_stopped",
            Self::VariantSwitched { .. } => "variant_switched",
            Self::RecordUpdated { .. } => "record_updated",
            Self::RecordEdited { .. } => "record_edited",
            Self::RecordDeleted { .. } => "record_deleted",
            Self::VariantDeleted { .. } => "variant_deleted",
            Self::InputSent { .. } => "input_sent",
            Self::RequestConsumed => "request_consumed",
        }
    }

    /// Decode a raw notification. Unknown names and unusable payloads yield
    /// `None`.
    pub fn from_raw(name: &str, payload: &Value) -> Option<Self> {
        let record = record_ref(payload);
        let event = match name {
            "session_changed" => Self::SessionChanged,
            "generation_about_to_start" => Self::GenerationAboutToStart {
                dry_run: is_dry_run(payload),
            },
            "generation_started" => Self::GenerationStarted {
                dry_run: is_dry_run(payload),
            },
            "output_received" => Self::OutputReceived { record },
            "output_rendered" => Self::OutputRendered { record },
            "generation_ended" => Self::GenerationEnded,
            "generation_stopped" => Self::GenerationStopped,
            "variant_switched" => Self::VariantSwitched { record },
            "record_updated" => Self::RecordUpdated { record },
            "record_edited" => Self::RecordEdited { record },
            "record_deleted" => Self::RecordDeleted {
                remaining: non_negative_integer(payload)
                    .and_then(|n| usize::try_from(n).ok())
                    .unwrap_or(0),
            },
            "variant_deleted" => {
                let field = |key: &str| {
                    payload
                        .get(key)
                        .and_then(Value::as_u64)
                        .and_then(|n| usize::try_from(n).ok())
                };
                Self::VariantDeleted {
                    position: field("messageId")?,
                    variant: field("swipeId")?,
                }
            }
            "input_sent" => Self::InputSent { record },
            "request_consumed" => Self::RequestConsumed,
            _ => return None,
        };
        Some(event)
    }
}

/// Low-level signal from the rendering surface, used when the engine has no
/// native variant-switch notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceSignal {
    /// The element of `record` mutated.
    Mutation {
        /// The mutated element's record.
        record: RecordId,
    },
    /// A variant switch control was clicked.
    SwitchControlClicked,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
