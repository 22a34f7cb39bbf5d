//! Boundary normalization of raw engine payloads.
//!
//! Engine notifications and records arrive as loosely-shaped JSON: a record
//! reference may be a bare number, a numeric string, or an object carrying the
//! id under one of several field names. This module is the only place that
//! inspects those shapes; everything past it works with [`RecordId`] and
//! [`ConversationRecord`].

use serde_json::Value;

use crate::errors::{Result, SyncError};
use crate::ids::RecordId;
use crate::records::{Conversation, ConversationRecord, Role};

/// Field names that may carry a record reference, in lookup order.
const REFERENCE_FIELDS: &[&str] = &[
    "messageIndex",
    "message_id",
    "index",
    "message_index",
    "mesid",
    "mesId",
    "id",
];

/// Field names that may carry a record's own id.
const RECORD_ID_FIELDS: &[&str] = &["mesid", "mesId", "message_id"];

/// Field names that may carry a variant's text when it is an object.
const VARIANT_TEXT_FIELDS: &[&str] = &["mes", "text", "content"];

/// Read a non-negative integer from a JSON number or a numeric string.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn non_negative_integer(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                s.parse().ok()
            }
        }
        _ => None,
    }
}

/// Normalize a notification payload into the record it refers to.
pub fn record_ref(payload: &Value) -> Option<RecordId> {
    if let Some(n) = non_negative_integer(payload) {
        return Some(RecordId::new(n));
    }
    let obj = payload.as_object()?;
    REFERENCE_FIELDS
        .iter()
        .find_map(|field| obj.get(*field).and_then(non_negative_integer))
        .map(RecordId::new)
}

/// Text of one variant entry: a string, or an object with a text field.
pub fn variant_text(entry: &Value) -> Option<String> {
    match entry {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => VARIANT_TEXT_FIELDS
            .iter()
            .find_map(|field| obj.get(*field).and_then(Value::as_str))
            .map(str::to_owned),
        _ => None,
    }
}

fn flag(obj: &serde_json::Map<String, Value>, field: &str) -> bool {
    obj.get(field).and_then(Value::as_bool).unwrap_or(false)
}

/// Convert a raw engine record at `position` into a [`ConversationRecord`].
///
/// Returns `None` when the value is not an object. The id falls back to the
/// position when no id field is present.
pub fn record_from_value(position: usize, raw: &Value) -> Option<ConversationRecord> {
    let obj = raw.as_object()?;

    let role = if flag(obj, "is_user") {
        Role::Input
    } else if flag(obj, "is_system") {
        Role::System
    } else {
        Role::Output
    };

    let id = RECORD_ID_FIELDS
        .iter()
        .find_map(|field| obj.get(*field).and_then(non_negative_integer))
        .map_or(RecordId::new(position as u64), RecordId::new);

    let text = obj
        .get("mes")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let variants = obj
        .get("swipes")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(variant_text).collect())
        .unwrap_or_default();

    let variant_index = obj
        .get("swipe_id")
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok());

    Some(ConversationRecord {
        position,
        id,
        role,
        text,
        variants,
        variant_index,
    })
}

/// Convert a raw engine record list into a conversation snapshot.
///
/// Entries that are not objects are skipped but keep their position.
pub fn conversation_from_value(raw: &Value) -> Result<Conversation> {
    let items = raw
        .as_array()
        .ok_or_else(|| SyncError::Payload(format!("expected a record list, got {raw}")))?;
    Ok(Conversation::new(
        items
            .iter()
            .enumerate()
            .filter_map(|(position, item)| record_from_value(position, item))
            .collect(),
    ))
}

/// Whether a generation payload marks a dry run.
pub fn is_dry_run(payload: &Value) -> bool {
    payload
        .get("dryRun")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
