//! Conversation records and snapshot lookups.
//!
//! The engine's conversation is an ordered list of records. Every handler in
//! the synchronizer takes one [`Conversation`] snapshot and answers all of its
//! questions from it ("where is exchange 5?", "which input precedes it?"),
//! so a single step never mixes two versions of the record list.

use serde::{Deserialize, Serialize};

use crate::ids::RecordId;

/// Who authored a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed by the user.
    Input,
    /// Generated response; may carry several variants.
    Output,
    /// Engine-authored notice, never part of an exchange.
    System,
}

/// One record of the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    /// Sequence position in the conversation.
    pub position: usize,
    /// Externally visible id.
    pub id: RecordId,
    /// Author role.
    pub role: Role,
    /// Current text.
    pub text: String,
    /// Historical variant texts, oldest first.
    #[serde(default)]
    pub variants: Vec<String>,
    /// The record's own current-variant counter.
    #[serde(default)]
    pub variant_index: Option<usize>,
}

impl ConversationRecord {
    fn with_role(position: usize, id: RecordId, role: Role, text: impl Into<String>) -> Self {
        Self {
            position,
            id,
            role,
            text: text.into(),
            variants: Vec::new(),
            variant_index: None,
        }
    }

    /// An input record.
    pub fn input(position: usize, id: RecordId, text: impl Into<String>) -> Self {
        Self::with_role(position, id, Role::Input, text)
    }

    /// An output record.
    pub fn output(position: usize, id: RecordId, text: impl Into<String>) -> Self {
        Self::with_role(position, id, Role::Output, text)
    }

    /// A system record.
    pub fn system(position: usize, id: RecordId, text: impl Into<String>) -> Self {
        Self::with_role(position, id, Role::System, text)
    }

    /// Attach a variant history and the current-variant counter.
    #[must_use]
    pub fn with_variants<S: Into<String>>(
        mut self,
        variants: impl IntoIterator<Item = S>,
        current: usize,
    ) -> Self {
        self.variants = variants.into_iter().map(Into::into).collect();
        self.variant_index = Some(current);
        self
    }

    /// Whether the record is user input.
    pub fn is_input(&self) -> bool {
        self.role == Role::Input
    }

    /// Whether the record is a generated output.
    pub fn is_output(&self) -> bool {
        self.role == Role::Output
    }

    /// Variant index of the newest variant.
    ///
    /// The variant list grows before the counter moves while a new variant is
    /// being created, so the list length wins over the counter.
    pub fn latest_variant_index(&self) -> usize {
        if self.variants.is_empty() {
            self.variant_index.unwrap_or(0)
        } else {
            self.variants.len() - 1
        }
    }

    /// The text this record was first sent with: the first non-blank variant,
    /// else the current text.
    pub fn original_text(&self) -> &str {
        self.variants
            .iter()
            .find(|v| !v.trim().is_empty())
            .map_or(self.text.as_str(), String::as_str)
    }
}

/// Immutable snapshot of the conversation record list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Conversation {
    records: Vec<ConversationRecord>,
}

impl Conversation {
    /// Wrap an ordered record list.
    pub fn new(records: Vec<ConversationRecord>) -> Self {
        Self { records }
    }

    /// All records in order.
    pub fn records(&self) -> &[ConversationRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the conversation is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at `position`.
    pub fn get(&self, position: usize) -> Option<&ConversationRecord> {
        self.records.get(position)
    }

    /// Id of the record at `position`, or the position itself when the slot
    /// is empty.
    pub fn id_at(&self, position: usize) -> RecordId {
        self.records
            .get(position)
            .map_or(RecordId::new(position as u64), |r| r.id)
    }

    /// Position of the record with `id`, searching from the newest record.
    ///
    /// Falls back to treating `id` as a position when no record carries it
    /// and it is in range.
    pub fn position_of(&self, id: RecordId) -> Option<usize> {
        self.records
            .iter()
            .rposition(|r| r.id == id)
            .or_else(|| usize::try_from(id.get()).ok().filter(|p| *p < self.len()))
    }

    /// Whether some record carries `id` (no positional fallback).
    pub fn contains(&self, id: RecordId) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    /// Position of the newest output record.
    pub fn last_output(&self) -> Option<usize> {
        self.records.iter().rposition(ConversationRecord::is_output)
    }

    /// Position of the newest input record.
    pub fn last_input(&self) -> Option<usize> {
        self.records.iter().rposition(ConversationRecord::is_input)
    }

    /// Position of the nearest input record strictly before `position`.
    pub fn input_before(&self, position: usize) -> Option<usize> {
        let end = position.min(self.len());
        self.records[..end].iter().rposition(ConversationRecord::is_input)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(n: u64) -> RecordId {
        RecordId::new(n)
    }

    fn sample() -> Conversation {
        Conversation::new(vec![
            ConversationRecord::system(0, rid(0), "greeting"),
            ConversationRecord::input(1, rid(1), "hello"),
            ConversationRecord::output(2, rid(2), "hi"),
            ConversationRecord::input(3, rid(3), "again"),
            ConversationRecord::output(4, rid(4), "sure"),
        ])
    }

    #[test]
    fn latest_variant_prefers_list_length() {
        let rec = ConversationRecord::output(0, rid(0), "c").with_variants(["a", "b", "c"], 1);
        assert_eq!(rec.latest_variant_index(), 2);
    }

    #[test]
    fn latest_variant_falls_back_to_counter_then_zero() {
        let mut rec = ConversationRecord::output(0, rid(0), "a");
        assert_eq!(rec.latest_variant_index(), 0);
        rec.variant_index = Some(3);
        assert_eq!(rec.latest_variant_index(), 3);
    }

    #[test]
    fn original_text_skips_blank_variants() {
        let rec = ConversationRecord::input(0, rid(0), "edited").with_variants(["  ", "first"], 0);
        assert_eq!(rec.original_text(), "first");
        let plain = ConversationRecord::input(0, rid(0), "only");
        assert_eq!(plain.original_text(), "only");
    }

    #[test]
    fn position_of_searches_ids_then_positions() {
        let convo = Conversation::new(vec![
            ConversationRecord::input(0, rid(10), "a"),
            ConversationRecord::output(1, rid(11), "b"),
        ]);
        assert_eq!(convo.position_of(rid(11)), Some(1));
        assert_eq!(convo.position_of(rid(1)), Some(1));
        assert_eq!(convo.position_of(rid(5)), None);
        assert!(!convo.contains(rid(1)));
    }

    #[test]
    fn last_output_and_input() {
        let convo = sample();
        assert_eq!(convo.last_output(), Some(4));
        assert_eq!(convo.last_input(), Some(3));
    }

    #[test]
    fn input_before_skips_system_records() {
        let convo = sample();
        assert_eq!(convo.input_before(2), Some(1));
        assert_eq!(convo.input_before(4), Some(3));
        assert_eq!(convo.input_before(1), None);
        assert_eq!(convo.input_before(99), Some(3));
    }

    #[test]
    fn id_at_falls_back_to_position() {
        let convo = sample();
        assert_eq!(convo.id_at(2), rid(2));
        assert_eq!(convo.id_at(40), rid(40));
    }

    #[test]
    fn record_serde_uses_camel_case() {
        let rec = ConversationRecord::output(2, rid(2), "x").with_variants(["x"], 0);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["variantIndex"], 0);
        assert_eq!(json["role"], "output");
    }
}
