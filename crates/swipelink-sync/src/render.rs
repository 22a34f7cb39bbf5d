//! Rendering synchronizer. Pushes mapped input text to the display surface.

use std::sync::Arc;

use swipelink_core::{Conversation, ExchangeId, MappingKey, RecordId, Result, SyncError};
use tracing::debug;

/// The engine's display surface, addressed by record id.
pub trait RenderSurface: Send + Sync {
    /// Variant index the element of `id` claims to show.
    fn shown_variant(&self, id: RecordId) -> Option<usize>;

    /// Displayed text of the element of `id`; `None` when no element exists.
    fn read_text(&self, id: RecordId) -> Option<String>;

    /// Overwrite the displayed text. Returns `false` when no element exists.
    fn write_text(&self, id: RecordId, text: &str) -> bool;

    /// Mark or unmark the element of `id` as linked to the shown variant.
    fn set_linked(&self, id: RecordId, linked: bool);

    /// Unmark every linked element.
    fn clear_linked(&self);
}

/// Outcome of a successful push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// The element already showed the mapped text; only the marker was set.
    AlreadyShown,
    /// The element text was overwritten.
    Rewritten,
}

/// Writes mapped input text onto the input element preceding an exchange.
pub struct RenderingSynchronizer {
    surface: Arc<dyn RenderSurface>,
}

impl RenderingSynchronizer {
    /// Drive `surface`.
    pub fn new(surface: Arc<dyn RenderSurface>) -> Self {
        Self { surface }
    }

    /// The surface being driven.
    pub fn surface(&self) -> &dyn RenderSurface {
        self.surface.as_ref()
    }

    fn input_for(&self, conversation: &Conversation, exchange: ExchangeId) -> Result<RecordId> {
        let position = conversation
            .position_of(exchange.record())
            .ok_or(SyncError::UnresolvableExchange(exchange))?;
        let input = conversation
            .input_before(position)
            .ok_or(SyncError::NoInputRecord { before: position })?;
        Ok(conversation.id_at(input))
    }

    /// Show `text` on the input element of `key`'s exchange and mark it linked.
    pub fn push(
        &self,
        conversation: &Conversation,
        key: &MappingKey,
        text: &str,
    ) -> Result<PushOutcome> {
        let input = self.input_for(conversation, key.exchange)?;
        let shown = self
            .surface
            .read_text(input)
            .ok_or(SyncError::ElementMissing(input))?;

        if shown.trim() == text.trim() {
            self.surface.set_linked(input, true);
            return Ok(PushOutcome::AlreadyShown);
        }

        if !self.surface.write_text(input, text) {
            return Err(SyncError::ElementMissing(input));
        }
        self.surface.set_linked(input, true);
        debug!(%key, record = %input, "rewrote input element for shown variant");
        Ok(PushOutcome::Rewritten)
    }

    /// Remove the linked marker from the input element of `exchange`.
    ///
    /// Falls back to clearing every marker when the element cannot be
    /// resolved, so no stale marker survives.
    pub fn clear_for(&self, conversation: &Conversation, exchange: Option<ExchangeId>) {
        let resolved = exchange
            .ok_or(SyncError::NoOutputRecord)
            .and_then(|exchange| self.input_for(conversation, exchange));
        match resolved {
            Ok(input) if self.surface.read_text(input).is_some() => {
                self.surface.set_linked(input, false);
            }
            _ => self.clear_all(),
        }
    }

    /// Remove every linked marker.
    pub fn clear_all(&self) {
        self.surface.clear_linked();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use swipelink_core::ConversationRecord;

    use super::*;
    use crate::test_utils::FakeSurface;

    fn rid(n: u64) -> RecordId {
        RecordId::new(n)
    }

    fn key(exchange: u64, variant: usize) -> MappingKey {
        MappingKey::new(ExchangeId::new(exchange), variant)
    }

    fn setup() -> (Arc<FakeSurface>, RenderingSynchronizer, Conversation) {
        let convo = Conversation::new(vec![
            ConversationRecord::input(0, rid(4), "hello"),
            ConversationRecord::output(1, rid(5), "reply"),
        ]);
        let surface = Arc::new(FakeSurface::from_conversation(&convo));
        let sync = RenderingSynchronizer::new(surface.clone());
        (surface, sync, convo)
    }

    #[test]
    fn push_rewrites_and_marks() {
        let (surface, sync, convo) = setup();
        let outcome = sync.push(&convo, &key(5, 1), "hi there").unwrap();
        assert_eq!(outcome, PushOutcome::Rewritten);
        assert_eq!(surface.text(rid(4)).as_deref(), Some("hi there"));
        assert!(surface.is_linked(rid(4)));
    }

    #[test]
    fn push_compares_trimmed_text() {
        let (surface, sync, convo) = setup();
        let outcome = sync.push(&convo, &key(5, 0), "  hello \n").unwrap();
        assert_eq!(outcome, PushOutcome::AlreadyShown);
        assert!(surface.writes().is_empty());
        assert!(surface.is_linked(rid(4)));
    }

    #[test]
    fn push_to_unknown_exchange_fails() {
        let (_surface, sync, convo) = setup();
        assert_matches!(
            sync.push(&convo, &key(9, 0), "x"),
            Err(SyncError::UnresolvableExchange(_))
        );
    }

    #[test]
    fn push_without_element_fails() {
        let (surface, sync, convo) = setup();
        surface.remove_element(rid(4));
        assert_matches!(
            sync.push(&convo, &key(5, 0), "x"),
            Err(SyncError::ElementMissing(id)) if id == rid(4)
        );
    }

    #[test]
    fn clear_for_unmarks_one_element() {
        let (surface, sync, convo) = setup();
        surface.set_linked(rid(4), true);
        surface.set_linked(rid(5), true);
        sync.clear_for(&convo, Some(ExchangeId::new(5)));
        assert!(!surface.is_linked(rid(4)));
        assert!(surface.is_linked(rid(5)));
    }

    #[test]
    fn clear_for_unresolvable_clears_everything() {
        let (surface, sync, convo) = setup();
        surface.set_linked(rid(4), true);
        surface.set_linked(rid(5), true);
        sync.clear_for(&convo, None);
        assert!(surface.linked().is_empty());
    }
}
