//! Active key resolution.
//!
//! Two signals report which variant of an exchange is on screen: the
//! rendering surface's shown-variant attribute and the record's own counter.
//! The surface can lag behind a data update, so when both are present and
//! disagree the record wins.

use swipelink_core::{Conversation, ExchangeId, MappingKey, RecordId};
use tracing::debug;

use crate::render::RenderSurface;

/// The two variant-index signals for one exchange.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VariantSignals {
    /// Variant the rendering surface claims to show.
    pub surface: Option<usize>,
    /// The record's own current-variant counter.
    pub record: Option<usize>,
}

impl VariantSignals {
    /// Pick the variant index: the record counter when present, else the
    /// surface attribute, else 0.
    pub fn resolve(self) -> usize {
        match (self.surface, self.record) {
            (Some(surface), Some(record)) if surface != record => {
                debug!(surface, record, "shown variant differs from record counter, using record");
                record
            }
            (_, Some(record)) => record,
            (Some(surface), None) => surface,
            (None, None) => 0,
        }
    }
}

/// Computes the key of the variant currently on screen. Side-effect free.
pub struct ActiveKeyResolver<'a> {
    conversation: &'a Conversation,
    surface: &'a dyn RenderSurface,
}

impl<'a> ActiveKeyResolver<'a> {
    /// Resolve against one conversation snapshot and the live surface.
    pub fn new(conversation: &'a Conversation, surface: &'a dyn RenderSurface) -> Self {
        Self {
            conversation,
            surface,
        }
    }

    /// Signals for the record at `position`.
    pub fn signals_at(&self, position: usize) -> Option<VariantSignals> {
        let record = self.conversation.get(position)?;
        Some(VariantSignals {
            surface: self.surface.shown_variant(record.id),
            record: record.variant_index,
        })
    }

    /// Key of the shown variant of `exchange`, or of the newest exchange when
    /// `exchange` is `None`. `None` when the exchange cannot be located.
    pub fn resolve(&self, exchange: Option<RecordId>) -> Option<MappingKey> {
        let position = match exchange {
            Some(id) => self.conversation.position_of(id)?,
            None => self.conversation.last_output()?,
        };
        let id = self.conversation.id_at(position);
        let variant = self.signals_at(position)?.resolve();
        Some(MappingKey::new(ExchangeId::from_record(id), variant))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use swipelink_core::ConversationRecord;

    use super::*;
    use crate::test_utils::FakeSurface;

    fn rid(n: u64) -> RecordId {
        RecordId::new(n)
    }

    fn key(exchange: u64, variant: usize) -> MappingKey {
        MappingKey::new(ExchangeId::new(exchange), variant)
    }

    fn conversation() -> Conversation {
        Conversation::new(vec![
            ConversationRecord::input(0, rid(0), "hello"),
            ConversationRecord::output(1, rid(1), "a").with_variants(["a", "b", "c", "d"], 3),
            ConversationRecord::input(2, rid(2), "again"),
            ConversationRecord::output(3, rid(3), "x"),
        ])
    }

    #[test]
    fn record_counter_wins_on_disagreement() {
        let signals = VariantSignals {
            surface: Some(2),
            record: Some(3),
        };
        assert_eq!(signals.resolve(), 3);
    }

    #[test]
    fn single_signal_is_used() {
        assert_eq!(VariantSignals { surface: Some(2), record: None }.resolve(), 2);
        assert_eq!(VariantSignals { surface: None, record: Some(1) }.resolve(), 1);
        assert_eq!(VariantSignals::default().resolve(), 0);
    }

    #[test]
    fn resolves_given_exchange_with_precedence() {
        let convo = conversation();
        let surface = FakeSurface::new();
        surface.set_shown_variant(rid(1), 2);

        let resolver = ActiveKeyResolver::new(&convo, &surface);
        assert_eq!(resolver.resolve(Some(rid(1))), Some(key(1, 3)));
    }

    #[test]
    fn defaults_to_newest_exchange() {
        let convo = conversation();
        let surface = FakeSurface::new();
        let resolver = ActiveKeyResolver::new(&convo, &surface);
        assert_eq!(resolver.resolve(None), Some(key(3, 0)));

        surface.set_shown_variant(rid(3), 1);
        assert_eq!(resolver.resolve(None), Some(key(3, 1)));
    }

    #[test]
    fn unknown_exchange_yields_no_key() {
        let convo = conversation();
        let surface = FakeSurface::new();
        let resolver = ActiveKeyResolver::new(&convo, &surface);
        assert_eq!(resolver.resolve(Some(rid(40))), None);
        assert_eq!(
            ActiveKeyResolver::new(&Conversation::default(), &surface).resolve(None),
            None
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let convo = conversation();
        let surface = FakeSurface::new();
        let resolver = ActiveKeyResolver::new(&convo, &surface);
        assert_eq!(resolver.resolve(Some(rid(1))), resolver.resolve(Some(rid(1))));
    }
}
