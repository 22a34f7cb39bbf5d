//! Session lifecycle and backfill capture.
//!
//! [`SessionLifecycle`] decides when a "session changed" notification is a
//! real identity change. The backfill functions synthesize mappings for an
//! exchange that already existed before anything was captured for it, such
//! as a rehydrated session; they never overwrite an existing entry.

use swipelink_core::{Conversation, ExchangeId, MappingKey, RecordId, SessionId};
use tracing::debug;

use crate::render::RenderSurface;
use crate::resolver::ActiveKeyResolver;
use crate::store::MappingStore;

/// Last-seen session identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionLifecycle {
    last_seen: Option<SessionId>,
}

impl SessionLifecycle {
    /// Lifecycle that has seen no session yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity seen last.
    pub fn last_seen(&self) -> Option<&SessionId> {
        self.last_seen.as_ref()
    }

    /// Remember `current` without treating it as a change.
    pub fn record(&mut self, current: Option<SessionId>) {
        self.last_seen = current;
    }

    /// Compare `current` with the last-seen identity. Returns `true` (and
    /// remembers `current`) when they differ.
    pub fn observe(&mut self, current: Option<SessionId>) -> bool {
        if self.last_seen == current {
            return false;
        }
        debug!(
            from = ?self.last_seen.as_ref().map(SessionId::as_str),
            to = ?current.as_ref().map(SessionId::as_str),
            "session identity changed"
        );
        self.last_seen = current;
        true
    }
}

/// Mappings written by one backfill pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Backfilled {
    /// The variant-0 key was newly inserted.
    pub original: bool,
    /// The current-variant key, when newly inserted.
    pub current: Option<MappingKey>,
}

/// Output position and preceding input position for the output record `id`.
fn exchange_positions(conversation: &Conversation, id: RecordId) -> Option<(usize, usize)> {
    let output = conversation.position_of(id)?;
    if !conversation.get(output)?.is_output() {
        return None;
    }
    let input = conversation.input_before(output)?;
    Some((output, input))
}

/// Make sure the exchange of output record `id` has a variant-0 mapping and a
/// mapping for its currently shown variant.
///
/// Variant 0 maps to the input's original text; the shown variant maps to
/// the input's current text.
pub fn ensure_mapping(
    store: &mut MappingStore,
    conversation: &Conversation,
    surface: &dyn RenderSurface,
    id: RecordId,
) -> Backfilled {
    let Some((output, input)) = exchange_positions(conversation, id) else {
        debug!(record = %id, "backfill skipped, exchange not found");
        return Backfilled::default();
    };
    let Some(input) = conversation.get(input) else {
        return Backfilled::default();
    };
    let exchange = ExchangeId::from_record(conversation.id_at(output));

    let original = store.set_if_absent(MappingKey::new(exchange, 0), input.original_text());

    let mut current = None;
    if let Some(key) = ActiveKeyResolver::new(conversation, surface).resolve(Some(exchange.record()))
        && store.set_if_absent(key, input.text.clone())
    {
        current = Some(key);
    }

    if original || current.is_some() {
        debug!(%exchange, original, current = ?current.map(|k| k.to_string()), "backfilled mappings");
    }
    Backfilled { original, current }
}

/// Backfill the newest exchange, if the conversation already has one.
///
/// Requires non-empty input text. The current-variant key goes in first so
/// an exchange showing variant 0 maps it to the text actually on screen.
pub fn backfill_current(
    store: &mut MappingStore,
    conversation: &Conversation,
    surface: &dyn RenderSurface,
) -> Backfilled {
    let Some(output) = conversation.last_output() else {
        return Backfilled::default();
    };
    let Some(input) = conversation
        .input_before(output)
        .and_then(|position| conversation.get(position))
    else {
        return Backfilled::default();
    };
    if input.text.is_empty() {
        return Backfilled::default();
    }

    let mut current = None;
    if let Some(key) = ActiveKeyResolver::new(conversation, surface).resolve(None)
        && store.set_if_absent(key, input.text.clone())
    {
        current = Some(key);
    }

    let exchange = ExchangeId::from_record(conversation.id_at(output));
    let original = store.set_if_absent(MappingKey::new(exchange, 0), input.original_text());

    if original || current.is_some() {
        debug!(%exchange, original, current = ?current.map(|k| k.to_string()), "captured current state");
    }
    Backfilled { original, current }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
