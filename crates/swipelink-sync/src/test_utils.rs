//! In-memory host fakes for tests.
//!
//! [`FakeConversation`] stands in for the engine's conversation and session
//! identity; [`FakeSurface`] records every write and marker change so tests
//! can assert on what the synchronizer painted.

use std::collections::{BTreeSet, HashMap};

use parking_lot::{Mutex, RwLock};
use swipelink_core::{Conversation, ConversationRecord, RecordId, SessionId};

use crate::host::ConversationSource;
use crate::render::RenderSurface;

/// Mutable conversation backing a [`ConversationSource`].
#[derive(Debug, Default)]
pub struct FakeConversation {
    session: RwLock<Option<SessionId>>,
    records: RwLock<Vec<ConversationRecord>>,
}

impl FakeConversation {
    /// Conversation `session` holding `records`.
    pub fn new(session: Option<&str>, records: Vec<ConversationRecord>) -> Self {
        Self {
            session: RwLock::new(session.map(SessionId::from)),
            records: RwLock::new(records),
        }
    }

    /// Replace the record list.
    pub fn set_records(&self, records: Vec<ConversationRecord>) {
        *self.records.write() = records;
    }

    /// Switch to another session identity.
    pub fn set_session(&self, session: Option<&str>) {
        *self.session.write() = session.map(SessionId::from);
    }

    /// Mutate the record list in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut Vec<ConversationRecord>) -> R) -> R {
        f(&mut *self.records.write())
    }
}

impl ConversationSource for FakeConversation {
    fn session_id(&self) -> Option<SessionId> {
        self.session.read().clone()
    }

    fn snapshot(&self) -> Conversation {
        Conversation::new(self.records.read().clone())
    }
}

#[derive(Debug, Default)]
struct SurfaceState {
    texts: HashMap<RecordId, String>,
    shown: HashMap<RecordId, usize>,
    linked: BTreeSet<RecordId>,
    writes: Vec<(RecordId, String)>,
}

/// Recording [`RenderSurface`].
#[derive(Debug, Default)]
pub struct FakeSurface {
    state: Mutex<SurfaceState>,
}

impl FakeSurface {
    /// Surface with no elements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface with one element per record, showing the record text.
    pub fn from_conversation(conversation: &Conversation) -> Self {
        let surface = Self::new();
        {
            let mut state = surface.state.lock();
            for record in conversation.records() {
                let _ = state.texts.insert(record.id, record.text.clone());
            }
        }
        surface
    }

    /// Set the shown-variant attribute of the element of `id`.
    pub fn set_shown_variant(&self, id: RecordId, variant: usize) {
        let _ = self.state.lock().shown.insert(id, variant);
    }

    /// Set the displayed text without recording a write.
    pub fn set_text(&self, id: RecordId, text: impl Into<String>) {
        let _ = self.state.lock().texts.insert(id, text.into());
    }

    /// Drop the element of `id`.
    pub fn remove_element(&self, id: RecordId) {
        let mut state = self.state.lock();
        let _ = state.texts.remove(&id);
        let _ = state.shown.remove(&id);
        let _ = state.linked.remove(&id);
    }

    /// Displayed text of the element of `id`.
    pub fn text(&self, id: RecordId) -> Option<String> {
        self.state.lock().texts.get(&id).cloned()
    }

    /// Every write made through [`RenderSurface::write_text`], in order.
    pub fn writes(&self) -> Vec<(RecordId, String)> {
        self.state.lock().writes.clone()
    }

    /// Whether the element of `id` carries the linked marker.
    pub fn is_linked(&self, id: RecordId) -> bool {
        self.state.lock().linked.contains(&id)
    }

    /// All elements carrying the linked marker.
    pub fn linked(&self) -> BTreeSet<RecordId> {
        self.state.lock().linked.clone()
    }
}

impl RenderSurface for FakeSurface {
    fn shown_variant(&self, id: RecordId) -> Option<usize> {
        self.state.lock().shown.get(&id).copied()
    }

    fn read_text(&self, id: RecordId) -> Option<String> {
        self.text(id)
    }

    fn write_text(&self, id: RecordId, text: &str) -> bool {
        let mut state = self.state.lock();
        match state.texts.get_mut(&id) {
            Some(shown) => {
                text.clone_into(shown);
                state.writes.push((id, text.to_owned()));
                true
            }
            None => false,
        }
    }

    fn set_linked(&self, id: RecordId, linked: bool) {
        let mut state = self.state.lock();
        if linked {
            let _ = state.linked.insert(id);
        } else {
            let _ = state.linked.remove(&id);
        }
    }

    fn clear_linked(&self) {
        self.state.lock().linked.clear();
    }
}
