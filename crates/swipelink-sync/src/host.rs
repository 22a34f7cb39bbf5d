//! Host collaborator seams.
//!
//! The conversation engine owns the record list and the session identity;
//! the synchronizer only reads them through [`ConversationSource`]. The
//! request-interception hook hands over an [`OutgoingRequest`], a shared
//! handle to the records about to be dispatched, which is the only place the
//! synchronizer ever writes conversation data.

use std::sync::Arc;

use parking_lot::Mutex;
use swipelink_core::{Conversation, ConversationRecord, SessionId};

/// Read access to the engine's current conversation.
pub trait ConversationSource: Send + Sync {
    /// Identity of the loaded conversation, if any.
    fn session_id(&self) -> Option<SessionId>;

    /// Snapshot of the record list.
    fn snapshot(&self) -> Conversation;
}

/// Records of a generation request about to be dispatched.
///
/// Cloning shares the same list, so an interceptor patch can write the
/// original text back after the hook that created it has returned.
#[derive(Clone, Debug, Default)]
pub struct OutgoingRequest {
    records: Arc<Mutex<Vec<ConversationRecord>>>,
}

impl OutgoingRequest {
    /// Wrap the records of a request.
    pub fn new(records: Vec<ConversationRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    /// Copy of the current records.
    pub fn records(&self) -> Vec<ConversationRecord> {
        self.records.lock().clone()
    }

    /// Text of the record at `position`.
    pub fn text_at(&self, position: usize) -> Option<String> {
        self.records.lock().get(position).map(|r| r.text.clone())
    }

    /// Run `f` with mutable access to the records.
    pub fn with_records_mut<R>(&self, f: impl FnOnce(&mut Vec<ConversationRecord>) -> R) -> R {
        f(&mut *self.records.lock())
    }

    /// Whether both handles share the same list.
    pub fn same_request(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.records, &other.records)
    }
}

/// Notification names the engine may advertise.
pub mod capability {
    /// Native variant-switch notification.
    pub const VARIANT_SWITCHED: &str = "variant_switched";
}

/// Optional engine features that change how the synchronizer runs, probed
/// once at startup.
///
/// Other optional notifications need no flag: one the engine never emits
/// simply never reaches [`EngineEvent::from_raw`](crate::EngineEvent::from_raw).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineCapabilities {
    /// Native variant-switch notification exists.
    pub variant_switched: bool,
}

impl EngineCapabilities {
    /// Every optional feature available.
    pub fn all() -> Self {
        Self {
            variant_switched: true,
        }
    }

    /// Build the capability set from the notification names an engine
    /// advertises.
    pub fn probe<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            variant_switched: names
                .into_iter()
                .any(|name| name == capability::VARIANT_SWITCHED),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
