//! Generation capture and request interception.
//!
//! A generation cycle moves Idle → Armed → Patched → Idle. Arming captures
//! the input text about to be sent ([`PendingCapture`]); patching rewrites the
//! input record of the outgoing request to the text mapped for the variant
//! the user is looking at; restoring writes the original text back.
//!
//! At most one [`InterceptorPatch`] exists at a time, and restoration only
//! ever reassigns the text field of the one record it patched.

use std::time::{Duration, Instant};

use swipelink_core::{Conversation, MappingKey, Result, SyncError};
use tracing::debug;

use crate::host::OutgoingRequest;
use crate::render::RenderSurface;

/// Default safety window for an outstanding patch.
pub const RESTORE_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Input captured for the generation in flight.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingCapture {
    /// Input text about to be sent.
    pub input_text: Option<String>,
    /// Active key frozen at generation start.
    pub generation_key: Option<MappingKey>,
}

impl PendingCapture {
    /// Forget everything captured.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Live input text: the surface text of the newest input record, else the
/// record's own text. Empty text counts as absent.
pub fn capture_input(conversation: &Conversation, surface: &dyn RenderSurface) -> Option<String> {
    let record = conversation.get(conversation.last_input()?)?;
    surface
        .read_text(record.id)
        .filter(|text| !text.is_empty())
        .or_else(|| Some(record.text.clone()).filter(|text| !text.is_empty()))
}

/// An outstanding rewrite of one request record.
#[derive(Debug)]
pub struct InterceptorPatch {
    target: OutgoingRequest,
    position: usize,
    original_text: String,
}

impl InterceptorPatch {
    /// Position of the patched record in the request.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Text the record carried before patching.
    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    fn restore(self) -> bool {
        let Self {
            target,
            position,
            original_text,
        } = self;
        target.with_records_mut(|records| match records.get_mut(position) {
            Some(record) => {
                record.text = original_text;
                true
            }
            None => false,
        })
    }
}

/// Owns the single outstanding patch and its safety deadline.
#[derive(Debug)]
pub struct Interceptor {
    patch: Option<InterceptorPatch>,
    deadline: Option<Instant>,
    timeout: Duration,
}

impl Default for Interceptor {
    fn default() -> Self {
        Self::new(RESTORE_TIMEOUT)
    }
}

impl Interceptor {
    /// Interceptor whose patches are force-restored after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            patch: None,
            deadline: None,
            timeout,
        }
    }

    /// Whether a patch is outstanding.
    pub fn is_patched(&self) -> bool {
        self.patch.is_some()
    }

    /// The outstanding patch.
    pub fn patch(&self) -> Option<&InterceptorPatch> {
        self.patch.as_ref()
    }

    /// When the outstanding patch will be force-restored.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Rewrite the input record preceding `key`'s output record to `mapped`.
    ///
    /// Any outstanding patch is restored first. Returns `Ok(false)` when the
    /// input already carries the mapped text.
    pub fn apply(
        &mut self,
        request: &OutgoingRequest,
        key: MappingKey,
        mapped: &str,
        now: Instant,
    ) -> Result<bool> {
        let _ = self.restore();

        let exchange = key.exchange.record();
        let patch = request.with_records_mut(|records| -> Result<Option<InterceptorPatch>> {
            let output = records
                .iter()
                .rposition(|r| r.id == exchange)
                .ok_or(SyncError::UnresolvableExchange(key.exchange))?;
            let position = records[..output]
                .iter()
                .rposition(|r| r.is_input())
                .ok_or(SyncError::NoInputRecord { before: output })?;

            let record = &mut records[position];
            if record.text == mapped {
                return Ok(None);
            }
            let original_text = std::mem::replace(&mut record.text, mapped.to_owned());
            Ok(Some(InterceptorPatch {
                target: request.clone(),
                position,
                original_text,
            }))
        })?;

        let Some(patch) = patch else {
            return Ok(false);
        };
        debug!(%key, position = patch.position, "patched outgoing input record");
        self.patch = Some(patch);
        self.deadline = Some(now + self.timeout);
        Ok(true)
    }

    /// Write the original text back. Returns `true` when a patch was
    /// outstanding.
    pub fn restore(&mut self) -> bool {
        self.deadline = None;
        let Some(patch) = self.patch.take() else {
            return false;
        };
        let position = patch.position;
        if patch.restore() {
            debug!(position, "restored outgoing input record");
        } else {
            debug!(position, "patched record vanished before restore");
        }
        true
    }

    /// Force-restore when the safety window has elapsed.
    pub fn expire(&mut self, now: Instant) -> Result<()> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                let _ = self.restore();
                Err(SyncError::PatchTimedOut)
            }
            _ => Ok(()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use swipelink_core::{ConversationRecord, ExchangeId, RecordId};

    use super::*;
    use crate::test_utils::FakeSurface;

    fn rid(n: u64) -> RecordId {
        RecordId::new(n)
    }

    fn key(exchange: u64, variant: usize) -> MappingKey {
        MappingKey::new(ExchangeId::new(exchange), variant)
    }

    fn request() -> OutgoingRequest {
        OutgoingRequest::new(vec![
            ConversationRecord::input(0, rid(0), "first"),
            ConversationRecord::output(1, rid(1), "reply one"),
            ConversationRecord::input(2, rid(2), "second"),
            ConversationRecord::output(3, rid(3), "reply two"),
            ConversationRecord::input(4, rid(4), "third"),
        ])
    }

    #[test]
    fn patches_input_preceding_exchange() {
        let req = request();
        let mut interceptor = Interceptor::default();
        let now = Instant::now();

        assert!(interceptor.apply(&req, key(3, 1), "second, edited", now).unwrap());
        assert_eq!(req.text_at(2).as_deref(), Some("second, edited"));
        assert_eq!(req.text_at(4).as_deref(), Some("third"));
        assert_eq!(interceptor.deadline(), Some(now + RESTORE_TIMEOUT));
        assert_eq!(interceptor.patch().map(InterceptorPatch::original_text), Some("second"));
    }

    #[test]
    fn equal_text_is_not_patched() {
        let req = request();
        let mut interceptor = Interceptor::default();
        assert!(!interceptor.apply(&req, key(1, 0), "first", Instant::now()).unwrap());
        assert!(!interceptor.is_patched());
    }

    #[test]
    fn unknown_exchange_aborts() {
        let req = request();
        let mut interceptor = Interceptor::default();
        assert_matches!(
            interceptor.apply(&req, key(9, 0), "x", Instant::now()),
            Err(SyncError::UnresolvableExchange(_))
        );
        let orphan = OutgoingRequest::new(vec![ConversationRecord::output(0, rid(1), "a")]);
        assert_matches!(
            interceptor.apply(&orphan, key(1, 0), "x", Instant::now()),
            Err(SyncError::NoInputRecord { before: 0 })
        );
    }

    #[test]
    fn restore_only_touches_text() {
        let req = request();
        let mut interceptor = Interceptor::default();
        let _ = interceptor.apply(&req, key(3, 1), "patched", Instant::now()).unwrap();
        req.with_records_mut(|records| records[2].variants.push("concurrent".into()));

        assert!(interceptor.restore());
        let records = req.records();
        assert_eq!(records[2].text, "second");
        assert_eq!(records[2].variants, vec!["concurrent".to_owned()]);
        assert!(!interceptor.restore());
        assert_eq!(interceptor.deadline(), None);
    }

    #[test]
    fn new_patch_restores_previous_one() {
        let first = request();
        let second = request();
        let mut interceptor = Interceptor::default();
        let now = Instant::now();
        let _ = interceptor.apply(&first, key(3, 1), "a", now).unwrap();
        let _ = interceptor.apply(&second, key(1, 1), "b", now).unwrap();

        assert_eq!(first.text_at(2).as_deref(), Some("second"));
        assert_eq!(second.text_at(0).as_deref(), Some("b"));
        assert_eq!(interceptor.patch().map(InterceptorPatch::position), Some(0));
    }

    #[test]
    fn safety_timeout_forces_restore() {
        let req = request();
        let mut interceptor = Interceptor::new(Duration::from_millis(500));
        let now = Instant::now();
        let _ = interceptor.apply(&req, key(3, 1), "patched", now).unwrap();

        assert!(interceptor.expire(now + Duration::from_millis(499)).is_ok());
        assert!(interceptor.is_patched());
        assert_matches!(
            interceptor.expire(now + Duration::from_millis(500)),
            Err(SyncError::PatchTimedOut)
        );
        assert_eq!(req.text_at(2).as_deref(), Some("second"));
        assert!(interceptor.expire(now + Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn capture_prefers_live_surface_text() {
        let convo = Conversation::new(vec![
            ConversationRecord::input(0, rid(0), "stale"),
            ConversationRecord::output(1, rid(1), "a"),
        ]);
        let surface = FakeSurface::new();
        assert_eq!(capture_input(&convo, &surface).as_deref(), Some("stale"));

        surface.set_text(rid(0), "fresh");
        assert_eq!(capture_input(&convo, &surface).as_deref(), Some("fresh"));

        assert_eq!(capture_input(&Conversation::default(), &surface), None);
    }
}
