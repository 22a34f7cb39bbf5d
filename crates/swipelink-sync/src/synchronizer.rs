//! Event synchronizer.
//!
//! One procedure per engine notification, each a bounded state transition
//! over an explicit [`SessionState`]. Work that must read up-to-date
//! rendering state is queued as a [`PaintTask`] and runs when the host
//! reports the next paint through [`EventSynchronizer::painted`]. Timers are
//! plain deadlines: the host asks for [`EventSynchronizer::next_deadline`] and
//! calls [`EventSynchronizer::poll_timers`] once it has passed.
//!
//! No step ever fails outward. An aborted step is logged at `debug` with its
//! error category and leaves prior state untouched.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use swipelink_core::{
    Conversation, ExchangeId, MappingKey, RecordId, Result, SessionId, SyncError,
};
use tracing::debug;

use crate::detection::{DetectorKind, SwitchTrigger, VariantSwitchDetector, select_detector};
use crate::events::{EngineEvent, SurfaceSignal};
use crate::host::{ConversationSource, EngineCapabilities, OutgoingRequest};
use crate::interceptor::{Interceptor, PendingCapture, capture_input};
use crate::lifecycle::{SessionLifecycle, backfill_current, ensure_mapping};
use crate::render::{RenderSurface, RenderingSynchronizer};
use crate::resolver::ActiveKeyResolver;
use crate::store::MappingStore;

/// Quiet period for fallback switch detection.
pub const SWITCH_DEBOUNCE: Duration = Duration::from_millis(80);

/// Per-session mutable state.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    /// Variant-to-input mappings.
    pub store: MappingStore,
    /// Key of the variant currently shown.
    pub active_key: Option<MappingKey>,
    /// A non-dry-run generation is in flight.
    pub generating: bool,
    /// Input captured for the generation in flight.
    pub capture: PendingCapture,
}

impl SessionState {
    /// Drop every mapping, the active key, and the pending capture.
    pub fn reset(&mut self) {
        self.store.clear();
        self.active_key = None;
        self.generating = false;
        self.capture.clear();
    }
}

/// Work deferred until the next paint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaintTask {
    /// Capture mappings for the newest exchange.
    Backfill,
    /// Watch the newest output element.
    AttachObserver,
    /// An output record was painted.
    Rendered(Option<RecordId>),
    /// Recompute the active key for an exchange and resync the surface.
    Reconcile(Option<RecordId>),
    /// Restart the debounce window.
    Debounce,
}

/// Serializable view of the synchronizer state for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSnapshot {
    /// Last-seen session identity.
    pub session_id: Option<String>,
    /// A generation is in flight.
    pub generating: bool,
    /// Captured input text.
    pub pending_input: Option<String>,
    /// Key of the variant currently shown.
    pub active_key: Option<MappingKey>,
    /// Key frozen for the generation in flight.
    pub generation_key: Option<MappingKey>,
    /// Number of stored mappings.
    pub store_size: usize,
    /// Stored keys in insertion order.
    pub store_keys: Vec<MappingKey>,
    /// An interceptor patch is outstanding.
    pub patch_outstanding: bool,
    /// Live switch-detection path.
    pub detector: DetectorKind,
    /// Tasks waiting for the next paint.
    pub pending_paint: usize,
}

/// Central dispatcher for engine notifications.
pub struct EventSynchronizer {
    source: Arc<dyn ConversationSource>,
    renderer: RenderingSynchronizer,
    state: SessionState,
    lifecycle: SessionLifecycle,
    interceptor: Interceptor,
    detector: Box<dyn VariantSwitchDetector>,
    after_paint: Vec<PaintTask>,
    debounce_deadline: Option<Instant>,
}

impl EventSynchronizer {
    /// Build a synchronizer for an engine with `capabilities`.
    pub fn new(
        source: Arc<dyn ConversationSource>,
        surface: Arc<dyn RenderSurface>,
        capabilities: &EngineCapabilities,
    ) -> Self {
        let detector = select_detector(capabilities);
        debug!(detector = ?detector.kind(), "selected variant-switch detector");
        Self {
            source,
            renderer: RenderingSynchronizer::new(surface),
            state: SessionState::default(),
            lifecycle: SessionLifecycle::new(),
            interceptor: Interceptor::default(),
            detector,
            after_paint: Vec::new(),
            debounce_deadline: None,
        }
    }

    /// Record the current session and queue the initial backfill.
    pub fn start(&mut self) {
        self.lifecycle.record(self.source.session_id());
        self.defer(PaintTask::Backfill);
        self.defer(PaintTask::AttachObserver);
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// Key of the variant currently shown.
    pub fn active_key(&self) -> Option<MappingKey> {
        self.state.active_key
    }

    /// The mapping store.
    pub fn store(&self) -> &MappingStore {
        &self.state.store
    }

    /// Captured input text for the generation in flight.
    pub fn pending_input(&self) -> Option<&str> {
        self.state.capture.input_text.as_deref()
    }

    /// Key frozen for the generation in flight.
    pub fn generation_key(&self) -> Option<MappingKey> {
        self.state.capture.generation_key
    }

    /// Whether a generation is in flight.
    pub fn is_generating(&self) -> bool {
        self.state.generating
    }

    /// Whether an interceptor patch is outstanding.
    pub fn is_patched(&self) -> bool {
        self.interceptor.is_patched()
    }

    /// Live switch-detection path.
    pub fn detector_kind(&self) -> DetectorKind {
        self.detector.kind()
    }

    /// Output record the fallback detector watches.
    pub fn observed_record(&self) -> Option<RecordId> {
        self.detector.observed()
    }

    /// Tasks waiting for the next paint.
    pub fn pending_paint(&self) -> &[PaintTask] {
        &self.after_paint
    }

    /// Diagnostic view of the current state.
    pub fn debug_snapshot(&self) -> DebugSnapshot {
        DebugSnapshot {
            session_id: self.lifecycle.last_seen().map(|s| s.as_str().to_owned()),
            generating: self.state.generating,
            pending_input: self.state.capture.input_text.clone(),
            active_key: self.state.active_key,
            generation_key: self.state.capture.generation_key,
            store_size: self.state.store.len(),
            store_keys: self.state.store.keys().copied().collect(),
            patch_outstanding: self.interceptor.is_patched(),
            detector: self.detector.kind(),
            pending_paint: self.after_paint.len(),
        }
    }

    // ── Entry points ────────────────────────────────────────────────────

    /// Process one engine notification.
    pub fn handle(&mut self, event: &EngineEvent, now: Instant) {
        if let Err(err) = self.dispatch(event, now) {
            log_abort(event.name(), &err);
        }
    }

    /// Process one rendering-surface signal.
    pub fn surface_signal(&mut self, signal: SurfaceSignal, now: Instant) {
        if self.state.generating && matches!(signal, SurfaceSignal::Mutation { .. }) {
            return;
        }
        if let Some(trigger) = self.detector.on_surface(signal) {
            self.apply_trigger(trigger, now);
        }
    }

    /// The host painted; run everything deferred to this point.
    pub fn painted(&mut self, now: Instant) {
        for task in std::mem::take(&mut self.after_paint) {
            if let Err(err) = self.run_paint_task(task, now) {
                log_abort("after_paint", &err);
            }
        }
    }

    /// Earliest pending timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.debounce_deadline, self.interceptor.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire every timer due at `now`.
    pub fn poll_timers(&mut self, now: Instant) {
        if self.debounce_deadline.is_some_and(|deadline| now >= deadline) {
            self.debounce_deadline = None;
            if let Err(err) = self.reconcile(None) {
                log_abort("switch_debounce", &err);
            }
        }
        if let Err(err) = self.interceptor.expire(now) {
            log_abort("restore_timeout", &err);
        }
    }

    /// Request-interception hook: patch `request` with the text mapped for
    /// the variant the generation started from.
    pub fn intercept(&mut self, request: &OutgoingRequest, now: Instant) {
        if let Err(err) = self.try_intercept(request, now) {
            log_abort("intercept", &err);
        }
    }

    /// The request's consumer is done with the input record.
    pub fn request_consumed(&mut self) {
        let _ = self.interceptor.restore();
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    fn dispatch(&mut self, event: &EngineEvent, now: Instant) -> Result<()> {
        match *event {
            EngineEvent::SessionChanged => self.on_session_changed(),
            EngineEvent::GenerationAboutToStart { dry_run } => {
                if !dry_run {
                    self.on_generation_armed();
                }
            }
            EngineEvent::GenerationStarted { dry_run } => {
                if !dry_run {
                    self.state.generating = true;
                    if self.state.capture.input_text.is_none() {
                        self.state.capture.input_text = self.live_input(&self.source.snapshot());
                    }
                }
            }
            EngineEvent::OutputReceived { record } => return self.on_output_received(record),
            EngineEvent::OutputRendered { record } => self.defer(PaintTask::Rendered(record)),
            EngineEvent::GenerationEnded | EngineEvent::GenerationStopped => {
                self.on_generation_finished();
            }
            EngineEvent::VariantSwitched { record } => {
                if let Some(trigger) = self.detector.on_native(record) {
                    self.apply_trigger(trigger, now);
                }
            }
            EngineEvent::RecordUpdated { .. } => {
                if !self.state.generating {
                    self.defer(PaintTask::Reconcile(None));
                }
            }
            EngineEvent::RecordEdited { .. } => {
                self.state.capture.input_text = self.live_input(&self.source.snapshot());
                if !self.state.generating {
                    self.defer(PaintTask::Reconcile(None));
                }
            }
            EngineEvent::RecordDeleted { remaining } => self.on_record_deleted(remaining),
            EngineEvent::VariantDeleted { position, variant } => {
                return self.on_variant_deleted(position, variant);
            }
            EngineEvent::InputSent { .. } => self.state.capture.input_text = None,
            EngineEvent::RequestConsumed => self.request_consumed(),
        }
        Ok(())
    }

    fn on_session_changed(&mut self) {
        let _ = self.interceptor.restore();
        if self.lifecycle.observe(self.source.session_id()) {
            self.reset();
        }
        self.defer(PaintTask::Backfill);
        self.defer(PaintTask::AttachObserver);
    }

    fn reset(&mut self) {
        self.renderer.clear_all();
        self.state.reset();
        self.detector.detach();
        self.debounce_deadline = None;
        self.after_paint.clear();
        debug!(
            session = ?self.lifecycle.last_seen().map(SessionId::as_str),
            "session state cleared"
        );
    }

    fn on_generation_armed(&mut self) {
        let _ = self.interceptor.restore();
        self.state.generating = true;

        let conversation = self.source.snapshot();
        self.state.capture.input_text = self.live_input(&conversation);
        self.refresh_active_key(&conversation, None);
        self.state.capture.generation_key = self.state.active_key;
        debug!(
            key = ?self.state.capture.generation_key.map(|k| k.to_string()),
            captured = self.state.capture.input_text.is_some(),
            "generation armed"
        );
    }

    fn on_output_received(&mut self, record: Option<RecordId>) -> Result<()> {
        let id = record.ok_or(SyncError::NoOutputRecord)?;
        let conversation = self.source.snapshot();
        let position = conversation
            .position_of(id)
            .ok_or(SyncError::UnresolvableRecord(id))?;
        let Some(output) = conversation.get(position).filter(|r| r.is_output()) else {
            return Err(SyncError::UnresolvableRecord(id));
        };
        if output.text.is_empty() {
            return Ok(());
        }
        let input = self
            .state
            .capture
            .input_text
            .take()
            .ok_or(SyncError::MissingInput)?;
        self.store_completion(&conversation, position, input);
        Ok(())
    }

    fn on_generation_finished(&mut self) {
        self.state.generating = false;
        self.state.capture.generation_key = None;
        let _ = self.interceptor.restore();

        if let Some(input) = self.state.capture.input_text.take() {
            let conversation = self.source.snapshot();
            if let Some(position) = conversation.last_output() {
                self.store_completion(&conversation, position, input);
            }
        }
        self.state.capture.clear();
    }

    fn store_completion(&mut self, conversation: &Conversation, position: usize, input: String) {
        let Some(output) = conversation.get(position) else {
            return;
        };
        let exchange = ExchangeId::from_record(output.id);
        let key = MappingKey::new(exchange, output.latest_variant_index());
        let evicted = self.state.store.set(key, input);
        self.state.active_key = Some(key);
        debug!(%key, evicted, "stored mapping for completed generation");
    }

    fn on_record_deleted(&mut self, remaining: usize) {
        if self.state.store.is_empty() {
            return;
        }
        let conversation = self.source.snapshot();
        let orphaned: Vec<ExchangeId> = self
            .state
            .store
            .exchanges()
            .into_iter()
            .filter(|exchange| !conversation.contains(exchange.record()))
            .collect();
        if orphaned.is_empty() {
            return;
        }

        let mut removed = 0;
        let mut active_cleared = false;
        for exchange in &orphaned {
            removed += self.state.store.remove_exchange(*exchange);
            if self.state.active_key.is_some_and(|key| key.is_for(*exchange)) {
                self.state.active_key = None;
                active_cleared = true;
            }
        }
        if active_cleared {
            self.renderer.clear_all();
        }
        debug!(remaining, removed, exchanges = orphaned.len(), "dropped mappings of deleted records");
    }

    fn on_variant_deleted(&mut self, position: usize, variant: usize) -> Result<()> {
        let conversation = self.source.snapshot();
        let exchange = ExchangeId::from_record(conversation.id_at(position));
        let shifted = self.state.store.remove_variant(exchange, variant);
        debug!(%exchange, variant, shifted, "removed variant mapping");

        self.refresh_active_key(&conversation, None);
        self.sync_rendering(&conversation, Some(exchange))
    }

    fn try_intercept(&mut self, request: &OutgoingRequest, now: Instant) -> Result<()> {
        let _ = self.interceptor.restore();

        let Some(key) = self.state.capture.generation_key.or(self.state.active_key) else {
            return Ok(());
        };
        let Some(mapped) = self.state.store.get(&key).filter(|text| !text.is_empty()) else {
            debug!(%key, "no mapping to apply to request");
            return Ok(());
        };
        let _ = self.interceptor.apply(request, key, mapped, now)?;
        Ok(())
    }

    // ── Deferred work ───────────────────────────────────────────────────

    fn defer(&mut self, task: PaintTask) {
        self.after_paint.push(task);
    }

    fn apply_trigger(&mut self, trigger: SwitchTrigger, now: Instant) {
        match trigger {
            SwitchTrigger::AfterPaint(record) => self.defer(PaintTask::Reconcile(record)),
            SwitchTrigger::Debounce => self.restart_debounce(now),
            SwitchTrigger::DebounceAfterPaint => self.defer(PaintTask::Debounce),
        }
    }

    fn restart_debounce(&mut self, now: Instant) {
        self.debounce_deadline = Some(now + SWITCH_DEBOUNCE);
    }

    fn run_paint_task(&mut self, task: PaintTask, now: Instant) -> Result<()> {
        match task {
            PaintTask::Backfill => {
                let conversation = self.source.snapshot();
                let backfilled =
                    backfill_current(&mut self.state.store, &conversation, self.renderer.surface());
                if let Some(key) = backfilled.current {
                    self.state.active_key = Some(key);
                }
            }
            PaintTask::AttachObserver => {
                let conversation = self.source.snapshot();
                self.attach_observer(&conversation);
            }
            PaintTask::Rendered(record) => {
                let conversation = self.source.snapshot();
                self.attach_observer(&conversation);
                let target = record
                    .filter(|id| conversation.position_of(*id).is_some())
                    .or_else(|| conversation.last_output().map(|p| conversation.id_at(p)))
                    .ok_or(SyncError::NoOutputRecord)?;
                let _ = ensure_mapping(
                    &mut self.state.store,
                    &conversation,
                    self.renderer.surface(),
                    target,
                );
            }
            PaintTask::Reconcile(record) => return self.reconcile(record),
            PaintTask::Debounce => self.restart_debounce(now),
        }
        Ok(())
    }

    fn attach_observer(&mut self, conversation: &Conversation) {
        let target = conversation.last_output().map(|p| conversation.id_at(p));
        self.detector.attach(target);
    }

    // ── Reconciliation ──────────────────────────────────────────────────

    fn live_input(&self, conversation: &Conversation) -> Option<String> {
        capture_input(conversation, self.renderer.surface())
    }

    /// Re-resolve the active key; an unresolvable exchange keeps the old key.
    fn refresh_active_key(&mut self, conversation: &Conversation, exchange: Option<RecordId>) {
        let resolved = ActiveKeyResolver::new(conversation, self.renderer.surface()).resolve(exchange);
        if let Some(key) = resolved {
            self.state.active_key = Some(key);
        }
    }

    fn reconcile(&mut self, exchange: Option<RecordId>) -> Result<()> {
        let conversation = self.source.snapshot();
        self.refresh_active_key(&conversation, exchange);
        self.sync_rendering(&conversation, None)
    }

    /// Push the active key's mapping to the surface, or clear the marker when
    /// nothing is mapped. `unmapped` names the exchange whose marker to clear
    /// in that case; it defaults to the active key's exchange.
    fn sync_rendering(
        &mut self,
        conversation: &Conversation,
        unmapped: Option<ExchangeId>,
    ) -> Result<()> {
        let Some(key) = self.state.active_key else {
            self.renderer.clear_all();
            return Ok(());
        };
        let Some(text) = self.state.store.get(&key) else {
            debug!(%key, "no mapping for shown variant");
            self.renderer
                .clear_for(conversation, Some(unmapped.unwrap_or(key.exchange)));
            return Ok(());
        };
        if let Err(err) = self.renderer.push(conversation, &key, text) {
            self.renderer.clear_all();
            return Err(err);
        }
        Ok(())
    }
}

fn log_abort(step: &'static str, err: &SyncError) {
    debug!(step, category = err.category(), error = %err, "step aborted");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use swipelink_core::ConversationRecord;
    use swipelink_core::logging::capture_logs;
    use tracing::Level;

    use super::*;
    use crate::store::MAX_ENTRIES;
    use crate::test_utils::{FakeConversation, FakeSurface};

    fn rid(n: u64) -> RecordId {
        RecordId::new(n)
    }

    fn key(exchange: u64, variant: usize) -> MappingKey {
        MappingKey::new(ExchangeId::new(exchange), variant)
    }

    struct Harness {
        source: Arc<FakeConversation>,
        surface: Arc<FakeSurface>,
        sync: EventSynchronizer,
        now: Instant,
    }

    impl Harness {
        fn new(capabilities: EngineCapabilities, records: Vec<ConversationRecord>) -> Self {
            let source = Arc::new(FakeConversation::new(Some("chat-a"), records));
            let surface = Arc::new(FakeSurface::from_conversation(&source.snapshot()));
            let sync = EventSynchronizer::new(source.clone(), surface.clone(), &capabilities);
            Self {
                source,
                surface,
                sync,
                now: Instant::now(),
            }
        }

        fn native(records: Vec<ConversationRecord>) -> Self {
            Self::new(EngineCapabilities::all(), records)
        }

        fn handle(&mut self, event: EngineEvent) {
            self.sync.handle(&event, self.now);
        }

        fn paint(&mut self) {
            self.sync.painted(self.now);
        }

        fn advance(&mut self, by: Duration) {
            self.now += by;
            self.sync.poll_timers(self.now);
        }
    }

    fn one_exchange() -> Vec<ConversationRecord> {
        vec![
            ConversationRecord::input(0, rid(4), "hello"),
            ConversationRecord::output(1, rid(5), "reply"),
        ]
    }

    #[test]
    fn start_backfills_after_first_paint() {
        let mut h = Harness::native(one_exchange());
        h.sync.start();
        assert!(h.sync.store().is_empty());
        assert_eq!(h.sync.pending_paint(), &[PaintTask::Backfill, PaintTask::AttachObserver]);

        h.paint();
        assert_eq!(h.sync.store().get(&key(5, 0)), Some("hello"));
        assert_eq!(h.sync.active_key(), Some(key(5, 0)));
        assert!(h.sync.pending_paint().is_empty());
    }

    #[test]
    fn generation_cycle_stores_mapping() {
        let mut h = Harness::native(one_exchange());
        h.handle(EngineEvent::GenerationAboutToStart { dry_run: false });
        assert!(h.sync.is_generating());
        assert_eq!(h.sync.pending_input(), Some("hello"));
        assert_eq!(h.sync.generation_key(), Some(key(5, 0)));

        h.source.update(|records| {
            records[1].variants = vec!["reply".into(), "second reply".into()];
            records[1].text = "second reply".into();
        });
        h.handle(EngineEvent::OutputReceived { record: Some(rid(5)) });
        assert_eq!(h.sync.store().get(&key(5, 1)), Some("hello"));
        assert_eq!(h.sync.active_key(), Some(key(5, 1)));
        assert_eq!(h.sync.pending_input(), None);

        h.handle(EngineEvent::GenerationEnded);
        assert!(!h.sync.is_generating());
        assert_eq!(h.sync.generation_key(), None);
        assert_eq!(h.sync.store().len(), 1);
    }

    #[test]
    fn completed_generations_never_outgrow_the_store() {
        let mut h = Harness::native(Vec::new());
        assert_eq!(h.sync.store().capacity(), MAX_ENTRIES);

        for cycle in 0..300_u64 {
            let input = rid(2 * cycle);
            let output = rid(2 * cycle + 1);
            h.source.update(|records| {
                let position = records.len();
                records.push(ConversationRecord::input(position, input, format!("q{cycle}")));
                records.push(ConversationRecord::output(position + 1, output, format!("a{cycle}")));
            });
            h.handle(EngineEvent::GenerationStarted { dry_run: false });
            h.handle(EngineEvent::OutputReceived { record: Some(output) });
            h.handle(EngineEvent::GenerationEnded);
            assert!(h.sync.store().len() <= MAX_ENTRIES);
        }

        assert_eq!(h.sync.store().len(), MAX_ENTRIES);
        assert!(!h.sync.store().contains(&key(1, 0)));
        assert!(!h.sync.store().contains(&key(399, 0)));
        assert_eq!(h.sync.store().get(&key(401, 0)), Some("q200"));
        assert_eq!(h.sync.store().get(&key(599, 0)), Some("q299"));
    }

    #[test]
    fn dry_run_is_ignored() {
        let mut h = Harness::native(one_exchange());
        h.handle(EngineEvent::GenerationAboutToStart { dry_run: true });
        h.handle(EngineEvent::GenerationStarted { dry_run: true });
        assert!(!h.sync.is_generating());
        assert_eq!(h.sync.pending_input(), None);
    }

    #[test]
    fn generation_end_falls_back_to_newest_output() {
        let mut h = Harness::native(one_exchange());
        h.handle(EngineEvent::GenerationStarted { dry_run: false });
        assert_eq!(h.sync.pending_input(), Some("hello"));
        h.handle(EngineEvent::GenerationStopped);
        assert_eq!(h.sync.store().get(&key(5, 0)), Some("hello"));
        assert_eq!(h.sync.active_key(), Some(key(5, 0)));
    }

    #[test]
    fn output_without_capture_aborts_quietly() {
        let (logs, _guard) = capture_logs();
        let mut h = Harness::native(one_exchange());
        h.handle(EngineEvent::OutputReceived { record: Some(rid(5)) });

        assert!(h.sync.store().is_empty());
        let aborted = logs.with_field(Level::DEBUG, "category", "missing_input");
        assert_eq!(aborted.len(), 1);
        assert_eq!(aborted[0].field("step"), Some("output_received"));
    }

    #[test]
    fn input_sent_clears_pending_text_only() {
        let mut h = Harness::native(one_exchange());
        h.sync.start();
        h.paint();
        h.handle(EngineEvent::GenerationAboutToStart { dry_run: false });
        h.handle(EngineEvent::InputSent { record: Some(rid(4)) });
        assert_eq!(h.sync.pending_input(), None);
        assert_eq!(h.sync.store().len(), 1);
    }

    #[test]
    fn record_edited_refreshes_capture_from_surface() {
        let mut h = Harness::native(one_exchange());
        h.handle(EngineEvent::GenerationAboutToStart { dry_run: false });
        h.surface.set_text(rid(4), "hello, edited");
        h.handle(EngineEvent::RecordEdited { record: Some(rid(4)) });
        assert_eq!(h.sync.pending_input(), Some("hello, edited"));
        assert!(h.sync.pending_paint().is_empty());
    }

    #[test]
    fn record_updated_is_suppressed_while_generating() {
        let mut h = Harness::native(one_exchange());
        h.handle(EngineEvent::GenerationStarted { dry_run: false });
        h.handle(EngineEvent::RecordUpdated { record: None });
        assert!(h.sync.pending_paint().is_empty());

        h.handle(EngineEvent::GenerationEnded);
        h.handle(EngineEvent::RecordUpdated { record: None });
        assert_eq!(h.sync.pending_paint(), &[PaintTask::Reconcile(None)]);
    }

    #[test]
    fn rendered_output_attaches_and_backfills() {
        let mut h = Harness::new(EngineCapabilities::default(), one_exchange());
        h.surface.set_shown_variant(rid(5), 1);
        h.handle(EngineEvent::OutputRendered { record: Some(rid(5)) });
        h.paint();

        assert_eq!(h.sync.observed_record(), Some(rid(5)));
        assert_eq!(h.sync.store().get(&key(5, 0)), Some("hello"));
        assert_eq!(h.sync.store().get(&key(5, 1)), Some("hello"));
    }

    #[test]
    fn unchanged_session_keeps_state() {
        let mut h = Harness::native(one_exchange());
        h.sync.start();
        h.paint();
        h.handle(EngineEvent::SessionChanged);
        assert_eq!(h.sync.store().len(), 1);
        assert_eq!(h.sync.active_key(), Some(key(5, 0)));
    }

    #[test]
    fn new_session_resets_everything() {
        let mut h = Harness::native(one_exchange());
        h.sync.start();
        h.paint();
        h.handle(EngineEvent::GenerationAboutToStart { dry_run: false });

        h.source.set_session(Some("chat-b"));
        h.source.set_records(Vec::new());
        h.handle(EngineEvent::SessionChanged);

        assert!(h.sync.store().is_empty());
        assert_eq!(h.sync.active_key(), None);
        assert_eq!(h.sync.pending_input(), None);
        assert!(!h.sync.is_generating());
        assert_eq!(h.sync.debug_snapshot().session_id.as_deref(), Some("chat-b"));
    }

    #[test]
    fn session_change_restores_outstanding_patch() {
        let mut h = Harness::native(one_exchange());
        h.sync.start();
        h.paint();
        h.surface.set_shown_variant(rid(5), 1);
        h.source.update(|records| records[1].variant_index = Some(1));
        h.handle(EngineEvent::GenerationAboutToStart { dry_run: false });
        let _ = h.sync.state.store.set(key(5, 1), "mapped");
        let request = OutgoingRequest::new(h.source.snapshot().records().to_vec());
        h.sync.intercept(&request, h.now);
        assert!(h.sync.is_patched());

        h.handle(EngineEvent::SessionChanged);
        assert!(!h.sync.is_patched());
        assert_eq!(request.text_at(0).as_deref(), Some("hello"));
    }

    #[test]
    fn next_deadline_tracks_both_timers() {
        let mut h = Harness::new(EngineCapabilities::default(), one_exchange());
        assert_eq!(h.sync.next_deadline(), None);
        h.sync.start();
        h.paint();
        h.sync.surface_signal(SurfaceSignal::Mutation { record: rid(5) }, h.now);
        assert_eq!(h.sync.next_deadline(), Some(h.now + SWITCH_DEBOUNCE));

        h.advance(SWITCH_DEBOUNCE - Duration::from_millis(1));
        assert!(h.sync.next_deadline().is_some());
        h.advance(Duration::from_millis(1));
        assert_eq!(h.sync.next_deadline(), None);
    }

    #[test]
    fn debug_snapshot_serializes() {
        let mut h = Harness::native(one_exchange());
        h.sync.start();
        h.paint();
        let json = serde_json::to_value(h.sync.debug_snapshot()).unwrap();
        assert_eq!(json["activeKey"], "5:0");
        assert_eq!(json["storeKeys"], serde_json::json!(["5:0"]));
        assert_eq!(json["detector"], "native");
        assert_eq!(json["sessionId"], "chat-a");
    }
}
