//! Variant-switch detection.
//!
//! Engines that emit a native variant-switch notification get the
//! [`NativeSwitchDetector`]; all other engines get the
//! [`ObservedSwitchDetector`], which watches the newest output element and
//! switch-control clicks and asks for a debounced reconciliation instead.
//! [`select_detector`] is the only place that chooses between them, and only
//! one of the two paths is ever live.

use serde::Serialize;
use swipelink_core::RecordId;

use crate::events::SurfaceSignal;
use crate::host::EngineCapabilities;

/// Which detection path is live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Native notification from the engine.
    Native,
    /// Observation of the rendering surface.
    Observed,
}

/// What the synchronizer should do about a switch signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchTrigger {
    /// Reconcile after the next paint for the given exchange (or the newest).
    AfterPaint(Option<RecordId>),
    /// Restart the debounce window.
    Debounce,
    /// Wait for the next paint, then restart the debounce window.
    DebounceAfterPaint,
}

/// Turns raw switch signals into reconciliation triggers.
pub trait VariantSwitchDetector: Send {
    /// Which path this detector implements.
    fn kind(&self) -> DetectorKind;

    /// Start watching the element of `target` (the newest output record).
    fn attach(&mut self, target: Option<RecordId>);

    /// Stop watching.
    fn detach(&mut self);

    /// Element currently watched.
    fn observed(&self) -> Option<RecordId>;

    /// Interpret a native variant-switch notification.
    fn on_native(&self, record: Option<RecordId>) -> Option<SwitchTrigger>;

    /// Interpret a rendering-surface signal.
    fn on_surface(&self, signal: SurfaceSignal) -> Option<SwitchTrigger>;
}

/// Detector for engines with a native variant-switch notification.
#[derive(Debug, Default)]
pub struct NativeSwitchDetector;

impl VariantSwitchDetector for NativeSwitchDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Native
    }

    fn attach(&mut self, _target: Option<RecordId>) {}

    fn detach(&mut self) {}

    fn observed(&self) -> Option<RecordId> {
        None
    }

    fn on_native(&self, record: Option<RecordId>) -> Option<SwitchTrigger> {
        Some(SwitchTrigger::AfterPaint(record))
    }

    fn on_surface(&self, _signal: SurfaceSignal) -> Option<SwitchTrigger> {
        None
    }
}

/// Fallback detector that observes the rendering surface.
#[derive(Debug, Default)]
pub struct ObservedSwitchDetector {
    target: Option<RecordId>,
}

impl VariantSwitchDetector for ObservedSwitchDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Observed
    }

    fn attach(&mut self, target: Option<RecordId>) {
        self.target = target;
    }

    fn detach(&mut self) {
        self.target = None;
    }

    fn observed(&self) -> Option<RecordId> {
        self.target
    }

    fn on_native(&self, _record: Option<RecordId>) -> Option<SwitchTrigger> {
        None
    }

    fn on_surface(&self, signal: SurfaceSignal) -> Option<SwitchTrigger> {
        match signal {
            SurfaceSignal::Mutation { record } if Some(record) == self.target => {
                Some(SwitchTrigger::Debounce)
            }
            SurfaceSignal::Mutation { .. } => None,
            SurfaceSignal::SwitchControlClicked => Some(SwitchTrigger::DebounceAfterPaint),
        }
    }
}

/// Pick the detector for an engine.
pub fn select_detector(capabilities: &EngineCapabilities) -> Box<dyn VariantSwitchDetector> {
    if capabilities.variant_switched {
        Box::new(NativeSwitchDetector)
    } else {
        Box::new(ObservedSwitchDetector::default())
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

    #[test]
    fn native_capability_selects_native_detector() {
        let caps = EngineCapabilities {
            variant_switched: true,
        };
        assert_eq!(select_detector(&caps).kind(), DetectorKind::Native);
        assert_eq!(
            select_detector(&EngineCapabilities::default()).kind(),
            DetectorKind::Observed
        );
    }

    #[test]
    fn native_detector_ignores_surface_signals() {
        let detector = NativeSwitchDetector;
        assert_eq!(detector.on_surface(SurfaceSignal::SwitchControlClicked), None);
        assert_eq!(
            detector.on_native(Some(rid(3))),
            Some(SwitchTrigger::AfterPaint(Some(rid(3))))
        );
    }

    #[test]
    fn observed_detector_debounces_its_target_only() {
        let mut detector = ObservedSwitchDetector::default();
        assert_eq!(detector.on_surface(SurfaceSignal::Mutation { record: rid(3) }), None);

        detector.attach(Some(rid(3)));
        assert_eq!(
            detector.on_surface(SurfaceSignal::Mutation { record: rid(3) }),
            Some(SwitchTrigger::Debounce)
        );
        assert_eq!(detector.on_surface(SurfaceSignal::Mutation { record: rid(1) }), None);

        detector.detach();
        assert_eq!(detector.observed(), None);
        assert_eq!(detector.on_surface(SurfaceSignal::Mutation { record: rid(3) }), None);
    }

    #[test]
    fn observed_detector_defers_clicks_and_ignores_native() {
        let detector = ObservedSwitchDetector::default();
        assert_eq!(
            detector.on_surface(SurfaceSignal::SwitchControlClicked),
            Some(SwitchTrigger::DebounceAfterPaint)
        );
        assert_eq!(detector.on_native(None), None);
    }
}
