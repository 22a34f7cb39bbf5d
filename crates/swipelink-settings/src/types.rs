//! Settings type definitions.
//!
//! Field names are camelCase in JSON. Missing fields take their default, so an
//! empty settings file is valid.

use serde::{Deserialize, Serialize};

/// Root settings type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwipeLinkSettings {
    /// Emit diagnostic logging for aborted steps.
    pub debug: bool,
}

impl SwipeLinkSettings {
    /// Tracing filter level selected by the debug toggle.
    pub fn log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "warn" }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
