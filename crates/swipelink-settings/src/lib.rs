//! # swipelink-settings
//!
//! Configuration management with layered sources for swipelink.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SwipeLinkSettings::default()`]
//! 2. **User file**: `~/.swipelink/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SWIPELINK_*` overrides (highest priority)
//!
//! The only setting is the `debug` toggle, which selects the log level.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::SwipeLinkSettings;

use std::sync::OnceLock;

/// Global settings singleton.
static SETTINGS: OnceLock<SwipeLinkSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.swipelink/settings.json` with env
/// var overrides; falls back to compiled defaults if loading fails.
pub fn get_settings() -> &'static SwipeLinkSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            SwipeLinkSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
pub fn init_settings(settings: SwipeLinkSettings) -> std::result::Result<(), SwipeLinkSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
