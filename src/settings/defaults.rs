//! Process-wide default settings.
//!
//! Configure these once at startup, before sessions are created. Sessions that were never
//! configured read the current defaults on every call.

use std::sync::{LazyLock, RwLock};

use super::{QuerySettings, SettingsOverrides, normalize};
use crate::error::SqlStencilError;

static DEFAULTS: LazyLock<RwLock<QuerySettings>> =
    LazyLock::new(|| RwLock::new(QuerySettings::default()));

/// Snapshot of the current process-wide defaults.
#[must_use]
pub fn defaults() -> QuerySettings {
    match DEFAULTS.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Apply `overrides` to the process-wide defaults and return the new defaults.
///
/// # Errors
/// Returns `ConfigError` when an override has the wrong shape; the defaults are unchanged.
pub fn configure_defaults(
    overrides: &SettingsOverrides,
) -> Result<QuerySettings, SqlStencilError> {
    let mut guard = match DEFAULTS.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let updated = normalize(overrides, &guard)?;
    *guard = updated.clone();
    Ok(updated)
}

/// Restore the built-in defaults.
pub fn reset_defaults() {
    let mut guard = match DEFAULTS.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = QuerySettings::default();
}
