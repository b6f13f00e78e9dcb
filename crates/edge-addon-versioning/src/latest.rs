//! ---
//! addon_section: "02-versioning"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on version ordering and release selection helpers."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use tracing::debug;

use crate::addon_version::{greater_than, sort_versions};

/// Pick the newest tag out of `tags`.
///
/// Tags that cannot be decomposed keep their position relative to each other,
/// so a list made only of such tags yields its last entry.
#[must_use]
pub fn latest_version<S: AsRef<str>>(tags: &[S]) -> Option<&str> {
    let mut ordered: Vec<&str> = tags.iter().map(AsRef::as_ref).collect();
    sort_versions(&mut ordered);
    let latest = ordered.pop();
    debug!(candidates = tags.len(), latest = ?latest, "selected latest add-on version");
    latest
}

/// Whether `candidate` is a strict upgrade over `installed`.
///
/// Lifecycle routines do not enforce this themselves; callers that must
/// refuse downgrades gate on it before replacing an add-on.
#[must_use]
pub fn is_upgrade(installed: &str, candidate: &str) -> bool {
    greater_than(candidate, installed)
}
