//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on lifecycle transactions and orchestration."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Precondition gates shared by the lifecycle routines.
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{LifecycleError, Result};
use crate::manifest::Manifest;
use crate::ports::HostFacts;

/// Host feature gated by the capability check.
pub const SSH_ROOT_ACCESS_FEATURE: &str = "ssh-root-access";

/// `codesys` as a whole ASCII word, in any letter case.
static PROTECTED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9A-Za-z_])(?i-u:codesys)(?:[^0-9A-Za-z_]|$)").unwrap()
});

/// The host platform must be listed by the manifest, and a required
/// `ssh-root-access` feature must be enabled on the host.
pub async fn validate_capabilities(
    platform: &str,
    manifest: &Manifest,
    host: &dyn HostFacts,
) -> Result<()> {
    if !manifest.platform.iter().any(|candidate| candidate == platform) {
        return Err(LifecycleError::PlatformUnsupported {
            platform: platform.to_owned(),
            supported: manifest.platform.join(", "),
        });
    }
    for feature in &manifest.features {
        if feature.name != SSH_ROOT_ACCESS_FEATURE || !feature.is_required() {
            continue;
        }
        if !host.is_ssh_root_access_enabled().await? {
            return Err(LifecycleError::FeatureUnavailable(feature.name.clone()));
        }
    }
    debug!(add_on = %manifest.name, platform, "capabilities satisfied");
    Ok(())
}

pub fn check_disk_space(available: u64, required: u64) -> Result<()> {
    if available < required {
        return Err(LifecycleError::InsufficientDiskSpace {
            available,
            required,
        });
    }
    Ok(())
}

/// Exact match of the manifest schema version.
pub fn check_manifest_version(manifest: &Manifest, supported: &str) -> Result<()> {
    if manifest.manifest_version != supported {
        return Err(LifecycleError::ManifestVersionUnsupported {
            found: manifest.manifest_version.clone(),
            supported: supported.to_owned(),
        });
    }
    Ok(())
}

/// Whether `name` contains the word "codesys" in any letter case.
pub fn is_protected_add_on(name: &str) -> bool {
    PROTECTED_NAME.is_match(name)
}

pub fn ensure_not_protected(name: &str) -> Result<()> {
    if is_protected_add_on(name) {
        return Err(LifecycleError::ProtectedAddOn(name.to_owned()));
    }
    Ok(())
}
