//! ---
//! addon_section: "02-versioning"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on version ordering and release selection helpers."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Add-on version strings carry a partner version followed by a package
//! revision (`1.4.2-3`, `2.0.0-rc.1-1`). This crate decomposes and orders them
//! and selects the latest release out of a set of catalogue tags.

pub mod addon_version;
pub mod latest;

pub use addon_version::{
    compare, greater_than, greater_than_or_equal, less, sort_versions, AddOnVersion,
    PackageVersion, VersionError,
};
pub use latest::{is_upgrade, latest_version};
