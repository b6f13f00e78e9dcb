//! ---
//! addon_section: "02-versioning"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on version ordering and release selection helpers."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Decomposition and ordering of add-on version strings.
//!
//! An add-on version is `<partner-version><revision-suffix>` where the suffix
//! matches `-<digits>(-(alpha|beta|rc)\.<digits>)?` at the end of the string.
//! The partner version is everything before the suffix and the package
//! revision is the suffix without its leading `-`. Both halves are parsed as
//! lenient semantic versions and compared partner first.
//!
//! Note that `1.0.0-rc.4-1` decomposes into partner `1.0.0-rc.4` and package
//! `1`: the prerelease stays with the partner segment. Published add-on
//! versions depend on this, so it must not be normalised away.
use std::cmp::Ordering;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Prerelease;
use thiserror::Error;
use tracing::trace;

static REVISION_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-[0-9]+(?:-(?:alpha|beta|rc)\.[0-9]+)?$").unwrap());

/// Errors raised while decomposing or parsing an add-on version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The string does not end in a package revision suffix.
    #[error("version {0:?} has no package revision suffix")]
    MissingRevision(String),
    /// One of the two halves is not a valid version.
    #[error("invalid version {segment:?}: {reason}")]
    InvalidSegment {
        /// Offending text.
        segment: String,
        /// Human readable parse failure.
        reason: String,
    },
}

/// A lenient semantic version: any number of numeric segments plus an
/// optional prerelease. Build metadata is accepted and ignored.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    segments: Vec<u64>,
    pre: Prerelease,
}

impl PackageVersion {
    /// Numeric segments in declaration order.
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// Prerelease identifier, empty for a release version.
    pub fn prerelease(&self) -> &Prerelease {
        &self.pre
    }
}

impl FromStr for PackageVersion {
    type Err = VersionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| VersionError::InvalidSegment {
            segment: raw.to_owned(),
            reason: reason.to_owned(),
        };

        let body = raw.strip_prefix('v').unwrap_or(raw);
        let body = match body.split_once('+') {
            Some((core, build)) => {
                if build.is_empty() || build.split('.').any(|part| !is_identifier(part)) {
                    return Err(invalid("malformed build metadata"));
                }
                core
            }
            None => body,
        };
        let (numbers, pre) = match body.split_once('-') {
            Some((numbers, pre)) => (numbers, Some(pre)),
            None => (body, None),
        };
        if numbers.is_empty() {
            return Err(invalid("missing numeric version"));
        }

        let segments = numbers
            .split('.')
            .map(|segment| {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid("numeric segment expected"));
                }
                segment
                    .parse::<u64>()
                    .map_err(|err| invalid(&err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pre = match pre {
            Some("") => return Err(invalid("empty prerelease")),
            Some(pre) => Prerelease::new(pre).map_err(|err| invalid(&err.to_string()))?,
            None => Prerelease::EMPTY,
        };

        Ok(Self { segments, pre })
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for index in 0..len {
            let lhs = self.segments.get(index).copied().unwrap_or(0);
            let rhs = other.segments.get(index).copied().unwrap_or(0);
            match lhs.cmp(&rhs) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        // `semver` orders an empty prerelease above any non-empty one.
        self.pre.cmp(&other.pre)
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

/// A decomposed add-on version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AddOnVersion {
    partner: PackageVersion,
    package: PackageVersion,
}

impl AddOnVersion {
    /// Decompose and parse `raw`.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let (partner, package) =
            split_revision(raw).ok_or_else(|| VersionError::MissingRevision(raw.to_owned()))?;
        Ok(Self {
            partner: partner.parse()?,
            package: package.parse()?,
        })
    }

    /// Split `raw` into its partner and package text without parsing them.
    pub fn split(raw: &str) -> Option<(&str, &str)> {
        split_revision(raw)
    }

    /// Version published by the add-on vendor.
    pub fn partner(&self) -> &PackageVersion {
        &self.partner
    }

    /// Packaging revision on top of the partner version.
    pub fn package(&self) -> &PackageVersion {
        &self.package
    }
}

impl FromStr for AddOnVersion {
    type Err = VersionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

fn split_revision(raw: &str) -> Option<(&str, &str)> {
    // Leftmost match, so the tagged form wins over a bare trailing `-<digits>`.
    let start = REVISION_SUFFIX.find(raw)?.start();
    Some((&raw[..start], &raw[start + 1..]))
}

fn is_identifier(part: &str) -> bool {
    !part.is_empty()
        && part
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Compare two add-on versions; `None` when either cannot be decomposed or
/// parsed.
pub fn compare(a: &str, b: &str) -> Option<Ordering> {
    let lhs = parse_logged(a)?;
    let rhs = parse_logged(b)?;
    Some(lhs.cmp(&rhs))
}

fn parse_logged(raw: &str) -> Option<AddOnVersion> {
    match AddOnVersion::parse(raw) {
        Ok(version) => Some(version),
        Err(err) => {
            trace!(version = raw, error = %err, "version is not comparable");
            None
        }
    }
}

/// Strict ordering used for sorting. Incomparable inputs are never less than
/// each other, in either direction.
pub fn less(a: &str, b: &str) -> bool {
    compare(a, b) == Some(Ordering::Less)
}

/// True when `a` sorts strictly after `b`. Ties and incomparable inputs are
/// `false`.
pub fn greater_than(a: &str, b: &str) -> bool {
    // Ordering `[a, b]` moves `a` behind `b` only when `b < a`.
    less(b, a)
}

/// Identical strings are equal; otherwise as [`greater_than`].
pub fn greater_than_or_equal(a: &str, b: &str) -> bool {
    a == b || greater_than(a, b)
}

/// Stable in-place sort by [`less`].
///
/// Insertion sort keeps unparseable entries in their input order and never
/// relies on the comparison being total.
pub fn sort_versions<S: AsRef<str>>(versions: &mut [S]) {
    for index in 1..versions.len() {
        let mut cursor = index;
        while cursor > 0 && less(versions[cursor].as_ref(), versions[cursor - 1].as_ref()) {
            versions.swap(cursor, cursor - 1);
            cursor -= 1;
        }
    }
}
