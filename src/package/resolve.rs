//! Package identifiers and version selection

use super::manifest::{Manifest, PackageEntry, VersionEntry, DEFAULT_VERSION};
use crate::error::{PimError, PimResult};
use std::fmt;

/// A package addressed as `name` or `name:version`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageId {
    pub name: String,
    pub version: String,
}

impl PackageId {
    /// Split on the first `:`; a missing tag means `latest`
    pub fn parse(identifier: &str) -> Self {
        match identifier.split_once(':') {
            Some((name, version)) => PackageId {
                name: name.to_string(),
                version: version.to_string(),
            },
            None => PackageId {
                name: identifier.to_string(),
                version: DEFAULT_VERSION.to_string(),
            },
        }
    }

    pub fn is_latest(&self) -> bool {
        self.version == DEFAULT_VERSION
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_latest() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.name, self.version)
        }
    }
}

/// Package and version selected from a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'m> {
    pub package: &'m PackageEntry,
    pub version: &'m VersionEntry,
}

/// Locate the entry for `id`.
///
/// Packages and then versions are scanned in declaration order and the first
/// package with a matching name and version wins. A missing package and a
/// missing version produce the same error.
pub fn resolve<'m>(manifest: &'m Manifest, id: &PackageId) -> PimResult<Resolved<'m>> {
    manifest
        .packages
        .iter()
        .filter(|package| package.name == id.name)
        .find_map(|package| {
            package
                .versions
                .iter()
                .find(|version| version.version == id.version)
                .map(|version| Resolved { package, version })
        })
        .ok_or_else(|| PimError::PackageNotFound {
            name: id.name.clone(),
            version: id.version.clone(),
        })
}

/// Parse `identifier` and resolve it against `manifest`
pub fn resolve_identifier<'m>(manifest: &'m Manifest, identifier: &str) -> PimResult<Resolved<'m>> {
    resolve(manifest, &PackageId::parse(identifier))
}
