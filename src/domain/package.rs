//! Released versions of one package
//!
//! The set is immutable once fetched and kept sorted newest-first.

use crate::domain::{SpecifierSet, Version};

/// All released versions of a package, newest first
#[derive(Debug, Clone)]
pub struct PackageVersions {
    name: String,
    versions: Vec<Version>,
}

impl PackageVersions {
    /// Build from raw version strings; strings that are not versions are dropped
    pub fn new(name: impl Into<String>, raw: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let mut versions: Vec<Version> = raw
            .into_iter()
            .filter_map(|v| Version::parse(v.as_ref()))
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        versions.dedup_by(|a, b| a.as_str() == b.as_str());
        Self {
            name: name.into(),
            versions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Versions newest first
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Newest version.
    ///
    /// Pre-releases are skipped unless allowed, but a package that has
    /// only ever published pre-releases still yields its newest one.
    pub fn latest(&self, allow_prerelease: bool) -> Option<&Version> {
        self.versions
            .iter()
            .find(|v| allow_prerelease || !v.is_prerelease())
            .or_else(|| self.versions.first())
    }

    /// Newest version satisfying every specifier of `specs`
    pub fn latest_within(&self, specs: &SpecifierSet, allow_prerelease: bool) -> Option<&Version> {
        let normalized = specs.normalized();
        self.versions
            .iter()
            .find(|v| normalized.contains(v, allow_prerelease))
    }
}
