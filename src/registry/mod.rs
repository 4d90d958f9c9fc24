//! Package index collaborators
//!
//! This module provides:
//! - HTTP client shared foundation with retry logic
//! - `VersionOracle`: released versions and file digests per package
//! - PyPI JSON API oracle (public and private indexes)
//! - In-memory oracle for tests and offline runs
//! - `AdvisorySource`: which pinned versions carry a known vulnerability

mod client;
mod memory;
mod pypi;

pub use client::{HttpClient, DEFAULT_USER_AGENT};
pub use memory::InMemoryOracle;
pub use pypi::PyPIOracle;

use crate::domain::{PackageVersions, Requirement};
use crate::error::RegistryError;
use async_trait::async_trait;
use std::collections::HashSet;

/// Source of released versions for a package
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VersionOracle: Send + Sync {
    /// Get the registry name
    fn registry_name(&self) -> &'static str;

    /// Released versions of `package`; `Ok(None)` when the index does not know it
    async fn fetch(
        &self,
        package: &str,
        index_url: Option<String>,
    ) -> Result<Option<PackageVersions>, RegistryError>;

    /// `sha256:<digest>` of every file released for `package` at `version`
    async fn fetch_hashes(&self, package: &str, version: &str)
        -> Result<Vec<String>, RegistryError>;
}

/// Source of security advisories
#[async_trait]
pub trait AdvisorySource: Send + Sync {
    /// True when the requirement's current version has a known advisory
    async fn is_insecure(&self, requirement: &Requirement, current: Option<&str>) -> bool;
}

/// Advisory source that knows of no advisories
pub struct NoAdvisories;

#[async_trait]
impl AdvisorySource for NoAdvisories {
    async fn is_insecure(&self, _requirement: &Requirement, _current: Option<&str>) -> bool {
        false
    }
}

/// Fixed advisory list of `key==version` entries
#[derive(Debug, Default)]
pub struct KnownAdvisories {
    vulnerable: HashSet<String>,
}

impl KnownAdvisories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` at `version` as vulnerable
    pub fn with(mut self, key: &str, version: &str) -> Self {
        self.vulnerable
            .insert(format!("{}=={}", key.to_lowercase(), version));
        self
    }
}

#[async_trait]
impl AdvisorySource for KnownAdvisories {
    async fn is_insecure(&self, requirement: &Requirement, current: Option<&str>) -> bool {
        current
            .map(|version| {
                self.vulnerable
                    .contains(&format!("{}=={}", requirement.key, version))
            })
            .unwrap_or(false)
    }
}
