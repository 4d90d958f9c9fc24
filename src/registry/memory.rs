//! In-memory version oracle
//!
//! Serves fixed release lists, optionally loaded from a JSON file of the
//! form `{"django": ["1.4.1", "1.4.2"], ...}`.

use crate::domain::PackageVersions;
use crate::error::RegistryError;
use crate::registry::VersionOracle;
use async_trait::async_trait;
use std::collections::HashMap;

/// Oracle answering from a fixed table
#[derive(Debug, Default, Clone)]
pub struct InMemoryOracle {
    releases: HashMap<String, Vec<String>>,
    hashes: HashMap<(String, String), Vec<String>>,
}

impl InMemoryOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the releases of a package
    pub fn with_package<I, S>(mut self, name: &str, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.releases.insert(
            name.to_lowercase(),
            versions.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Register the digests of one release
    pub fn with_hashes<I, S>(mut self, name: &str, version: &str, hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hashes.insert(
            (name.to_lowercase(), version.to_string()),
            hashes.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Build from a JSON object mapping package names to version lists
    pub fn from_json(content: &str) -> Result<Self, RegistryError> {
        let table: HashMap<String, Vec<String>> = serde_json::from_str(content)
            .map_err(|e| RegistryError::invalid_response("", "fixture", e.to_string()))?;
        Ok(table
            .into_iter()
            .fold(Self::new(), |oracle, (name, versions)| {
                oracle.with_package(&name, versions)
            }))
    }
}

#[async_trait]
impl VersionOracle for InMemoryOracle {
    fn registry_name(&self) -> &'static str {
        "in-memory"
    }

    async fn fetch(
        &self,
        package: &str,
        _index_url: Option<String>,
    ) -> Result<Option<PackageVersions>, RegistryError> {
        Ok(self
            .releases
            .get(&package.to_lowercase())
            .map(|versions| PackageVersions::new(package, versions)))
    }

    async fn fetch_hashes(&self, package: &str, version: &str) -> Result<Vec<String>, RegistryError> {
        Ok(self
            .hashes
            .get(&(package.to_lowercase(), version.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let oracle = InMemoryOracle::new().with_package("Django", ["1.4.1", "1.4.2"]);
        let versions = oracle.fetch("django", None).await.unwrap().unwrap();
        assert_eq!(versions.latest(false).unwrap().as_str(), "1.4.2");
        assert!(oracle.fetch("flask", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hashes() {
        let oracle = InMemoryOracle::new().with_hashes("six", "1.11.0", ["sha256:abc"]);
        assert_eq!(
            oracle.fetch_hashes("six", "1.11.0").await.unwrap(),
            vec!["sha256:abc"]
        );
        assert!(oracle.fetch_hashes("six", "1.10.0").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_from_json() {
        let oracle = InMemoryOracle::from_json(r#"{"requests": ["2.19.0", "2.20.0"]}"#).unwrap();
        let versions = oracle.fetch("requests", None).await.unwrap().unwrap();
        assert_eq!(versions.versions().len(), 2);
        assert!(InMemoryOracle::from_json("[").is_err());
    }
}
