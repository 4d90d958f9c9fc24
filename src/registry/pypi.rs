//! PyPI JSON API oracle
//!
//! Endpoints:
//! - `https://pypi.org/pypi/{package}/json` for the release list
//! - `https://pypi.org/pypi/{package}/{version}/json` for file digests
//! - `{index_url}{package}` on private indexes, answering `{"result": {version: ...}}`

use crate::domain::PackageVersions;
use crate::error::RegistryError;
use crate::registry::{HttpClient, VersionOracle};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// PyPI API base URL
const PYPI_API_URL: &str = "https://pypi.org/pypi";

/// PyPI oracle
pub struct PyPIOracle {
    client: HttpClient,
    base_url: String,
}

/// PyPI package metadata response
#[derive(Debug, Deserialize)]
struct PyPIResponse {
    /// Release files keyed by version
    #[serde(default)]
    releases: HashMap<String, Value>,
}

/// Private index response
#[derive(Debug, Deserialize)]
struct IndexResponse {
    result: HashMap<String, Value>,
}

/// Release metadata for one version
#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    #[serde(default)]
    urls: Vec<ReleaseFile>,
}

#[derive(Debug, Deserialize)]
struct ReleaseFile {
    #[serde(default)]
    digests: HashMap<String, String>,
}

impl PyPIOracle {
    /// Create a new PyPI oracle
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: PYPI_API_URL.to_string(),
        }
    }

    /// Use another PyPI-compatible JSON API
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the release-list URL for a package
    fn build_url(&self, package: &str) -> String {
        format!("{}/{}/json", self.base_url, package)
    }

    /// Build the per-version URL for a package
    fn build_release_url(&self, package: &str, version: &str) -> String {
        format!("{}/{}/{}/json", self.base_url, package, version)
    }
}

#[async_trait]
impl VersionOracle for PyPIOracle {
    fn registry_name(&self) -> &'static str {
        "PyPI"
    }

    async fn fetch(
        &self,
        package: &str,
        index_url: Option<String>,
    ) -> Result<Option<PackageVersions>, RegistryError> {
        let versions: Vec<String> = match index_url {
            Some(index) => {
                let url = format!("{}{}", index, package);
                debug!("fetching {} from private index {}", package, index);
                let Some(response) = self
                    .client
                    .get_json::<IndexResponse>(&url, package, &index)
                    .await?
                else {
                    return Ok(None);
                };
                response.result.into_keys().collect()
            }
            None => {
                let url = self.build_url(package);
                let Some(response) = self
                    .client
                    .get_json::<PyPIResponse>(&url, package, self.registry_name())
                    .await?
                else {
                    return Ok(None);
                };
                response.releases.into_keys().collect()
            }
        };

        Ok(Some(PackageVersions::new(package, versions)))
    }

    async fn fetch_hashes(&self, package: &str, version: &str) -> Result<Vec<String>, RegistryError> {
        let url = self.build_release_url(package, version);
        let Some(response) = self
            .client
            .get_json::<ReleaseResponse>(&url, package, self.registry_name())
            .await?
        else {
            return Ok(Vec::new());
        };

        Ok(response
            .urls
            .into_iter()
            .filter_map(|file| file.digests.get("sha256").cloned())
            .map(|digest| format!("sha256:{}", digest))
            .collect())
    }
}
