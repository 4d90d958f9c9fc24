//! Manifest discovery
//!
//! Features:
//! - Filename patterns matched against the full path or the file name
//! - Explicitly configured paths are always fetched
//! - `-r` references are followed; a path is fetched at most once

use crate::config::Config;
use crate::manifest::{Manifest, ManifestSet};
use crate::provider::Provider;
use globset::{Glob, GlobSet, GlobSetBuilder};
use log::{debug, info, warn};
use std::collections::HashSet;

/// Matches repository paths against discovery patterns
pub struct ManifestDetector {
    patterns: GlobSet,
}

impl ManifestDetector {
    /// Build from glob patterns; invalid patterns are skipped
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            match Glob::new(pattern.as_ref()) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!("ignoring search pattern '{}': {}", pattern.as_ref(), e),
            }
        }
        let patterns = builder.build().unwrap_or_else(|e| {
            warn!("unable to build search patterns: {}", e);
            GlobSet::empty()
        });
        Self { patterns }
    }

    /// True when `path` or its file name matches a pattern
    pub fn matches(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let file_name = path.rsplit('/').next().unwrap_or(&path);
        self.patterns.is_match(&path) || self.patterns.is_match(file_name)
    }
}

/// Normalise a repository path: no leading `/` or `./`, `.` and `..` folded
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Fetch `path` and every manifest it references, depth first
async fn add_manifest(
    provider: &dyn Provider,
    branch: &str,
    path: &str,
    manifests: &mut ManifestSet,
    seen: &mut HashSet<String>,
) {
    let mut pending = vec![normalize_path(path)];
    while let Some(path) = pending.pop() {
        if path.is_empty() || manifests.has_file_in_path(&path) || !seen.insert(path.clone()) {
            continue;
        }
        info!("adding requirement file at {}", path);

        let file = match provider.get_file(&path, branch).await {
            Ok(file) => file,
            Err(e) => {
                warn!("unable to fetch {}: {}", path, e);
                continue;
            }
        };
        let (Some(content), Some(revision)) = (file.content, file.revision) else {
            debug!("{} does not exist on {}", path, branch);
            continue;
        };

        match Manifest::parse(path.as_str(), content, Some(revision)) {
            Ok(manifest) => {
                pending.extend(manifest.other_files.iter().rev().cloned());
                manifests.push(manifest);
            }
            Err(e) => warn!("skipping {}: {}", path, e),
        }
    }
}

/// Discover every manifest of the repository at `branch`
pub async fn discover(provider: &dyn Provider, config: &Config, branch: &str) -> ManifestSet {
    let mut manifests = ManifestSet::new();
    let mut seen = HashSet::new();

    if config.search {
        info!("searching requirement files");
        let detector = ManifestDetector::new(config.search_patterns.as_slice());
        match provider.iter_tree(branch).await {
            Ok(tree) => {
                for entry in tree.iter().filter(|e| e.is_blob()) {
                    if detector.matches(&entry.path) {
                        add_manifest(provider, branch, &entry.path, &mut manifests, &mut seen)
                            .await;
                    }
                }
            }
            Err(e) => warn!("unable to list the tree of {}: {}", branch, e),
        }
    }

    for requirement in &config.requirements {
        add_manifest(provider, branch, &requirement.path, &mut manifests, &mut seen).await;
    }

    manifests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RequirementConfig, DEFAULT_SEARCH_PATTERNS};
    use crate::provider::InMemoryProvider;

    #[test]
    fn test_default_patterns() {
        let detector = ManifestDetector::new(&DEFAULT_SEARCH_PATTERNS);
        assert!(detector.matches("requirements.txt"));
        assert!(detector.matches("requirements-dev.txt"));
        assert!(detector.matches("backend/requirements_test.txt"));
        assert!(detector.matches("requirements/base.txt"));
        assert!(detector.matches("app/requirements/prod.txt"));
        assert!(detector.matches("deps/base.pip"));
        assert!(detector.matches("lib/setup.cfg"));
        assert!(!detector.matches("README.md"));
        assert!(!detector.matches("docs/conf.txt"));
        assert!(!detector.matches("tox.ini"));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let detector = ManifestDetector::new(&["[", "*.pip"]);
        assert!(detector.matches("base.pip"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/requirements.txt"), "requirements.txt");
        assert_eq!(normalize_path("./requirements/base.txt"), "requirements/base.txt");
        assert_eq!(normalize_path("requirements/../common.txt"), "common.txt");
        assert_eq!(normalize_path("a//b/./c.txt"), "a/b/c.txt");
    }

    #[tokio::test]
    async fn test_discover_follows_references() {
        let provider = InMemoryProvider::new("acme/app", "main")
            .with_file("requirements.txt", "-r requirements/dev.txt\ndjango==1.0\n")
            .with_file("requirements/dev.txt", "-r ../requirements.txt\n-r base.txt\npytest\n")
            .with_file("requirements/base.txt", "six\n")
            .with_file("README.md", "hello\n");

        let set = discover(&provider, &Config::default(), "main").await;
        let paths: Vec<&str> = set.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["requirements.txt", "requirements/dev.txt", "requirements/base.txt"]
        );
    }

    #[tokio::test]
    async fn test_discover_configured_paths_without_search() {
        let provider = InMemoryProvider::new("acme/app", "main")
            .with_file("requirements.txt", "django==1.0\n")
            .with_file("Pipfile", "[packages]\nflask = \"*\"\n");
        let config = Config {
            search: false,
            requirements: vec![
                RequirementConfig::new("/Pipfile"),
                RequirementConfig::new("missing.txt"),
            ],
            ..Config::default()
        };

        let set = discover(&provider, &config, "main").await;
        assert_eq!(set.len(), 1);
        assert!(set.has_file_in_path("Pipfile"));
    }

    #[tokio::test]
    async fn test_discover_skips_broken_files() {
        let provider = InMemoryProvider::new("acme/app", "main")
            .with_file("environment.yml", "dependencies: [\n")
            .with_file("requirements.txt", "django==1.0\n");
        let config = Config {
            requirements: vec![RequirementConfig::new("environment.yml")],
            ..Config::default()
        };

        let set = discover(&provider, &config, "main").await;
        assert_eq!(set.len(), 1);
        assert!(set.has_file_in_path("requirements.txt"));
    }
}
