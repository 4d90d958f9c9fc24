//! Manifest files and their discovery
//!
//! This module provides:
//! - `Manifest`: one fetched dependency file with its parsed requirements
//! - `ManifestSet`: the ordered collection of manifests of one run
//! - Discovery of manifests in a repository tree, following `-r` references

mod detector;

pub use detector::{discover, normalize_path, ManifestDetector};

use crate::domain::{FileType, Requirement};
use crate::error::ManifestError;
use crate::parser::get_parser;

/// One dependency-declaration file
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Repository-relative path without a leading slash
    pub path: String,
    pub content: String,
    /// Provider blob handle the content was read at
    pub revision: Option<String>,
    pub file_type: FileType,
    /// Requirements in declaration order
    pub requirements: Vec<Requirement>,
    /// Other manifests referenced from this one
    pub other_files: Vec<String>,
    /// False for ignored files and files declaring nothing
    pub is_valid: bool,
}

impl Manifest {
    /// Parse fetched content; the file type is derived from the path
    pub fn parse(
        path: impl Into<String>,
        content: impl Into<String>,
        revision: Option<String>,
    ) -> Result<Self, ManifestError> {
        let path = normalize_path(&path.into());
        let content = content.into();
        let file_type = FileType::from_path(&path);
        let parsed = get_parser(file_type).parse(&content, &path)?;
        let is_valid = !parsed.is_empty();
        let other_files = parsed
            .other_files
            .iter()
            .map(|other| normalize_path(other))
            .collect();

        Ok(Self {
            path,
            content,
            revision,
            file_type,
            requirements: parsed.requirements,
            other_files,
            is_valid,
        })
    }
}

/// Manifests of one run in discovery order
#[derive(Debug, Clone, Default)]
pub struct ManifestSet {
    manifests: Vec<Manifest>,
}

impl ManifestSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, manifest: Manifest) {
        self.manifests.push(manifest);
    }

    /// A manifest with this path was already added
    pub fn has_file_in_path(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.manifests.iter().any(|m| m.path == path)
    }

    pub fn get(&self, path: &str) -> Option<&Manifest> {
        let path = normalize_path(path);
        self.manifests.iter().find(|m| m.path == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Manifest> {
        self.manifests.iter()
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Every requirement with its manifest, in discovery order
    pub fn requirements(&self) -> impl Iterator<Item = (&Manifest, &Requirement)> {
        self.manifests
            .iter()
            .flat_map(|m| m.requirements.iter().map(move |r| (m, r)))
    }
}

impl FromIterator<Manifest> for ManifestSet {
    fn from_iter<I: IntoIterator<Item = Manifest>>(iter: I) -> Self {
        Self {
            manifests: iter.into_iter().collect(),
        }
    }
}
