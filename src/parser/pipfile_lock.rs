//! Pipfile.lock parser
//!
//! Reads the `default` and `develop` sections; every entry with a
//! `version` becomes a pinned requirement carrying its `hashes`.

use crate::domain::{FileType, Requirement, SpecifierSet};
use crate::error::ManifestError;
use crate::parser::{ManifestParser, ParsedManifest};
use log::debug;
use serde_json::Value;

/// Sections that hold locked dependencies
pub const LOCK_SECTIONS: [&str; 2] = ["default", "develop"];

/// Parser for Pipfile.lock files
pub struct PipfileLockParser;

/// 1-based number of the line holding the `"name": {` key inside `section`
fn locate_key(content: &str, section: &str, name: &str) -> usize {
    let section_key = format!("\"{}\":", section);
    let entry_key = format!("\"{}\":", name);
    let mut in_section = false;
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with(&section_key) {
            in_section = true;
            continue;
        }
        if in_section && trimmed.starts_with(&entry_key) {
            return index + 1;
        }
    }
    0
}

impl ManifestParser for PipfileLockParser {
    fn parse(&self, content: &str, path: &str) -> Result<ParsedManifest, ManifestError> {
        let mut parsed = ParsedManifest::new();

        let document: Value =
            serde_json::from_str(content).map_err(|e| ManifestError::JsonParseError {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        for section in LOCK_SECTIONS {
            let Some(entries) = document.get(section).and_then(Value::as_object) else {
                continue;
            };
            for (name, entry) in entries {
                let Some(version) = entry.get("version").and_then(Value::as_str) else {
                    debug!("skipping unversioned lock entry {} in {}", name, path);
                    continue;
                };
                let Some(specs) = SpecifierSet::parse(version) else {
                    continue;
                };
                let hashes = entry
                    .get("hashes")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let number = locate_key(content, section, name);
                let requirement = Requirement::from_parts(
                    name.clone(),
                    specs,
                    format!("{}{}", name, version),
                    number,
                    FileType::PipfileLock,
                )
                .with_hashes(hashes)
                .with_section(section);
                parsed.requirements.push(requirement);
            }
        }

        Ok(parsed)
    }

    fn file_type(&self) -> FileType {
        FileType::PipfileLock
    }
}
