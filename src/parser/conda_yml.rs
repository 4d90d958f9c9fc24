//! conda environment file parser
//!
//! Only the `pip` sub-list of `dependencies` is managed; conda's own
//! package specs use a different version grammar and are left alone.

use crate::domain::{is_ignored_file, is_ignored_line, Directive, FileType, Requirement};
use crate::error::ManifestError;
use crate::parser::{ManifestParser, ParsedManifest};
use log::debug;
use serde_yaml::Value;

/// Parser for conda environment files
pub struct CondaYmlParser;

/// 1-based number of the first line at or after `from` containing `needle`
fn locate(content: &str, needle: &str, from: usize) -> Option<usize> {
    content
        .lines()
        .enumerate()
        .skip(from)
        .find(|(_, line)| line.contains(needle))
        .map(|(index, _)| index + 1)
}

impl ManifestParser for CondaYmlParser {
    fn parse(&self, content: &str, path: &str) -> Result<ParsedManifest, ManifestError> {
        let mut parsed = ParsedManifest::new();
        if is_ignored_file(content) {
            return Ok(parsed);
        }

        let document: Value =
            serde_yaml::from_str(content).map_err(|e| ManifestError::YamlParseError {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        let Some(dependencies) = document.get("dependencies").and_then(Value::as_sequence) else {
            return Ok(parsed);
        };

        let mut cursor = 0;
        for entry in dependencies {
            let Some(pip) = entry.get("pip").and_then(Value::as_sequence) else {
                continue;
            };
            for item in pip {
                let Some(line) = item.as_str() else {
                    continue;
                };
                let number = locate(content, line, cursor).unwrap_or(0);
                if number > 0 {
                    cursor = number;
                }
                // the marker lives in a YAML comment, so check the physical line
                let physical = match number {
                    0 => line,
                    n => content.lines().nth(n - 1).unwrap_or(line),
                };
                if is_ignored_line(physical) {
                    continue;
                }
                match Requirement::parse(line, number, FileType::CondaYml) {
                    Ok(mut requirement) => {
                        if requirement.directive.is_none() {
                            requirement.directive = Directive::from_line(physical);
                        }
                        parsed.requirements.push(requirement.with_section("pip"))
                    }
                    Err(e) => debug!("skipping pip entry '{}' of {}: {}", line, path, e),
                }
            }
        }

        Ok(parsed)
    }

    fn file_type(&self) -> FileType {
        FileType::CondaYml
    }
}
