//! tox.ini parser
//!
//! Every section's `deps` option is read, one requirement per value line.

use crate::domain::{is_ignored_file, is_ignored_line, FileType, Requirement};
use crate::error::ManifestError;
use crate::parser::{IniDocument, ManifestParser, ParsedManifest};
use log::debug;

/// Parser for tox.ini files
pub struct ToxIniParser;

impl ManifestParser for ToxIniParser {
    fn parse(&self, content: &str, path: &str) -> Result<ParsedManifest, ManifestError> {
        let mut parsed = ParsedManifest::new();
        if is_ignored_file(content) {
            return Ok(parsed);
        }

        let document = IniDocument::parse(content);
        for section in &document.sections {
            let Some(deps) = section.option("deps") else {
                continue;
            };
            for line in &deps.lines {
                if is_ignored_line(&line.text) {
                    continue;
                }
                match Requirement::parse(&line.text, line.number, FileType::ToxIni) {
                    Ok(requirement) => parsed
                        .requirements
                        .push(requirement.with_section(section.name.clone())),
                    Err(e) => debug!("skipping line {} of {}: {}", line.number, path, e),
                }
            }
        }

        Ok(parsed)
    }

    fn file_type(&self) -> FileType {
        FileType::ToxIni
    }
}
