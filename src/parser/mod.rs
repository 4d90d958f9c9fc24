//! Manifest parsers for the supported dependency file formats
//!
//! This module provides parsers for:
//! - Plain requirements lists (requirements.txt, *.pip, lockfiles)
//! - tox configuration (tox.ini)
//! - setuptools declarative config (setup.cfg)
//! - conda environment files (environment.yml)
//! - pipenv manifests (Pipfile, Pipfile.lock)
//!
//! Malformed declaration lines are dropped, never fatal to the file.

mod conda_yml;
mod ini;
mod pipfile;
mod pipfile_lock;
mod requirements_txt;
mod setup_cfg;
mod tox_ini;

pub use conda_yml::CondaYmlParser;
pub use ini::{IniDocument, IniOption};
pub use pipfile::{locate_entry, PipfileParser, PIPFILE_SECTIONS};
pub use pipfile_lock::{PipfileLockParser, LOCK_SECTIONS};
pub use requirements_txt::RequirementsTxtParser;
pub use setup_cfg::SetupCfgParser;
pub use tox_ini::ToxIniParser;

use crate::domain::{FileType, Requirement};
use crate::error::ManifestError;

/// Requirements and referenced files extracted from one manifest
#[derive(Debug, Clone, Default)]
pub struct ParsedManifest {
    /// Requirements in declaration order
    pub requirements: Vec<Requirement>,
    /// Paths of other manifests referenced with `-r`
    pub other_files: Vec<String>,
}

impl ParsedManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty() && self.other_files.is_empty()
    }
}

/// Trait for parsing manifest files
pub trait ManifestParser {
    /// Parse requirements from manifest content.
    ///
    /// Errors only when the file's outer grammar is broken (YAML, TOML, JSON).
    fn parse(&self, content: &str, path: &str) -> Result<ParsedManifest, ManifestError>;

    /// Returns the file type this parser handles
    fn file_type(&self) -> FileType;
}

/// Get a manifest parser for the specified file type
pub fn get_parser(file_type: FileType) -> Box<dyn ManifestParser> {
    match file_type {
        FileType::RequirementsTxt | FileType::RequirementsLock => {
            Box::new(RequirementsTxtParser::new(file_type))
        }
        FileType::ToxIni => Box::new(ToxIniParser),
        FileType::SetupCfg => Box::new(SetupCfgParser),
        FileType::CondaYml => Box::new(CondaYmlParser),
        FileType::Pipfile => Box::new(PipfileParser),
        FileType::PipfileLock => Box::new(PipfileLockParser),
    }
}

/// One declaration with its continuation lines folded in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// 1-based number of the first physical line
    pub number: usize,
    /// Verbatim text without the final line terminator
    pub text: String,
}

/// Split content into logical lines.
///
/// A physical line ending in a backslash continues onto the next one unless
/// it is a comment. The joined text keeps the original inner terminators so
/// it can be found verbatim in the content later.
pub fn logical_lines(content: &str) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    for (index, piece) in content.split_inclusive('\n').enumerate() {
        if current.is_empty() {
            start = index + 1;
        }
        let body = piece.trim_end_matches(['\n', '\r']);
        // a comment never continues, even when it ends in a backslash
        let comment = current.is_empty() && body.trim_start().starts_with('#');
        if !comment && body.trim_end().ends_with('\\') {
            current.push_str(piece);
            continue;
        }
        current.push_str(body);
        lines.push(LogicalLine {
            number: start,
            text: std::mem::take(&mut current),
        });
    }

    if !current.is_empty() {
        let text = current.trim_end_matches(['\n', '\r']).to_string();
        lines.push(LogicalLine {
            number: start,
            text,
        });
    }

    lines
}

/// Resolve a `-r other.txt` reference relative to the referencing file
pub fn resolve_reference(file_path: &str, reference: &str) -> String {
    let reference = reference.split(" #").next().unwrap_or(reference).trim();
    match file_path.rsplit_once('/') {
        Some((dir, _)) => format!("{}/{}", dir, reference),
        None => reference.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_parser_file_types() {
        for file_type in [
            FileType::RequirementsTxt,
            FileType::RequirementsLock,
            FileType::ToxIni,
            FileType::SetupCfg,
            FileType::CondaYml,
            FileType::Pipfile,
            FileType::PipfileLock,
        ] {
            assert_eq!(get_parser(file_type).file_type(), file_type);
        }
    }

    #[test]
    fn test_logical_lines_simple() {
        let lines = logical_lines("a==1\nb==2\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].number, 1);
        assert_eq!(lines[0].text, "a==1");
        assert_eq!(lines[1].number, 2);
    }

    #[test]
    fn test_logical_lines_continuation_keeps_crlf() {
        let content = "a==1 \\\r\n    --hash=sha256:x\r\nb==2\r\n";
        let lines = logical_lines(content);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "a==1 \\\r\n    --hash=sha256:x");
        assert!(content.contains(&lines[0].text));
        assert_eq!(lines[1].number, 3);
        assert_eq!(lines[1].text, "b==2");
    }

    #[test]
    fn test_logical_lines_without_trailing_newline() {
        let lines = logical_lines("a==1\nb==2");
        assert_eq!(lines[1].text, "b==2");
    }

    #[test]
    fn test_logical_lines_dangling_continuation() {
        let lines = logical_lines("a==1 \\\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "a==1 \\");
    }

    #[test]
    fn test_logical_lines_comment_does_not_continue() {
        let lines = logical_lines("# pinned for py2 \\\nDjango==1.0\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "# pinned for py2 \\");
        assert_eq!(lines[1].number, 2);
        assert_eq!(lines[1].text, "Django==1.0");
    }

    #[test]
    fn test_comment_ending_in_backslash_keeps_next_requirement() {
        let parsed = get_parser(FileType::RequirementsTxt)
            .parse("# note \\\nDjango==1.0\n", "requirements.txt")
            .unwrap();
        assert_eq!(parsed.requirements.len(), 1);
        assert_eq!(parsed.requirements[0].key, "django");
    }

    #[test]
    fn test_resolve_reference() {
        assert_eq!(resolve_reference("requirements.txt", "base.txt"), "base.txt");
        assert_eq!(
            resolve_reference("requirements/dev.txt", "base.txt # shared"),
            "requirements/base.txt"
        );
        assert_eq!(
            resolve_reference("requirements/dev.txt", "../common.txt"),
            "requirements/../common.txt"
        );
    }
}
