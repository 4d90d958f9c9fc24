//! Plain requirements list parser
//!
//! Handles:
//! - One declaration per line, `#` comments
//! - `-r` / `--requirement` includes (recorded as other files)
//! - `-i` / `--index-url` / `--extra-index-url` private index context
//! - Continuation lines and `--hash` pins
//! - `reqbot: ignore` lines and `reqbot: ignore file` headers

use crate::domain::{is_ignored_file, is_ignored_line, FileType, Requirement};
use crate::error::ManifestError;
use crate::parser::{logical_lines, resolve_reference, ManifestParser, ParsedManifest};
use log::debug;

/// pip options that carry no requirement and are skipped
const SKIPPED_OPTIONS: [&str; 7] = [
    "-f",
    "--find-links",
    "--no-index",
    "--allow-external",
    "--allow-unverified",
    "-Z",
    "--always-unzip",
];

const INDEX_OPTIONS: [&str; 3] = ["-i", "--index-url", "--extra-index-url"];

const REFERENCE_OPTIONS: [&str; 2] = ["-r", "--requirement"];

/// Parser for plain requirements lists and text lockfiles
pub struct RequirementsTxtParser {
    file_type: FileType,
}

impl RequirementsTxtParser {
    /// Create a parser tagging requirements with `file_type`
    pub fn new(file_type: FileType) -> Self {
        Self { file_type }
    }
}

impl Default for RequirementsTxtParser {
    fn default() -> Self {
        Self::new(FileType::RequirementsTxt)
    }
}

/// Split `--flag value` / `--flag=value` into the flag and its value
fn split_option(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.find(|c: char| c == '=' || c.is_whitespace()) {
        Some(pos) => (&line[..pos], line[pos + 1..].trim()),
        None => (line, ""),
    }
}

/// Index server URL from an index option value, always with a trailing slash
fn parse_index_server(value: &str) -> Option<String> {
    let url = value.split_whitespace().next()?;
    if url.ends_with('/') {
        Some(url.to_string())
    } else {
        Some(format!("{}/", url))
    }
}

impl ManifestParser for RequirementsTxtParser {
    fn parse(&self, content: &str, path: &str) -> Result<ParsedManifest, ManifestError> {
        let mut parsed = ParsedManifest::new();
        if is_ignored_file(content) {
            debug!("{} is marked as ignored", path);
            return Ok(parsed);
        }

        let mut index_url: Option<String> = None;

        for line in logical_lines(content) {
            let trimmed = line.text.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if is_ignored_line(&line.text) {
                debug!("ignoring line {} of {}", line.number, path);
                continue;
            }

            if trimmed.starts_with('-') {
                let (flag, value) = split_option(trimmed);
                if INDEX_OPTIONS.contains(&flag) {
                    index_url = parse_index_server(value);
                    continue;
                }
                if REFERENCE_OPTIONS.contains(&flag) {
                    if !value.is_empty() {
                        parsed.other_files.push(resolve_reference(path, value));
                    }
                    continue;
                }
                if SKIPPED_OPTIONS.contains(&flag) {
                    continue;
                }
            }

            match Requirement::parse(&line.text, line.number, self.file_type) {
                Ok(requirement) => parsed
                    .requirements
                    .push(requirement.with_index_url(index_url.clone())),
                Err(e) => debug!("skipping line {} of {}: {}", line.number, path, e),
            }
        }

        Ok(parsed)
    }

    fn file_type(&self) -> FileType {
        self.file_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> ParsedManifest {
        RequirementsTxtParser::default()
            .parse(content, "requirements.txt")
            .unwrap()
    }

    #[test]
    fn test_parse_simple() {
        let parsed = parse("Django==1.4.1\nflask>=1.0\n# comment\n\nrequests\n");
        let keys: Vec<&str> = parsed.requirements.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["django", "flask", "requests"]);
        assert_eq!(parsed.requirements[0].line_number, 1);
        assert_eq!(parsed.requirements[2].line_number, 5);
    }

    #[test]
    fn test_parse_drops_malformed_lines() {
        let parsed = parse("django==1.0\nthis is not valid\nflask>>1\n-e .\nsix==1.0\n");
        let keys: Vec<&str> = parsed.requirements.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["django", "six"]);
    }

    #[test]
    fn test_parse_references() {
        let parsed = RequirementsTxtParser::default()
            .parse(
                "-r base.txt\n--requirement=test.txt # tests\ndjango\n",
                "reqs/dev.txt",
            )
            .unwrap();
        assert_eq!(parsed.other_files, vec!["reqs/base.txt", "reqs/test.txt"]);
        assert_eq!(parsed.requirements.len(), 1);
    }

    #[test]
    fn test_parse_index_context() {
        let parsed = parse(
            "django==1.0\n-i https://pypi.example.com/simple\nflask==1.0\n--index-url https://other.example.com/\nsix==1.0\n",
        );
        assert_eq!(parsed.requirements[0].index_url, None);
        assert_eq!(
            parsed.requirements[1].index_url.as_deref(),
            Some("https://pypi.example.com/simple/")
        );
        assert_eq!(
            parsed.requirements[2].index_url.as_deref(),
            Some("https://other.example.com/")
        );
    }

    #[test]
    fn test_parse_skips_pip_options() {
        let parsed = parse("--find-links /tmp/wheels\n-f ./dist\n--no-index\ndjango\n");
        assert_eq!(parsed.requirements.len(), 1);
        assert!(parsed.other_files.is_empty());
    }

    #[test]
    fn test_parse_ignore_line() {
        let parsed = parse("django==1.0 # reqbot: ignore\nflask==1.0\n");
        assert_eq!(parsed.requirements.len(), 1);
        assert_eq!(parsed.requirements[0].key, "flask");
    }

    #[test]
    fn test_ignore_file_marker_on_first_line() {
        let parsed = parse("# reqbot: ignore file\ndjango==1.0\n-r base.txt\n");
        assert!(parsed.requirements.is_empty());
        assert!(parsed.other_files.is_empty());
    }

    #[test]
    fn test_ignore_file_marker_past_second_line_has_no_effect() {
        let parsed = parse("django==1.0\nflask==1.0\n# reqbot: ignore file\n");
        assert_eq!(parsed.requirements.len(), 2);
    }

    #[test]
    fn test_parse_hash_block() {
        let content = "flask==1.0 \\\n    --hash=sha256:aaa \\\n    --hash=sha256:bbb\nsix==1.0\n";
        let parsed = parse(content);
        assert_eq!(parsed.requirements.len(), 2);
        let flask = &parsed.requirements[0];
        assert_eq!(flask.hashes, vec!["sha256:aaa", "sha256:bbb"]);
        assert!(content.contains(&flask.source_line));
        assert_eq!(parsed.requirements[1].line_number, 4);
    }

    #[test]
    fn test_lockfile_tagging() {
        let parsed = RequirementsTxtParser::new(FileType::RequirementsLock)
            .parse("  django==1.0\n", "requirements.lock")
            .unwrap();
        assert_eq!(parsed.requirements[0].file_type, FileType::RequirementsLock);
    }
}
