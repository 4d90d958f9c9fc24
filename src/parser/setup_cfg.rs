//! setup.cfg parser
//!
//! Handles:
//! - `[options]` install_requires, setup_requires, tests_require
//! - every option of `[options.extras_require]`

use crate::domain::{is_ignored_file, is_ignored_line, FileType, Requirement};
use crate::error::ManifestError;
use crate::parser::{IniDocument, IniOption, ManifestParser, ParsedManifest};
use log::debug;

const REQUIREMENT_OPTIONS: [&str; 3] = ["install_requires", "setup_requires", "tests_require"];

/// Parser for setup.cfg files
pub struct SetupCfgParser;

fn collect(option: &IniOption, section: &str, path: &str, parsed: &mut ParsedManifest) {
    for line in &option.lines {
        if is_ignored_line(&line.text) {
            continue;
        }
        match Requirement::parse(&line.text, line.number, FileType::SetupCfg) {
            Ok(requirement) => parsed.requirements.push(requirement.with_section(section)),
            Err(e) => debug!("skipping line {} of {}: {}", line.number, path, e),
        }
    }
}

impl ManifestParser for SetupCfgParser {
    fn parse(&self, content: &str, path: &str) -> Result<ParsedManifest, ManifestError> {
        let mut parsed = ParsedManifest::new();
        if is_ignored_file(content) {
            return Ok(parsed);
        }

        let document = IniDocument::parse(content);

        if let Some(options) = document.section("options") {
            for name in REQUIREMENT_OPTIONS {
                if let Some(option) = options.option(name) {
                    collect(option, name, path, &mut parsed);
                }
            }
        }

        if let Some(extras) = document.section("options.extras_require") {
            for option in &extras.options {
                collect(option, &option.name, path, &mut parsed);
            }
        }

        Ok(parsed)
    }

    fn file_type(&self) -> FileType {
        FileType::SetupCfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETUP_CFG: &str = "[metadata]\nname = demo\n\n[options]\npackages = find:\ninstall_requires =\n    requests>=2.0\n    click==7.0\nsetup_requires = setuptools_scm\ntests_require =\n    pytest\n\n[options.extras_require]\nyaml = PyYAML==5.1\ndocs =\n    sphinx==2.0\n";

    #[test]
    fn test_parse_all_option_groups() {
        let parsed = SetupCfgParser.parse(SETUP_CFG, "setup.cfg").unwrap();
        let keys: Vec<&str> = parsed.requirements.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["requests", "click", "setuptools_scm", "pytest", "pyyaml", "sphinx"]
        );
        assert_eq!(parsed.requirements[5].section.as_deref(), Some("docs"));
    }

    #[test]
    fn test_ignores_unrelated_options() {
        let parsed = SetupCfgParser
            .parse("[options]\npackages = find:\n", "setup.cfg")
            .unwrap();
        assert!(parsed.is_empty());
    }
}
