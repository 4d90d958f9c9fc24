//! Pipfile parser
//!
//! Handles:
//! - `[packages]` and `[dev-packages]` tables
//! - String entries: `django = "==2.0"`, `requests = "*"`
//! - Table entries: `django = {version = ">=2.0", extras = ["bcrypt"]}`
//!
//! Entries without a version (git, path, editable) are not managed.

use crate::domain::{is_ignored_file, is_ignored_line, FileType, Requirement, SpecifierSet};
use crate::error::ManifestError;
use crate::parser::{ManifestParser, ParsedManifest};
use log::debug;
use toml::Value;

/// Tables that hold dependencies
pub const PIPFILE_SECTIONS: [&str; 2] = ["packages", "dev-packages"];

/// Parser for Pipfile files
pub struct PipfileParser;

/// Locate the line declaring `name` inside `[section]`: (1-based number, text)
pub fn locate_entry<'a>(content: &'a str, section: &str, name: &str) -> Option<(usize, &'a str)> {
    let header = format!("[{}]", section);
    let mut in_section = false;
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            in_section = trimmed == header;
            continue;
        }
        if !in_section {
            continue;
        }
        let Some((key, _)) = trimmed.split_once('=') else {
            continue;
        };
        if key.trim().trim_matches(|c| c == '"' || c == '\'') == name {
            return Some((index + 1, line));
        }
    }
    None
}

fn entry_specs(value: &Value) -> Option<(String, Vec<String>)> {
    match value {
        Value::String(spec) => Some((spec.clone(), Vec::new())),
        Value::Table(table) => {
            let spec = table.get("version")?.as_str()?.to_string();
            let extras = table
                .get("extras")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some((spec, extras))
        }
        _ => None,
    }
}

impl ManifestParser for PipfileParser {
    fn parse(&self, content: &str, path: &str) -> Result<ParsedManifest, ManifestError> {
        let mut parsed = ParsedManifest::new();
        if is_ignored_file(content) {
            return Ok(parsed);
        }

        let document: toml::Table =
            content
                .parse()
                .map_err(|e: toml::de::Error| ManifestError::TomlParseError {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;

        for section in PIPFILE_SECTIONS {
            let Some(table) = document.get(section).and_then(Value::as_table) else {
                continue;
            };
            for (name, value) in table {
                let Some((raw_spec, extras)) = entry_specs(value) else {
                    debug!("skipping unversioned entry {} in {}", name, path);
                    continue;
                };
                let spec_text = if raw_spec.trim() == "*" { "" } else { raw_spec.as_str() };
                let Some(specs) = SpecifierSet::parse(spec_text) else {
                    debug!("skipping {} in {}: invalid specifier '{}'", name, path, raw_spec);
                    continue;
                };
                let (number, line) = locate_entry(content, section, name).unwrap_or((0, ""));
                if is_ignored_line(line) {
                    continue;
                }
                let source = if line.is_empty() {
                    format!("{}{}", name, spec_text)
                } else {
                    line.to_string()
                };
                let requirement =
                    Requirement::from_parts(name.clone(), specs, source, number, FileType::Pipfile)
                        .with_extras(extras)
                        .with_section(section);
                parsed.requirements.push(requirement);
            }
        }

        Ok(parsed)
    }

    fn file_type(&self) -> FileType {
        FileType::Pipfile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPFILE: &str = r#"[[source]]
url = "https://pypi.org/simple"
verify_ssl = true
name = "pypi"

[packages]
django = "==2.0.1"
requests = "*"
"flask-login" = {version = ">=0.4", extras = ["secure"]}
mylib = {git = "https://example.com/mylib.git"}

[dev-packages]
pytest = "==3.5.0" # reqbot: <4.0

[requires]
python_version = "3.7"
"#;

    #[test]
    fn test_parse_sections() {
        let parsed = PipfileParser.parse(PIPFILE, "Pipfile").unwrap();
        let keys: Vec<&str> = parsed.requirements.iter().map(|r| r.key.as_str()).collect();
        assert!(keys.contains(&"django"));
        assert!(keys.contains(&"requests"));
        assert!(keys.contains(&"flask-login"));
        assert!(keys.contains(&"pytest"));
        assert!(!keys.contains(&"mylib"));
    }

    #[test]
    fn test_star_is_loose() {
        let parsed = PipfileParser.parse(PIPFILE, "Pipfile").unwrap();
        let requests = parsed.requirements.iter().find(|r| r.key == "requests").unwrap();
        assert!(requests.is_loose());
        assert_eq!(requests.section.as_deref(), Some("packages"));
    }

    #[test]
    fn test_table_entry_extras_and_line() {
        let parsed = PipfileParser.parse(PIPFILE, "Pipfile").unwrap();
        let login = parsed
            .requirements
            .iter()
            .find(|r| r.key == "flask-login")
            .unwrap();
        assert_eq!(login.extras, vec!["secure"]);
        assert_eq!(login.line_number, 9);
        assert!(login.is_open_ranged());
    }

    #[test]
    fn test_directive_from_toml_comment() {
        let parsed = PipfileParser.parse(PIPFILE, "Pipfile").unwrap();
        let pytest = parsed.requirements.iter().find(|r| r.key == "pytest").unwrap();
        assert!(pytest.directive.is_some());
        assert_eq!(pytest.section.as_deref(), Some("dev-packages"));
    }

    #[test]
    fn test_broken_toml() {
        let result = PipfileParser.parse("[packages\n", "Pipfile");
        assert!(matches!(result, Err(ManifestError::TomlParseError { .. })));
    }

    #[test]
    fn test_locate_entry_respects_section() {
        let content = "[dev-packages]\ndjango = \"*\"\n[packages]\ndjango = \"==1.0\"\n";
        assert_eq!(locate_entry(content, "packages", "django").unwrap().0, 4);
    }
}
