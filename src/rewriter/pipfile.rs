//! Pipfile rewriter
//!
//! Edits the version string of one entry in place; every other byte of the
//! file, including comments and line endings, is kept.

use crate::domain::Requirement;
use crate::parser::{locate_entry, PIPFILE_SECTIONS};
use crate::rewriter::ContentRewriter;

/// Rewriter for Pipfile entries
pub struct PipfileRewriter;

/// Replace the first quoted string at or after `from` with `"value"`
fn replace_quoted(line: &str, from: usize, value: &str) -> Option<String> {
    let (open, quote) = line[from..]
        .char_indices()
        .find(|(_, c)| *c == '"' || *c == '\'')
        .map(|(offset, c)| (from + offset, c))?;
    let close = open + 1 + line[open + 1..].find(quote)?;
    Some(format!(
        "{}{}{}{}{}",
        &line[..open],
        quote,
        value,
        quote,
        &line[close + 1..]
    ))
}

/// Rewrite one entry line, string or inline-table form
fn rewrite_entry(line: &str, value: &str) -> Option<String> {
    let equals = line.find('=')?;
    let rest = line[equals + 1..].trim_start();
    if rest.starts_with('{') {
        let brace = equals + 1 + line[equals + 1..].find('{')?;
        let version = brace + line[brace..].find("version")?;
        let assign = version + line[version..].find('=')?;
        replace_quoted(line, assign + 1, value)
    } else {
        replace_quoted(line, equals + 1, value)
    }
}

impl ContentRewriter for PipfileRewriter {
    fn rewrite(
        &self,
        content: &str,
        requirement: &Requirement,
        target: &str,
        _hashes: &[String],
    ) -> String {
        let sections: Vec<&str> = match requirement.section.as_deref() {
            Some(section) => vec![section],
            None => PIPFILE_SECTIONS.to_vec(),
        };
        let Some(number) = sections
            .iter()
            .find_map(|section| locate_entry(content, section, &requirement.name))
            .map(|(number, _)| number)
        else {
            return content.to_string();
        };

        let value = format!("=={}", target);
        let mut output = String::with_capacity(content.len() + value.len());
        for (index, segment) in content.split_inclusive('\n').enumerate() {
            if index + 1 == number {
                match rewrite_entry(segment, &value) {
                    Some(updated) => output.push_str(&updated),
                    None => return content.to_string(),
                }
            } else {
                output.push_str(segment);
            }
        }
        output
    }
}
