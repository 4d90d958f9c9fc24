//! Line-oriented rewriter
//!
//! Replaces the verbatim declaration text with `name==version`, keeping:
//! - leading indentation
//! - the environment marker (`; python_version < "3.8"`)
//! - the trailing comment and the whitespace run before it
//! - the original line ending
//!
//! Hash pins are re-emitted one per continuation line, before the comment.

use crate::domain::Requirement;
use crate::rewriter::ContentRewriter;

/// Rewriter for line-oriented manifests
pub struct LineRewriter {
    anchored: bool,
}

impl LineRewriter {
    /// `anchored` requires the declaration to start at the beginning of a line
    pub fn new(anchored: bool) -> Self {
        Self { anchored }
    }

    /// Byte offsets of every acceptable occurrence of `needle`
    fn find_matches(&self, content: &str, needle: &str) -> Vec<usize> {
        let mut matches = Vec::new();
        let Some(first) = needle.chars().next() else {
            return matches;
        };

        let mut from = 0;
        while let Some(pos) = content[from..].find(needle) {
            let start = from + pos;
            let end = start + needle.len();
            let line_start = content[..start].rfind('\n').map_or(0, |i| i + 1);
            let prefix = &content[line_start..start];
            let at_line_start = prefix.is_empty();
            let tail = content[end..].split('\n').next().unwrap_or_default();
            let tail = tail.trim_start_matches([' ', '\t', '\r']);
            let tail_ok = tail.is_empty() || tail.starts_with('#');

            let head_ok = if self.anchored {
                at_line_start
            } else {
                is_declaration_prefix(prefix)
            };

            if head_ok && tail_ok {
                matches.push(start);
                from = end;
            } else {
                from = start + first.len_utf8();
            }
        }
        matches
    }
}

/// Text allowed before a declaration on its line: indentation, a YAML list
/// dash, or an inline `option =` assignment
fn is_declaration_prefix(prefix: &str) -> bool {
    let trimmed = prefix.trim();
    if trimmed.is_empty() {
        return true;
    }
    let separated = prefix.ends_with([' ', '\t']);
    (trimmed == "-" && separated) || trimmed.ends_with('=')
}

/// Render the replacement text for a declaration
pub fn render_declaration(requirement: &Requirement, target: &str, hashes: &[String]) -> String {
    let source = requirement.source_line.as_str();
    let indent: String = source
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();

    let mut declaration = format!("{}{}=={}", indent, requirement.full_name(), target);

    let first_line = source.lines().next().unwrap_or_default();
    if let Some((_, marker)) = first_line.split_once(';') {
        let marker = marker
            .split('#')
            .next()
            .unwrap_or_default()
            .split("--hash")
            .next()
            .unwrap_or_default()
            .trim_end()
            .trim_end_matches('\\')
            .trim_end();
        declaration.push(';');
        declaration.push_str(marker);
    }

    let mut appendix = String::new();
    if let Some((before, comment)) = source.split_once('#') {
        let whitespace: String = before
            .chars()
            .rev()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect();
        appendix.push_str(&whitespace);
        appendix.push('#');
        appendix.push_str(comment);
    }

    if !hashes.is_empty() {
        declaration.push_str(" \\");
        let line_ending = if source.contains("\r\n") { "\r\n" } else { "\n" };
        for (n, hash) in hashes.iter().enumerate() {
            declaration.push_str(line_ending);
            declaration.push_str("    --hash=");
            declaration.push_str(hash);
            if n + 1 < hashes.len() {
                declaration.push_str(" \\");
            }
        }
    }

    declaration.push_str(&appendix);
    declaration
}

impl ContentRewriter for LineRewriter {
    fn rewrite(
        &self,
        content: &str,
        requirement: &Requirement,
        target: &str,
        hashes: &[String],
    ) -> String {
        let needle = requirement.source_line.as_str();
        let matches = self.find_matches(content, needle);
        if matches.is_empty() {
            return content.to_string();
        }

        let replacement = render_declaration(requirement, target, hashes);
        let mut output = String::with_capacity(content.len() + replacement.len());
        let mut last = 0;
        for start in matches {
            output.push_str(&content[last..start]);
            output.push_str(&replacement);
            last = start + needle.len();
        }
        output.push_str(&content[last..]);
        output
    }
}
