//! Pipfile.lock rewriter
//!
//! The lock is re-serialised as JSON with four-space indentation and a
//! trailing newline, which is how pipenv writes it.

use crate::domain::Requirement;
use crate::parser::LOCK_SECTIONS;
use crate::rewriter::ContentRewriter;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

/// Rewriter for Pipfile.lock entries
pub struct PipfileLockRewriter;

fn to_lock_json(document: &Value) -> Option<String> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    document.serialize(&mut serializer).ok()?;
    let mut text = String::from_utf8(buffer).ok()?;
    text.push('\n');
    Some(text)
}

impl ContentRewriter for PipfileLockRewriter {
    fn rewrite(
        &self,
        content: &str,
        requirement: &Requirement,
        target: &str,
        hashes: &[String],
    ) -> String {
        let Ok(mut document) = serde_json::from_str::<Value>(content) else {
            return content.to_string();
        };

        let sections: Vec<&str> = match requirement.section.as_deref() {
            Some(section) => vec![section],
            None => LOCK_SECTIONS.to_vec(),
        };

        let mut changed = false;
        for section in sections {
            let Some(entry) = document
                .get_mut(section)
                .and_then(|entries| entries.get_mut(&requirement.name))
                .and_then(Value::as_object_mut)
            else {
                continue;
            };
            entry.insert("version".to_string(), Value::String(format!("=={}", target)));
            if !hashes.is_empty() {
                let digests = hashes.iter().cloned().map(Value::String).collect();
                entry.insert("hashes".to_string(), Value::Array(digests));
            }
            changed = true;
            break;
        }

        if !changed {
            return content.to_string();
        }
        to_lock_json(&document).unwrap_or_else(|| content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FileType;
    use crate::parser::get_parser;

    const LOCK: &str = "{\n    \"default\": {\n        \"django\": {\n            \"hashes\": [\n                \"sha256:aaa\"\n            ],\n            \"version\": \"==2.0.1\"\n        }\n    },\n    \"develop\": {}\n}\n";

    fn django() -> Requirement {
        get_parser(FileType::PipfileLock)
            .parse(LOCK, "Pipfile.lock")
            .unwrap()
            .requirements
            .remove(0)
    }

    #[test]
    fn test_version_and_hashes_replaced() {
        let hashes = vec!["sha256:bbb".to_string(), "sha256:ccc".to_string()];
        let out = PipfileLockRewriter.rewrite(LOCK, &django(), "2.0.2", &hashes);
        assert_eq!(
            out,
            "{\n    \"default\": {\n        \"django\": {\n            \"hashes\": [\n                \"sha256:bbb\",\n                \"sha256:ccc\"\n            ],\n            \"version\": \"==2.0.2\"\n        }\n    },\n    \"develop\": {}\n}\n"
        );
    }

    #[test]
    fn test_hashes_kept_when_none_supplied() {
        let out = PipfileLockRewriter.rewrite(LOCK, &django(), "2.0.2", &[]);
        assert!(out.contains("\"sha256:aaa\""));
        assert!(out.contains("\"version\": \"==2.0.2\""));
    }

    #[test]
    fn test_invalid_json_is_noop() {
        assert_eq!(PipfileLockRewriter.rewrite("{", &django(), "2.0.2", &[]), "{");
    }

    #[test]
    fn test_missing_entry_is_noop() {
        let mut requirement = django();
        requirement.name = "flask".to_string();
        assert_eq!(PipfileLockRewriter.rewrite(LOCK, &requirement, "1.0", &[]), LOCK);
    }
}
