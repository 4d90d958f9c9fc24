//! Change-request bodies

use super::{RequirementUpdate, UnitKind};

/// Body of the issue raised when an initial run finds nothing to update
pub const EMPTY_INITIAL_BODY: &str = "The initial setup worked, but all your packages are up to date. You can safely close this issue.";

fn project_url(key: &str) -> String {
    format!("https://pypi.org/project/{}/", key)
}

fn manifest_list(updates: &[RequirementUpdate]) -> String {
    let mut paths: Vec<&str> = Vec::new();
    for update in updates {
        if !paths.contains(&update.manifest_path.as_str()) {
            paths.push(&update.manifest_path);
        }
    }
    paths
        .iter()
        .map(|p| format!("- `{}`", p))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Body of a single-package unit
pub fn sequential_body(first: &RequirementUpdate, updates: &[RequirementUpdate]) -> String {
    let mut body = String::new();
    match first.pinned_version() {
        Some(old) => body.push_str(&format!(
            "This PR updates [{}]({}) from **{}** to **{}**.\n",
            first.requirement.name,
            project_url(first.key()),
            old,
            first.target
        )),
        None => body.push_str(&format!(
            "This PR pins [{}]({}) to the latest release **{}**.\n",
            first.requirement.name,
            project_url(first.key()),
            first.target
        )),
    }
    if updates.iter().any(|u| u.insecure) {
        body.push_str("\nThe current version has a known security advisory.\n");
    }
    body.push_str("\nChanged files:\n\n");
    body.push_str(&manifest_list(updates));
    body.push('\n');
    body
}

/// Body of a bundled unit: one table row per edit
pub fn bundled_body(kind: UnitKind, updates: &[RequirementUpdate]) -> String {
    let mut body = String::new();
    match kind {
        UnitKind::Initial => body.push_str(
            "This is the initial update of this repository. It pins or updates every outdated requirement.\n\n",
        ),
        _ => body.push_str("Bundled dependency updates for this period.\n\n"),
    }
    body.push_str("| Package | File | From | To |\n");
    body.push_str("| --- | --- | --- | --- |\n");
    for update in updates {
        let from = update.pinned_version().unwrap_or("unpinned");
        let marker = if update.insecure { " (insecure)" } else { "" };
        body.push_str(&format!(
            "| [{}]({}){} | `{}` | {} | **{}** |\n",
            update.key(),
            project_url(update.key()),
            marker,
            update.manifest_path,
            from,
            update.target
        ));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FileType, Requirement};

    fn update(line: &str, path: &str, target: &str) -> RequirementUpdate {
        let requirement = Requirement::parse(line, 1, FileType::RequirementsTxt).unwrap();
        RequirementUpdate::new(requirement, path, None, target)
    }

    #[test]
    fn test_sequential_body() {
        let updates = vec![
            update("Django==1.0", "requirements.txt", "1.1"),
            update("django==1.0", "dev/requirements.txt", "1.1"),
            update("django==1.0", "requirements.txt", "1.1"),
        ];
        let body = sequential_body(&updates[0], &updates);
        assert!(body.contains("[Django](https://pypi.org/project/django/) from **1.0** to **1.1**"));
        assert!(body.contains("- `requirements.txt`\n- `dev/requirements.txt`"));
        assert_eq!(body.matches("- `requirements.txt`").count(), 1);
        assert!(!body.contains("advisory"));
    }

    #[test]
    fn test_sequential_pin_body_mentions_advisory() {
        let updates = vec![update("six", "requirements.txt", "1.2").with_insecure(true)];
        let body = sequential_body(&updates[0], &updates);
        assert!(body.contains("pins [six]"));
        assert!(body.contains("security advisory"));
    }

    #[test]
    fn test_bundled_body_rows() {
        let updates = vec![
            update("django==1.0", "requirements.txt", "1.1"),
            update("six", "requirements.txt", "1.2"),
        ];
        let body = bundled_body(UnitKind::Initial, &updates);
        assert!(body.starts_with("This is the initial update"));
        assert!(body.contains("| `requirements.txt` | 1.0 | **1.1** |"));
        assert!(body.contains("| `requirements.txt` | unpinned | **1.2** |"));
        let django = body.find("django").unwrap();
        let six = body.find("[six]").unwrap();
        assert!(django < six);
    }
}
