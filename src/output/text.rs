//! Text output formatter for human-readable display
//!
//! This module provides:
//! - One line per update unit with its outcome, colored by status
//! - Release change kind of every edit (major/minor/patch) in verbose mode
//! - Closed stale pull requests, opened issues and errors
//! - Summary line with totals

use crate::domain::{EditSummary, RunSummary, UnitOutcome, UnitSummary, Version};
use crate::output::{OutputFormatter, Verbosity};
use colored::Colorize;
use std::io::Write;

/// Release segment an edit moves across
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// First release segment changed
    Major,
    /// Second release segment changed
    Minor,
    /// Anything smaller
    Patch,
    /// Pin of an unpinned requirement, or unparseable versions
    Unknown,
}

impl ChangeKind {
    /// Determine the change kind between two versions
    pub fn from_versions(old: Option<&str>, new: &str) -> Self {
        let (Some(old), Some(new)) = (old.and_then(Version::parse), Version::parse(new)) else {
            return ChangeKind::Unknown;
        };
        if old.epoch() != new.epoch() || old.major() != new.major() {
            ChangeKind::Major
        } else if old.minor() != new.minor() {
            ChangeKind::Minor
        } else {
            ChangeKind::Patch
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Major => "major",
            ChangeKind::Minor => "minor",
            ChangeKind::Patch => "patch",
            ChangeKind::Unknown => "pin",
        }
    }

    fn colored_label(&self) -> String {
        match self {
            ChangeKind::Major => self.label().red().bold().to_string(),
            ChangeKind::Minor => self.label().yellow().to_string(),
            ChangeKind::Patch => self.label().green().to_string(),
            ChangeKind::Unknown => self.label().cyan().to_string(),
        }
    }
}

/// Text formatter for human-readable output
pub struct TextFormatter {
    verbosity: Verbosity,
    color: bool,
}

impl TextFormatter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self::with_color(verbosity, true)
    }

    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    fn paint(&self, text: &str, outcome: &UnitOutcome) -> String {
        if !self.color {
            return text.to_string();
        }
        match outcome {
            UnitOutcome::Created { .. } => text.green().bold().to_string(),
            UnitOutcome::Reused { .. } | UnitOutcome::Gated { .. } => text.blue().to_string(),
            UnitOutcome::Planned => text.cyan().to_string(),
            UnitOutcome::Skipped { .. } => text.dimmed().to_string(),
            UnitOutcome::Failed { .. } => text.red().bold().to_string(),
        }
    }

    fn outcome_label(outcome: &UnitOutcome) -> String {
        match outcome {
            UnitOutcome::Created { number, .. } => format!("created #{}", number),
            UnitOutcome::Reused { number } => format!("exists #{}", number),
            UnitOutcome::Gated { number } => format!("waiting on #{}", number),
            UnitOutcome::Planned => "planned".to_string(),
            UnitOutcome::Skipped { reason } => format!("skipped ({})", reason),
            UnitOutcome::Failed { message } => format!("failed ({})", message),
        }
    }

    fn format_unit(&self, unit: &UnitSummary, writer: &mut dyn Write) -> std::io::Result<()> {
        let label = self.paint(&Self::outcome_label(&unit.outcome), &unit.outcome);
        if self.color {
            writeln!(
                writer,
                "  {} {} {}",
                unit.title.bold(),
                format!("[{}]", unit.branch).dimmed(),
                label
            )?;
        } else {
            writeln!(writer, "  {} [{}] {}", unit.title, unit.branch, label)?;
        }

        if self.verbosity == Verbosity::Verbose {
            let width = unit.edits.iter().map(|e| e.key.len()).max().unwrap_or(0);
            for edit in &unit.edits {
                self.format_edit(edit, width, writer)?;
            }
        }
        Ok(())
    }

    fn format_edit(&self, edit: &EditSummary, width: usize, writer: &mut dyn Write) -> std::io::Result<()> {
        let kind = ChangeKind::from_versions(edit.from.as_deref(), &edit.to);
        let from = edit.from.as_deref().unwrap_or("*");
        if self.color {
            writeln!(
                writer,
                "    {:width$} {} {} {} [{}] {}",
                edit.key,
                from.dimmed(),
                "→".dimmed(),
                edit.to.bright_white().bold(),
                kind.colored_label(),
                edit.path.dimmed(),
                width = width
            )
        } else {
            writeln!(
                writer,
                "    {:width$} {} -> {} [{}] {}",
                edit.key,
                from,
                edit.to,
                kind.label(),
                edit.path,
                width = width
            )
        }
    }

    fn format_totals(&self, summary: &RunSummary, writer: &mut dyn Write) -> std::io::Result<()> {
        let line = format!(
            "{} units, {} created, {} failed, {} edits, {} closed, {} issues",
            summary.units.len(),
            summary.created_count(),
            summary.failed_count(),
            summary.total_edits(),
            summary.closed.len(),
            summary.issues.len()
        );
        if self.color {
            writeln!(writer, "{}", line.bold())
        } else {
            writeln!(writer, "{}", line)
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, summary: &RunSummary, writer: &mut dyn Write) -> std::io::Result<()> {
        let dry_run = if summary.dry_run { " (dry-run)" } else { "" };
        if self.color {
            writeln!(
                writer,
                "{}{}: {} requirement files",
                summary.repo.bold(),
                dry_run.cyan(),
                summary.manifests.len()
            )?;
        } else {
            writeln!(
                writer,
                "{}{}: {} requirement files",
                summary.repo,
                dry_run,
                summary.manifests.len()
            )?;
        }

        if self.verbosity != Verbosity::Quiet {
            if summary.is_empty() {
                writeln!(writer, "  Everything is up to date.")?;
            }
            for unit in &summary.units {
                self.format_unit(unit, writer)?;
            }
            for number in &summary.closed {
                writeln!(writer, "  closed stale pull request #{}", number)?;
            }
            for issue in &summary.issues {
                writeln!(writer, "  opened issue '{}'", issue)?;
            }
            if summary.empty_edits > 0 {
                writeln!(
                    writer,
                    "  {} edits left the file unchanged",
                    summary.empty_edits
                )?;
            }
            for error in &summary.errors {
                if self.color {
                    writeln!(writer, "  {} {}", "error:".red().bold(), error)?;
                } else {
                    writeln!(writer, "  error: {}", error)?;
                }
            }
        }

        writeln!(writer)?;
        self.format_totals(summary, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        let mut summary = RunSummary::new("acme/app", false);
        summary.manifests = vec!["requirements.txt".to_string()];
        summary.add_unit(UnitSummary {
            title: "Update django to 1.4.2".to_string(),
            branch: "reqbot-update-django-1.4.1-to-1.4.2".to_string(),
            edits: vec![EditSummary {
                key: "django".to_string(),
                path: "requirements.txt".to_string(),
                from: Some("1.4.1".to_string()),
                to: "1.4.2".to_string(),
            }],
            outcome: UnitOutcome::Created {
                number: 7,
                url: "https://example.test/7".to_string(),
            },
        });
        summary.closed.push(3);
        summary
    }

    fn render(verbosity: Verbosity, summary: &RunSummary) -> String {
        let mut out = Vec::new();
        TextFormatter::with_color(verbosity, false)
            .format(summary, &mut out)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_change_kind() {
        assert_eq!(ChangeKind::from_versions(Some("1.4.1"), "2.0"), ChangeKind::Major);
        assert_eq!(ChangeKind::from_versions(Some("1.4.1"), "1.5.0"), ChangeKind::Minor);
        assert_eq!(ChangeKind::from_versions(Some("1.4.1"), "1.4.2"), ChangeKind::Patch);
        assert_eq!(ChangeKind::from_versions(None, "1.4.2"), ChangeKind::Unknown);
        assert_eq!(ChangeKind::from_versions(Some("1.0"), "1!1.0"), ChangeKind::Major);
    }

    #[test]
    fn test_normal_output() {
        let text = render(Verbosity::Normal, &summary());
        assert!(text.starts_with("acme/app: 1 requirement files"));
        assert!(text.contains("Update django to 1.4.2 [reqbot-update-django-1.4.1-to-1.4.2] created #7"));
        assert!(text.contains("closed stale pull request #3"));
        assert!(!text.contains("[patch]"));
        assert!(text.contains("1 units, 1 created, 0 failed, 1 edits, 1 closed, 0 issues"));
    }

    #[test]
    fn test_verbose_output_lists_edits() {
        let text = render(Verbosity::Verbose, &summary());
        assert!(text.contains("django 1.4.1 -> 1.4.2 [patch] requirements.txt"));
    }

    #[test]
    fn test_quiet_output_only_totals() {
        let text = render(Verbosity::Quiet, &summary());
        assert!(!text.contains("Update django"));
        assert!(text.contains("1 units"));
    }

    #[test]
    fn test_up_to_date_dry_run() {
        let summary = RunSummary::new("acme/app", true);
        let text = render(Verbosity::Normal, &summary);
        assert!(text.contains("acme/app (dry-run)"));
        assert!(text.contains("Everything is up to date."));
    }
}
