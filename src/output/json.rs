//! JSON output formatter for machine processing
//!
//! The run summary is serialized as is; quiet mode drops the per-edit
//! details of every unit.

use crate::domain::{RunSummary, UnitOutcome};
use crate::output::{OutputFormatter, Verbosity};
use serde::Serialize;
use std::io::Write;

/// JSON formatter for machine-readable output
pub struct JsonFormatter {
    verbosity: Verbosity,
}

impl JsonFormatter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

/// Totals appended next to the summary
#[derive(Serialize)]
struct JsonTotals {
    units: usize,
    created: usize,
    failed: usize,
    edits: usize,
    closed: usize,
}

/// Unit without its edits
#[derive(Serialize)]
struct JsonUnitBrief<'a> {
    title: &'a str,
    branch: &'a str,
    outcome: &'a UnitOutcome,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    #[serde(flatten)]
    summary: &'a RunSummary,
    totals: JsonTotals,
}

#[derive(Serialize)]
struct JsonQuietOutput<'a> {
    repo: &'a str,
    dry_run: bool,
    units: Vec<JsonUnitBrief<'a>>,
    totals: JsonTotals,
}

fn totals(summary: &RunSummary) -> JsonTotals {
    JsonTotals {
        units: summary.units.len(),
        created: summary.created_count(),
        failed: summary.failed_count(),
        edits: summary.total_edits(),
        closed: summary.closed.len(),
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, summary: &RunSummary, writer: &mut dyn Write) -> std::io::Result<()> {
        let json = if self.verbosity == Verbosity::Quiet {
            serde_json::to_string_pretty(&JsonQuietOutput {
                repo: &summary.repo,
                dry_run: summary.dry_run,
                units: summary
                    .units
                    .iter()
                    .map(|u| JsonUnitBrief {
                        title: &u.title,
                        branch: &u.branch,
                        outcome: &u.outcome,
                    })
                    .collect(),
                totals: totals(summary),
            })
        } else {
            serde_json::to_string_pretty(&JsonOutput {
                summary,
                totals: totals(summary),
            })
        }
        .map_err(std::io::Error::other)?;
        writeln!(writer, "{}", json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EditSummary, UnitSummary};
    use serde_json::Value;

    fn summary() -> RunSummary {
        let mut summary = RunSummary::new("acme/app", true);
        summary.add_unit(UnitSummary {
            title: "Pin six to latest version 1.16.0".to_string(),
            branch: "reqbot-pin-six-1.16.0".to_string(),
            edits: vec![EditSummary {
                key: "six".to_string(),
                path: "requirements.txt".to_string(),
                from: None,
                to: "1.16.0".to_string(),
            }],
            outcome: UnitOutcome::Planned,
        });
        summary
    }

    fn render(verbosity: Verbosity) -> Value {
        let mut out = Vec::new();
        JsonFormatter::new(verbosity)
            .format(&summary(), &mut out)
            .unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn test_full_output() {
        let value = render(Verbosity::Normal);
        assert_eq!(value["repo"], "acme/app");
        assert_eq!(value["dry_run"], true);
        assert_eq!(value["units"][0]["outcome"]["status"], "planned");
        assert_eq!(value["units"][0]["edits"][0]["key"], "six");
        assert!(value["units"][0]["edits"][0]["from"].is_null());
        assert_eq!(value["totals"]["units"], 1);
        assert_eq!(value["totals"]["edits"], 1);
    }

    #[test]
    fn test_quiet_output_drops_edits() {
        let value = render(Verbosity::Quiet);
        assert_eq!(value["units"][0]["branch"], "reqbot-pin-six-1.16.0");
        assert!(value["units"][0].get("edits").is_none());
        assert_eq!(value["totals"]["created"], 0);
    }
}
