//! Run summary types
//!
//! Provides structures for tracking what one bot run did, per update unit
//! and overall.

use serde::{Deserialize, Serialize};

/// One requirement edit that belongs to an update unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSummary {
    /// Requirement key
    pub key: String,
    /// Manifest path
    pub path: String,
    /// Version before the update, None for unpinned requirements
    pub from: Option<String>,
    /// Version after the update
    pub to: String,
}

/// What happened to one update unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// A new change-request was opened
    Created { number: u64, url: String },
    /// An existing change-request with the same title was reused
    Reused { number: u64 },
    /// An open initial change-request gates the run
    Gated { number: u64 },
    /// Dry run: nothing was written
    Planned,
    /// Nothing was opened (pull gate closed, branch collision, nothing committed)
    Skipped { reason: String },
    /// Provider failure for this unit only
    Failed { message: String },
}

impl UnitOutcome {
    /// Change-request number this unit resolved to, if any
    pub fn number(&self) -> Option<u64> {
        match self {
            UnitOutcome::Created { number, .. }
            | UnitOutcome::Reused { number }
            | UnitOutcome::Gated { number } => Some(*number),
            _ => None,
        }
    }
}

/// Summary for a single update unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub title: String,
    pub branch: String,
    pub edits: Vec<EditSummary>,
    pub outcome: UnitOutcome,
}

/// Overall summary of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Repository the run targeted
    pub repo: String,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Manifest paths discovered, in discovery order
    pub manifests: Vec<String>,
    /// Update units, in grouping order
    pub units: Vec<UnitSummary>,
    /// Numbers of stale change-requests closed
    pub closed: Vec<u64>,
    /// Titles of issues opened
    pub issues: Vec<String>,
    /// Edits skipped because the rewrite left the content unchanged
    pub empty_edits: usize,
    /// Non-fatal errors
    pub errors: Vec<String>,
}

impl RunSummary {
    /// Creates a new RunSummary
    pub fn new(repo: impl Into<String>, dry_run: bool) -> Self {
        Self {
            repo: repo.into(),
            dry_run,
            ..Default::default()
        }
    }

    pub fn add_unit(&mut self, unit: UnitSummary) {
        self.units.push(unit);
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Number of change-requests opened this run
    pub fn created_count(&self) -> usize {
        self.units
            .iter()
            .filter(|u| matches!(u.outcome, UnitOutcome::Created { .. }))
            .count()
    }

    /// Number of units that failed
    pub fn failed_count(&self) -> usize {
        self.units
            .iter()
            .filter(|u| matches!(u.outcome, UnitOutcome::Failed { .. }))
            .count()
    }

    /// Total requirement edits across all units
    pub fn total_edits(&self) -> usize {
        self.units.iter().map(|u| u.edits.len()).sum()
    }

    /// True if any unit failed or a non-fatal error was recorded
    pub fn has_errors(&self) -> bool {
        self.failed_count() > 0 || !self.errors.is_empty()
    }

    /// True if the run had nothing to do
    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.issues.is_empty() && self.closed.is_empty()
    }
}
