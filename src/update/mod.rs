//! Update grouping engine
//!
//! This module provides:
//! - `RequirementUpdate`: one requirement edit with its commit message
//! - `GroupingStrategy` selection (sequential, initial, scheduled)
//! - `UpdateGrouper`: turns candidate edits into committable update units
//!
//! Sequential grouping keys edits by `key-target` (or `key-pin` for
//! unpinned requirements), so the same bump in several manifests lands in
//! one unit. Units keep discovery order.

mod body;

pub use body::{bundled_body, sequential_body, EMPTY_INITIAL_BODY};

use crate::config::{Cadence, Config};
use crate::domain::Requirement;
use crate::error::ConfigError;
use chrono::{DateTime, Utc};

/// Title of the initial bundled update
pub const INITIAL_TITLE: &str = "Initial Update";

/// Branch of the initial bundled update
pub const INITIAL_BRANCH: &str = "initial-update";

/// One requirement edit
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementUpdate {
    pub requirement: Requirement,
    /// Path of the manifest holding the requirement
    pub manifest_path: String,
    /// Resolved current version, if any
    pub current: Option<String>,
    /// Version to write
    pub target: String,
    pub commit_message: String,
    /// The current version has a known advisory
    pub insecure: bool,
}

impl RequirementUpdate {
    pub fn new(
        requirement: Requirement,
        manifest_path: impl Into<String>,
        current: Option<String>,
        target: impl Into<String>,
    ) -> Self {
        let target = target.into();
        let commit_message = match requirement.declared_version().filter(|_| requirement.is_pinned()) {
            Some(old) => format!("Update {} from {} to {}", requirement.key, old, target),
            None => format!("Pin {} to latest version {}", requirement.key, target),
        };
        Self {
            requirement,
            manifest_path: manifest_path.into(),
            current,
            target,
            commit_message,
            insecure: false,
        }
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn key(&self) -> &str {
        &self.requirement.key
    }

    /// True when the edit introduces a pin
    pub fn is_pin(&self) -> bool {
        !self.requirement.is_pinned()
    }

    /// Version the requirement is pinned to before the edit
    pub fn pinned_version(&self) -> Option<&str> {
        if self.requirement.is_pinned() {
            self.requirement.declared_version()
        } else {
            None
        }
    }

    /// Sequential grouping key
    pub fn group_key(&self) -> String {
        if self.is_pin() {
            format!("{}-pin", self.requirement.key)
        } else {
            format!("{}-{}", self.requirement.key, self.target)
        }
    }
}

/// Kind of an update unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Sequential,
    Initial,
    Scheduled,
}

/// One committable group of edits
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateUnit {
    pub kind: UnitKind,
    pub title: String,
    pub body: String,
    /// Branch name without the configured prefix
    pub branch: String,
    pub updates: Vec<RequirementUpdate>,
}

impl UpdateUnit {
    pub fn is_bundled(&self) -> bool {
        self.kind != UnitKind::Sequential
    }
}

/// How the candidate edits of one run are grouped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingStrategy {
    /// One unit per distinct grouping key
    Sequential,
    /// Everything in one fixed "Initial Update" unit
    Initial,
    /// Everything in one unit named after the date and cadence
    Scheduled(Cadence),
}

/// Pick the strategy for a run.
///
/// A scheduled run with a schedule that cannot be interpreted is an error;
/// one without any schedule falls back to sequential grouping.
pub fn select_grouping(
    initial: bool,
    scheduled: bool,
    config: &Config,
) -> Result<GroupingStrategy, ConfigError> {
    if initial {
        return Ok(GroupingStrategy::Initial);
    }
    if scheduled {
        match Cadence::parse(&config.schedule) {
            Some(cadence) => return Ok(GroupingStrategy::Scheduled(cadence)),
            None if !config.schedule.trim().is_empty() => {
                return Err(ConfigError::UnsupportedSchedule {
                    schedule: config.schedule.clone(),
                })
            }
            None => {}
        }
    }
    Ok(GroupingStrategy::Sequential)
}

/// Groups candidate edits into update units
pub struct UpdateGrouper<'a> {
    config: &'a Config,
    /// Current time for scheduled titles and branches
    now: DateTime<Utc>,
}

impl<'a> UpdateGrouper<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            now: Utc::now(),
        }
    }

    /// Create a grouper with a custom current time (for testing)
    pub fn with_time(config: &'a Config, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }

    /// Whether the configuration allows this edit
    pub fn should_update(&self, update: &RequirementUpdate) -> bool {
        let path = update.manifest_path.as_str();
        if self.config.can_update_all(path)
            || (self.config.can_update_insecure(path) && update.insecure)
        {
            // unpinned requirements are only touched when pinning is enabled
            if update.is_pin() {
                return self.config.can_pin(path);
            }
            return true;
        }
        false
    }

    /// Group candidates according to `strategy`
    pub fn group(
        &self,
        strategy: GroupingStrategy,
        candidates: &[RequirementUpdate],
    ) -> Vec<UpdateUnit> {
        match strategy {
            GroupingStrategy::Sequential => self.sequential(candidates),
            GroupingStrategy::Initial => self
                .bundled(candidates, UnitKind::Initial, INITIAL_TITLE.to_string(), INITIAL_BRANCH.to_string())
                .into_iter()
                .collect(),
            GroupingStrategy::Scheduled(cadence) => self
                .bundled(
                    candidates,
                    UnitKind::Scheduled,
                    self.scheduled_title(cadence),
                    self.scheduled_branch(),
                )
                .into_iter()
                .collect(),
        }
    }

    /// Candidate edits keyed by grouping key, in first-seen order
    fn keyed(candidates: &[RequirementUpdate]) -> Vec<(String, Vec<&RequirementUpdate>)> {
        let mut groups: Vec<(String, Vec<&RequirementUpdate>)> = Vec::new();
        for update in candidates {
            let key = update.group_key();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, updates)) => updates.push(update),
                None => groups.push((key, vec![update])),
            }
        }
        groups
    }

    fn sequential(&self, candidates: &[RequirementUpdate]) -> Vec<UpdateUnit> {
        Self::keyed(candidates)
            .into_iter()
            .filter_map(|(_, updates)| {
                let updates: Vec<RequirementUpdate> = updates
                    .into_iter()
                    .filter(|u| self.should_update(u))
                    .cloned()
                    .collect();
                let first = updates.first()?;
                Some(UpdateUnit {
                    kind: UnitKind::Sequential,
                    title: sequential_title(first),
                    body: sequential_body(first, &updates),
                    branch: sequential_branch(first),
                    updates,
                })
            })
            .collect()
    }

    fn bundled(
        &self,
        candidates: &[RequirementUpdate],
        kind: UnitKind,
        title: String,
        branch: String,
    ) -> Option<UpdateUnit> {
        let updates: Vec<RequirementUpdate> = candidates
            .iter()
            .filter(|u| self.should_update(u))
            .cloned()
            .collect();
        if updates.is_empty() {
            return None;
        }
        Some(UpdateUnit {
            kind,
            body: bundled_body(kind, &updates),
            title,
            branch,
            updates,
        })
    }

    fn scheduled_title(&self, cadence: Cadence) -> String {
        match cadence {
            Cadence::Daily => format!(
                "Scheduled daily dependency update on {}",
                self.now.format("%A").to_string().to_lowercase()
            ),
            Cadence::Weekly => format!(
                "Scheduled weekly dependency update for week {}",
                self.now.format("%U")
            ),
            Cadence::Biweekly => format!(
                "Scheduled biweekly dependency update for week {}",
                self.now.format("%U")
            ),
            Cadence::Monthly => format!(
                "Scheduled monthly dependency update for {}",
                self.now.format("%B")
            ),
        }
    }

    fn scheduled_branch(&self) -> String {
        format!("scheduled-update-{}", self.now.format("%m-%d-%Y"))
    }
}

/// Title of a sequential unit
fn sequential_title(update: &RequirementUpdate) -> String {
    if update.is_pin() {
        format!("Pin {} to latest version {}", update.key(), update.target)
    } else {
        format!("Update {} to {}", update.key(), update.target)
    }
}

/// Branch of a sequential unit
fn sequential_branch(update: &RequirementUpdate) -> String {
    match update.pinned_version() {
        Some(old) => format!("update-{}-{}-to-{}", update.key(), old, update.target),
        None => format!("pin-{}-{}", update.key(), update.target),
    }
}
