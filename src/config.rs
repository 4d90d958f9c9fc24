//! Runtime configuration
//!
//! A `Config` starts from defaults, is adjusted from the command line and is
//! then merged with the repository's `.reqbot.yml`:
//! - Global switches (`close_prs`, `pin`, `search`, `update`, ...)
//! - Per-path requirement entries overriding `pin` and `update`
//! - Schedule cadence for bundled scheduled runs

use crate::error::ConfigError;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Path of the repository configuration file
pub const CONFIG_FILE: &str = ".reqbot.yml";

/// Filename patterns searched when `search` is enabled
pub const DEFAULT_SEARCH_PATTERNS: [&str; 5] = [
    "requirements*.txt",
    "requirements/*.txt",
    "**/requirements/*.txt",
    "*.pip",
    "setup.cfg",
];

static SCHEDULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^every (day|month|(week|two weeks)( on (monday|tuesday|wednesday|thursday|friday|saturday|sunday))?)$",
    )
    .unwrap()
});

/// Which updates may be applied to a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPolicy")]
pub enum UpdatePolicy {
    /// Every outdated requirement
    All,
    /// Only requirements with a known advisory
    Insecure,
    /// Nothing
    Never,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPolicy {
    Flag(bool),
    Name(String),
}

impl TryFrom<RawPolicy> for UpdatePolicy {
    type Error = ConfigError;

    fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
        match raw {
            RawPolicy::Flag(true) => Ok(UpdatePolicy::All),
            RawPolicy::Flag(false) => Ok(UpdatePolicy::Never),
            RawPolicy::Name(name) => name.parse(),
        }
    }
}

impl std::str::FromStr for UpdatePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "true" => Ok(UpdatePolicy::All),
            "insecure" => Ok(UpdatePolicy::Insecure),
            "false" | "none" => Ok(UpdatePolicy::Never),
            _ => Err(ConfigError::InvalidUpdatePolicy {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdatePolicy::All => write!(f, "all"),
            UpdatePolicy::Insecure => write!(f, "insecure"),
            UpdatePolicy::Never => write!(f, "false"),
        }
    }
}

/// Bundling cadence of scheduled runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl Cadence {
    /// Interpret a schedule string such as `every week on monday`
    pub fn parse(schedule: &str) -> Option<Self> {
        let schedule = schedule.trim();
        let captures = SCHEDULE_RE.captures(schedule)?;
        let unit = captures.get(1)?.as_str().to_lowercase();
        if unit == "day" {
            Some(Cadence::Daily)
        } else if unit == "month" {
            Some(Cadence::Monthly)
        } else if unit.starts_with("two weeks") {
            Some(Cadence::Biweekly)
        } else {
            Some(Cadence::Weekly)
        }
    }
}

/// Per-path overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementConfig {
    pub path: String,
    pub pin: Option<bool>,
    pub update: Option<UpdatePolicy>,
}

impl RequirementConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            pin: None,
            update: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RequirementOptions {
    pin: Option<bool>,
    update: Option<UpdatePolicy>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRequirement {
    Path(String),
    Detailed(BTreeMap<String, Option<RequirementOptions>>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(item) if item.trim().is_empty() => Vec::new(),
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Contents of `.reqbot.yml`; absent keys keep the current value
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    close_prs: Option<bool>,
    branch: Option<String>,
    branch_prefix: Option<String>,
    pr_prefix: Option<String>,
    pin: Option<bool>,
    search: Option<bool>,
    update: Option<UpdatePolicy>,
    requirements: Option<Vec<RawRequirement>>,
    schedule: Option<String>,
    label_prs: Option<String>,
    assignees: Option<OneOrMany>,
    update_hashes: Option<bool>,
    search_patterns: Option<Vec<String>>,
}

impl RepoConfig {
    /// Parse the configuration file; an empty document yields `None`
    pub fn parse(content: &str) -> Result<Option<Self>, ConfigError> {
        serde_yaml::from_str::<Option<RepoConfig>>(content).map_err(|e| {
            ConfigError::InvalidFile {
                content: content.to_string(),
                message: e.to_string(),
            }
        })
    }
}

/// Effective configuration of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Close superseded change-requests
    pub close_prs: bool,
    /// Base branch; `None` until resolved from the provider
    pub branch: Option<String>,
    pub branch_prefix: String,
    pub pr_prefix: String,
    /// Pin unpinned requirements
    pub pin: bool,
    /// Search the repository tree for manifests
    pub search: bool,
    pub update: UpdatePolicy,
    pub requirements: Vec<RequirementConfig>,
    pub schedule: String,
    pub label_prs: Option<String>,
    pub assignees: Vec<String>,
    pub update_hashes: bool,
    pub search_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            close_prs: true,
            branch: None,
            branch_prefix: "reqbot-".to_string(),
            pr_prefix: String::new(),
            pin: true,
            search: true,
            update: UpdatePolicy::All,
            requirements: Vec::new(),
            schedule: String::new(),
            label_prs: None,
            assignees: Vec::new(),
            update_hashes: true,
            search_patterns: DEFAULT_SEARCH_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Merge a repository configuration over the current values
    pub fn merge(&mut self, repo: RepoConfig) {
        if let Some(close_prs) = repo.close_prs {
            self.close_prs = close_prs;
        }
        if let Some(branch) = repo.branch.filter(|b| !b.trim().is_empty()) {
            self.branch = Some(branch);
        }
        if let Some(prefix) = repo.branch_prefix {
            self.branch_prefix = prefix;
        }
        if let Some(prefix) = repo.pr_prefix {
            self.pr_prefix = prefix;
        }
        if let Some(pin) = repo.pin {
            self.pin = pin;
        }
        if let Some(search) = repo.search {
            self.search = search;
        }
        if let Some(update) = repo.update {
            self.update = update;
        }
        if let Some(requirements) = repo.requirements {
            self.requirements = requirements
                .into_iter()
                .flat_map(|item| match item {
                    RawRequirement::Path(path) => vec![RequirementConfig::new(path)],
                    RawRequirement::Detailed(entries) => entries
                        .into_iter()
                        .map(|(path, options)| {
                            let options = options.unwrap_or_default();
                            RequirementConfig {
                                path,
                                pin: options.pin,
                                update: options.update,
                            }
                        })
                        .collect(),
                })
                .collect();
        }
        if let Some(schedule) = repo.schedule {
            self.schedule = schedule;
        }
        if let Some(label) = repo.label_prs {
            self.label_prs = Some(label).filter(|l| !l.trim().is_empty());
        }
        if let Some(assignees) = repo.assignees {
            self.assignees = assignees.into();
        }
        if let Some(update_hashes) = repo.update_hashes {
            self.update_hashes = update_hashes;
        }
        if let Some(patterns) = repo.search_patterns {
            self.search_patterns = patterns;
        }
    }

    /// Parse `.reqbot.yml` content and merge it
    pub fn apply_file(&mut self, content: &str) -> Result<(), ConfigError> {
        if let Some(repo) = RepoConfig::parse(content)? {
            self.merge(repo);
        }
        Ok(())
    }

    /// Base branch, empty until resolved
    pub fn base_branch(&self) -> &str {
        self.branch.as_deref().unwrap_or_default()
    }

    fn entry(&self, path: &str) -> Option<&RequirementConfig> {
        let path = path.trim_start_matches('/');
        self.requirements
            .iter()
            .find(|r| r.path.trim_start_matches('/') == path)
    }

    fn policy(&self, path: &str) -> UpdatePolicy {
        self.entry(path)
            .and_then(|r| r.update)
            .unwrap_or(self.update)
    }

    /// All outdated requirements of `path` may be updated
    pub fn can_update_all(&self, path: &str) -> bool {
        self.policy(path) == UpdatePolicy::All
    }

    /// Insecure requirements of `path` may be updated
    pub fn can_update_insecure(&self, path: &str) -> bool {
        matches!(self.policy(path), UpdatePolicy::All | UpdatePolicy::Insecure)
    }

    /// Unpinned requirements of `path` may be pinned
    pub fn can_pin(&self, path: &str) -> bool {
        self.entry(path).and_then(|r| r.pin).unwrap_or(self.pin)
    }

    /// The configured schedule can be interpreted
    pub fn is_valid_schedule(&self) -> bool {
        Cadence::parse(&self.schedule).is_some()
    }

    /// Cadence of the configured schedule
    pub fn cadence(&self) -> Result<Cadence, ConfigError> {
        Cadence::parse(&self.schedule).ok_or_else(|| ConfigError::UnsupportedSchedule {
            schedule: self.schedule.clone(),
        })
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "branch={} close_prs={} pin={} search={} update={} schedule='{}' requirements={}",
            self.base_branch(),
            self.close_prs,
            self.pin,
            self.search,
            self.update,
            self.schedule,
            self.requirements.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.close_prs);
        assert!(config.pin);
        assert!(config.search);
        assert_eq!(config.update, UpdatePolicy::All);
        assert_eq!(config.branch_prefix, "reqbot-");
        assert!(config.pr_prefix.is_empty());
        assert!(!config.is_valid_schedule());
    }

    #[test]
    fn test_apply_file() {
        let mut config = Config::default();
        config
            .apply_file(
                "close_prs: false\nbranch: develop\npr_prefix: \"[deps]\"\nupdate: insecure\nlabel_prs: update\nassignees: alice\nschedule: every week on monday\n",
            )
            .unwrap();
        assert!(!config.close_prs);
        assert_eq!(config.base_branch(), "develop");
        assert_eq!(config.pr_prefix, "[deps]");
        assert_eq!(config.update, UpdatePolicy::Insecure);
        assert_eq!(config.label_prs.as_deref(), Some("update"));
        assert_eq!(config.assignees, vec!["alice"]);
        assert_eq!(config.cadence().unwrap(), Cadence::Weekly);
    }

    #[test]
    fn test_update_false() {
        let mut config = Config::default();
        config.apply_file("update: false\n").unwrap();
        assert_eq!(config.update, UpdatePolicy::Never);
        assert!(!config.can_update_all("requirements.txt"));
        assert!(!config.can_update_insecure("requirements.txt"));
    }

    #[test]
    fn test_invalid_update_value() {
        let mut config = Config::default();
        assert!(config.apply_file("update: sometimes\n").is_err());
    }

    #[test]
    fn test_requirement_entries() {
        let mut config = Config::default();
        config
            .apply_file(
                "pin: true\nrequirements:\n  - requirements/base.txt\n  - requirements/dev.txt:\n      pin: false\n      update: insecure\n",
            )
            .unwrap();
        assert_eq!(config.requirements.len(), 2);
        assert!(config.can_pin("requirements/base.txt"));
        assert!(!config.can_pin("requirements/dev.txt"));
        assert!(!config.can_update_all("/requirements/dev.txt"));
        assert!(config.can_update_insecure("requirements/dev.txt"));
        assert!(config.can_update_all("other.txt"));
    }

    #[test]
    fn test_assignee_list() {
        let mut config = Config::default();
        config.apply_file("assignees:\n  - alice\n  - bob\n").unwrap();
        assert_eq!(config.assignees, vec!["alice", "bob"]);
    }

    #[test]
    fn test_empty_file_keeps_defaults() {
        let mut config = Config::default();
        config.apply_file("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_malformed_yaml() {
        let mut config = Config::default();
        let err = config.apply_file("close_prs: [true\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile { .. }));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_cadence_parsing() {
        assert_eq!(Cadence::parse("every day"), Some(Cadence::Daily));
        assert_eq!(Cadence::parse("every week"), Some(Cadence::Weekly));
        assert_eq!(Cadence::parse("every week on friday"), Some(Cadence::Weekly));
        assert_eq!(Cadence::parse("every two weeks"), Some(Cadence::Biweekly));
        assert_eq!(
            Cadence::parse("Every two weeks on Sunday"),
            Some(Cadence::Biweekly)
        );
        assert_eq!(Cadence::parse("every month"), Some(Cadence::Monthly));
        assert_eq!(Cadence::parse("every fortnight"), None);
        assert_eq!(Cadence::parse(""), None);
    }

    #[test]
    fn test_unsupported_schedule_error() {
        let config = Config {
            schedule: "hourly".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.cadence(),
            Err(ConfigError::UnsupportedSchedule { .. })
        ));
    }
}
