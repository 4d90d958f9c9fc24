//! Change-request (pull request / issue) model
//!
//! Classification is derived purely from the title text, so requests
//! opened by earlier runs can be recognised without any stored state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Title of the issue opened when the repository configuration is malformed
pub const CONFIG_ERROR_TITLE: &str = "Invalid .reqbot.yml detected";

/// State of a change-request on the hosting provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Open,
    Closed,
    Merged,
}

impl RequestState {
    /// Map a provider state string; GitLab reports `opened`
    pub fn from_provider(state: &str) -> Self {
        match state {
            "open" | "opened" => RequestState::Open,
            "merged" => RequestState::Merged,
            _ => RequestState::Closed,
        }
    }
}

/// Kind of change-request, derived from its title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Update,
    Security,
    Pin,
    Initial,
    Compile,
    Scheduled,
    ConfigError,
    Unknown,
}

impl RequestKind {
    /// Classify a title; the first matching pattern wins
    pub fn classify(title: &str) -> Self {
        if title.contains("Update ") {
            RequestKind::Update
        } else if title.contains("Security") {
            RequestKind::Security
        } else if title.contains("Pin") {
            RequestKind::Pin
        } else if title.contains("Initial") {
            RequestKind::Initial
        } else if title.contains("Compile") {
            RequestKind::Compile
        } else if title.contains("Scheduled") {
            RequestKind::Scheduled
        } else if title.contains("Invalid .reqbot.yml") {
            RequestKind::ConfigError
        } else {
            RequestKind::Unknown
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestKind::Update => "update",
            RequestKind::Security => "security",
            RequestKind::Pin => "pin",
            RequestKind::Initial => "initial",
            RequestKind::Compile => "compile",
            RequestKind::Scheduled => "scheduled",
            RequestKind::ConfigError => "config",
            RequestKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// A pull request or issue on the hosting provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
    /// Provider-assigned number
    pub number: u64,
    pub title: String,
    pub url: String,
    pub state: RequestState,
    /// Source branch, None for issues
    pub branch: Option<String>,
    /// Whether this is an issue rather than a pull request
    pub is_issue: bool,
}

impl ChangeRequest {
    /// Create an open pull request record
    pub fn new(number: u64, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            url: url.into(),
            state: RequestState::Open,
            branch: None,
            is_issue: false,
        }
    }

    pub fn with_state(mut self, state: RequestState) -> Self {
        self.state = state;
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn as_issue(mut self) -> Self {
        self.is_issue = true;
        self
    }

    pub fn kind(&self) -> RequestKind {
        RequestKind::classify(&self.title)
    }

    pub fn is_open(&self) -> bool {
        self.state == RequestState::Open
    }

    pub fn is_update(&self) -> bool {
        self.kind() == RequestKind::Update
    }

    pub fn is_initial(&self) -> bool {
        self.kind() == RequestKind::Initial
    }

    pub fn is_scheduled(&self) -> bool {
        self.kind() == RequestKind::Scheduled
    }

    /// Whether the title looks like something this tool opened
    pub fn is_recognised(&self) -> bool {
        self.kind() != RequestKind::Unknown
    }

    /// Title with `"<prefix> "` removed
    pub fn canonical_title(&self, prefix: &str) -> String {
        canonical_title(&self.title, prefix)
    }

    /// Requirement key named by the title (second word of the canonical title).
    ///
    /// Custom title templates can break this; it mirrors how titles are rendered.
    pub fn requirement_key(&self, prefix: &str) -> Option<String> {
        if self.is_initial() {
            return None;
        }
        self.canonical_title(prefix)
            .split(' ')
            .nth(1)
            .map(|word| word.to_lowercase())
    }
}

impl PartialEq for ChangeRequest {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
    }
}

impl Eq for ChangeRequest {}

/// Strip an organisational prefix from a title
pub fn canonical_title(title: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        title.to_string()
    } else {
        title.replace(&format!("{} ", prefix), "")
    }
}

/// Prepend an organisational prefix to a title
pub fn prefixed_title(title: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        title.to_string()
    } else {
        format!("{} {}", prefix, title)
    }
}
