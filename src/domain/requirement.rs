//! Requirement model
//!
//! One declared dependency occurrence, parsed from a manifest line:
//! - Name, canonical key and extras
//! - Version specifiers (`==1.2`, `>=1.0,<2.0`, `~=1.4`)
//! - Inline directive (filter, `until` expiry, update cap)
//! - Attached `--hash` pins
//!
//! Classification and target computation are pure functions of the
//! declaration, the package's released versions and an injected clock.

use crate::domain::{Directive, FileType, Operator, PackageVersions, SpecifierSet, UpdateCap, Version};
use crate::error::ParseError;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[([^\]]*)\])?\s*(.*?)\s*$")
        .unwrap()
});
static HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--hash[=\s]+([A-Za-z0-9]+:[A-Za-z0-9+/=_-]+)").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|\s)#.*$").unwrap());
static CONTINUATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\\r?\n").unwrap());

/// One parsed dependency declaration
#[derive(Debug, Clone)]
pub struct Requirement {
    /// Name as written
    pub name: String,
    /// Lowercased name, the canonical identity
    pub key: String,
    /// Declared version constraints
    pub specs: SpecifierSet,
    /// Optional feature tags, in declaration order
    pub extras: Vec<String>,
    /// Verbatim declaration text, including continuation lines and comments
    pub source_line: String,
    /// 1-based line number of the declaration's first line
    pub line_number: usize,
    /// Directive carried in the trailing comment
    pub directive: Option<Directive>,
    /// Grammar that produced this requirement
    pub file_type: FileType,
    /// Integrity hashes (`sha256:<digest>`) attached to the declaration
    pub hashes: Vec<String>,
    /// Private index in effect for this declaration
    pub index_url: Option<String>,
    /// Section the declaration lives in (Pipfile `packages`, lockfile `default`, ...)
    pub section: Option<String>,
    /// Change-request this requirement was committed to during the run
    pub change_request: Option<u64>,
}

/// Result of evaluating a requirement against released versions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Version currently in effect
    pub current: Option<String>,
    /// Highest version the requirement may move to
    pub target: Option<String>,
    /// Whether an update should be proposed
    pub needs_update: bool,
}

impl Requirement {
    /// Parse a declaration line.
    ///
    /// `line` is the verbatim text; continuation lines (trailing backslash)
    /// are joined for parsing but kept intact in `source_line`.
    pub fn parse(line: &str, line_number: usize, file_type: FileType) -> Result<Self, ParseError> {
        let joined = CONTINUATION_RE.replace_all(line, " ");

        let hashes: Vec<String> = HASH_RE
            .captures_iter(&joined)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();
        let without_hashes = HASH_RE.replace_all(&joined, " ");
        let without_comment = COMMENT_RE.replace(&without_hashes, "");
        let declaration = without_comment
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();

        if declaration.is_empty() {
            return Err(ParseError::Empty);
        }
        if declaration.starts_with('-')
            || declaration.contains("://")
            || declaration.contains(" @ ")
            || declaration.starts_with('.')
            || declaration.starts_with('/')
        {
            return Err(ParseError::Unsupported {
                line: line.to_string(),
            });
        }

        let caps = NAME_RE
            .captures(declaration)
            .ok_or_else(|| ParseError::InvalidName {
                line: line.to_string(),
            })?;
        let name = caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| ParseError::InvalidName {
                line: line.to_string(),
            })?;
        let extras = caps
            .get(2)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let raw_specs = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        let raw_specs = raw_specs
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(raw_specs);
        let specs = SpecifierSet::parse(raw_specs).ok_or_else(|| ParseError::InvalidSpecifier {
            line: line.to_string(),
            spec: raw_specs.to_string(),
        })?;

        Ok(Self::from_parts(name, specs, line, line_number, file_type)
            .with_extras(extras)
            .with_hashes(hashes))
    }

    /// Build a requirement from already-extracted parts (structured formats)
    pub fn from_parts(
        name: impl Into<String>,
        specs: SpecifierSet,
        source_line: impl Into<String>,
        line_number: usize,
        file_type: FileType,
    ) -> Self {
        let name = name.into();
        let source_line = source_line.into();
        Self {
            key: name.to_lowercase(),
            directive: Directive::from_line(&source_line),
            name,
            specs,
            extras: Vec::new(),
            source_line,
            line_number,
            file_type,
            hashes: Vec::new(),
            index_url: None,
            section: None,
            change_request: None,
        }
    }

    pub fn with_extras(mut self, extras: Vec<String>) -> Self {
        self.extras = extras;
        self
    }

    pub fn with_hashes(mut self, hashes: Vec<String>) -> Self {
        self.hashes = hashes;
        self
    }

    pub fn with_index_url(mut self, index_url: Option<String>) -> Self {
        self.index_url = index_url;
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Record the change-request this requirement ended up in
    pub fn attach_change_request(&mut self, number: u64) {
        self.change_request = Some(number);
    }

    /// Exactly one `==` specifier
    pub fn is_pinned(&self) -> bool {
        self.single_operator() == Some(Operator::Equal)
    }

    /// Exactly one `~=` specifier
    pub fn is_compatible(&self) -> bool {
        self.single_operator() == Some(Operator::Compatible)
    }

    /// Exactly one `>=` specifier
    pub fn is_open_ranged(&self) -> bool {
        self.single_operator() == Some(Operator::GreaterEqual)
    }

    /// At least one specifier, and not pinned
    pub fn is_ranged(&self) -> bool {
        !self.specs.is_empty() && !self.is_pinned()
    }

    /// No specifiers at all
    pub fn is_loose(&self) -> bool {
        self.specs.is_empty()
    }

    fn single_operator(&self) -> Option<Operator> {
        self.specs.single().map(|s| s.operator)
    }

    /// Version named by a pinned or compatible-release specifier
    pub fn declared_version(&self) -> Option<&str> {
        if self.is_pinned() || self.is_compatible() {
            self.specs.single().map(|s| s.version.as_str())
        } else {
            None
        }
    }

    /// Pre-releases are eligible only when the declaration opts in
    pub fn allows_prerelease(&self) -> bool {
        let pinned_pre = self.is_pinned()
            && self
                .declared_version()
                .and_then(Version::parse)
                .is_some_and(|v| v.is_prerelease());
        pinned_pre || self.specs.mentions_prerelease()
    }

    /// Filter specifiers from the inline directive, if active at `now`
    pub fn effective_filter(&self, now: DateTime<Utc>) -> Option<SpecifierSet> {
        self.directive.as_ref()?.effective_filter(now)
    }

    /// Name with extras, as it should be written back (`requests[security]`)
    pub fn full_name(&self) -> String {
        if self.extras.is_empty() {
            self.name.clone()
        } else {
            format!("{}[{}]", self.name, self.extras.join(","))
        }
    }

    /// Compute current version, target version and whether to update.
    ///
    /// `package` is None when the index does not know the package, which
    /// means no update is possible.
    pub fn evaluate(&self, package: Option<&PackageVersions>, now: DateTime<Utc>) -> Evaluation {
        let Some(package) = package else {
            return Evaluation::default();
        };
        let allow_pre = self.allows_prerelease();
        let filter = self.effective_filter(now).unwrap_or_default();

        let current = match self.declared_version() {
            Some(version) => Some(version.to_string()),
            None => package
                .latest_within(&self.specs.and(&filter), allow_pre)
                .map(|v| v.to_string()),
        };

        // the pin of a pinned requirement is the baseline, not a ceiling
        let constraints = if self.is_pinned() {
            filter
        } else {
            self.specs.and(&filter)
        };
        let target = if constraints.is_empty() {
            package.latest(allow_pre)
        } else {
            package.latest_within(&constraints, allow_pre)
        }
        .map(|v| v.to_string());

        let needs_update = match &target {
            None => false,
            Some(target) if self.is_loose() => self.cap_allows(None, target),
            Some(target) => match current.as_deref() {
                Some(current) => {
                    self.cap_allows(Some(current), target) && is_older(current, target)
                }
                None => false,
            },
        };

        Evaluation {
            current,
            target,
            needs_update,
        }
    }

    /// Apply the `update major` / `update minor` cap
    fn cap_allows(&self, current: Option<&str>, target: &str) -> bool {
        let Some(directive) = &self.directive else {
            return true;
        };
        if !directive.restricts_updates() {
            return true;
        }
        let Some(cap) = directive.update_cap() else {
            return false;
        };
        let (Some(current), Some(target)) = (current.and_then(Version::parse), Version::parse(target))
        else {
            return true;
        };
        match cap {
            UpdateCap::Major => current.major() < target.major(),
            UpdateCap::Minor => {
                current.major() < target.major() || current.minor() < target.minor()
            }
        }
    }
}

fn is_older(current: &str, target: &str) -> bool {
    match (Version::parse(current), Version::parse(target)) {
        (Some(c), Some(t)) => c < t,
        _ => false,
    }
}

impl PartialEq for Requirement {
    fn eq(&self, other: &Self) -> bool {
        let extras = |r: &Requirement| -> BTreeSet<String> { r.extras.iter().cloned().collect() };
        self.key == other.key && self.specs == other.specs && extras(self) == extras(other)
    }
}

impl Eq for Requirement {}
