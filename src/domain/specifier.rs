//! Version specifiers and specifier sets
//!
//! Handles the comparison operators used in Python requirement lines:
//! - Exact: `==1.2.3`, prefix match `==1.2.*`
//! - Exclusion: `!=1.2.3`
//! - Comparison: `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3`
//! - Compatible release: `~=1.2.3` (normalised to `>=1.2.3,<1.3.0`)
//! - Arbitrary equality: `===foobar`

use crate::domain::Version;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static SPECIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(~=|===|==|!=|<=|>=|<|>)\s*([^\s,;]+)\s*$").unwrap());

/// Comparison operator of a single specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterEqual,
    LessEqual,
    Greater,
    Less,
    Compatible,
    Arbitrary,
}

impl Operator {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(Operator::Equal),
            "!=" => Some(Operator::NotEqual),
            ">=" => Some(Operator::GreaterEqual),
            "<=" => Some(Operator::LessEqual),
            ">" => Some(Operator::Greater),
            "<" => Some(Operator::Less),
            "~=" => Some(Operator::Compatible),
            "===" => Some(Operator::Arbitrary),
            _ => None,
        }
    }

    /// The operator as written in a requirement line
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::GreaterEqual => ">=",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::Compatible => "~=",
            Operator::Arbitrary => "===",
        }
    }
}

/// A single `(operator, version)` constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Specifier {
    pub operator: Operator,
    /// Version text as written (may end in `.*` for prefix matches)
    pub version: String,
}

impl Specifier {
    /// Parse one specifier such as `>=1.0`
    pub fn parse(input: &str) -> Option<Self> {
        let caps = SPECIFIER_RE.captures(input)?;
        let operator = Operator::from_symbol(caps.get(1)?.as_str())?;
        let version = caps.get(2)?.as_str().to_string();

        let valid = match operator {
            Operator::Arbitrary => true,
            Operator::Equal | Operator::NotEqual => match version.strip_suffix(".*") {
                Some(prefix) => Version::parse(prefix).is_some(),
                None => Version::parse(&version).is_some(),
            },
            // ~= needs at least two release segments
            Operator::Compatible => {
                Version::parse(&version).is_some_and(|v| v.release().len() >= 2)
            }
            _ => Version::parse(&version).is_some(),
        };

        valid.then_some(Self { operator, version })
    }

    /// Construct a specifier from parts
    pub fn new(operator: Operator, version: impl Into<String>) -> Self {
        Self {
            operator,
            version: version.into(),
        }
    }

    /// Whether this is a `==X.*` prefix match
    pub fn is_wildcard(&self) -> bool {
        self.version.ends_with(".*")
    }

    /// Parsed version of this specifier, None for wildcards and arbitrary strings
    pub fn parsed_version(&self) -> Option<Version> {
        if self.is_wildcard() || self.operator == Operator::Arbitrary {
            return None;
        }
        Version::parse(&self.version)
    }

    /// Expand a compatible-release specifier into its `>=`/`<` pair.
    ///
    /// `~=1.2.3` becomes `>=1.2.3,<1.3.0`; `~=1.2` becomes `>=1.2,<2.0`.
    /// Any other specifier is returned unchanged.
    pub fn normalized(&self) -> Vec<Specifier> {
        if self.operator != Operator::Compatible {
            return vec![self.clone()];
        }
        let Some(version) = self.parsed_version() else {
            return vec![self.clone()];
        };

        let mut upper: Vec<u64> = version.release().to_vec();
        upper.pop();
        if let Some(last) = upper.last_mut() {
            *last += 1;
        }
        upper.push(0);

        let mut upper_text = upper
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".");
        if version.epoch() > 0 {
            upper_text = format!("{}!{}", version.epoch(), upper_text);
        }

        vec![
            Specifier::new(Operator::GreaterEqual, self.version.clone()),
            Specifier::new(Operator::Less, upper_text),
        ]
    }

    /// Check whether a candidate version satisfies this specifier
    pub fn contains(&self, candidate: &Version) -> bool {
        if self.operator == Operator::Arbitrary {
            return candidate.as_str().eq_ignore_ascii_case(&self.version);
        }

        if self.is_wildcard() {
            let matched = self.prefix_matches(candidate);
            return match self.operator {
                Operator::NotEqual => !matched,
                _ => matched,
            };
        }

        let Some(spec) = self.parsed_version() else {
            return false;
        };
        // local labels only participate when the specifier names one
        let candidate = if spec.has_local() {
            candidate.clone()
        } else {
            candidate.without_local()
        };

        match self.operator {
            Operator::Equal => candidate == spec,
            Operator::NotEqual => candidate != spec,
            Operator::GreaterEqual => candidate >= spec,
            Operator::LessEqual => candidate <= spec,
            Operator::Greater => {
                if candidate <= spec {
                    return false;
                }
                // >1.0 excludes 1.0.post1 unless the bound is itself a post-release
                !(candidate.is_postrelease()
                    && !spec.is_postrelease()
                    && candidate.cmp_release(&spec) == Ordering::Equal)
            }
            Operator::Less => {
                if candidate >= spec {
                    return false;
                }
                // <2.0 excludes 2.0a1 unless the bound is itself a pre-release
                !(candidate.is_prerelease()
                    && !spec.is_prerelease()
                    && candidate.cmp_release(&spec) == Ordering::Equal)
            }
            Operator::Compatible => self
                .normalized()
                .iter()
                .all(|s| s.contains(&candidate)),
            Operator::Arbitrary => false,
        }
    }

    fn prefix_matches(&self, candidate: &Version) -> bool {
        let Some(prefix) = self
            .version
            .strip_suffix(".*")
            .and_then(Version::parse)
        else {
            return false;
        };
        if prefix.epoch() != candidate.epoch() {
            return false;
        }
        prefix
            .release()
            .iter()
            .enumerate()
            .all(|(i, part)| candidate.release().get(i).copied().unwrap_or(0) == *part)
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator.symbol(), self.version)
    }
}

/// An ordered collection of specifiers that must all hold
#[derive(Debug, Clone, Default)]
pub struct SpecifierSet {
    specs: Vec<Specifier>,
}

impl SpecifierSet {
    /// Empty set (matches every version)
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma separated list like `>=1.0,<2.0`.
    ///
    /// Returns None if any member is malformed.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Some(Self::new());
        }
        let specs = trimmed
            .split(',')
            .map(Specifier::parse)
            .collect::<Option<Vec<_>>>()?;
        Some(Self { specs })
    }

    /// Build a set from already-parsed specifiers
    pub fn from_specs(specs: Vec<Specifier>) -> Self {
        Self { specs }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Specifier> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// The single specifier of a one-member set
    pub fn single(&self) -> Option<&Specifier> {
        match self.specs.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Intersection of two sets
    pub fn and(&self, other: &SpecifierSet) -> SpecifierSet {
        let mut specs = self.specs.clone();
        specs.extend(other.specs.iter().cloned());
        SpecifierSet { specs }
    }

    /// Copy with every `~=` expanded into its `>=`/`<` pair
    pub fn normalized(&self) -> SpecifierSet {
        SpecifierSet {
            specs: self.specs.iter().flat_map(|s| s.normalized()).collect(),
        }
    }

    /// Whether any member names a pre-release explicitly
    pub fn mentions_prerelease(&self) -> bool {
        self.specs
            .iter()
            .filter_map(|s| s.parsed_version())
            .any(|v| v.is_prerelease())
    }

    /// Check a candidate against every member.
    ///
    /// Pre-releases are rejected unless `allow_prerelease` is set.
    pub fn contains(&self, candidate: &Version, allow_prerelease: bool) -> bool {
        if candidate.is_prerelease() && !allow_prerelease {
            return false;
        }
        self.specs.iter().all(|s| s.contains(candidate))
    }

    /// Members rendered and sorted, used for order-independent equality
    fn canonical(&self) -> Vec<String> {
        let mut rendered: Vec<String> = self.specs.iter().map(|s| s.to_string()).collect();
        rendered.sort();
        rendered.dedup();
        rendered
    }
}

impl PartialEq for SpecifierSet {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for SpecifierSet {}

impl fmt::Display for SpecifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.specs.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", rendered.join(","))
    }
}
