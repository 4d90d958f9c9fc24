//! Python package version model
//!
//! Implements the subset of PEP 440 needed to order releases:
//! - Epoch: `1!2.0`
//! - Release segments: `1.2.3`
//! - Pre-releases: `1.0a1`, `1.0b2`, `1.0rc1` (with `alpha`/`beta`/`c`/`pre` aliases)
//! - Post-releases: `1.0.post1`, `1.0-1`
//! - Dev releases: `1.0.dev3`
//! - Local labels: `1.0+ubuntu.1`
//!
//! Ordering is dev < pre < final < post for the same release.

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^\s*v?
        (?:(?P<epoch>\d+)!)?
        (?P<release>\d+(?:\.\d+)*)
        (?P<pre>[-_.]?(?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)[-_.]?(?P<pre_n>\d+)?)?
        (?P<post>(?:-(?P<post_n1>\d+))|(?:[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>\d+)?))?
        (?P<dev>[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>\d+)?)?
        (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
        \s*$",
    )
    .unwrap()
});

/// Pre-release phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreKind {
    Alpha,
    Beta,
    ReleaseCandidate,
}

impl PreKind {
    fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "a" | "alpha" => PreKind::Alpha,
            "b" | "beta" => PreKind::Beta,
            _ => PreKind::ReleaseCandidate,
        }
    }
}

/// A parsed package version
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreKind, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Option<String>,
}

impl Version {
    /// Parse a version string, returning None if it is not a valid version
    pub fn parse(input: &str) -> Option<Self> {
        let caps = VERSION_RE.captures(input)?;

        let number = |name: &str| -> Option<u64> {
            caps.name(name).and_then(|m| m.as_str().parse().ok())
        };

        let epoch = number("epoch").unwrap_or(0);
        let release = caps
            .name("release")?
            .as_str()
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        let pre = caps
            .name("pre_l")
            .map(|label| (PreKind::from_label(label.as_str()), number("pre_n").unwrap_or(0)));

        let post = if caps.name("post").is_some() {
            Some(number("post_n1").or_else(|| number("post_n2")).unwrap_or(0))
        } else {
            None
        };

        let dev = caps
            .name("dev_l")
            .map(|_| number("dev_n").unwrap_or(0));

        let local = caps.name("local").map(|m| m.as_str().to_ascii_lowercase());

        Some(Self {
            raw: input.trim().to_string(),
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    /// The version exactly as it was written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Release segments (`1.2.3` -> `[1, 2, 3]`)
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// Version epoch, 0 when absent
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Major component
    pub fn major(&self) -> u64 {
        self.release.first().copied().unwrap_or(0)
    }

    /// Minor component, 0 when absent
    pub fn minor(&self) -> u64 {
        self.release.get(1).copied().unwrap_or(0)
    }

    /// Pre-releases and dev releases are both considered pre-releases
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// Whether this version carries a `.postN` segment
    pub fn is_postrelease(&self) -> bool {
        self.post.is_some()
    }

    /// Whether this version carries a `+local` label
    pub fn has_local(&self) -> bool {
        self.local.is_some()
    }

    /// Same version with the local label stripped
    pub fn without_local(&self) -> Self {
        let mut public = self.clone();
        if let Some(pos) = public.raw.find('+') {
            public.raw.truncate(pos);
        }
        public.local = None;
        public
    }

    /// Compare only epoch and release segments
    pub fn cmp_release(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_release(&self.release, &other.release))
    }

    fn pre_key(&self) -> (u8, u8, u64) {
        match (self.pre, self.post, self.dev) {
            // a bare dev release sorts before any pre-release of the same version
            (None, None, Some(_)) => (0, 0, 0),
            (Some((kind, n)), _, _) => (1, kind as u8, n),
            (None, _, _) => (2, 0, 0),
        }
    }

    fn post_key(&self) -> (u8, u64) {
        match self.post {
            None => (0, 0),
            Some(n) => (1, n),
        }
    }

    fn dev_key(&self) -> (u8, u64) {
        match self.dev {
            Some(n) => (0, n),
            None => (1, 0),
        }
    }
}

/// Compare release segments with implicit trailing zeros (`1.0 == 1.0.0`)
fn compare_release(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let pa = a.get(i).copied().unwrap_or(0);
        let pb = b.get(i).copied().unwrap_or(0);
        match pa.cmp(&pb) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn compare_local(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let split = |s: &str| -> Vec<String> {
                s.split(['.', '-', '_']).map(str::to_string).collect()
            };
            let (pa, pb) = (split(a), split(b));
            for (x, y) in pa.iter().zip(pb.iter()) {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    // numeric segments sort above alphanumeric ones
                    (Ok(_), Err(_)) => Ordering::Greater,
                    (Err(_), Ok(_)) => Ordering::Less,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            pa.len().cmp(&pb.len())
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_release(other)
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post_key().cmp(&other.post_key()))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| compare_local(&self.local, &other.local))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Compare two version strings, falling back to string order for invalid input
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (Version::parse(a), Version::parse(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        _ => a.cmp(b),
    }
}
