//! Inline directives embedded in requirement comments
//!
//! Recognised forms (after the `reqbot:` marker, or the legacy `rq.filter:`):
//! - `reqbot: ignore` drops the line entirely
//! - `reqbot: >=1.4,<1.5` restricts candidate versions
//! - `reqbot: <2.0 until 2026-01-01` restricts until the given date
//! - `reqbot: update minor` / `reqbot: update major` caps update granularity
//!
//! Whole files opt out with `reqbot: ignore file` on one of their first two lines.

use crate::domain::SpecifierSet;
use chrono::{DateTime, NaiveDate, Utc};

/// Marker that introduces a directive
pub const DIRECTIVE_PREFIX: &str = "reqbot:";

/// Legacy marker that only ever carries a filter
pub const LEGACY_FILTER_PREFIX: &str = "rq.filter:";

/// Markers that ignore a whole manifest
pub const FILE_IGNORE_MARKERS: [&str; 2] = ["reqbot: ignore file", "reqbot:ignore file"];

/// Markers that ignore one requirement line
pub const LINE_IGNORE_MARKERS: [&str; 2] = ["reqbot: ignore", "reqbot:ignore"];

const UPDATE_CAP_MARKER: &str = "reqbot: update";

/// Granularity cap for `update major` / `update minor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateCap {
    /// Only propose updates that change the major component
    Major,
    /// Only propose updates that change the major or minor component
    Minor,
}

/// A directive attached to one requirement line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Restrict candidates to a specifier expression, optionally until a date
    Filter {
        expression: String,
        until: Option<NaiveDate>,
    },
    /// Cap the granularity of proposed updates
    Update(UpdateCap),
    /// A cap keyword that is neither `major` nor `minor`; blocks every update
    UnknownUpdate(String),
}

impl Directive {
    /// Extract the directive carried by a requirement line, if any
    pub fn from_line(line: &str) -> Option<Self> {
        if let Some(rest) = after_marker(line, LEGACY_FILTER_PREFIX) {
            let expression = strip_comment(rest);
            return (!expression.is_empty()).then(|| Directive::Filter {
                expression,
                until: None,
            });
        }

        if let Some(rest) = after_marker(line, UPDATE_CAP_MARKER) {
            let keyword = strip_comment(rest);
            return Some(match keyword.as_str() {
                "major" => Directive::Update(UpdateCap::Major),
                "minor" => Directive::Update(UpdateCap::Minor),
                _ => Directive::UnknownUpdate(keyword),
            });
        }

        let rest = after_marker(line, DIRECTIVE_PREFIX)?;
        let text = strip_comment(rest);
        if text.is_empty() {
            return None;
        }

        match text.split_once("until") {
            Some((expression, date)) => {
                let expression = expression.trim().to_string();
                match NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
                    Ok(until) => Some(Directive::Filter {
                        expression,
                        until: Some(until),
                    }),
                    // a malformed date keeps the filter active forever
                    Err(_) => Some(Directive::Filter {
                        expression,
                        until: None,
                    }),
                }
            }
            None => Some(Directive::Filter {
                expression: text,
                until: None,
            }),
        }
    }

    /// Filter specifiers in effect at `now`.
    ///
    /// None when this is not a filter, the filter has expired, or the
    /// expression does not parse into at least one specifier.
    pub fn effective_filter(&self, now: DateTime<Utc>) -> Option<SpecifierSet> {
        let Directive::Filter { expression, until } = self else {
            return None;
        };
        if let Some(until) = until {
            let deadline = until.and_hms_opt(0, 0, 0)?.and_utc();
            if deadline < now {
                return None;
            }
        }
        SpecifierSet::parse(expression).filter(|set| !set.is_empty())
    }

    /// Granularity cap, if this is an update directive
    pub fn update_cap(&self) -> Option<UpdateCap> {
        match self {
            Directive::Update(cap) => Some(*cap),
            _ => None,
        }
    }

    /// Whether this directive caps update granularity at all
    pub fn restricts_updates(&self) -> bool {
        matches!(self, Directive::Update(_) | Directive::UnknownUpdate(_))
    }
}

/// True if the line carries a line-level ignore marker
pub fn is_ignored_line(line: &str) -> bool {
    LINE_IGNORE_MARKERS.iter().any(|m| line.contains(m))
}

/// True if one of the first two lines carries the whole-file ignore marker
pub fn is_ignored_file(content: &str) -> bool {
    content
        .lines()
        .take(2)
        .any(|line| FILE_IGNORE_MARKERS.iter().any(|m| line.contains(m)))
}

fn after_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.split_once(marker).map(|(_, rest)| rest)
}

fn strip_comment(text: &str) -> String {
    text.trim()
        .split('#')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_legacy_filter() {
        let directive = Directive::from_line("Django # rq.filter: >=1.4,<1.5").unwrap();
        assert_eq!(
            directive,
            Directive::Filter {
                expression: ">=1.4,<1.5".to_string(),
                until: None
            }
        );
        let filter = directive.effective_filter(now()).unwrap();
        assert_eq!(filter.to_string(), ">=1.4,<1.5");
    }

    #[test]
    fn test_filter_with_trailing_comment() {
        let directive = Directive::from_line("flask # reqbot: <2.0 # pinned for py2").unwrap();
        assert_eq!(
            directive.effective_filter(now()).unwrap().to_string(),
            "<2.0"
        );
    }

    #[test]
    fn test_filter_until_future_date_is_active() {
        let directive = Directive::from_line("requests # reqbot: <3.0 until 2026-12-31").unwrap();
        assert!(directive.effective_filter(now()).is_some());
    }

    #[test]
    fn test_filter_until_past_date_is_expired() {
        let directive = Directive::from_line("requests # reqbot: <3.0 until 2025-12-31").unwrap();
        assert!(directive.effective_filter(now()).is_none());
    }

    #[test]
    fn test_filter_until_malformed_date_stays_active() {
        let directive = Directive::from_line("requests # reqbot: <3.0 until someday").unwrap();
        assert!(directive.effective_filter(now()).is_some());
    }

    #[test]
    fn test_malformed_filter_is_no_filter() {
        let directive = Directive::from_line("requests # reqbot: whatever").unwrap();
        assert!(directive.effective_filter(now()).is_none());
    }

    #[test]
    fn test_update_caps() {
        let major = Directive::from_line("django==1.0 # reqbot: update major").unwrap();
        assert_eq!(major.update_cap(), Some(UpdateCap::Major));
        assert!(major.effective_filter(now()).is_none());

        let minor = Directive::from_line("django==1.0 # reqbot: update minor").unwrap();
        assert_eq!(minor.update_cap(), Some(UpdateCap::Minor));

        let other = Directive::from_line("django==1.0 # reqbot: update patch").unwrap();
        assert!(other.restricts_updates());
        assert_eq!(other.update_cap(), None);
    }

    #[test]
    fn test_no_directive() {
        assert!(Directive::from_line("django==1.0 # just a comment").is_none());
    }

    #[test]
    fn test_ignore_markers() {
        assert!(is_ignored_line("django==1.0 # reqbot: ignore"));
        assert!(is_ignored_line("django==1.0 #reqbot:ignore"));
        assert!(!is_ignored_line("django==1.0"));
    }

    #[test]
    fn test_ignore_file_only_first_two_lines() {
        assert!(is_ignored_file("# reqbot: ignore file\ndjango==1.0\n"));
        assert!(is_ignored_file("# header\n#reqbot:ignore file\ndjango==1.0\n"));
        assert!(!is_ignored_file("# a\n# b\n# reqbot: ignore file\n"));
    }
}
