//! Keep-a-Changelog parsing and validation.
//!
//! Parsing never fails: lines that cannot be understood are recorded and
//! reported by [`Changelog::validate`] together with every other violation.

use crate::utils::error::{ConvertError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_url};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;

pub const UNRELEASED: &str = "Unreleased";
pub const SECTION_NAMES: [&str; 6] = ["Added", "Changed", "Deprecated", "Removed", "Fixed", "Security"];

static SEMVER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-([0-9A-Za-z.-]+))?(?:\+[0-9A-Za-z.-]+)?$")
        .expect("semver pattern is valid")
});
static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"));
static HEADING_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^## \[([^\]]+)\](?:\s+-\s+(.+))?\s*$").expect("heading pattern is valid")
});
static LINK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[([^\]]+)\]:\s*(\S+)\s*$").expect("link pattern is valid"));

#[derive(Debug, Clone, PartialEq)]
pub struct Changelog {
    pub title: Option<String>,
    pub unreleased: Option<Release>,
    pub releases: Vec<Release>,
    pub links: Vec<Link>,
    problems: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub version: String,
    pub date: Option<String>,
    pub line: usize,
    pub sections: Vec<ChangeSection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSection {
    pub name: String,
    pub line: usize,
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub label: String,
    pub url: String,
    pub line: usize,
}

/// `MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]`; build metadata is ignored for ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl SemVer {
    pub fn parse(text: &str) -> Option<Self> {
        let caps = SEMVER_PATTERN.captures(text)?;
        Some(Self {
            major: caps[1].parse().ok()?,
            minor: caps[2].parse().ok()?,
            patch: caps[3].parse().ok()?,
            pre: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                // A pre-release sorts before its release.
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

/// Dot-separated identifiers left to right: numeric ones compare as numbers
/// and sort below alphanumeric ones; a shorter prefix sorts first.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        let ordering = match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match (x.parse::<u64>(), y.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => x.cmp(y),
            },
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

/// `YYYY-MM-DD` with zero-padded fields and a real calendar day.
pub fn parse_release_date(text: &str) -> Option<NaiveDate> {
    if !DATE_PATTERN.is_match(text) {
        return None;
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

impl Release {
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.entries.is_empty())
    }
}

impl Changelog {
    pub fn parse(text: &str) -> Self {
        let mut changelog = Self {
            title: None,
            unreleased: None,
            releases: Vec::new(),
            links: Vec::new(),
            problems: Vec::new(),
        };
        let mut current: Option<Release> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim_end();

            if let Some(title) = line.strip_prefix("# ") {
                if changelog.title.is_none() {
                    changelog.title = Some(title.trim().to_string());
                }
                continue;
            }

            if line.starts_with("## ") {
                changelog.finish(current.take());
                match HEADING_PATTERN.captures(line) {
                    Some(caps) => {
                        current = Some(Release {
                            version: caps[1].to_string(),
                            date: caps.get(2).map(|m| m.as_str().trim().to_string()),
                            line: line_no,
                            sections: Vec::new(),
                        })
                    }
                    None => changelog.problem(line_no, format!("unparseable release heading '{}'", line)),
                }
                continue;
            }

            if let Some(name) = line.strip_prefix("### ") {
                match current.as_mut() {
                    Some(release) => release.sections.push(ChangeSection {
                        name: name.trim().to_string(),
                        line: line_no,
                        entries: Vec::new(),
                    }),
                    None => changelog.problem(line_no, "section heading outside of a release"),
                }
                continue;
            }

            if let Some(caps) = LINK_PATTERN.captures(line) {
                changelog.finish(current.take());
                changelog.links.push(Link {
                    label: caps[1].to_string(),
                    url: caps[2].to_string(),
                    line: line_no,
                });
                continue;
            }

            let bullet = line
                .strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .or_else(|| (line == "-" || line == "*").then_some(""));
            if let Some(entry) = bullet {
                let in_release = current.is_some();
                let section = current.as_mut().and_then(|r| r.sections.last_mut());
                match section {
                    Some(section) => {
                        if let Err(e) = validate_non_empty_string("entry", entry) {
                            changelog.problem(line_no, e.to_string());
                        }
                        section.entries.push(entry.trim().to_string());
                    }
                    None if in_release => {
                        changelog.problem(line_no, "entry outside of a change section")
                    }
                    None => {}
                }
                continue;
            }

            // Indented continuation of the previous entry.
            if raw.starts_with(char::is_whitespace) && !line.trim().is_empty() {
                if let Some(entry) = current
                    .as_mut()
                    .and_then(|r| r.sections.last_mut())
                    .and_then(|s| s.entries.last_mut())
                {
                    entry.push(' ');
                    entry.push_str(line.trim());
                }
            }
        }

        changelog.finish(current);
        changelog
    }

    fn finish(&mut self, release: Option<Release>) {
        let Some(release) = release else { return };
        if release.version.eq_ignore_ascii_case(UNRELEASED) {
            if self.unreleased.is_some() {
                self.problem(release.line, "more than one Unreleased section");
            }
            if !self.releases.is_empty() {
                self.problem(release.line, "Unreleased must come before every release");
            }
            self.unreleased = Some(release);
        } else {
            self.releases.push(release);
        }
    }

    fn problem(&mut self, line: usize, message: impl Into<String>) {
        self.problems.push(format!("line {}: {}", line, message.into()));
    }

    pub fn link(&self, label: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.label.eq_ignore_ascii_case(label))
    }

    /// Every violation, in file order per check.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = self.problems.clone();

        if self.title.is_none() {
            problems.push("missing '# ' title line".to_string());
        }

        if let Some(unreleased) = &self.unreleased {
            check_sections(unreleased, &mut problems);
            if self.link(UNRELEASED).is_none() {
                problems.push(format!(
                    "line {}: no footer link for [{}]",
                    unreleased.line, UNRELEASED
                ));
            }
        }

        let mut seen = HashSet::new();
        let mut previous: Option<(&Release, Option<SemVer>, Option<NaiveDate>)> = None;

        for release in &self.releases {
            let at = release.line;
            let version = SemVer::parse(&release.version);
            if version.is_none() {
                problems.push(format!("line {}: '{}' is not a semantic version", at, release.version));
            }

            let date = match &release.date {
                Some(date) => match parse_release_date(date) {
                    Some(parsed) => Some(parsed),
                    None => {
                        problems.push(format!("line {}: '{}' is not a YYYY-MM-DD date", at, date));
                        None
                    }
                },
                None => {
                    problems.push(format!("line {}: release {} has no date", at, release.version));
                    None
                }
            };

            if !seen.insert(release.version.as_str()) {
                problems.push(format!("line {}: duplicate version {}", at, release.version));
            } else if let Some((prev, prev_version, _)) = &previous {
                if let (Some(prev_version), Some(version)) = (prev_version, &version) {
                    if version >= prev_version {
                        problems.push(format!(
                            "line {}: version {} is not lower than {} above it",
                            at, release.version, prev.version
                        ));
                    }
                }
            }

            if let Some((prev, _, Some(prev_date))) = &previous {
                if let Some(date) = date {
                    if date > *prev_date {
                        problems.push(format!(
                            "line {}: {} is dated after {} above it",
                            at, release.version, prev.version
                        ));
                    }
                }
            }

            if release.is_empty() {
                problems.push(format!("line {}: release {} lists no changes", at, release.version));
            }
            check_sections(release, &mut problems);

            if self.link(&release.version).is_none() {
                problems.push(format!("line {}: no footer link for [{}]", at, release.version));
            }

            previous = Some((release, version, date));
        }

        for link in &self.links {
            if let Err(e) = validate_url(&link.label, &link.url) {
                problems.push(format!("line {}: {}", link.line, e));
            }
        }

        problems
    }

    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConvertError::ChangelogError { problems })
        }
    }
}

fn check_sections(release: &Release, problems: &mut Vec<String>) {
    for section in &release.sections {
        if !SECTION_NAMES.contains(&section.name.as_str()) {
            problems.push(format!(
                "line {}: unknown section '{}' (expected one of {})",
                section.line,
                section.name,
                SECTION_NAMES.join(", ")
            ));
        }
    }
}
