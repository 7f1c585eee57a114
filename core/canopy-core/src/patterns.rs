//! Compiled regex patterns for branch names and AI output.
//!
//! Compiled once on first use. Order of `ISSUE_PATTERNS` is significant:
//! the first pattern that yields a positive number wins.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Branch → Issue Regexes
// ═══════════════════════════════════════════════════════════════════════════════

pub static RE_ISSUE_DASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[^a-z0-9])issue-(\d+)").unwrap());
pub static RE_ISSUES_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[^a-z0-9])issues/(\d+)").unwrap());
pub static RE_HASH_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\d+)").unwrap());
pub static RE_GH_DASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[^a-z0-9])gh-(\d+)").unwrap());
pub static RE_JIRA_DASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[^a-z0-9])jira-(\d+)").unwrap());

pub static ISSUE_PATTERNS: Lazy<[&'static Regex; 5]> = Lazy::new(|| {
    [
        &*RE_ISSUE_DASH,
        &*RE_ISSUES_SLASH,
        &*RE_HASH_NUMBER,
        &*RE_GH_DASH,
        &*RE_JIRA_DASH,
    ]
});

/// Mainline branch names that never carry an issue reference.
pub const SKIP_BRANCHES: &[&str] = &[
    "main",
    "master",
    "develop",
    "staging",
    "production",
    "release",
    "hotfix",
];

// ═══════════════════════════════════════════════════════════════════════════════
// AI Output Rescue Regexes
// ═══════════════════════════════════════════════════════════════════════════════

pub static RE_ISSUE_NUMBER_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)"?issue_?number"?\s*[:=]\s*(\d+)"#).unwrap());
pub static RE_BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*#?(\d+)\s*$").unwrap());
pub static RE_JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
