//! Branch name → issue number resolution.
//!
//! Resolution order:
//!
//! 1. Memo: every resolution (including "no issue") is remembered per branch
//! 2. Skip list: mainline branches (`main`, `release/...`) never carry an issue
//! 3. Fast path: ordered regex patterns (`issue-N`, `issues/N`, `#N`, `gh-N`, `jira-N`)
//! 4. AI fallback: structured `{issueNumber: number|null}` request, with a
//!    regex rescue pass over malformed output
//!
//! [`IssueResolver::resolve_cached`] stops after step 3 and never touches the
//! network, so renderers can call it on every frame.

use crate::ai::{AiClient, AiRequest, OutputSchema};
use crate::config::{AiConfig, ReasoningEffort};
use crate::patterns::{
    ISSUE_PATTERNS, RE_BARE_NUMBER, RE_ISSUE_NUMBER_FIELD, RE_JSON_OBJECT, SKIP_BRANCHES,
};
use crate::shard::ShardedMap;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const ISSUE_MAX_OUTPUT_TOKENS: u32 = 32;

const ISSUE_INSTRUCTIONS: &str = "You extract issue tracker references from git branch names. \
Reply with JSON {\"issueNumber\": <positive integer or null>}. \
Only return a number when the branch name clearly references a ticket or issue; \
otherwise return null.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueResolution {
    Issue(u32),
    /// Resolved: the branch definitely has no issue reference.
    NoIssue,
}

impl IssueResolution {
    pub fn issue_number(&self) -> Option<u32> {
        match self {
            IssueResolution::Issue(n) => Some(*n),
            IssueResolution::NoIssue => None,
        }
    }
}

/// Fast-path matcher over a branch name.
pub trait BranchMatcher: Send + Sync {
    fn match_branch(&self, branch: &str) -> Option<u32>;
}

/// Ordered regex patterns; matches of `0` are discarded and the next pattern tried.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexMatcher;

impl BranchMatcher for RegexMatcher {
    fn match_branch(&self, branch: &str) -> Option<u32> {
        ISSUE_PATTERNS.iter().find_map(|re| {
            re.captures_iter(branch)
                .filter_map(|cap| cap[1].parse::<u32>().ok())
                .find(|n| *n > 0)
        })
    }
}

/// True for mainline branches and anything namespaced under one (`release/1.2`).
pub fn is_skip_branch(branch: &str) -> bool {
    let branch = branch.trim();
    SKIP_BRANCHES.iter().any(|name| {
        branch == *name
            || branch
                .strip_prefix(name)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

#[derive(Debug, Deserialize)]
struct IssueAnswer {
    #[serde(rename = "issueNumber", alias = "issue_number")]
    issue_number: Option<i64>,
}

fn positive(n: i64) -> Option<u32> {
    u32::try_from(n).ok().filter(|n| *n > 0)
}

/// Interprets model output. `None` means nothing usable could be recovered.
fn parse_issue_answer(text: &str) -> Option<IssueResolution> {
    let structured = serde_json::from_str::<IssueAnswer>(text.trim()).ok().or_else(|| {
        RE_JSON_OBJECT
            .find(text)
            .and_then(|m| serde_json::from_str::<IssueAnswer>(m.as_str()).ok())
    });
    if let Some(answer) = structured {
        return Some(match answer.issue_number.and_then(positive) {
            Some(n) => IssueResolution::Issue(n),
            None => IssueResolution::NoIssue,
        });
    }

    // Best-effort rescue of malformed output.
    [&*RE_ISSUE_NUMBER_FIELD, &*RE_BARE_NUMBER]
        .iter()
        .find_map(|re| re.captures(text)?[1].parse::<i64>().ok().and_then(positive))
        .map(IssueResolution::Issue)
}

pub struct IssueResolver {
    memo: ShardedMap<IssueResolution>,
    matcher: Box<dyn BranchMatcher>,
    ai: Option<Arc<dyn AiClient>>,
    reasoning_effort: ReasoningEffort,
}

impl IssueResolver {
    pub fn new(ai: Option<Arc<dyn AiClient>>, config: &AiConfig) -> Self {
        Self::with_matcher(ai, config, Box::new(RegexMatcher))
    }

    pub fn with_matcher(
        ai: Option<Arc<dyn AiClient>>,
        config: &AiConfig,
        matcher: Box<dyn BranchMatcher>,
    ) -> Self {
        Self {
            memo: ShardedMap::new(),
            matcher,
            ai,
            reasoning_effort: config.reasoning_effort,
        }
    }

    /// Non-blocking lookup: memo, skip list, then regex.
    ///
    /// `None` means *unresolved* (the async path may still find an issue),
    /// which is distinct from `Some(IssueResolution::NoIssue)`.
    pub fn resolve_cached(&self, branch: &str) -> Option<IssueResolution> {
        if let Some(hit) = self.memo.get(branch) {
            return Some(hit);
        }
        if is_skip_branch(branch) {
            return Some(self.remember(branch, IssueResolution::NoIssue));
        }
        self.matcher
            .match_branch(branch)
            .map(|n| self.remember(branch, IssueResolution::Issue(n)))
    }

    /// Full resolution including the AI fallback. Never fails.
    pub async fn resolve(&self, branch: &str) -> IssueResolution {
        if let Some(resolution) = self.resolve_cached(branch) {
            return resolution;
        }

        let Some(ai) = self.ai.as_ref() else {
            return self.remember(branch, IssueResolution::NoIssue);
        };

        let request = AiRequest {
            instructions: ISSUE_INSTRUCTIONS.to_string(),
            input: format!("Branch name: {}", branch),
            output_schema: issue_schema(),
            max_output_tokens: ISSUE_MAX_OUTPUT_TOKENS,
            reasoning_effort: self.reasoning_effort,
        };

        match ai.complete(&request).await {
            Ok(response) => {
                let resolution = response
                    .text()
                    .and_then(|text| parse_issue_answer(&text))
                    .unwrap_or_else(|| {
                        tracing::debug!(branch, "Unusable issue answer from AI");
                        IssueResolution::NoIssue
                    });
                self.remember(branch, resolution)
            }
            Err(err) => {
                // Not memoized: a later call may reach the endpoint.
                tracing::warn!(branch, error = %err, "Issue lookup via AI failed");
                IssueResolution::NoIssue
            }
        }
    }

    pub fn clear(&self) {
        self.memo.clear();
    }

    fn remember(&self, branch: &str, resolution: IssueResolution) -> IssueResolution {
        self.memo.insert(branch.to_string(), resolution);
        resolution
    }
}

fn issue_schema() -> OutputSchema {
    OutputSchema {
        name: "branch_issue".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "issueNumber": { "type": ["integer", "null"] }
            },
            "required": ["issueNumber"],
            "additionalProperties": false
        }),
    }
}
