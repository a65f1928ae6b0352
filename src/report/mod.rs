//! User-facing status reports
//!
//! Every outcome of the merge train is published as a
//! `(conclusion, title, summary)` triple. This module turns pull request
//! state, queue contents and entitlements into those triples.

mod failure;

pub use failure::MergeFailure;

use crate::condition::EvaluatedRule;
use crate::entitlement::{Entitlements, Feature};
use crate::queue::Queue;
use crate::types::{MergeableState, Owner, Priority, PullSnapshot, StrictMode};
use std::fmt::Write as _;

/// Terminal outcome of a status report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conclusion {
    /// Merged
    Success,
    /// Needs attention
    Failure,
    /// Left the train
    Cancelled,
    /// Blocked until someone acts
    ActionRequired,
}

impl std::fmt::Display for Conclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::ActionRequired => write!(f, "action_required"),
        }
    }
}

/// A `(conclusion, title, summary)` triple
///
/// `conclusion` is `None` while evaluation is still in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Terminal conclusion, if any
    pub conclusion: Option<Conclusion>,
    /// One-line title
    pub title: String,
    /// Markdown summary
    pub summary: String,
}

impl StatusReport {
    /// Report with a terminal conclusion
    pub fn new(conclusion: Conclusion, title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            conclusion: Some(conclusion),
            title: title.into(),
            summary: summary.into(),
        }
    }

    /// Report without a terminal conclusion
    pub fn pending(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            conclusion: None,
            title: title.into(),
            summary: summary.into(),
        }
    }

    /// Whether the report ends the pull request's stay in the train
    pub const fn is_terminal(&self) -> bool {
        self.conclusion.is_some()
    }
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.conclusion {
            Some(conclusion) => write!(f, "[{conclusion}] {}", self.title),
            None => write!(f, "[pending] {}", self.title),
        }
    }
}

/// English ordinal of a 1-based position (`1st`, `2nd`, `11th`, `23rd`)
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Builds status reports
pub struct StatusReporter<'a> {
    entitlements: &'a dyn Entitlements,
    bot_identities: &'a [String],
}

impl<'a> StatusReporter<'a> {
    /// Create a reporter
    ///
    /// `bot_identities` are the logins whose merges are reported as
    /// automatic.
    pub fn new(entitlements: &'a dyn Entitlements, bot_identities: &'a [String]) -> Self {
        Self {
            entitlements,
            bot_identities,
        }
    }

    /// Entitlements used by this reporter
    pub fn entitlements(&self) -> &'a dyn Entitlements {
        self.entitlements
    }

    /// Status derived from the pull request alone
    ///
    /// `Some` means the pull request must not go further down the train;
    /// `None` means evaluation continues elsewhere.
    pub fn merge_report(&self, pull: &PullSnapshot, strict: StrictMode) -> Option<StatusReport> {
        if pull.is_draft {
            return Some(StatusReport::pending("Draft flag needs to be removed", ""));
        }

        if pull.merged {
            let mode = match pull.merged_by.as_deref() {
                None => "somehow",
                Some(login) if self.bot_identities.iter().any(|b| b == login) => "automatically",
                Some(_) => "manually",
            };
            let sha = pull.merge_commit_sha.as_deref().unwrap_or("unknown");
            return Some(StatusReport::new(
                Conclusion::Success,
                format!("The pull request has been merged {mode}"),
                format!("The pull request has been merged {mode} at *{sha}*"),
            ));
        }

        if pull.is_closed() {
            return Some(StatusReport::new(
                Conclusion::Cancelled,
                "The pull request has been closed manually",
                "",
            ));
        }

        match pull.mergeable_state {
            MergeableState::Dirty => {
                return Some(StatusReport::new(
                    Conclusion::Cancelled,
                    "Merge conflict needs to be solved",
                    "",
                ));
            }
            MergeableState::Unknown => {
                return Some(StatusReport::new(
                    Conclusion::Failure,
                    "Pull request state reported as `unknown`",
                    "",
                ));
            }
            // Branch protection requires an up-to-date branch but strict is off
            MergeableState::Behind if strict == StrictMode::Disabled => {
                return Some(StatusReport::new(
                    Conclusion::Failure,
                    "Branch protection setting 'strict' conflicts with the merge configuration",
                    "",
                ));
            }
            _ => {}
        }

        if pull.workflow_changed {
            return Some(StatusReport::new(
                Conclusion::ActionRequired,
                "Pull request must be merged manually.",
                "Automated merges are not allowed on pull requests where `.github/workflows` is changed.\n<br />\nThis pull request must be merged manually.",
            ));
        }

        None
    }

    /// Markdown listing of the queue grouped by configured priority
    ///
    /// Empty when the queue is empty.
    pub fn queue_summary(&self, queue: &Queue, owner: &Owner) -> String {
        let entries = queue.list_ordered();
        if entries.is_empty() {
            return String::new();
        }

        let mut summary = String::from("\n\nThe following pull requests are queued:");
        let mut priorities_configured = false;

        for group in entries.chunk_by(|a, b| a.config.priority == b.config.priority) {
            let priority = group[0].config.priority;
            if priority != Priority::MEDIUM {
                priorities_configured = true;
            }
            let pulls = group
                .iter()
                .map(|e| format!("#{}", e.number()))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(summary, "\n* {pulls} (priority: {priority})");
        }

        if priorities_configured
            && !self
                .entitlements
                .has_feature(owner.id, Feature::PriorityQueues)
        {
            summary.push_str("\n\n⚠ *Ignoring merge priority*\n");
            summary.push_str(&self.entitlements.missing_feature_reason(&owner.login));
        }

        summary
    }

    /// Status of a strict-mode pull request around a base branch update
    ///
    /// With `need_update` the update is announced; otherwise it is reported
    /// done, followed by the rule checklist when a rule is supplied.
    pub fn strict_status(
        &self,
        queue: &Queue,
        owner: &Owner,
        need_update: bool,
        rule: Option<&EvaluatedRule>,
    ) -> StatusReport {
        let (title, mut summary) = if need_update {
            (
                "Base branch will be updated soon",
                String::from("The pull request base branch will be updated soon and then merged."),
            )
        } else {
            (
                "Base branch update done",
                String::from(
                    "The pull request has been automatically updated to follow its base branch and will be merged soon.",
                ),
            )
        };

        summary.push_str(&self.queue_summary(queue, owner));

        if !need_update && let Some(rule) = rule {
            push_checklist(&mut summary, rule);
        }

        StatusReport::pending(title, summary)
    }

    /// Status of a queued pull request waiting for its turn or its checks
    pub fn waiting_status(
        &self,
        queue: &Queue,
        number: u64,
        owner: &Owner,
        strict: StrictMode,
        is_behind: bool,
        rule: Option<&EvaluatedRule>,
    ) -> StatusReport {
        let mut summary = String::new();
        let title = if strict.reports_position() {
            if is_behind {
                summary.push_str("\nThe pull request base branch will be updated before being merged.");
            }
            match queue.position(number) {
                Some(position) => format!(
                    "The pull request is the {} in the queue to be merged",
                    ordinal(position + 1)
                ),
                None => "The pull request is queued to be merged".to_string(),
            }
        } else if strict.is_enabled() && is_behind {
            "The pull request will be updated with its base branch soon".to_string()
        } else {
            "The pull request will be merged soon".to_string()
        };

        summary.push_str(&self.queue_summary(queue, owner));
        if let Some(rule) = rule {
            push_checklist(&mut summary, rule);
        }

        StatusReport::pending(title, summary)
    }
}

fn push_checklist(summary: &mut String, rule: &EvaluatedRule) {
    summary.push_str("\n\nRequired conditions for merge:\n");
    for condition in &rule.conditions {
        let checked = if rule.is_missing(condition.as_ref()) { " " } else { "X" };
        let _ = write!(summary, "\n- [{checked}] `{condition}`");
    }
}
