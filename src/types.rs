//! Core types for mergeq

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Repository owner (user or organization)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Owner {
    /// Numeric account id, used for entitlement lookups
    pub id: u64,
    /// Account login, used in human-readable messages
    pub login: String,
}

/// Immutable identity of a pull request at a given head commit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PullRequestRef {
    /// Repository owner
    pub owner: Owner,
    /// Repository name
    pub repo: String,
    /// PR number
    pub number: u64,
    /// Head commit ID
    pub head_sha: String,
    /// Target (base) branch name
    pub base_ref: String,
}

impl PullRequestRef {
    /// `owner/repo` form of the repository
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner.login, self.repo)
    }
}

impl std::fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner.login, self.repo, self.number)
    }
}

/// PR lifecycle state as reported by the platform
///
/// Merged pull requests are `Closed` with [`PullSnapshot::merged`] set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    /// PR is open
    Open,
    /// PR was closed (merged or not)
    Closed,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Mergeability as computed by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeableState {
    /// Merge conflict with the base branch
    Dirty,
    /// Platform has not computed mergeability yet
    Unknown,
    /// Head branch is missing commits from the base branch
    Behind,
    /// Ready to merge
    Clean,
    /// Mergeable, with non-passing commit statuses
    Unstable,
    /// Mergeable, with pre-receive hooks
    HasHooks,
    /// Blocked by branch protection
    Blocked,
}

/// Live snapshot of a pull request, fetched through the VCS gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct PullSnapshot {
    /// Identity of the pull request
    pub pull: PullRequestRef,
    /// PR title
    pub title: String,
    /// PR body/description
    #[serde(default)]
    pub body: Option<String>,
    /// Open or closed
    pub state: PrState,
    /// Whether PR is a draft
    #[serde(default)]
    pub is_draft: bool,
    /// Whether PR has been merged
    #[serde(default)]
    pub merged: bool,
    /// Login of the account that merged the PR
    #[serde(default)]
    pub merged_by: Option<String>,
    /// SHA of the merge commit
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    /// Mergeability computed by the platform
    pub mergeable_state: MergeableState,
    /// Whether the platform can rebase this PR
    #[serde(default = "default_true")]
    pub rebaseable: bool,
    /// Number of changed files
    #[serde(default)]
    pub changed_files: u64,
    /// Whether a protected workflow definition file is modified
    #[serde(default)]
    pub workflow_changed: bool,
}

const fn default_true() -> bool {
    true
}

impl PullSnapshot {
    /// PR number
    pub const fn number(&self) -> u64 {
        self.pull.number
    }

    /// Whether the PR is closed (merged or not)
    pub fn is_closed(&self) -> bool {
        self.state == PrState::Closed
    }
}

/// Live state of a single CI check run or commit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Terminated successfully (success, neutral, skipped)
    Success,
    /// Terminated unsuccessfully (failure, cancelled, timed out, ...)
    Failure,
    /// Still running or queued
    Pending,
    /// Reported without a usable value
    Unknown,
}

impl CheckStatus {
    /// Map a check run `status`/`conclusion` pair to a check status
    ///
    /// Anything not `completed` is pending; completed runs without a
    /// conclusion carry no terminal value.
    pub fn from_check_run(status: &str, conclusion: Option<&str>) -> Self {
        if status != "completed" {
            return Self::Pending;
        }
        match conclusion {
            Some("success" | "neutral" | "skipped") => Self::Success,
            Some(_) => Self::Failure,
            None => Self::Unknown,
        }
    }

    /// Map a legacy commit status `state` to a check status
    pub fn from_commit_state(state: &str) -> Self {
        match state {
            "success" => Self::Success,
            "failure" | "error" => Self::Failure,
            "pending" => Self::Pending,
            _ => Self::Unknown,
        }
    }

    /// Whether the check has reported a final result
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Pending => write!(f, "pending"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Check name to live state
pub type CheckStates = BTreeMap<String, CheckStatus>;

// =============================================================================
// Merge policy
// =============================================================================

/// Merge strategy/method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Squash all commits into one
    Squash,
    /// Create a merge commit
    Merge,
    /// Rebase commits onto base branch
    Rebase,
}

impl std::fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Squash => write!(f, "squash"),
            Self::Merge => write!(f, "merge"),
            Self::Rebase => write!(f, "rebase"),
        }
    }
}

/// Method used when `rebase` is configured but the PR cannot be rebased
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebaseFallback {
    /// Fall back to a merge commit
    Merge,
    /// Fall back to a squash merge
    Squash,
    /// Do not fall back, ask for manual action
    None,
}

/// How a pull request is brought up to date with its base branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrictMethod {
    /// Rewrite the head branch by rebasing it
    Rebase,
    /// Merge the base branch into the head branch
    Merge,
}

impl std::fmt::Display for StrictMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rebase => write!(f, "rebase"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

/// Base-branch freshness policy
///
/// Legacy spellings are normalized into one of these variants when the
/// policy is loaded (see [`crate::config`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrictMode {
    /// No freshness requirement
    Disabled,
    /// Must be up to date before merge, independent of queue position
    Continuous,
    /// Same freshness requirement as `Continuous`
    FastTrack,
    /// Freshness and mergeability gated on being first in the queue
    Ordered,
}

impl StrictMode {
    /// Whether the PR must be up to date with its base branch
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Whether status titles report the queue position
    pub const fn reports_position(self) -> bool {
        matches!(self, Self::FastTrack | Self::Ordered)
    }
}

impl std::fmt::Display for StrictMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Continuous => write!(f, "continuous"),
            Self::FastTrack => write!(f, "fasttrack"),
            Self::Ordered => write!(f, "ordered"),
        }
    }
}

/// Commit message selection for merges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitMessageMode {
    /// Platform default, unless the body has a `Commit Message` section
    #[serde(rename = "default")]
    Default,
    /// PR title (with number) and body
    #[serde(rename = "title+body")]
    TitleAndBody,
}

/// Queue priority weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u32);

impl Priority {
    /// `low` alias
    pub const LOW: Self = Self(1000);
    /// `medium` alias, the default
    pub const MEDIUM: Self = Self(2000);
    /// `high` alias
    pub const HIGH: Self = Self(3000);
    /// Highest accepted custom value
    pub const MAX: Self = Self(10_000);

    /// Resolve a named alias
    pub fn from_alias(name: &str) -> Option<Self> {
        match name {
            "low" => Some(Self::LOW),
            "medium" => Some(Self::MEDIUM),
            "high" => Some(Self::HIGH),
            _ => None,
        }
    }

    /// Alias name if this value matches one
    pub const fn alias(self) -> Option<&'static str> {
        match self.0 {
            1000 => Some("low"),
            2000 => Some("medium"),
            3000 => Some("high"),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.alias() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Per-pull merge policy snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeConfig {
    /// Merge method
    pub method: MergeMethod,
    /// Fallback when `method` is rebase and the PR is not rebaseable
    pub rebase_fallback: RebaseFallback,
    /// Base-branch freshness policy
    pub strict: StrictMode,
    /// How to update the head branch
    pub strict_method: StrictMethod,
    /// Queue priority
    pub priority: Priority,
    /// Legacy alias of `update_bot_account`
    pub bot_account: Option<String>,
    /// Identity used to update branches
    pub update_bot_account: Option<String>,
    /// Identity used to merge
    pub merge_bot_account: Option<String>,
    /// Commit message selection
    pub commit_message: CommitMessageMode,
}

impl MergeConfig {
    /// Identity acting on branch updates
    pub fn update_actor(&self) -> Option<&str> {
        self.update_bot_account
            .as_deref()
            .or(self.bot_account.as_deref())
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            method: MergeMethod::Merge,
            rebase_fallback: RebaseFallback::Merge,
            strict: StrictMode::Disabled,
            strict_method: StrictMethod::Merge,
            priority: Priority::MEDIUM,
            bot_account: None,
            update_bot_account: None,
            merge_bot_account: None,
            commit_message: CommitMessageMode::Default,
        }
    }
}
