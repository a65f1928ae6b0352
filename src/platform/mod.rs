//! VCS gateway
//!
//! Everything the merge train needs from the hosting platform goes through
//! [`PlatformService`]. Retries and rate limiting belong to implementations.

mod scenario;

pub use scenario::{
    Scenario, ScenarioCheckRun, ScenarioCommitStatus, ScenarioEntry, ScenarioPlatform,
    ScenarioRejection, ScenarioRule, ScenarioSubscription,
};

use crate::error::Result;
use crate::types::{CheckStates, MergeMethod, PullRequestRef, PullSnapshot, StrictMethod};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A merge to perform through the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Pull request to merge
    pub pull: PullRequestRef,
    /// Effective merge method
    pub method: MergeMethod,
    /// Commit title override
    pub commit_title: Option<String>,
    /// Commit message override
    pub commit_message: Option<String>,
    /// Identity performing the merge, if not the default one
    pub actor: Option<String>,
}

/// Platform service trait for the merge train
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Fresh snapshot of a pull request
    async fn get_pull(&self, pull: &PullRequestRef) -> Result<PullSnapshot>;

    /// Whether the head branch lacks commits of the base branch
    async fn is_behind(&self, pull: &PullRequestRef) -> Result<bool>;

    /// Whether new commits were pushed since the last evaluation
    async fn have_been_synchronized(&self, pull: &PullRequestRef) -> Result<bool>;

    /// Live check states keyed by check name
    async fn get_checks(&self, pull: &PullRequestRef) -> Result<CheckStates>;

    /// Check names required by the branch protection of `branch`
    async fn required_checks(&self, repository: &str, branch: &str) -> Result<Vec<String>>;

    /// Merge the base branch into the head branch through the platform API
    ///
    /// Fails with [`crate::error::Error::BranchUpdate`].
    async fn update_branch_with_api(&self, pull: &PullRequestRef) -> Result<()>;

    /// Rewrite the head branch with git, acting as `actor` when given
    ///
    /// Fails with [`crate::error::Error::BranchUpdate`].
    async fn rewrite_branch(
        &self,
        pull: &PullRequestRef,
        method: StrictMethod,
        actor: Option<&str>,
    ) -> Result<()>;

    /// Merge a pull request
    ///
    /// A refused merge fails with [`crate::error::Error::MergeRejected`].
    async fn merge_pr(&self, request: &MergeRequest) -> Result<()>;
}
