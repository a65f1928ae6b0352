//! Offline platform backed by a JSON scenario
//!
//! A scenario describes one pull request, the rest of its branch queue and
//! what the platform answers. Used by `mergeq simulate` to replay decisions
//! without network access.

use super::{MergeRequest, PlatformService};
use crate::condition::EvaluatedRule;
use crate::entitlement::{Subscription, SubscriptionSource};
use crate::error::{Error, Result};
use crate::queue::{Queue, QueueEntry};
use crate::types::{
    CheckStates, CheckStatus, MergeConfig, PrState, Priority, PullRequestRef, PullSnapshot,
    StrictMethod,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

const fn default_true() -> bool {
    true
}

/// Merge rule of a scenario, as condition strings
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioRule {
    /// Rule name
    pub name: String,
    /// Conditions of the rule
    pub conditions: Vec<String>,
    /// Conditions the pull request fails
    #[serde(default)]
    pub missing: Vec<String>,
}

impl ScenarioRule {
    /// Parse the rule conditions
    pub fn evaluate(&self) -> Result<EvaluatedRule> {
        let conditions: Vec<&str> = self.conditions.iter().map(String::as_str).collect();
        let missing: Vec<&str> = self.missing.iter().map(String::as_str).collect();
        EvaluatedRule::parse(&self.name, &conditions, &missing)
    }
}

/// Another pull request already waiting in the queue
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioEntry {
    /// Pull request number
    pub number: u64,
    /// Queue priority
    #[serde(default)]
    pub priority: Priority,
    /// When it was queued
    pub enqueued_at: DateTime<Utc>,
}

/// Subscription of the repository owner
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioSubscription {
    /// Whether the subscription is active
    #[serde(default)]
    pub active: bool,
    /// Enabled feature names
    #[serde(default)]
    pub features: Vec<String>,
}

/// A check run as the checks API reports it
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioCheckRun {
    /// Check name
    pub name: String,
    /// `queued`, `in_progress` or `completed`
    pub status: String,
    /// Set once completed
    #[serde(default)]
    pub conclusion: Option<String>,
}

/// A legacy commit status
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioCommitStatus {
    /// Status context
    pub context: String,
    /// `success`, `failure`, `error` or `pending`
    pub state: String,
}

/// A refused merge
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioRejection {
    /// HTTP status code
    pub status: u16,
    /// Platform message
    pub message: String,
}

/// One replayable situation
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// The pull request under evaluation
    pub pull: PullSnapshot,
    /// Whether its head branch is behind the base branch
    #[serde(default)]
    pub is_behind: bool,
    /// Whether new commits were pushed since the last evaluation
    #[serde(default)]
    pub synchronized: bool,
    /// Check states; absent means the platform could not report them
    #[serde(default)]
    pub checks: Option<CheckStates>,
    /// Raw check runs, folded into the check states
    #[serde(default)]
    pub check_runs: Vec<ScenarioCheckRun>,
    /// Raw commit statuses, folded into the check states
    #[serde(default)]
    pub commit_statuses: Vec<ScenarioCommitStatus>,
    /// Checks required by branch protection
    #[serde(default)]
    pub required_checks: Vec<String>,
    /// Merge rule
    #[serde(default)]
    pub rule: Option<ScenarioRule>,
    /// Whether the merge rule matches; `false` replays the eviction path
    #[serde(default = "default_true")]
    pub rule_matches: bool,
    /// Entries already queued on the base branch
    #[serde(default)]
    pub queue: Vec<ScenarioEntry>,
    /// Owner subscription
    #[serde(default)]
    pub subscription: ScenarioSubscription,
    /// Make branch updates fail with this message
    #[serde(default)]
    pub branch_update_error: Option<String>,
    /// State of the pull request once a branch update failed
    #[serde(default)]
    pub pull_after_update: Option<PullSnapshot>,
    /// Make merges fail
    #[serde(default)]
    pub merge_error: Option<ScenarioRejection>,
    /// Evaluation time; defaults to now
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

impl Scenario {
    /// Read a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Subscription of the repository owner
    pub fn subscription(&self) -> Subscription {
        Subscription::from_feature_names(
            self.pull.pull.owner.id,
            self.subscription.active,
            "scenario",
            &self.subscription.features,
        )
    }

    /// Check states the platform reports, if any source is given
    ///
    /// Check runs override explicit states of the same name and commit
    /// statuses override both.
    pub fn check_states(&self) -> Option<CheckStates> {
        if self.checks.is_none() && self.check_runs.is_empty() && self.commit_statuses.is_empty()
        {
            return None;
        }
        let mut states = self.checks.clone().unwrap_or_default();
        for run in &self.check_runs {
            let status = CheckStatus::from_check_run(&run.status, run.conclusion.as_deref());
            states.insert(run.name.clone(), status);
        }
        for status in &self.commit_statuses {
            states.insert(
                status.context.clone(),
                CheckStatus::from_commit_state(&status.state),
            );
        }
        Some(states)
    }

    /// Queue the scenario's other entries into `queue`
    pub fn seed_queue(&self, queue: &mut Queue, config: &MergeConfig) -> Result<()> {
        for entry in &self.queue {
            let pull = PullRequestRef {
                number: entry.number,
                head_sha: format!("scenario-{}", entry.number),
                ..self.pull.pull.clone()
            };
            let config = MergeConfig {
                priority: entry.priority,
                ..config.clone()
            };
            queue.insert(QueueEntry::new(pull, entry.priority, entry.enqueued_at, config))?;
        }
        Ok(())
    }
}

/// [`PlatformService`] answering from a [`Scenario`]
pub struct ScenarioPlatform {
    scenario: Scenario,
    pull: Mutex<PullSnapshot>,
    merged_by: String,
}

impl ScenarioPlatform {
    /// Create the platform; successful merges are attributed to `merged_by`
    pub fn new(scenario: Scenario, merged_by: impl Into<String>) -> Self {
        let pull = Mutex::new(scenario.pull.clone());
        Self {
            scenario,
            pull,
            merged_by: merged_by.into(),
        }
    }

    fn snapshot(&self) -> PullSnapshot {
        self.pull
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check_pull(&self, pull: &PullRequestRef) -> Result<()> {
        if pull.number == self.scenario.pull.number() {
            Ok(())
        } else {
            Err(Error::Platform(format!("pull request #{} not found", pull.number)))
        }
    }

    fn fail_update(&self) -> Result<()> {
        let Some(message) = &self.scenario.branch_update_error else {
            return Ok(());
        };
        if let Some(after) = &self.scenario.pull_after_update {
            *self.pull.lock().unwrap_or_else(PoisonError::into_inner) = after.clone();
        }
        Err(Error::branch_update(message.clone()))
    }
}

#[async_trait]
impl PlatformService for ScenarioPlatform {
    async fn get_pull(&self, pull: &PullRequestRef) -> Result<PullSnapshot> {
        self.check_pull(pull)?;
        Ok(self.snapshot())
    }

    async fn is_behind(&self, pull: &PullRequestRef) -> Result<bool> {
        self.check_pull(pull)?;
        Ok(self.scenario.is_behind)
    }

    async fn have_been_synchronized(&self, pull: &PullRequestRef) -> Result<bool> {
        self.check_pull(pull)?;
        Ok(self.scenario.synchronized)
    }

    async fn get_checks(&self, pull: &PullRequestRef) -> Result<CheckStates> {
        self.check_pull(pull)?;
        self.scenario
            .check_states()
            .ok_or_else(|| Error::Platform("check states unavailable".to_string()))
    }

    async fn required_checks(&self, _repository: &str, _branch: &str) -> Result<Vec<String>> {
        Ok(self.scenario.required_checks.clone())
    }

    async fn update_branch_with_api(&self, pull: &PullRequestRef) -> Result<()> {
        self.check_pull(pull)?;
        debug!(pull = pull.number, "scenario: branch updated through api");
        self.fail_update()
    }

    async fn rewrite_branch(
        &self,
        pull: &PullRequestRef,
        method: StrictMethod,
        actor: Option<&str>,
    ) -> Result<()> {
        self.check_pull(pull)?;
        debug!(pull = pull.number, %method, actor, "scenario: branch rewritten");
        self.fail_update()
    }

    async fn merge_pr(&self, request: &MergeRequest) -> Result<()> {
        self.check_pull(&request.pull)?;
        if let Some(rejection) = &self.scenario.merge_error {
            return Err(Error::MergeRejected {
                status: rejection.status,
                message: rejection.message.clone(),
            });
        }

        let mut pull = self.pull.lock().unwrap_or_else(PoisonError::into_inner);
        pull.state = PrState::Closed;
        pull.merged = true;
        pull.merged_by = Some(
            request
                .actor
                .clone()
                .unwrap_or_else(|| self.merged_by.clone()),
        );
        pull.merge_commit_sha = Some(format!("{}-merged", pull.pull.head_sha));
        Ok(())
    }
}

#[async_trait]
impl SubscriptionSource for ScenarioPlatform {
    async fn fetch(&self, owner_id: u64) -> Result<Subscription> {
        let subscription = self.scenario.subscription();
        if subscription.owner_id == owner_id {
            Ok(subscription)
        } else {
            Ok(Subscription::free(owner_id))
        }
    }
}
