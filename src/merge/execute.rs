//! Train execution - effectful operations
//!
//! [`TrainRunner`] is the caller described by the decision engine: it
//! fetches live state through the platform, enqueues, plans under the
//! branch lock, releases the lock and then acts on the plan.

use crate::condition::{ConditionRef, EvaluatedRule};
use crate::config::QueueSettings;
use crate::engine::{CancellationInput, TrainState, should_cancel};
use crate::entitlement::Entitlements;
use crate::error::{Error, Result};
use crate::merge::commit_message::commit_message;
use crate::merge::plan::{
    EvictionReason, PlanInput, TrainDecision, effective_priority, plan_train, preflight,
};
use crate::platform::{MergeRequest, PlatformService};
use crate::queue::{Queue, QueueEntry, QueueRegistry};
use crate::report::{Conclusion, MergeFailure, StatusReport, StatusReporter};
use crate::sync::BranchSynchronizer;
use crate::types::{MergeConfig, MergeMethod, PrState, PullRequestRef, PullSnapshot, StrictMethod};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Static runner settings
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Logins whose merges are reported as automatic
    pub bot_identities: Vec<String>,
    /// Queue limits
    pub queue: QueueSettings,
}

/// One evaluation request
#[derive(Debug, Clone, Copy)]
pub struct PullContext<'a> {
    /// Pull request being evaluated
    pub pull: &'a PullRequestRef,
    /// Policy snapshot for this pull request
    pub config: &'a MergeConfig,
    /// Evaluated merge rule, for the condition checklist and eviction
    pub rule: Option<&'a EvaluatedRule>,
    /// Evaluation time
    pub now: DateTime<Utc>,
}

/// What the runner decided and reported
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Status to publish
    pub report: StatusReport,
    /// Merge the caller must perform, see [`TrainRunner::complete_merge`]
    pub merge: Option<MergeRequest>,
    /// Derived train state after this evaluation
    pub state: TrainState,
    /// Other pull requests evicted from the branch queue because they
    /// waited too long; each gets [`EvictionReason::Expired`]
    pub expired: Vec<u64>,
}

impl TrainOutcome {
    const fn new(report: StatusReport, state: TrainState) -> Self {
        Self {
            report,
            merge: None,
            state,
            expired: Vec::new(),
        }
    }
}

/// What to do once the branch lock is released
enum Action {
    Report(StatusReport, TrainState),
    Synchronize(StrictMethod),
    Merge(MergeMethod),
}

fn final_state(snapshot: &PullSnapshot, report: &StatusReport) -> TrainState {
    if snapshot.merged {
        TrainState::Merged
    } else if report.is_terminal() {
        TrainState::Cancelled
    } else {
        TrainState::NotQueued
    }
}

/// Drives pull requests through their branch queue
pub struct TrainRunner<'a> {
    platform: &'a dyn PlatformService,
    registry: &'a QueueRegistry,
    entitlements: &'a dyn Entitlements,
    settings: &'a RunnerSettings,
}

impl<'a> TrainRunner<'a> {
    /// Create a runner
    pub const fn new(
        platform: &'a dyn PlatformService,
        registry: &'a QueueRegistry,
        entitlements: &'a dyn Entitlements,
        settings: &'a RunnerSettings,
    ) -> Self {
        Self {
            platform,
            registry,
            entitlements,
            settings,
        }
    }

    fn reporter(&self) -> StatusReporter<'_> {
        StatusReporter::new(self.entitlements, &self.settings.bot_identities)
    }

    fn queue_of(&self, pull: &PullRequestRef) -> Arc<Mutex<Queue>> {
        self.registry.queue(&pull.repository(), &pull.base_ref)
    }

    fn leave_train(&self, pull: &PullRequestRef) {
        self.registry.prune_empty(&pull.repository(), &pull.base_ref);
    }

    /// Drop the pull request from the queues of the branches it no longer targets
    async fn follow_retarget(&self, pull: &PullRequestRef) {
        let moved = self
            .registry
            .remove_elsewhere(&pull.repository(), pull.number, &pull.base_ref)
            .await;
        if !moved.is_empty() {
            info!(pull = pull.number, from = ?moved, to = %pull.base_ref, "base branch changed");
        }
    }

    /// Evaluate a pull request whose merge rule matches
    pub async fn run(&self, ctx: &PullContext<'_>) -> Result<TrainOutcome> {
        let outcome = self.enqueue_and_advance(ctx).await;
        self.leave_train(ctx.pull);
        outcome
    }

    async fn enqueue_and_advance(&self, ctx: &PullContext<'_>) -> Result<TrainOutcome> {
        let pull = ctx.pull;
        self.follow_retarget(pull).await;

        if let Some(report) = preflight(ctx.config, self.entitlements, &pull.owner) {
            info!(pull = pull.number, title = %report.title, "merge configuration not allowed");
            return Ok(TrainOutcome::new(report, TrainState::NotQueued));
        }

        let snapshot = self.platform.get_pull(pull).await?;
        let reporter = self.reporter();
        let queue = self.queue_of(pull);

        if let Some(report) = reporter.merge_report(&snapshot, ctx.config.strict) {
            queue.lock().await.remove(pull.number);
            let state = final_state(&snapshot, &report);
            info!(pull = pull.number, %state, title = %report.title, "pull request left the train");
            return Ok(TrainOutcome::new(report, state));
        }

        let is_behind = self.platform.is_behind(pull).await?;

        {
            let mut q = queue.lock().await;
            let priority = effective_priority(ctx.config, self.entitlements, &pull.owner);
            let entry = QueueEntry::new(pull.clone(), priority, ctx.now, ctx.config.clone());
            match q.insert(entry) {
                Ok(()) => info!(pull = pull.number, branch = %pull.base_ref, %priority, "queued"),
                Err(Error::AlreadyQueued { .. }) => {
                    q.update_config(pull.number, priority, ctx.config.clone())?;
                }
                Err(e) => return Err(e),
            }
        }

        self.advance(ctx, &snapshot, &reporter, &queue, is_behind, true)
            .await
    }

    /// Evaluate a queued pull request whose merge rule stopped matching
    ///
    /// The entry stays while strict mode is on and its checks are still
    /// running; otherwise it is evicted.
    pub async fn cancel_flow(&self, ctx: &PullContext<'_>) -> Result<TrainOutcome> {
        let outcome = self.evaluate_unmatched(ctx).await;
        self.leave_train(ctx.pull);
        outcome
    }

    async fn evaluate_unmatched(&self, ctx: &PullContext<'_>) -> Result<TrainOutcome> {
        let pull = ctx.pull;
        self.follow_retarget(pull).await;

        let snapshot = self.platform.get_pull(pull).await?;
        let reporter = self.reporter();
        let queue = self.queue_of(pull);

        if let Some(report) = reporter.merge_report(&snapshot, ctx.config.strict) {
            queue.lock().await.remove(pull.number);
            if snapshot.state == PrState::Closed {
                let state = final_state(&snapshot, &report);
                return Ok(TrainOutcome::new(report, state));
            }
            return Ok(TrainOutcome::new(
                EvictionReason::RuleUnmatched.report(),
                TrainState::Cancelled,
            ));
        }

        if ctx.config.strict.is_enabled() && !self.should_evict(ctx, &snapshot).await? {
            let is_behind = self.platform.is_behind(pull).await?;
            return self
                .advance(ctx, &snapshot, &reporter, &queue, is_behind, false)
                .await;
        }

        queue.lock().await.remove(pull.number);
        info!(pull = pull.number, reason = %EvictionReason::RuleUnmatched, "evicted");
        Ok(TrainOutcome::new(
            EvictionReason::RuleUnmatched.report(),
            TrainState::Cancelled,
        ))
    }

    async fn should_evict(&self, ctx: &PullContext<'_>, snapshot: &PullSnapshot) -> Result<bool> {
        let pull = ctx.pull;
        let resynchronized = self.platform.have_been_synchronized(pull).await?;
        let required_checks = self
            .platform
            .required_checks(&pull.repository(), &pull.base_ref)
            .await?;
        let checks = match self.platform.get_checks(pull).await {
            Ok(checks) => Some(checks),
            Err(e) => {
                warn!(pull = pull.number, error = %e, "check states unavailable");
                None
            }
        };
        let missing = ctx
            .rule
            .map_or(&[] as &[ConditionRef], |r| r.missing_conditions.as_slice());

        let cancel = should_cancel(&CancellationInput {
            state: snapshot.state,
            resynchronized,
            missing_conditions: missing,
            required_checks: &required_checks,
            checks: checks.as_ref(),
        });
        debug!(pull = pull.number, cancel, "cancellation evaluated");
        Ok(cancel)
    }

    /// Plan under the branch lock, then act with the lock released
    async fn advance(
        &self,
        ctx: &PullContext<'_>,
        snapshot: &PullSnapshot,
        reporter: &StatusReporter<'_>,
        queue: &Mutex<Queue>,
        is_behind: bool,
        allow_merge: bool,
    ) -> Result<TrainOutcome> {
        let pull = ctx.pull;

        let mut expired_others = Vec::new();
        let action = {
            let mut q = queue.lock().await;
            let mut expired = false;
            if let Some(max_wait) = self.settings.queue.max_wait_for(&pull.base_ref) {
                for number in q.expired(ctx.now, max_wait) {
                    if number == pull.number {
                        expired = true;
                        continue;
                    }
                    q.remove(number);
                    info!(pull = number, reason = %EvictionReason::Expired, "evicted");
                    expired_others.push(number);
                }
            }

            let decision = plan_train(
                &PlanInput {
                    number: pull.number,
                    is_behind,
                    rebaseable: snapshot.rebaseable,
                    expired,
                    allow_merge,
                    config: ctx.config,
                },
                &q,
            );
            debug!(pull = pull.number, %decision, "planned");

            match decision {
                TrainDecision::Wait => Action::Report(
                    reporter.waiting_status(
                        &q,
                        pull.number,
                        &pull.owner,
                        ctx.config.strict,
                        is_behind,
                        ctx.rule,
                    ),
                    TrainState::Queued,
                ),
                TrainDecision::Blocked(report) => {
                    q.remove(pull.number);
                    info!(pull = pull.number, title = %report.title, "blocked");
                    Action::Report(report, TrainState::Cancelled)
                }
                TrainDecision::Evict(reason) => {
                    q.remove(pull.number);
                    info!(pull = pull.number, %reason, "evicted");
                    Action::Report(reason.report(), TrainState::Cancelled)
                }
                TrainDecision::Synchronize { method } => Action::Synchronize(method),
                TrainDecision::Merge { method } => Action::Merge(method),
            }
        };

        let mut outcome = self.act(ctx, snapshot, reporter, queue, action).await?;
        outcome.expired = expired_others;
        Ok(outcome)
    }

    async fn act(
        &self,
        ctx: &PullContext<'_>,
        snapshot: &PullSnapshot,
        reporter: &StatusReporter<'_>,
        queue: &Mutex<Queue>,
        action: Action,
    ) -> Result<TrainOutcome> {
        let pull = ctx.pull;
        match action {
            Action::Report(report, state) => Ok(TrainOutcome::new(report, state)),
            Action::Synchronize(method) => {
                let synchronizer = BranchSynchronizer::new(self.platform, reporter);
                let outcome = synchronizer
                    .synchronize(
                        pull,
                        method,
                        ctx.config.update_actor(),
                        ctx.config.strict,
                        queue,
                        ctx.rule,
                    )
                    .await?;
                if outcome.is_updated() {
                    return Ok(TrainOutcome::new(
                        outcome.into_report(),
                        TrainState::Synchronizing,
                    ));
                }

                // Raced or failed: the pull request leaves the train either way
                let report = outcome.into_report();
                queue.lock().await.remove(pull.number);
                let state = match report.conclusion {
                    Some(Conclusion::Success) => TrainState::Merged,
                    Some(_) => TrainState::Cancelled,
                    None => TrainState::NotQueued,
                };
                info!(pull = pull.number, %state, title = %report.title, "left the train during update");
                Ok(TrainOutcome::new(report, state))
            }
            Action::Merge(method) => {
                let (commit_title, commit_message) =
                    commit_message(snapshot, ctx.config.commit_message)
                        .map(|(title, message)| {
                            (
                                Some(title).filter(|t| !t.is_empty()),
                                Some(message).filter(|m| !m.is_empty()),
                            )
                        })
                        .unwrap_or_default();
                let request = MergeRequest {
                    pull: pull.clone(),
                    method,
                    commit_title,
                    commit_message,
                    actor: ctx.config.merge_bot_account.clone(),
                };
                info!(pull = pull.number, %method, "ready to merge");
                Ok(TrainOutcome {
                    report: StatusReport::pending("The pull request is being merged", ""),
                    merge: Some(request),
                    state: TrainState::Mergeable,
                    expired: Vec::new(),
                })
            }
        }
    }

    /// Perform a planned merge and report its result
    ///
    /// A merge refused because the base branch moved is re-planned; the
    /// returned outcome may then carry a new merge request.
    pub async fn complete_merge(
        &self,
        ctx: &PullContext<'_>,
        request: &MergeRequest,
    ) -> Result<TrainOutcome> {
        let outcome = self.merge_and_report(ctx, request).await;
        self.leave_train(ctx.pull);
        outcome
    }

    async fn merge_and_report(
        &self,
        ctx: &PullContext<'_>,
        request: &MergeRequest,
    ) -> Result<TrainOutcome> {
        let pull = ctx.pull;
        let reporter = self.reporter();
        let queue = self.queue_of(pull);

        let rejection = match self.platform.merge_pr(request).await {
            Ok(()) => None,
            Err(Error::MergeRejected { status, message }) => Some((status, message)),
            Err(e) => {
                queue.lock().await.remove(pull.number);
                return Err(e);
            }
        };

        let snapshot = self.platform.get_pull(pull).await?;

        if let Some((status, message)) = rejection
            && !snapshot.merged
        {
            let failure = MergeFailure::classify(status, &message);
            info!(pull = pull.number, status, %message, ?failure, "merge rejected");
            let Some(report) = failure.report() else {
                let is_behind = self.platform.is_behind(pull).await?;
                return self
                    .advance(ctx, &snapshot, &reporter, &queue, is_behind, true)
                    .await;
            };
            if report.is_terminal() {
                queue.lock().await.remove(pull.number);
                return Ok(TrainOutcome::new(report, TrainState::Cancelled));
            }
            return Ok(TrainOutcome::new(report, TrainState::Queued));
        }

        queue.lock().await.remove(pull.number);
        match reporter.merge_report(&snapshot, ctx.config.strict) {
            Some(report) => {
                let state = final_state(&snapshot, &report);
                info!(pull = pull.number, %state, "merged");
                Ok(TrainOutcome::new(report, state))
            }
            None => Ok(TrainOutcome::new(
                StatusReport::new(
                    Conclusion::Failure,
                    "Unexpected after merge pull request state",
                    "The pull request has been merged while the platform still reports it as opened.",
                ),
                TrainState::Cancelled,
            )),
        }
    }
}
