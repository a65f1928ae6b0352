//! Train planning - pure functions deciding the next step of a pull request
//!
//! No I/O happens here: live state is fetched beforehand by the runner and
//! passed in, so every function can be unit tested on plain values.

use crate::engine::MergeDecisionEngine;
use crate::entitlement::{Entitlements, Feature};
use crate::queue::Queue;
use crate::report::{Conclusion, StatusReport};
use crate::types::{MergeConfig, MergeMethod, Owner, Priority, RebaseFallback, StrictMethod};
use tracing::info;

/// Why a pull request leaves the queue without being merged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The merge rule stopped matching and the checks settled
    RuleUnmatched,
    /// The entry waited longer than the branch allows
    Expired,
}

impl EvictionReason {
    /// Status published on eviction
    pub fn report(self) -> StatusReport {
        match self {
            Self::RuleUnmatched => StatusReport::new(
                Conclusion::Cancelled,
                "The pull request has been removed from the queue",
                "The pull request rule doesn't match anymore.",
            ),
            Self::Expired => StatusReport::new(
                Conclusion::Cancelled,
                "The pull request has been removed from the queue after waiting too long",
                "The pull request did not become mergeable within the maximum wait configured for its base branch.",
            ),
        }
    }
}

impl std::fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RuleUnmatched => write!(f, "rule unmatched"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Next step for a queued pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainDecision {
    /// Merge now with this method
    Merge {
        /// Effective merge method
        method: MergeMethod,
    },
    /// Update the head branch with the base branch
    Synchronize {
        /// How to update
        method: StrictMethod,
    },
    /// Wait for the queue or for checks
    Wait,
    /// Cannot proceed without a human
    Blocked(StatusReport),
    /// Leave the queue
    Evict(EvictionReason),
}

impl std::fmt::Display for TrainDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merge { method } => write!(f, "merge ({method})"),
            Self::Synchronize { method } => write!(f, "synchronize ({method})"),
            Self::Wait => write!(f, "wait"),
            Self::Blocked(report) => write!(f, "blocked: {}", report.title),
            Self::Evict(reason) => write!(f, "evict ({reason})"),
        }
    }
}

/// Live facts about one pull request, gathered by the caller
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    /// Pull request number
    pub number: u64,
    /// Head branch lacks base branch commits
    pub is_behind: bool,
    /// Platform can rebase the pull request
    pub rebaseable: bool,
    /// Entry exceeded its maximum wait
    pub expired: bool,
    /// A merge may be decided; false while the rule is not matching
    pub allow_merge: bool,
    /// Policy snapshot
    pub config: &'a MergeConfig,
}

/// Decide the next step (PURE)
#[must_use]
pub fn plan_train(input: &PlanInput<'_>, queue: &Queue) -> TrainDecision {
    if input.expired {
        return TrainDecision::Evict(EvictionReason::Expired);
    }

    let engine = MergeDecisionEngine::new(input.number, input.is_behind, input.config.strict, queue);

    if engine.should_merge() {
        if !input.allow_merge {
            return TrainDecision::Wait;
        }
        return match effective_merge_method(input.config, input.rebaseable) {
            Some(method) => TrainDecision::Merge { method },
            None => TrainDecision::Blocked(StatusReport::new(
                Conclusion::ActionRequired,
                "Automatic rebasing is not possible, manual intervention required",
                "",
            )),
        };
    }

    if engine.should_synchronize() {
        return TrainDecision::Synchronize {
            method: input.config.strict_method,
        };
    }

    TrainDecision::Wait
}

/// Merge method to use, honouring the rebase fallback
///
/// `None` when rebase is required but impossible and no fallback is set.
#[must_use]
pub const fn effective_merge_method(config: &MergeConfig, rebaseable: bool) -> Option<MergeMethod> {
    match (config.method, rebaseable) {
        (MergeMethod::Rebase, false) => match config.rebase_fallback {
            RebaseFallback::Merge => Some(MergeMethod::Merge),
            RebaseFallback::Squash => Some(MergeMethod::Squash),
            RebaseFallback::None => None,
        },
        (method, _) => Some(method),
    }
}

/// Priority an entry is queued with
///
/// Configured priorities are a paid feature; everyone else gets medium.
#[must_use]
pub fn effective_priority(config: &MergeConfig, entitlements: &dyn Entitlements, owner: &Owner) -> Priority {
    if entitlements.has_feature(owner.id, Feature::PriorityQueues) {
        config.priority
    } else {
        Priority::MEDIUM
    }
}

/// Reject configurations the owner is not entitled to
#[must_use]
pub fn preflight(config: &MergeConfig, entitlements: &dyn Entitlements, owner: &Owner) -> Option<StatusReport> {
    let entitled = entitlements.has_feature(owner.id, Feature::MergeBotAccount);

    if config.bot_account.is_some() {
        info!(owner = %owner.login, entitled, "legacy bot_account in use");
    }

    let gated = [
        ("update_bot_account", config.update_bot_account.is_some()),
        ("merge_bot_account", config.merge_bot_account.is_some()),
    ];
    gated
        .into_iter()
        .find(|(_, set)| *set && !entitled)
        .map(|(option, _)| {
            StatusReport::new(
                Conclusion::ActionRequired,
                format!("Merge with `{option}` set is disabled"),
                entitlements.missing_feature_reason(&owner.login),
            )
        })
}
