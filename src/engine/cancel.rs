//! Eviction of queued pull requests

use crate::condition::{CheckSubject, ConditionRef, required_check_conditions};
use crate::types::{CheckStates, CheckStatus, PrState};
use std::sync::Arc;
use tracing::debug;

/// Everything needed to decide whether a queued pull request is evicted
#[derive(Debug, Clone, Copy)]
pub struct CancellationInput<'a> {
    /// Lifecycle state of the pull request
    pub state: PrState,
    /// New commits landed on the pull request since the last evaluation
    pub resynchronized: bool,
    /// Conditions the pull request currently fails
    pub missing_conditions: &'a [ConditionRef],
    /// Status checks required by branch protection
    pub required_checks: &'a [String],
    /// Live check states; `None` when they could not be fetched
    pub checks: Option<&'a CheckStates>,
}

/// Decide whether a queued pull request must be evicted
///
/// Pure: transient gateway failures are passed in as `checks: None` and
/// are treated as "no results yet", which never evicts.
pub fn should_cancel(input: &CancellationInput<'_>) -> bool {
    // It's closed, it's not going to change
    if input.state == PrState::Closed {
        return true;
    }

    if input.resynchronized {
        return true;
    }

    let mut need_look_at_checks = required_check_conditions(input.required_checks);
    for condition in input.missing_conditions {
        if condition.is_check_related() {
            need_look_at_checks.push(Arc::clone(condition));
        } else {
            debug!(condition = %condition, "non-check condition no longer matches");
            return true;
        }
    }

    if !need_look_at_checks.is_empty() {
        let Some(checks) = input.checks.filter(|c| !c.is_empty()) else {
            return false;
        };

        let mut states: Vec<CheckStatus> = Vec::new();
        for (name, state) in checks {
            for cond in &need_look_at_checks {
                if cond.evaluate(&CheckSubject::new(cond.attribute_name(), name)) {
                    states.push(*state);
                }
            }
        }

        if states.is_empty() {
            return false;
        }

        if states.iter().any(|s| !s.is_terminal()) {
            return false;
        }
    }

    true
}
