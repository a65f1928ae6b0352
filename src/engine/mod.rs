//! Merge queue decision engine
//!
//! Pure decision functions, safe to call concurrently without locking:
//! - [`MergeDecisionEngine`]: should the pull request be queued, updated
//!   with its base branch, or merged
//! - [`should_cancel`]: should a queued pull request be evicted

mod cancel;
mod decision;

pub use cancel::{CancellationInput, should_cancel};
pub use decision::MergeDecisionEngine;

/// Derived position of a pull request in the merge train
///
/// Never stored: computed from queue membership and decision outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainState {
    /// Not in any queue
    NotQueued,
    /// Waiting for its turn or for checks
    Queued,
    /// Its head branch is being updated with the base branch
    Synchronizing,
    /// Eligible to merge now
    Mergeable,
    /// Merged
    Merged,
    /// Evicted from the queue
    Cancelled,
}

impl TrainState {
    /// Label the combination of queue membership and decisions
    pub fn derive(queued: bool, engine: &MergeDecisionEngine<'_>) -> Self {
        if !queued {
            Self::NotQueued
        } else if engine.should_merge() {
            Self::Mergeable
        } else if engine.should_synchronize() {
            Self::Synchronizing
        } else {
            Self::Queued
        }
    }

    /// Whether the pull request left the train for good
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Merged | Self::Cancelled)
    }
}

impl std::fmt::Display for TrainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotQueued => write!(f, "not queued"),
            Self::Queued => write!(f, "queued"),
            Self::Synchronizing => write!(f, "synchronizing"),
            Self::Mergeable => write!(f, "mergeable"),
            Self::Merged => write!(f, "merged"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
