//! Queue, synchronize and merge predicates

use crate::queue::Queue;
use crate::types::StrictMode;

/// Stateless merge decisions for one pull request
///
/// Built from the pull request's live freshness, its branch queue and its
/// strict mode. Never mutates the queue.
#[derive(Debug, Clone, Copy)]
pub struct MergeDecisionEngine<'a> {
    number: u64,
    is_behind: bool,
    strict: StrictMode,
    queue: &'a Queue,
}

impl<'a> MergeDecisionEngine<'a> {
    /// Create the decision engine for pull request `number`
    pub const fn new(number: u64, is_behind: bool, strict: StrictMode, queue: &'a Queue) -> Self {
        Self {
            number,
            is_behind,
            strict,
            queue,
        }
    }

    /// Whether the pull request belongs in the queue
    ///
    /// Always true once the merge action applies; eviction is decided by
    /// [`super::should_cancel`].
    pub const fn should_queue(&self) -> bool {
        true
    }

    /// Whether the head branch must be updated with the base branch now
    pub fn should_synchronize(&self) -> bool {
        match self.strict {
            StrictMode::Disabled => false,
            StrictMode::Continuous | StrictMode::FastTrack => self.is_behind,
            StrictMode::Ordered => self.is_behind && self.queue.is_first(self.number),
        }
    }

    /// Whether the pull request can be merged now
    pub fn should_merge(&self) -> bool {
        match self.strict {
            StrictMode::Disabled => true,
            StrictMode::Continuous | StrictMode::FastTrack => !self.is_behind,
            StrictMode::Ordered => !self.is_behind && self.queue.is_first(self.number),
        }
    }
}
