//! Per-branch merge queues
//!
//! A [`Queue`] orders the pull requests waiting to be merged into one target
//! branch: highest priority first, then oldest enqueue time, then arrival
//! order. It is a plain data structure; callers serialize access per branch
//! through the [`QueueRegistry`].

mod registry;

pub use registry::{QueueKey, QueueRegistry};

use crate::error::{Error, Result};
use crate::types::{MergeConfig, Priority, PullRequestRef};
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

/// A pull request waiting in a branch queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// The queued pull request
    pub pull: PullRequestRef,
    /// Effective priority
    pub priority: Priority,
    /// When the pull request entered the queue
    pub enqueued_at: DateTime<Utc>,
    /// Merge policy snapshot taken at enqueue time
    pub config: MergeConfig,
    /// Arrival sequence number, assigned by the queue
    seq: u64,
}

impl QueueEntry {
    /// Create an entry ready to be inserted
    pub const fn new(
        pull: PullRequestRef,
        priority: Priority,
        enqueued_at: DateTime<Utc>,
        config: MergeConfig,
    ) -> Self {
        Self {
            pull,
            priority,
            enqueued_at,
            config,
            seq: 0,
        }
    }

    /// PR number
    pub const fn number(&self) -> u64 {
        self.pull.number
    }

    fn queue_order(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.enqueued_at.cmp(&other.enqueued_at))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Ordered queue of pull requests targeting one branch
#[derive(Debug, Clone)]
pub struct Queue {
    repository: String,
    branch: String,
    /// Kept sorted in queue order
    entries: Vec<QueueEntry>,
    next_seq: u64,
}

impl Queue {
    /// Create an empty queue for `repository` (`owner/repo`) and `branch`
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// Repository this queue belongs to
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Target branch of this queue
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Number of queued pull requests
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an entry at its ordered position
    ///
    /// Fails with [`Error::AlreadyQueued`] if the pull request is already
    /// present, and with [`Error::WrongBranch`] if it targets another branch.
    pub fn insert(&mut self, mut entry: QueueEntry) -> Result<()> {
        if entry.pull.base_ref != self.branch {
            return Err(Error::WrongBranch {
                branch: self.branch.clone(),
                target: entry.pull.base_ref,
                number: entry.pull.number,
            });
        }
        if self.contains(entry.number()) {
            return Err(Error::AlreadyQueued {
                branch: self.branch.clone(),
                number: entry.number(),
            });
        }

        entry.seq = self.next_seq;
        self.next_seq += 1;

        let index = self
            .entries
            .partition_point(|e| e.queue_order(&entry) == Ordering::Less);
        self.entries.insert(index, entry);
        Ok(())
    }

    /// Remove a pull request; removing an absent one is a no-op
    pub fn remove(&mut self, number: u64) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|e| e.number() == number)?;
        Some(self.entries.remove(index))
    }

    /// Replace the policy snapshot of a queued pull request
    ///
    /// The entry keeps its enqueue time and arrival order; a priority change
    /// moves it to its new ordered position.
    pub fn update_config(
        &mut self,
        number: u64,
        priority: Priority,
        config: MergeConfig,
    ) -> Result<()> {
        let index = self
            .entries
            .iter()
            .position(|e| e.number() == number)
            .ok_or(Error::PullNotQueued(number))?;

        let mut entry = self.entries.remove(index);
        entry.priority = priority;
        entry.config = config;
        let index = self
            .entries
            .partition_point(|e| e.queue_order(&entry) == Ordering::Less);
        self.entries.insert(index, entry);
        Ok(())
    }

    /// Entries in queue order
    pub fn list_ordered(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Queued PR numbers in queue order
    pub fn pull_numbers(&self) -> Vec<u64> {
        self.entries.iter().map(QueueEntry::number).collect()
    }

    /// Whether the pull request is queued
    pub fn contains(&self, number: u64) -> bool {
        self.entries.iter().any(|e| e.number() == number)
    }

    /// Get the entry of a queued pull request
    pub fn get(&self, number: u64) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.number() == number)
    }

    /// Zero-based position of a pull request
    pub fn position(&self, number: u64) -> Option<usize> {
        self.entries.iter().position(|e| e.number() == number)
    }

    /// Whether the pull request is at the head of the queue
    pub fn is_first(&self, number: u64) -> bool {
        self.entries.first().is_some_and(|e| e.number() == number)
    }

    /// PR numbers that have been waiting longer than `max_wait` at `now`
    pub fn expired(&self, now: DateTime<Utc>, max_wait: Duration) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|e| now - e.enqueued_at > max_wait)
            .map(QueueEntry::number)
            .collect()
    }
}
