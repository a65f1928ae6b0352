//! Shared test fixtures

#![allow(dead_code)]

pub mod mock_platform;

pub use mock_platform::{MockPlatformService, RewriteCall};

use chrono::{DateTime, Duration, TimeZone, Utc};
use mergeq::entitlement::Subscription;
use mergeq::queue::{Queue, QueueEntry};
use mergeq::types::{
    MergeConfig, MergeableState, Owner, PrState, Priority, PullRequestRef, PullSnapshot,
    StrictMode,
};

pub const REPO: &str = "acme/widgets";
pub const BRANCH: &str = "main";
pub const OWNER_ID: u64 = 42;
pub const BOT: &str = "mergeq[bot]";

pub fn owner() -> Owner {
    Owner {
        id: OWNER_ID,
        login: "acme".to_string(),
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn at_minute(minute: i64) -> DateTime<Utc> {
    base_time() + Duration::minutes(minute)
}

pub fn make_pull_ref(number: u64) -> PullRequestRef {
    PullRequestRef {
        owner: owner(),
        repo: "widgets".to_string(),
        number,
        head_sha: format!("sha{number}"),
        base_ref: BRANCH.to_string(),
    }
}

/// Open, clean, non-draft pull request
pub fn make_snapshot(number: u64) -> PullSnapshot {
    PullSnapshot {
        pull: make_pull_ref(number),
        title: format!("Change {number}"),
        body: None,
        state: PrState::Open,
        is_draft: false,
        merged: false,
        merged_by: None,
        merge_commit_sha: None,
        mergeable_state: MergeableState::Clean,
        rebaseable: true,
        changed_files: 1,
        workflow_changed: false,
    }
}

/// Snapshot of a pull request merged by `login`
pub fn make_merged_snapshot(number: u64, login: Option<&str>) -> PullSnapshot {
    PullSnapshot {
        state: PrState::Closed,
        merged: true,
        merged_by: login.map(str::to_string),
        merge_commit_sha: Some(format!("merge{number}")),
        ..make_snapshot(number)
    }
}

pub fn strict_config(strict: StrictMode) -> MergeConfig {
    MergeConfig {
        strict,
        ..MergeConfig::default()
    }
}

pub fn make_entry(number: u64, priority: u32, minute: i64) -> QueueEntry {
    let config = MergeConfig {
        priority: Priority(priority),
        ..MergeConfig::default()
    };
    QueueEntry::new(make_pull_ref(number), Priority(priority), at_minute(minute), config)
}

/// Queue filled from `(number, priority, minute)` triples, in that order
pub fn make_queue(entries: &[(u64, u32, i64)]) -> Queue {
    let mut queue = Queue::new(REPO, BRANCH);
    for &(number, priority, minute) in entries {
        queue.insert(make_entry(number, priority, minute)).unwrap();
    }
    queue
}

pub fn free_plan() -> Subscription {
    Subscription::free(OWNER_ID)
}

pub fn paid_plan() -> Subscription {
    Subscription::from_feature_names(
        OWNER_ID,
        true,
        "active",
        &["priority_queues", "merge_bot_account"],
    )
}

pub fn bots() -> Vec<String> {
    vec![BOT.to_string()]
}
