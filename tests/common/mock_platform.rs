//! Mock platform service for testing
//!
//! These are test utilities - not all may be used in current tests but are
//! available for future test development.

#![allow(dead_code)]

use async_trait::async_trait;
use mergeq::error::{Error, Result};
use mergeq::platform::{MergeRequest, PlatformService};
use mergeq::types::{
    CheckStates, CheckStatus, PrState, PullRequestRef, PullSnapshot, StrictMethod,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// Call record for `rewrite_branch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteCall {
    pub pr_number: u64,
    pub method: StrictMethod,
    pub actor: Option<String>,
}

/// Simple mock platform service for testing
///
/// Features:
/// - Configurable responses per PR
/// - Call tracking for verification
/// - Error injection for failure path testing
/// - Pull state swapped after a failed branch update, to replay races
pub struct MockPlatformService {
    merged_by: String,
    pull_responses: Mutex<HashMap<u64, PullSnapshot>>,
    pull_after_update_failure: Mutex<HashMap<u64, PullSnapshot>>,
    behind_responses: Mutex<HashMap<u64, bool>>,
    synchronized_responses: Mutex<HashMap<u64, bool>>,
    check_responses: Mutex<HashMap<u64, CheckStates>>,
    required_checks: Mutex<Vec<String>>,
    // Call tracking
    get_pull_calls: Mutex<Vec<u64>>,
    get_checks_calls: Mutex<Vec<u64>>,
    update_api_calls: Mutex<Vec<u64>>,
    rewrite_calls: Mutex<Vec<RewriteCall>>,
    merge_calls: Mutex<Vec<MergeRequest>>,
    // Error injection
    error_on_update_branch: Mutex<Option<String>>,
    error_on_get_checks: Mutex<Option<String>>,
    error_on_get_pull: Mutex<Option<String>>,
    error_on_merge: Mutex<Option<(u16, String)>>,
}

impl MockPlatformService {
    /// Create a mock; merges succeed as `merged_by`
    pub fn new(merged_by: &str) -> Self {
        Self {
            merged_by: merged_by.to_string(),
            pull_responses: Mutex::new(HashMap::new()),
            pull_after_update_failure: Mutex::new(HashMap::new()),
            behind_responses: Mutex::new(HashMap::new()),
            synchronized_responses: Mutex::new(HashMap::new()),
            check_responses: Mutex::new(HashMap::new()),
            required_checks: Mutex::new(Vec::new()),
            get_pull_calls: Mutex::new(Vec::new()),
            get_checks_calls: Mutex::new(Vec::new()),
            update_api_calls: Mutex::new(Vec::new()),
            rewrite_calls: Mutex::new(Vec::new()),
            merge_calls: Mutex::new(Vec::new()),
            error_on_update_branch: Mutex::new(None),
            error_on_get_checks: Mutex::new(None),
            error_on_get_pull: Mutex::new(None),
            error_on_merge: Mutex::new(None),
        }
    }

    // === Error injection methods ===

    /// Make branch updates fail with a branch update error
    pub fn fail_update_branch(&self, msg: &str) {
        *self.error_on_update_branch.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `get_checks` fail
    pub fn fail_get_checks(&self, msg: &str) {
        *self.error_on_get_checks.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `get_pull` fail
    pub fn fail_get_pull(&self, msg: &str) {
        *self.error_on_get_pull.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `merge_pr` be refused
    pub fn fail_merge(&self, status: u16, msg: &str) {
        *self.error_on_merge.lock().unwrap() = Some((status, msg.to_string()));
    }

    // === Response setup ===

    /// Set the snapshot returned by `get_pull`
    pub fn set_pull(&self, snapshot: PullSnapshot) {
        self.pull_responses
            .lock()
            .unwrap()
            .insert(snapshot.number(), snapshot);
    }

    /// Set the snapshot served once a branch update failed
    pub fn set_pull_after_update_failure(&self, snapshot: PullSnapshot) {
        self.pull_after_update_failure
            .lock()
            .unwrap()
            .insert(snapshot.number(), snapshot);
    }

    /// Set `is_behind` for a PR
    pub fn set_behind(&self, pr_number: u64, behind: bool) {
        self.behind_responses
            .lock()
            .unwrap()
            .insert(pr_number, behind);
    }

    /// Set `have_been_synchronized` for a PR
    pub fn set_synchronized(&self, pr_number: u64, synchronized: bool) {
        self.synchronized_responses
            .lock()
            .unwrap()
            .insert(pr_number, synchronized);
    }

    /// Set check states for a PR
    pub fn set_checks(&self, pr_number: u64, checks: &[(&str, CheckStatus)]) {
        let states = checks
            .iter()
            .map(|(name, status)| ((*name).to_string(), *status))
            .collect();
        self.check_responses
            .lock()
            .unwrap()
            .insert(pr_number, states);
    }

    /// Set the checks required by branch protection
    pub fn set_required_checks(&self, names: &[&str]) {
        *self.required_checks.lock().unwrap() = names.iter().map(|n| (*n).to_string()).collect();
    }

    /// Helper to set up an open, up-to-date PR
    pub fn setup_open_pr(&self, snapshot: PullSnapshot) {
        let number = snapshot.number();
        self.set_pull(snapshot);
        self.set_behind(number, false);
        self.set_synchronized(number, false);
    }

    // === Call tracking accessors ===

    pub fn get_pull_calls(&self) -> Vec<u64> {
        self.get_pull_calls.lock().unwrap().clone()
    }

    pub fn get_checks_calls(&self) -> Vec<u64> {
        self.get_checks_calls.lock().unwrap().clone()
    }

    pub fn update_api_calls(&self) -> Vec<u64> {
        self.update_api_calls.lock().unwrap().clone()
    }

    pub fn rewrite_calls(&self) -> Vec<RewriteCall> {
        self.rewrite_calls.lock().unwrap().clone()
    }

    pub fn merge_calls(&self) -> Vec<MergeRequest> {
        self.merge_calls.lock().unwrap().clone()
    }

    // === Assertion helpers ===

    /// Assert the branch of a PR was updated through the API
    pub fn assert_update_api_called(&self, pr_number: u64) {
        let calls = self.update_api_calls();
        assert!(
            calls.contains(&pr_number),
            "expected API update of PR #{pr_number}, got {calls:?}"
        );
    }

    /// Assert no branch update of any kind happened
    pub fn assert_no_branch_update(&self) {
        assert!(self.update_api_calls().is_empty(), "unexpected API update");
        assert!(self.rewrite_calls().is_empty(), "unexpected branch rewrite");
    }

    /// Assert a PR was merged
    pub fn assert_merge_called(&self, pr_number: u64) {
        let calls = self.merge_calls();
        assert!(
            calls.iter().any(|c| c.pull.number == pr_number),
            "expected merge of PR #{pr_number}, got {calls:?}"
        );
    }

    fn pull_or_missing(&self, number: u64) -> Result<PullSnapshot> {
        self.pull_responses
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .ok_or_else(|| Error::Platform(format!("PR #{number} not found")))
    }

    fn update_result(&self, number: u64) -> Result<()> {
        let error = self.error_on_update_branch.lock().unwrap().clone();
        let Some(msg) = error else {
            return Ok(());
        };
        if let Some(after) = self.pull_after_update_failure.lock().unwrap().remove(&number) {
            self.set_pull(after);
        }
        Err(Error::branch_update(msg))
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    async fn get_pull(&self, pull: &PullRequestRef) -> Result<PullSnapshot> {
        self.get_pull_calls.lock().unwrap().push(pull.number);
        if let Some(msg) = self.error_on_get_pull.lock().unwrap().clone() {
            return Err(Error::Platform(msg));
        }
        self.pull_or_missing(pull.number)
    }

    async fn is_behind(&self, pull: &PullRequestRef) -> Result<bool> {
        Ok(self
            .behind_responses
            .lock()
            .unwrap()
            .get(&pull.number)
            .copied()
            .unwrap_or(false))
    }

    async fn have_been_synchronized(&self, pull: &PullRequestRef) -> Result<bool> {
        Ok(self
            .synchronized_responses
            .lock()
            .unwrap()
            .get(&pull.number)
            .copied()
            .unwrap_or(false))
    }

    async fn get_checks(&self, pull: &PullRequestRef) -> Result<CheckStates> {
        self.get_checks_calls.lock().unwrap().push(pull.number);
        if let Some(msg) = self.error_on_get_checks.lock().unwrap().clone() {
            return Err(Error::Platform(msg));
        }
        Ok(self
            .check_responses
            .lock()
            .unwrap()
            .get(&pull.number)
            .cloned()
            .unwrap_or_default())
    }

    async fn required_checks(&self, _repository: &str, _branch: &str) -> Result<Vec<String>> {
        Ok(self.required_checks.lock().unwrap().clone())
    }

    async fn update_branch_with_api(&self, pull: &PullRequestRef) -> Result<()> {
        self.update_api_calls.lock().unwrap().push(pull.number);
        self.update_result(pull.number)
    }

    async fn rewrite_branch(
        &self,
        pull: &PullRequestRef,
        method: StrictMethod,
        actor: Option<&str>,
    ) -> Result<()> {
        self.rewrite_calls.lock().unwrap().push(RewriteCall {
            pr_number: pull.number,
            method,
            actor: actor.map(str::to_string),
        });
        self.update_result(pull.number)
    }

    async fn merge_pr(&self, request: &MergeRequest) -> Result<()> {
        self.merge_calls.lock().unwrap().push(request.clone());
        if let Some((status, message)) = self.error_on_merge.lock().unwrap().clone() {
            return Err(Error::MergeRejected { status, message });
        }

        let mut snapshot = self.pull_or_missing(request.pull.number)?;
        snapshot.state = PrState::Closed;
        snapshot.merged = true;
        snapshot.merged_by = Some(
            request
                .actor
                .clone()
                .unwrap_or_else(|| self.merged_by.clone()),
        );
        snapshot.merge_commit_sha = Some(format!("merged_{}", request.pull.head_sha));
        self.set_pull(snapshot);
        Ok(())
    }
}
