//! Base branch synchronization
//!
//! Brings a pull request's head branch up to date with its base branch and
//! turns the result into a status. A failed update is double-checked against
//! the live pull request: it may have been merged or closed by hand while
//! the update was running.

use crate::condition::EvaluatedRule;
use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::queue::Queue;
use crate::report::{Conclusion, StatusReport, StatusReporter};
use crate::types::{PullRequestRef, StrictMethod, StrictMode};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of a base branch update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The branch was updated; non-terminal "update done" status
    Updated(StatusReport),
    /// The update failed because the pull request changed under us; the
    /// status reflects its current state
    Raced(StatusReport),
    /// The update failed and the pull request is still open
    Fatal {
        /// Failure title
        title: String,
        /// Message from the platform or git
        message: String,
    },
}

impl SyncOutcome {
    /// Status to publish for this outcome
    pub fn into_report(self) -> StatusReport {
        match self {
            Self::Updated(report) | Self::Raced(report) => report,
            Self::Fatal { title, message } => StatusReport::new(Conclusion::Failure, title, message),
        }
    }

    /// Whether the branch was actually updated
    pub const fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

/// Performs base branch updates
pub struct BranchSynchronizer<'a> {
    platform: &'a dyn PlatformService,
    reporter: &'a StatusReporter<'a>,
}

impl<'a> BranchSynchronizer<'a> {
    /// Create a synchronizer
    pub const fn new(platform: &'a dyn PlatformService, reporter: &'a StatusReporter<'a>) -> Self {
        Self { platform, reporter }
    }

    /// Update `pull` with its base branch
    ///
    /// `merge` goes through the platform API, `rebase` rewrites the branch
    /// with git as `actor`. The queue lock is only taken to render the
    /// resulting status, never across the update itself.
    ///
    /// Errors other than a branch update failure are propagated, as is a
    /// failure to re-read the pull request after one.
    pub async fn synchronize(
        &self,
        pull: &PullRequestRef,
        method: StrictMethod,
        actor: Option<&str>,
        strict: StrictMode,
        queue: &Mutex<Queue>,
        rule: Option<&EvaluatedRule>,
    ) -> Result<SyncOutcome> {
        info!(pull = pull.number, %method, actor, "updating head branch with base branch");

        let updated = match method {
            StrictMethod::Merge => self.platform.update_branch_with_api(pull).await,
            StrictMethod::Rebase => self.platform.rewrite_branch(pull, method, actor).await,
        };

        match updated {
            Ok(()) => {
                debug!(pull = pull.number, "head branch updated");
                let queue = queue.lock().await;
                Ok(SyncOutcome::Updated(self.reporter.strict_status(
                    &queue,
                    &pull.owner,
                    false,
                    rule,
                )))
            }
            Err(Error::BranchUpdate { title, message }) => {
                warn!(pull = pull.number, %message, "branch update failed, re-reading pull request");
                let snapshot = self.platform.get_pull(pull).await?;
                match self.reporter.merge_report(&snapshot, strict) {
                    Some(report) => {
                        info!(pull = pull.number, title = %report.title, "pull request changed during update");
                        Ok(SyncOutcome::Raced(report))
                    }
                    None => Ok(SyncOutcome::Fatal { title, message }),
                }
            }
            Err(e) => Err(e),
        }
    }
}
