//! Classification of rejected merges

use super::{Conclusion, StatusReport};
use regex::Regex;
use std::sync::LazyLock;

static REQUIRED_STATUS_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"Required status check "([^"]*)" is expected\."#).ok());

const FORBIDDEN_MERGE_COMMITS_MSG: &str = "Merge commits are not allowed on this repository.";
const FORBIDDEN_SQUASH_MERGE_MSG: &str = "Squash merges are not allowed on this repository.";
const FORBIDDEN_REBASE_MERGE_MSG: &str = "Rebase merges are not allowed on this repository.";

const BRANCH_PROTECTION_DOC: &str =
    "https://docs.github.com/en/github/administering-a-repository/about-protected-branches";
const REQUIRED_CHECKS_DOC: &str =
    "https://docs.github.com/en/github/administering-a-repository/about-required-status-checks";

/// Why the platform refused to merge a pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeFailure {
    /// New commits landed on the head branch during the merge
    HeadModified,
    /// The base branch moved during the merge; resynchronize and retry
    BaseModified,
    /// A required status check has not reported yet
    RequiredStatusPending {
        /// Name of the check
        check: String,
        /// Platform message
        message: String,
    },
    /// The configured merge method is disabled on the repository
    MethodForbidden {
        /// Platform message
        message: String,
        /// Name of the forbidden method, as in the repository settings
        method: &'static str,
    },
    /// Branch protection refuses the merge
    ProtectionNotValidated {
        /// Platform message
        message: String,
    },
    /// Anything else
    Other {
        /// Platform message
        message: String,
    },
}

impl MergeFailure {
    /// Classify a rejected merge from its HTTP status and message
    pub fn classify(status: u16, message: &str) -> Self {
        if message.contains("Head branch was modified") {
            return Self::HeadModified;
        }
        if message.contains("Base branch was modified") {
            return Self::BaseModified;
        }
        if status != 405 {
            return Self::Other {
                message: message.to_string(),
            };
        }

        if let Some(caps) = REQUIRED_STATUS_RE.as_ref().and_then(|re| re.captures(message)) {
            return Self::RequiredStatusPending {
                check: caps[1].to_string(),
                message: message.to_string(),
            };
        }

        let forbidden = [
            (FORBIDDEN_REBASE_MERGE_MSG, "rebase merge"),
            (FORBIDDEN_SQUASH_MERGE_MSG, "squash merge"),
            (FORBIDDEN_MERGE_COMMITS_MSG, "merge commits"),
        ];
        for (needle, method) in forbidden {
            if message.contains(needle) {
                return Self::MethodForbidden {
                    message: message.to_string(),
                    method,
                };
            }
        }

        Self::ProtectionNotValidated {
            message: message.to_string(),
        }
    }

    /// Status to publish, or `None` when the caller must resynchronize
    pub fn report(&self) -> Option<StatusReport> {
        let report = match self {
            Self::HeadModified => StatusReport::new(
                Conclusion::Cancelled,
                "Head branch was modified in the meantime",
                "The head branch was modified, the merge action has been cancelled.",
            ),
            Self::BaseModified => return None,
            Self::RequiredStatusPending { message, .. } => StatusReport::pending(
                "Waiting for the branch protection required status checks to be validated",
                format!(
                    "[Branch protection]({BRANCH_PROTECTION_DOC}) is enabled and is preventing the merge. \
                     The pull request will be merged when the [required status check]({REQUIRED_CHECKS_DOC}) \
                     validate the pull request. (detail: {message})"
                ),
            ),
            Self::MethodForbidden { message, method } => StatusReport::new(
                Conclusion::Cancelled,
                message.clone(),
                format!(
                    "The repository configuration doesn't allow {method}. \
                     The merge `method` configured must be allowed in the repository configuration settings."
                ),
            ),
            Self::ProtectionNotValidated { message } => StatusReport::new(
                Conclusion::Cancelled,
                "Branch protection settings are not validated anymore",
                format!(
                    "[Branch protection]({BRANCH_PROTECTION_DOC}) is enabled and is preventing the merge. \
                     The pull request will be merged when branch protection settings validate it once again. \
                     (detail: {message})"
                ),
            ),
            Self::Other { message } => StatusReport::new(
                Conclusion::Failure,
                "Failed to merge the pull request",
                format!("Platform error message: `{message}`"),
            ),
        };
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_status_is_pending() {
        let failure = MergeFailure::classify(405, r#"Required status check "ci/build" is expected."#);
        assert!(matches!(&failure, MergeFailure::RequiredStatusPending { check, .. } if check == "ci/build"));
        let report = failure.report().unwrap();
        assert!(!report.is_terminal());
    }

    #[test]
    fn test_base_modified_resynchronizes() {
        let failure = MergeFailure::classify(405, "Base branch was modified. Review and try the merge again.");
        assert_eq!(failure, MergeFailure::BaseModified);
        assert!(failure.report().is_none());
    }

    #[test]
    fn test_forbidden_method_is_cancelled() {
        let failure = MergeFailure::classify(405, FORBIDDEN_SQUASH_MERGE_MSG);
        let report = failure.report().unwrap();
        assert_eq!(report.conclusion, Some(Conclusion::Cancelled));
        assert_eq!(report.title, FORBIDDEN_SQUASH_MERGE_MSG);
        assert!(report.summary.contains("squash merge"));
    }

    #[test]
    fn test_other_405_is_protection() {
        let failure = MergeFailure::classify(405, "At least 1 approving review is required");
        let report = failure.report().unwrap();
        assert_eq!(report.title, "Branch protection settings are not validated anymore");
    }

    #[test]
    fn test_non_405_is_failure() {
        let report = MergeFailure::classify(422, "boom").report().unwrap();
        assert_eq!(report.conclusion, Some(Conclusion::Failure));
        assert!(report.summary.contains("`boom`"));
    }
}
