//! Error types for mergeq

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the merge queue engine and its collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// Pull request is already present in the branch queue
    #[error("pull request #{number} is already queued on {branch}")]
    AlreadyQueued {
        /// Target branch of the queue
        branch: String,
        /// Pull request number
        number: u64,
    },

    /// Pull request targets another branch than the queue it was offered to
    #[error("pull request #{number} targets {target}, not {branch}")]
    WrongBranch {
        /// Branch of the queue
        branch: String,
        /// Branch the pull request targets
        target: String,
        /// Pull request number
        number: u64,
    },

    /// Pull request is not in the queue
    #[error("pull request #{0} is not queued")]
    PullNotQueued(u64),

    /// Invalid policy or rule configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure reported by the VCS gateway
    #[error("platform error: {0}")]
    Platform(String),

    /// The base branch of a pull request could not be updated
    #[error("{title}: {message}")]
    BranchUpdate {
        /// Short failure title
        title: String,
        /// Message from the platform or git
        message: String,
    },

    /// The platform refused to merge a pull request
    #[error("merge rejected ({status}): {message}")]
    MergeRejected {
        /// HTTP status code
        status: u16,
        /// Message from the platform
        message: String,
    },

    /// Entitlement lookup failed
    #[error("entitlement lookup failed: {0}")]
    Entitlement(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Policy file could not be parsed
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// JSON (de)serialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a branch update failure with the default title
    pub fn branch_update(message: impl Into<String>) -> Self {
        Self::BranchUpdate {
            title: "Base branch update has failed".to_string(),
            message: message.into(),
        }
    }
}
