//! mergeq - merge queue decision engine
//!
//! Decides, per pull request and per target branch, whether a pull request
//! waits, is brought up to date with its base branch, is merged now or is
//! evicted from its queue, and renders each outcome as a status report.
//!
//! # Architecture
//!
//! - [`queue`]: priority-ordered per-branch queues and their registry
//! - [`engine`]: pure queue/synchronize/merge and cancellation decisions
//! - [`sync`]: base branch updates, with recovery from manual races
//! - [`report`]: status triples and queue summaries
//! - [`merge`]: the train runner composing all of the above
//! - [`platform`]: the VCS gateway contract
//! - [`entitlement`]: subscription-gated features and their cache
//! - [`config`]: policy loading and normalization

pub mod condition;
pub mod config;
pub mod engine;
pub mod entitlement;
pub mod error;
pub mod merge;
pub mod platform;
pub mod queue;
pub mod report;
pub mod sync;
pub mod types;

pub use error::{Error, Result};
