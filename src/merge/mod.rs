//! Merge train driver
//!
//! Three-phase pattern:
//! 1. Gather - fetch pull state, freshness and checks (effectful)
//! 2. Plan - decide a `TrainDecision` under the branch lock (pure)
//! 3. Execute - synchronize, report or hand back a merge (effectful)

mod commit_message;
mod execute;
mod plan;

pub use commit_message::commit_message;
pub use execute::{PullContext, RunnerSettings, TrainOutcome, TrainRunner};
pub use plan::{
    EvictionReason, PlanInput, TrainDecision, effective_merge_method, effective_priority,
    plan_train, preflight,
};
