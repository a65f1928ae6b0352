//! Shared command context for CLI commands
//!
//! Loads the policy and the scenario and builds the offline platform that
//! the simulation drives.

use mergeq::config::{Policy, load_policy};
use mergeq::error::Result;
use mergeq::merge::RunnerSettings;
use mergeq::platform::{Scenario, ScenarioPlatform};
use mergeq::queue::QueueRegistry;
use std::path::Path;
use tracing::debug;

/// Default policy file, looked up in the working directory
pub const DEFAULT_POLICY_FILE: &str = "mergeq.toml";

/// Everything a simulation needs
pub struct CommandContext {
    /// Normalized policy
    pub policy: Policy,
    /// Scenario being replayed
    pub scenario: Scenario,
    /// Offline platform answering from the scenario
    pub platform: ScenarioPlatform,
    /// Branch queues
    pub registry: QueueRegistry,
    /// Runner settings derived from the policy
    pub settings: RunnerSettings,
}

impl CommandContext {
    /// Load the scenario and policy
    ///
    /// Without an explicit policy path, `mergeq.toml` in the working
    /// directory is used when present, else the defaults.
    pub fn new(scenario_path: &Path, policy_path: Option<&Path>) -> Result<Self> {
        let policy = load_policy(policy_path.unwrap_or_else(|| Path::new(DEFAULT_POLICY_FILE)))?;
        debug!(strict = %policy.merge.strict, method = %policy.merge.method, "policy loaded");

        let scenario = Scenario::load(scenario_path)?;
        let merged_by = policy
            .reporting
            .bot_identities
            .first()
            .cloned()
            .unwrap_or_else(|| mergeq::config::DEFAULT_BOT_IDENTITY.to_string());
        let platform = ScenarioPlatform::new(scenario.clone(), merged_by);

        let settings = RunnerSettings {
            bot_identities: policy.reporting.bot_identities.clone(),
            queue: policy.queue.clone(),
        };

        Ok(Self {
            policy,
            scenario,
            platform,
            registry: QueueRegistry::new(),
            settings,
        })
    }
}
