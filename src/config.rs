//! Merge policy loading
//!
//! The policy file is TOML. Legacy spellings of `strict` and priority
//! aliases are normalized here, once, so the rest of the crate only sees
//! canonical values.

use crate::entitlement::{EntitlementCache, MemoryStorage};
use crate::error::{Error, Result};
use crate::types::{
    CommitMessageMode, MergeConfig, MergeMethod, Priority, RebaseFallback, StrictMethod,
    StrictMode,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Login used by the engine when none is configured
pub const DEFAULT_BOT_IDENTITY: &str = "mergeq[bot]";

/// Fully normalized policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Policy {
    /// Per-pull merge policy
    pub merge: MergeConfig,
    /// Queue limits
    pub queue: QueueSettings,
    /// Entitlement cache windows
    pub entitlements: EntitlementSettings,
    /// Status reporting
    pub reporting: ReportingSettings,
}

impl Policy {
    /// Render the policy back to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize policy: {e}")))
    }
}

/// Queue limits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueSettings {
    /// Maximum time an entry may wait, for every branch
    pub max_wait_minutes: Option<u32>,
    /// Per-branch overrides
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub branches: BTreeMap<String, BranchQueueSettings>,
}

/// Queue limits of one branch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchQueueSettings {
    /// Maximum time an entry may wait on this branch
    pub max_wait_minutes: Option<u32>,
}

impl QueueSettings {
    /// Maximum wait on `branch`; `None` means entries never expire
    pub fn max_wait_for(&self, branch: &str) -> Option<Duration> {
        self.branches
            .get(branch)
            .and_then(|b| b.max_wait_minutes)
            .or(self.max_wait_minutes)
            .map(|minutes| Duration::minutes(i64::from(minutes)))
    }

    fn validate(&self) -> Result<()> {
        if self.max_wait_minutes == Some(0) {
            return Err(Error::Config("queue.max_wait_minutes must be positive".to_string()));
        }
        for (branch, settings) in &self.branches {
            if settings.max_wait_minutes == Some(0) {
                return Err(Error::Config(format!(
                    "queue.branches.{branch}.max_wait_minutes must be positive"
                )));
            }
        }
        Ok(())
    }
}

/// Entitlement cache windows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntitlementSettings {
    /// Entries younger than this are served without refetching
    pub cache_validity_seconds: u32,
    /// Expired entries younger than this are served when refetching fails
    pub cache_retention_seconds: u32,
}

impl Default for EntitlementSettings {
    fn default() -> Self {
        Self {
            cache_validity_seconds: 3600,
            cache_retention_seconds: 60 * 60 * 24 * 3,
        }
    }
}

impl EntitlementSettings {
    /// In-memory cache with these windows
    pub fn build_cache(&self) -> EntitlementCache {
        EntitlementCache::new(
            Box::new(MemoryStorage::default()),
            Duration::seconds(i64::from(self.cache_validity_seconds)),
            Duration::seconds(i64::from(self.cache_retention_seconds)),
        )
    }
}

/// Status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportingSettings {
    /// Logins whose merges are reported as automatic
    pub bot_identities: Vec<String>,
}

impl Default for ReportingSettings {
    fn default() -> Self {
        Self {
            bot_identities: vec![DEFAULT_BOT_IDENTITY.to_string()],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPolicy {
    #[serde(default)]
    merge: RawMerge,
    #[serde(default)]
    queue: QueueSettings,
    #[serde(default)]
    entitlements: EntitlementSettings,
    #[serde(default)]
    reporting: ReportingSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMerge {
    method: Option<MergeMethod>,
    rebase_fallback: Option<RebaseFallback>,
    strict: Option<RawStrict>,
    strict_method: Option<StrictMethod>,
    priority: Option<RawPriority>,
    commit_message: Option<CommitMessageMode>,
    bot_account: Option<String>,
    update_bot_account: Option<String>,
    merge_bot_account: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawStrict {
    Flag(bool),
    Named(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPriority {
    Value(i64),
    Alias(String),
}

/// Normalize a textual `strict` value
///
/// Accepts the legacy spellings and the canonical variant names.
pub fn parse_strict(value: &str) -> Result<StrictMode> {
    match value {
        "false" | "disabled" => Ok(StrictMode::Disabled),
        "true" | "continuous" => Ok(StrictMode::Continuous),
        "smart" | "smart+ordered" | "ordered" => Ok(StrictMode::Ordered),
        "smart+fastpath" | "smart+fasttrack" | "fasttrack" => Ok(StrictMode::FastTrack),
        other => Err(Error::Config(format!("unknown strict mode `{other}`"))),
    }
}

/// Normalize a priority alias or number
pub fn parse_priority(value: &str) -> Result<Priority> {
    if let Some(priority) = Priority::from_alias(value) {
        return Ok(priority);
    }
    value
        .parse::<i64>()
        .map_err(|_| Error::Config(format!("unknown priority `{value}`")))
        .and_then(priority_from_int)
}

fn priority_from_int(value: i64) -> Result<Priority> {
    u32::try_from(value)
        .ok()
        .filter(|v| (1..=Priority::MAX.0).contains(v))
        .map(Priority)
        .ok_or_else(|| {
            Error::Config(format!(
                "priority {value} out of range 1..={}",
                Priority::MAX.0
            ))
        })
}

impl RawMerge {
    fn normalize(self) -> Result<MergeConfig> {
        let defaults = MergeConfig::default();
        let strict = match self.strict {
            None => defaults.strict,
            Some(RawStrict::Flag(false)) => StrictMode::Disabled,
            Some(RawStrict::Flag(true)) => StrictMode::Continuous,
            Some(RawStrict::Named(name)) => parse_strict(&name)?,
        };
        let priority = match self.priority {
            None => defaults.priority,
            Some(RawPriority::Value(v)) => priority_from_int(v)?,
            Some(RawPriority::Alias(name)) => parse_priority(&name)?,
        };

        Ok(MergeConfig {
            method: self.method.unwrap_or(defaults.method),
            rebase_fallback: self.rebase_fallback.unwrap_or(defaults.rebase_fallback),
            strict,
            strict_method: self.strict_method.unwrap_or(defaults.strict_method),
            priority,
            bot_account: self.bot_account,
            update_bot_account: self.update_bot_account,
            merge_bot_account: self.merge_bot_account,
            commit_message: self.commit_message.unwrap_or(defaults.commit_message),
        })
    }
}

/// Parse and normalize a policy document
pub fn parse_policy(content: &str) -> Result<Policy> {
    let raw: RawPolicy = toml::from_str(content)?;
    raw.queue.validate()?;
    Ok(Policy {
        merge: raw.merge.normalize()?,
        queue: raw.queue,
        entitlements: raw.entitlements,
        reporting: raw.reporting,
    })
}

/// Load the policy file at `path`
///
/// Returns the default policy if the file doesn't exist.
pub fn load_policy(path: &Path) -> Result<Policy> {
    if !path.exists() {
        return Ok(Policy::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    parse_policy(&content).map_err(|e| match e {
        Error::Toml(e) => Error::Config(format!("failed to parse {}: {e}", path.display())),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let temp = TempDir::new().unwrap();
        let policy = load_policy(&temp.path().join("mergeq.toml")).unwrap();
        assert_eq!(policy, Policy::default());
        assert_eq!(policy.reporting.bot_identities, vec![DEFAULT_BOT_IDENTITY]);
    }

    #[test]
    fn test_strict_aliases() {
        assert_eq!(parse_strict("smart").unwrap(), StrictMode::Ordered);
        assert_eq!(parse_strict("smart+ordered").unwrap(), StrictMode::Ordered);
        assert_eq!(parse_strict("smart+fastpath").unwrap(), StrictMode::FastTrack);
        assert_eq!(parse_strict("smart+fasttrack").unwrap(), StrictMode::FastTrack);
        assert!(matches!(parse_strict("smart+yolo"), Err(Error::Config(_))));
    }

    #[test]
    fn test_boolean_strict() {
        let policy = parse_policy("[merge]\nstrict = true\n").unwrap();
        assert_eq!(policy.merge.strict, StrictMode::Continuous);
        let policy = parse_policy("[merge]\nstrict = false\n").unwrap();
        assert_eq!(policy.merge.strict, StrictMode::Disabled);
    }

    #[test]
    fn test_priority_forms() {
        let policy = parse_policy("[merge]\npriority = \"high\"\n").unwrap();
        assert_eq!(policy.merge.priority, Priority::HIGH);
        let policy = parse_policy("[merge]\npriority = 4242\n").unwrap();
        assert_eq!(policy.merge.priority, Priority(4242));
        assert!(parse_policy("[merge]\npriority = 0\n").is_err());
        assert!(parse_policy("[merge]\npriority = 10001\n").is_err());
        assert!(parse_policy("[merge]\npriority = \"urgent\"\n").is_err());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(matches!(
            parse_policy("[merge]\nstrategy = \"merge\"\n"),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn test_branch_max_wait_override() {
        let policy = parse_policy(
            "[queue]\nmax_wait_minutes = 240\n\n[queue.branches.main]\nmax_wait_minutes = 60\n",
        )
        .unwrap();
        assert_eq!(policy.queue.max_wait_for("main"), Some(Duration::minutes(60)));
        assert_eq!(policy.queue.max_wait_for("develop"), Some(Duration::minutes(240)));
        assert_eq!(QueueSettings::default().max_wait_for("main"), None);
        assert!(parse_policy("[queue]\nmax_wait_minutes = 0\n").is_err());
    }

    #[test]
    fn test_normalized_policy_reparses() {
        let policy = parse_policy(
            "[merge]\nmethod = \"squash\"\nstrict = \"smart+fastpath\"\npriority = \"low\"\nrebase_fallback = \"none\"\ncommit_message = \"title+body\"\nmerge_bot_account = \"octobot\"\n",
        )
        .unwrap();
        let rendered = policy.to_toml().unwrap();
        assert_eq!(parse_policy(&rendered).unwrap(), policy);
    }
}
