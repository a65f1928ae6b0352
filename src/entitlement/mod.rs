//! Subscription-gated features
//!
//! Entitlements only affect reporting and optional behaviour (priority
//! queues, bot accounts), never the queue decisions themselves.

mod cache;

pub use cache::{CacheStorage, CachedSubscription, EntitlementCache, MemoryStorage, SubscriptionSource};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Where owners manage their subscription
pub const DASHBOARD_URL: &str = "https://dashboard.mergeq.dev/github";

/// A subscription-gated feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Private repositories
    PrivateRepository,
    /// Large repositories
    LargeRepository,
    /// Honour configured merge priorities
    PriorityQueues,
    /// Custom checks
    CustomChecks,
    /// Random review requests
    RandomRequestReviews,
    /// Dedicated bot accounts for merges and branch updates
    MergeBotAccount,
    /// Legacy bot account
    BotAccount,
    /// Queue action
    QueueAction,
}

impl Feature {
    /// Parse a feature from its wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "private_repository" => Self::PrivateRepository,
            "large_repository" => Self::LargeRepository,
            "priority_queues" => Self::PriorityQueues,
            "custom_checks" => Self::CustomChecks,
            "random_request_reviews" => Self::RandomRequestReviews,
            "merge_bot_account" => Self::MergeBotAccount,
            "bot_account" => Self::BotAccount,
            "queue_action" => Self::QueueAction,
            _ => return None,
        })
    }
}

/// Feature lookup for repository owners
pub trait Entitlements: Send + Sync {
    /// Whether the owner may use `feature`
    fn has_feature(&self, owner_id: u64, feature: Feature) -> bool;

    /// Human-readable explanation of how to unlock a missing feature
    fn missing_feature_reason(&self, owner: &str) -> String {
        format!(
            "⚠ The [subscription]({DASHBOARD_URL}/{owner}/subscription) needs to be updated to enable this feature."
        )
    }
}

/// Subscription of one owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Owner account id
    pub owner_id: u64,
    /// Whether the subscription is active
    pub active: bool,
    /// Reason reported by the subscription service
    pub reason: String,
    /// Enabled features
    pub features: BTreeSet<Feature>,
}

impl Subscription {
    /// Build a subscription from feature wire names
    ///
    /// Unknown names are logged and skipped.
    pub fn from_feature_names<S: AsRef<str>>(
        owner_id: u64,
        active: bool,
        reason: impl Into<String>,
        names: &[S],
    ) -> Self {
        let features = names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                let feature = Feature::from_name(name);
                if feature.is_none() {
                    warn!(owner_id, feature = name, "unknown subscription feature");
                }
                feature
            })
            .collect();
        Self {
            owner_id,
            active,
            reason: reason.into(),
            features,
        }
    }

    /// Subscription without any feature
    pub fn free(owner_id: u64) -> Self {
        Self {
            owner_id,
            active: false,
            reason: "No subscription".to_string(),
            features: BTreeSet::new(),
        }
    }

    /// Whether the feature is available on this plan
    pub fn has(&self, feature: Feature) -> bool {
        self.active && self.features.contains(&feature)
    }
}

impl Entitlements for Subscription {
    fn has_feature(&self, owner_id: u64, feature: Feature) -> bool {
        self.owner_id == owner_id && self.has(feature)
    }
}
