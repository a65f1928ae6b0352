//! Registry of branch queues with one lock per branch

use super::Queue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::Mutex;
use tracing::debug;

/// Key of a branch queue
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueKey {
    /// `owner/repo`
    pub repository: String,
    /// Target branch
    pub branch: String,
}

impl QueueKey {
    /// Build a key
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
        }
    }
}

/// Shared store of branch queues
///
/// Each queue sits behind its own async mutex, so events for different
/// branches proceed in parallel while events for the same branch are
/// serialized. The map lock is only held to look up, create or prune a
/// queue, never across an await point.
#[derive(Debug, Default)]
pub struct QueueRegistry {
    queues: StdMutex<HashMap<QueueKey, Arc<Mutex<Queue>>>>,
}

impl QueueRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the queue of a branch, creating it if needed
    pub fn queue(&self, repository: &str, branch: &str) -> Arc<Mutex<Queue>> {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        let key = QueueKey::new(repository, branch);
        Arc::clone(queues.entry(key).or_insert_with(|| {
            debug!(repository, branch, "creating branch queue");
            Arc::new(Mutex::new(Queue::new(repository, branch)))
        }))
    }

    /// Branches of a repository that have a queue
    pub fn branches(&self, repository: &str) -> Vec<String> {
        let queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        let mut branches: Vec<String> = queues
            .keys()
            .filter(|k| k.repository == repository)
            .map(|k| k.branch.clone())
            .collect();
        branches.sort();
        branches
    }

    /// Drop the queue of a branch if it is empty and nobody holds it
    ///
    /// A queue still referenced outside the registry is kept, so a caller
    /// holding it never inserts into a queue the registry forgot about.
    pub fn prune_empty(&self, repository: &str, branch: &str) -> bool {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        let key = QueueKey::new(repository, branch);
        let idle = queues.get(&key).is_some_and(|queue| {
            Arc::strong_count(queue) == 1 && queue.try_lock().is_ok_and(|q| q.is_empty())
        });
        if idle {
            queues.remove(&key);
            debug!(repository, branch, "dropped empty branch queue");
        }
        idle
    }

    /// Remove a pull request from every queue of the repository except `keep`
    ///
    /// Used when a pull request is retargeted, so that it never sits in two
    /// branch queues at once. Returns the branches it was removed from.
    pub async fn remove_elsewhere(&self, repository: &str, number: u64, keep: &str) -> Vec<String> {
        let candidates: Vec<(String, Arc<Mutex<Queue>>)> = {
            let queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
            queues
                .iter()
                .filter(|(k, _)| k.repository == repository && k.branch != keep)
                .map(|(k, q)| (k.branch.clone(), Arc::clone(q)))
                .collect()
        };

        let mut removed = Vec::new();
        for (branch, queue) in candidates {
            if queue.lock().await.remove(number).is_some() {
                debug!(repository, branch = %branch, pull = number, "removed retargeted pull");
                removed.push(branch);
            }
        }
        for branch in &removed {
            self.prune_empty(repository, branch);
        }
        removed.sort();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueEntry;
    use crate::types::{MergeConfig, Owner, Priority, PullRequestRef};
    use chrono::Utc;

    fn entry(number: u64, branch: &str) -> QueueEntry {
        QueueEntry::new(
            PullRequestRef {
                owner: Owner {
                    id: 1,
                    login: "acme".to_string(),
                },
                repo: "widgets".to_string(),
                number,
                head_sha: "abc".to_string(),
                base_ref: branch.to_string(),
            },
            Priority::MEDIUM,
            Utc::now(),
            MergeConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_same_key_returns_same_queue() {
        let registry = QueueRegistry::new();
        let a = registry.queue("acme/widgets", "main");
        let b = registry.queue("acme/widgets", "main");
        assert!(Arc::ptr_eq(&a, &b));

        a.lock().await.insert(entry(1, "main")).unwrap();
        assert!(b.lock().await.contains(1));
    }

    #[tokio::test]
    async fn test_remove_elsewhere_keeps_target_branch() {
        let registry = QueueRegistry::new();
        registry
            .queue("acme/widgets", "main")
            .lock()
            .await
            .insert(entry(7, "main"))
            .unwrap();
        registry
            .queue("acme/widgets", "release")
            .lock()
            .await
            .insert(entry(7, "release"))
            .unwrap();

        let removed = registry.remove_elsewhere("acme/widgets", 7, "release").await;

        assert_eq!(removed, vec!["main".to_string()]);
        assert!(registry.queue("acme/widgets", "release").lock().await.contains(7));
        assert_eq!(registry.branches("acme/widgets"), vec!["release"]);
    }

    #[tokio::test]
    async fn test_prune_keeps_held_or_filled_queues() {
        let registry = QueueRegistry::new();
        let held = registry.queue("acme/widgets", "main");
        assert!(!registry.prune_empty("acme/widgets", "main"));

        held.lock().await.insert(entry(3, "main")).unwrap();
        drop(held);
        assert!(!registry.prune_empty("acme/widgets", "main"));

        registry.queue("acme/widgets", "main").lock().await.remove(3);
        assert!(registry.prune_empty("acme/widgets", "main"));
        assert!(registry.branches("acme/widgets").is_empty());
        assert!(!registry.prune_empty("acme/widgets", "main"));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_serialized() {
        let registry = Arc::new(QueueRegistry::new());
        let mut handles = Vec::new();
        for number in 1..=20 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let queue = registry.queue("acme/widgets", "main");
                queue.lock().await.insert(entry(number, "main"))
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(registry.queue("acme/widgets", "main").lock().await.len(), 20);
    }
}
