//! Per-provider counters.
//!
//! Each provider owns one hash under `stats:<provider_id>`. Mutations for a
//! provider run under that provider's lock so a counter update is never
//! observed half applied; different providers never contend.

use log::{debug, trace};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::errors::{ProofResult, StoreError, StoreResult};
use crate::core::logging::format_file_size;
use crate::core::types::{TaskKind, Tier};
use crate::bonding::store::MetadataStore;

pub const STATS_KEY_PREFIX: &str = "stats:";

const LEGACY_RETRIEVE_FIELDS: [(&str, &str); 2] = [
    ("retrieval_successes", "retrieve_successes"),
    ("retrieval_attempts", "retrieve_attempts"),
];

pub fn stats_key(provider_id: &str) -> String {
    format!("{}{}", STATS_KEY_PREFIX, provider_id)
}

/// Snapshot of one provider's hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatistics {
    pub store_attempts: u64,
    pub store_successes: u64,
    pub retrieve_attempts: u64,
    pub retrieve_successes: u64,
    pub challenge_attempts: u64,
    pub challenge_successes: u64,
    /// Survives rollovers, unlike the per-task counters
    pub total_successes: u64,
    pub tier: Tier,
    pub storage_limit: u64,
}

impl Default for ProviderStatistics {
    fn default() -> Self {
        Self {
            store_attempts: 0,
            store_successes: 0,
            retrieve_attempts: 0,
            retrieve_successes: 0,
            challenge_attempts: 0,
            challenge_successes: 0,
            total_successes: 0,
            tier: Tier::Bronze,
            storage_limit: Tier::Bronze.storage_limit(),
        }
    }
}

impl ProviderStatistics {
    pub fn attempts(&self, task: TaskKind) -> u64 {
        match task {
            TaskKind::Store => self.store_attempts,
            TaskKind::Retrieve => self.retrieve_attempts,
            TaskKind::Challenge => self.challenge_attempts,
        }
    }

    pub fn successes(&self, task: TaskKind) -> u64 {
        match task {
            TaskKind::Store => self.store_successes,
            TaskKind::Retrieve => self.retrieve_successes,
            TaskKind::Challenge => self.challenge_successes,
        }
    }

    pub fn total_attempts(&self) -> u64 {
        TaskKind::ALL.iter().map(|t| self.attempts(*t)).sum()
    }

    /// Sum of the per-task success counters
    pub fn task_successes(&self) -> u64 {
        TaskKind::ALL.iter().map(|t| self.successes(*t)).sum()
    }

    fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("store_attempts", self.store_attempts.to_string()),
            ("store_successes", self.store_successes.to_string()),
            ("retrieve_attempts", self.retrieve_attempts.to_string()),
            ("retrieve_successes", self.retrieve_successes.to_string()),
            ("challenge_attempts", self.challenge_attempts.to_string()),
            ("challenge_successes", self.challenge_successes.to_string()),
            ("total_successes", self.total_successes.to_string()),
            ("tier", self.tier.name().to_string()),
            ("storage_limit", self.storage_limit.to_string()),
        ]
    }

    /// Parse a stored hash. Missing counters read as zero.
    pub fn from_fields(key: &str, fields: &HashMap<String, String>) -> StoreResult<Self> {
        let counter = |field: &str| -> StoreResult<u64> {
            match fields.get(field) {
                None => Ok(0),
                Some(value) => value.parse().map_err(|_| StoreError::Corrupt {
                    key: key.to_string(),
                    field: field.to_string(),
                    value: value.clone(),
                }),
            }
        };

        let tier = match fields.get("tier") {
            None => Tier::Bronze,
            Some(name) => Tier::from_name(name).ok_or_else(|| StoreError::Corrupt {
                key: key.to_string(),
                field: "tier".to_string(),
                value: name.clone(),
            })?,
        };

        let mut stats = Self {
            store_attempts: counter("store_attempts")?,
            store_successes: counter("store_successes")?,
            retrieve_attempts: counter("retrieve_attempts")?,
            retrieve_successes: counter("retrieve_successes")?,
            challenge_attempts: counter("challenge_attempts")?,
            challenge_successes: counter("challenge_successes")?,
            total_successes: 0,
            tier,
            storage_limit: Tier::Bronze.storage_limit(),
        };
        stats.total_successes = match fields.get("total_successes") {
            Some(_) => counter("total_successes")?,
            None => stats.task_successes(),
        };
        if fields.contains_key("storage_limit") {
            stats.storage_limit = counter("storage_limit")?;
        }
        Ok(stats)
    }
}

/// Handle over the metadata store for everything statistics related
pub struct StatisticsBook {
    store: Arc<dyn MetadataStore>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StatisticsBook {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    fn provider_lock(&self, provider_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(provider_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` inside the provider's critical section
    pub fn with_provider_lock<T>(&self, provider_id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.provider_lock(provider_id);
        let _guard = lock.lock();
        f()
    }

    pub fn is_registered(&self, provider_id: &str) -> ProofResult<bool> {
        Ok(self.store.exists(&stats_key(provider_id))?)
    }

    fn register_locked(&self, provider_id: &str) -> ProofResult<()> {
        debug!("Registering new provider {}...", provider_id);
        let fields = ProviderStatistics::default().to_fields();
        self.store.hset_multiple(&stats_key(provider_id), &fields)?;
        Ok(())
    }

    /// Fold legacy `retrieval_*` fields into `retrieve_*` and rebuild a
    /// missing `total_successes`.
    fn normalize_locked(&self, key: &str) -> ProofResult<()> {
        for (legacy, current) in LEGACY_RETRIEVE_FIELDS {
            if let Some(value) = self.store.hget(key, legacy)? {
                let legacy_count: i64 = value.parse().map_err(|_| StoreError::Corrupt {
                    key: key.to_string(),
                    field: legacy.to_string(),
                    value: value.clone(),
                })?;
                self.store.hincrby(key, current, legacy_count)?;
                self.store.hdel(key, legacy)?;
                debug!("Migrated {}.{} -> {}", key, legacy, current);
            }
        }

        if self.store.hget(key, "total_successes")?.is_none() {
            let fields = self.store.hgetall(key)?;
            let rebuilt = ProviderStatistics::from_fields(key, &fields)?.task_successes();
            let mut ensure: Vec<(&str, String)> = vec![("total_successes", rebuilt.to_string())];
            for task in TaskKind::ALL {
                if !fields.contains_key(task.successes_field()) {
                    ensure.push((task.successes_field(), "0".to_string()));
                }
            }
            self.store.hset_multiple(key, &ensure)?;
        }
        Ok(())
    }

    /// Count one verified outcome. Registers the provider on first sight.
    pub fn record_outcome(
        &self,
        provider_id: &str,
        task: TaskKind,
        success: bool,
    ) -> ProofResult<ProviderStatistics> {
        let key = stats_key(provider_id);
        self.with_provider_lock(provider_id, || -> ProofResult<ProviderStatistics> {
            if !self.store.exists(&key)? {
                self.register_locked(provider_id)?;
            }
            self.normalize_locked(&key)?;

            let mut deltas = vec![(task.attempts_field(), 1)];
            if success {
                deltas.push((task.successes_field(), 1));
                deltas.push(("total_successes", 1));
            }
            self.store.hincrby_multiple(&key, &deltas)?;

            let stats = ProviderStatistics::from_fields(&key, &self.store.hgetall(&key)?)?;
            trace!(
                "{} {} {}: {}/{} (total successes {})",
                provider_id,
                task,
                if success { "success" } else { "failure" },
                stats.successes(task),
                stats.attempts(task),
                stats.total_successes
            );
            Ok(stats)
        })
    }

    pub fn get_statistics(&self, provider_id: &str) -> ProofResult<Option<ProviderStatistics>> {
        let key = stats_key(provider_id);
        let fields = self.store.hgetall(&key)?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(ProviderStatistics::from_fields(&key, &fields)?))
    }

    /// Persist a new tier together with its storage limit
    pub fn set_tier(&self, provider_id: &str, tier: Tier) -> ProofResult<()> {
        self.store.hset_multiple(
            &stats_key(provider_id),
            &[
                ("tier", tier.name().to_string()),
                ("storage_limit", tier.storage_limit().to_string()),
            ],
        )?;
        Ok(())
    }

    /// Every provider with a statistics hash
    pub fn providers(&self) -> ProofResult<Vec<String>> {
        Ok(self
            .store
            .scan_prefix(STATS_KEY_PREFIX)?
            .into_iter()
            .map(|key| key[STATS_KEY_PREFIX.len()..].to_string())
            .collect())
    }

    /// Zero the per-task counters, keeping total successes and tier
    pub fn reset_statistics(&self, provider_id: &str) -> ProofResult<()> {
        let key = stats_key(provider_id);
        self.with_provider_lock(provider_id, || -> ProofResult<()> {
            if !self.store.exists(&key)? {
                return Ok(());
            }
            // Preserve the lifetime total before the per-task counters vanish
            self.normalize_locked(&key)?;
            let zeroed: Vec<(&str, String)> = TaskKind::ALL
                .iter()
                .flat_map(|t| {
                    [
                        (t.attempts_field(), "0".to_string()),
                        (t.successes_field(), "0".to_string()),
                    ]
                })
                .collect();
            self.store.hset_multiple(&key, &zeroed)?;
            Ok(())
        })
    }

    pub fn rollover_all(&self) -> ProofResult<usize> {
        let providers = self.providers()?;
        for provider in &providers {
            self.reset_statistics(provider)?;
        }
        debug!("Rolled over statistics for {} providers", providers.len());
        Ok(providers.len())
    }

    /// Storage ceiling; unregistered providers get the lowest tier's
    pub fn storage_limit(&self, provider_id: &str) -> ProofResult<u64> {
        Ok(self
            .get_statistics(provider_id)?
            .map_or(Tier::Bronze.storage_limit(), |s| s.storage_limit))
    }

    pub fn provider_at_capacity(&self, provider_id: &str, used_bytes: u64) -> ProofResult<bool> {
        let limit = self.storage_limit(provider_id)?;
        let full = used_bytes >= limit;
        if full {
            debug!(
                "{} at capacity: {} of {}",
                provider_id,
                format_file_size(used_bytes),
                format_file_size(limit)
            );
        }
        Ok(full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonding::store::MemoryStore;
    use crate::core::errors::ProofError;
    use proptest::prelude::*;

    fn book() -> (Arc<MemoryStore>, StatisticsBook) {
        let store = Arc::new(MemoryStore::new());
        let book = StatisticsBook::new(store.clone());
        (store, book)
    }

    #[test]
    fn test_lazy_registration() {
        let (_, book) = book();
        assert!(!book.is_registered("alice").unwrap());
        assert_eq!(book.get_statistics("alice").unwrap(), None);

        let stats = book.record_outcome("alice", TaskKind::Store, true).unwrap();
        assert_eq!(stats.store_attempts, 1);
        assert_eq!(stats.store_successes, 1);
        assert_eq!(stats.total_successes, 1);
        assert_eq!(stats.tier, Tier::Bronze);
        assert_eq!(stats.storage_limit, Tier::Bronze.storage_limit());
        assert!(book.is_registered("alice").unwrap());
    }

    #[test]
    fn test_failure_only_counts_attempt() {
        let (_, book) = book();
        book.record_outcome("bob", TaskKind::Challenge, true).unwrap();
        let stats = book.record_outcome("bob", TaskKind::Challenge, false).unwrap();
        assert_eq!(stats.challenge_attempts, 2);
        assert_eq!(stats.challenge_successes, 1);
        assert_eq!(stats.total_successes, 1);
    }

    #[test]
    fn test_legacy_fields_migrate() {
        let (store, book) = book();
        store
            .hset_multiple(
                "stats:carol",
                &[
                    ("store_attempts", "4".to_string()),
                    ("store_successes", "3".to_string()),
                    ("retrieval_attempts", "10".to_string()),
                    ("retrieval_successes", "8".to_string()),
                    ("tier", "Silver".to_string()),
                ],
            )
            .unwrap();

        let stats = book.record_outcome("carol", TaskKind::Retrieve, true).unwrap();
        assert_eq!(stats.retrieve_attempts, 11);
        assert_eq!(stats.retrieve_successes, 9);
        // Rebuilt from 3 + 8, then the new success
        assert_eq!(stats.total_successes, 12);
        assert_eq!(stats.tier, Tier::Silver);
        assert!(store.hget("stats:carol", "retrieval_attempts").unwrap().is_none());
    }

    #[test]
    fn test_reset_keeps_total_and_tier() {
        let (_, book) = book();
        for _ in 0..3 {
            book.record_outcome("dave", TaskKind::Store, true).unwrap();
        }
        book.set_tier("dave", Tier::Gold).unwrap();
        assert_eq!(book.rollover_all().unwrap(), 1);

        let stats = book.get_statistics("dave").unwrap().unwrap();
        assert_eq!(stats.total_attempts(), 0);
        assert_eq!(stats.total_successes, 3);
        assert_eq!(stats.tier, Tier::Gold);
        assert_eq!(stats.storage_limit, Tier::Gold.storage_limit());
    }

    #[test]
    fn test_storage_limit_and_capacity() {
        let (_, book) = book();
        let bronze = Tier::Bronze.storage_limit();
        assert_eq!(book.storage_limit("nobody").unwrap(), bronze);
        assert!(!book.provider_at_capacity("nobody", bronze - 1).unwrap());
        assert!(book.provider_at_capacity("nobody", bronze).unwrap());
    }

    #[test]
    fn test_corrupt_tier_is_reported() {
        let (store, book) = book();
        store.hset("stats:erin", "tier", "Adamantium").unwrap();
        assert!(matches!(
            book.get_statistics("erin"),
            Err(ProofError::Store(StoreError::Corrupt { .. }))
        ));
    }

    #[test]
    fn test_failed_update_leaves_counters_untouched() {
        let (store, book) = book();
        book.record_outcome("gina", TaskKind::Store, true).unwrap();
        store.hset("stats:gina", "total_successes", "oops").unwrap();

        assert!(book.record_outcome("gina", TaskKind::Store, true).is_err());
        assert_eq!(
            store.hget("stats:gina", "store_attempts").unwrap().as_deref(),
            Some("1")
        );
        assert_eq!(
            store.hget("stats:gina", "store_successes").unwrap().as_deref(),
            Some("1")
        );
    }

    #[test]
    fn test_unavailable_store_is_retryable() {
        let (store, book) = book();
        store.set_available(false);
        let err = book.record_outcome("frank", TaskKind::Store, true).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_concurrent_outcomes_are_serialized() {
        let (_, book) = book();
        let book = Arc::new(book);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let book = book.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        book.record_outcome("grace", TaskKind::Challenge, i % 2 == 0)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let stats = book.get_statistics("grace").unwrap().unwrap();
        assert_eq!(stats.challenge_attempts, 400);
        assert_eq!(stats.challenge_successes, 200);
        assert_eq!(stats.total_successes, 200);
    }

    fn task_strategy() -> impl Strategy<Value = TaskKind> {
        prop_oneof![
            Just(TaskKind::Store),
            Just(TaskKind::Retrieve),
            Just(TaskKind::Challenge)
        ]
    }

    proptest! {
        #[test]
        fn prop_successes_never_exceed_attempts(
            outcomes in prop::collection::vec((task_strategy(), any::<bool>()), 1..60)
        ) {
            let (_, book) = book();
            let mut previous = ProviderStatistics::default();
            for (task, success) in outcomes {
                let stats = book.record_outcome("prop", task, success).unwrap();
                for t in TaskKind::ALL {
                    prop_assert!(stats.successes(t) <= stats.attempts(t));
                    prop_assert!(stats.attempts(t) >= previous.attempts(t));
                }
                previous = stats;
            }
        }
    }
}
