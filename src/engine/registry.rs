//! Concurrent map from session key to machine instance.
//!
//! Each key owns a [`SessionSlot`]: the instance behind an async mutex plus
//! bookkeeping for eviction. Event processing for a key is serialized by
//! that mutex, so different keys never contend with each other.
//!
//! A slot that has been evicted is marked retired. A task that was already
//! queued on its mutex notices the flag after acquiring the lock and starts
//! over with a fresh slot, so no event is ever applied to an instance that
//! is no longer reachable from the registry.

use super::machine::MachineInstance;
use crate::config::EngineConfig;
use crate::core::StatePath;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry entry for one session key.
#[derive(Debug)]
pub struct SessionSlot {
    key: String,
    machine: Arc<Mutex<MachineInstance>>,
    last_touched_ms: AtomicI64,
    retired: AtomicBool,
}

impl SessionSlot {
    fn new(machine: MachineInstance) -> Self {
        Self {
            key: machine.key().to_string(),
            machine: Arc::new(Mutex::new(machine)),
            last_touched_ms: AtomicI64::new(Utc::now().timestamp_millis()),
            retired: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait for exclusive access to the instance. Waiters are served in FIFO order.
    pub async fn lock(&self) -> OwnedMutexGuard<MachineInstance> {
        Arc::clone(&self.machine).lock_owned().await
    }

    /// Whether a transition currently holds the instance.
    pub fn is_busy(&self) -> bool {
        self.machine.try_lock().is_err()
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    pub fn touch(&self, now: DateTime<Utc>) {
        self.last_touched_ms
            .fetch_max(now.timestamp_millis(), Ordering::AcqRel);
    }

    pub fn last_touched(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_touched_ms.load(Ordering::Acquire))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_touched())
            .to_std()
            .unwrap_or_default()
    }
}

/// Live sessions keyed by caller-supplied string.
#[derive(Debug)]
pub struct SessionRegistry {
    initial: StatePath,
    history_limit: usize,
    idle_ttl: Option<Duration>,
    max_sessions: Option<usize>,
    sessions: DashMap<String, Arc<SessionSlot>>,
}

impl SessionRegistry {
    /// Registry whose new instances start in `initial`.
    pub fn new(initial: StatePath, config: &EngineConfig) -> Self {
        Self {
            initial,
            history_limit: config.history_limit,
            idle_ttl: config.idle_ttl(),
            max_sessions: config.max_sessions,
            sessions: DashMap::new(),
        }
    }

    /// Slot for `key`, creating a fresh instance on first touch.
    ///
    /// Concurrent first touches of the same key all receive the same slot.
    pub fn get_or_create(&self, key: &str) -> Arc<SessionSlot> {
        let now = Utc::now();
        if let Some(slot) = self.get(key) {
            slot.touch(now);
            return slot;
        }

        if let Some(max) = self.max_sessions {
            while self.sessions.len() >= max {
                if !self.evict_least_recent() {
                    break;
                }
            }
        }

        let mut created = false;
        let slot = Arc::clone(
            self.sessions
                .entry(key.to_string())
                .or_insert_with(|| {
                    created = true;
                    Arc::new(SessionSlot::new(MachineInstance::new(
                        key,
                        self.initial.clone(),
                        self.history_limit,
                    )))
                })
                .value(),
        );

        if created {
            tracing::debug!(session.key = key, "session created");
        } else {
            slot.touch(now);
        }
        slot
    }

    pub fn get(&self, key: &str) -> Option<Arc<SessionSlot>> {
        self.sessions.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    /// Drop the session for `key`. Returns whether one existed.
    pub fn remove(&self, key: &str) -> bool {
        match self.sessions.remove(key) {
            Some((_, slot)) => {
                slot.retire();
                tracing::debug!(session.key = key, "session removed");
                true
            }
            None => false,
        }
    }

    /// Remove `slot` only if it is still the one registered under its key.
    pub(crate) fn remove_slot(&self, slot: &Arc<SessionSlot>) -> bool {
        let removed = self
            .sessions
            .remove_if(slot.key(), |_, current| Arc::ptr_eq(current, slot))
            .is_some();
        if removed {
            slot.retire();
        }
        removed
    }

    /// Evict every idle session untouched for longer than the configured TTL.
    ///
    /// Sessions with a transition in flight are skipped. Returns the number
    /// of sessions evicted.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let Some(ttl) = self.idle_ttl else {
            return 0;
        };
        let expired = |slot: &Arc<SessionSlot>| slot.idle_for(now) >= ttl && !slot.is_busy();

        let candidates: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| expired(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for key in candidates {
            if let Some((_, slot)) = self.sessions.remove_if(&key, |_, slot| expired(slot)) {
                slot.retire();
                evicted += 1;
            }
        }

        if evicted > 0 {
            tracing::info!(evicted, remaining = self.sessions.len(), "idle sessions evicted");
        }
        evicted
    }

    fn evict_least_recent(&self) -> bool {
        let oldest = self
            .sessions
            .iter()
            .filter(|entry| !entry.value().is_busy())
            .min_by_key(|entry| entry.value().last_touched())
            .map(|entry| entry.key().clone());

        let Some(key) = oldest else {
            return false;
        };

        match self.sessions.remove_if(&key, |_, slot| !slot.is_busy()) {
            Some((_, slot)) => {
                slot.retire();
                tracing::info!(session.key = %key, "session evicted at capacity");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(config: EngineConfig) -> SessionRegistry {
        SessionRegistry::new(StatePath::parse("idle"), &config)
    }

    #[test]
    fn same_key_yields_same_slot() {
        let registry = registry(EngineConfig::default());

        let first = registry.get_or_create("a");
        let second = registry.get_or_create("a");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn get_never_creates() {
        let registry = registry(EngineConfig::default());

        assert!(registry.get("a").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_retires_slot() {
        let registry = registry(EngineConfig::default());
        let slot = registry.get_or_create("a");

        assert!(registry.remove("a"));
        assert!(slot.is_retired());
        assert!(!registry.remove("a"));

        let fresh = registry.get_or_create("a");
        assert!(!Arc::ptr_eq(&slot, &fresh));
        assert!(!fresh.is_retired());
    }

    #[test]
    fn remove_slot_ignores_replaced_slot() {
        let registry = registry(EngineConfig::default());
        let stale = registry.get_or_create("a");
        registry.remove("a");
        let current = registry.get_or_create("a");

        assert!(!registry.remove_slot(&stale));
        assert!(registry.contains("a"));
        assert!(registry.remove_slot(&current));
        assert!(!registry.contains("a"));
    }

    #[test]
    fn idle_sessions_are_evicted() {
        let registry = registry(EngineConfig {
            idle_ttl_secs: Some(60),
            ..EngineConfig::default()
        });
        let stale = registry.get_or_create("stale");
        registry.get_or_create("fresh");

        let now = Utc::now();
        stale.last_touched_ms.store(
            (now - chrono::Duration::seconds(120)).timestamp_millis(),
            Ordering::Release,
        );

        assert_eq!(registry.evict_idle(now), 1);
        assert!(stale.is_retired());
        assert_eq!(registry.keys(), vec!["fresh".to_string()]);
    }

    #[test]
    fn idle_eviction_disabled_without_ttl() {
        let registry = registry(EngineConfig {
            idle_ttl_secs: None,
            ..EngineConfig::default()
        });
        registry.get_or_create("a");

        let far_future = Utc::now() + chrono::Duration::days(365);
        assert_eq!(registry.evict_idle(far_future), 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn busy_sessions_survive_idle_eviction() {
        let registry = registry(EngineConfig {
            idle_ttl_secs: Some(0),
            ..EngineConfig::default()
        });
        let slot = registry.get_or_create("a");
        let _guard = slot.lock().await;

        assert_eq!(registry.evict_idle(Utc::now() + chrono::Duration::seconds(5)), 0);
        assert!(registry.contains("a"));
    }

    #[test]
    fn capacity_evicts_least_recently_touched() {
        let registry = registry(EngineConfig {
            max_sessions: Some(2),
            ..EngineConfig::default()
        });
        let oldest = registry.get_or_create("a");
        registry.get_or_create("b");
        oldest.last_touched_ms.store(0, Ordering::Release);

        registry.get_or_create("c");

        assert_eq!(registry.len(), 2);
        assert!(oldest.is_retired());
        assert!(!registry.contains("a"));
        assert!(registry.contains("b"));
        assert!(registry.contains("c"));
    }
}
