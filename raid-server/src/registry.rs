//! Process-wide raid registry.
//!
//! Each raid lives behind its own mutex. Locks are short and never held
//! across an await: tick, input handlers and windup tasks each lock, mutate,
//! drain the outbox and unlock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use raid_core::raid::RaidState;

/// A resident raid plus the tasks working on it
pub struct RaidHandle {
    pub id: String,
    pub team_id: i64,
    raid: Mutex<RaidState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    ended_at: Mutex<Option<Instant>>,
}

impl RaidHandle {
    pub fn new(raid: RaidState) -> Arc<Self> {
        Arc::new(Self {
            id: raid.id.clone(),
            team_id: raid.team_id,
            raid: Mutex::new(raid),
            tasks: Mutex::new(Vec::new()),
            ended_at: Mutex::new(None),
        })
    }

    pub fn lock(&self) -> MutexGuard<'_, RaidState> {
        self.raid.lock()
    }

    /// Keep a task so it can be aborted with the raid
    pub fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.lock().iter().filter(|t| !t.is_finished()).count()
    }

    pub fn abort_tasks(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    pub fn mark_ended(&self, at: Instant) {
        self.ended_at.lock().get_or_insert(at);
    }

    pub fn ended_at(&self) -> Option<Instant> {
        *self.ended_at.lock()
    }
}

/// Outcome of registering a freshly built raid
pub enum Claim {
    Inserted(Arc<RaidHandle>),
    /// A raid with the same id is still live
    Existing(Arc<RaidHandle>),
}

#[derive(Default)]
pub struct RaidRegistry {
    raids: RwLock<HashMap<String, Arc<RaidHandle>>>,
}

impl RaidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless a live raid already holds the id; an ended one is replaced
    pub fn claim(&self, handle: Arc<RaidHandle>) -> Claim {
        let mut raids = self.raids.write();
        if let Some(existing) = raids.get(&handle.id) {
            if !existing.lock().is_over() {
                return Claim::Existing(Arc::clone(existing));
            }
            existing.abort_tasks();
        }
        raids.insert(handle.id.clone(), Arc::clone(&handle));
        Claim::Inserted(handle)
    }

    pub fn get(&self, id: &str) -> Option<Arc<RaidHandle>> {
        self.raids.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<RaidHandle>> {
        let handle = self.raids.write().remove(id)?;
        handle.abort_tasks();
        Some(handle)
    }

    /// Snapshot of every resident raid
    pub fn handles(&self) -> Vec<Arc<RaidHandle>> {
        self.raids.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.raids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.raids.read().is_empty()
    }

    /// Drop ended raids older than `retention`, returning their ids
    pub fn sweep(&self, now: Instant, retention: Duration) -> Vec<String> {
        let mut raids = self.raids.write();
        let expired: Vec<String> = raids
            .values()
            .filter(|h| {
                h.ended_at()
                    .is_some_and(|at| now.saturating_duration_since(at) >= retention)
            })
            .map(|h| h.id.clone())
            .collect();
        for id in &expired {
            if let Some(handle) = raids.remove(id) {
                handle.abort_tasks();
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raid_core::grid::MapDefinition;
    use raid_core::raid::RaidOutcome;

    fn raid(id: &str) -> RaidState {
        RaidState::new(id, Arc::new(MapDefinition::open("arena", 4)), Some(1))
    }

    #[test]
    fn test_claim_keeps_live_raid() {
        let registry = RaidRegistry::new();
        let first = RaidHandle::new(raid("battle:1"));
        assert!(matches!(registry.claim(first), Claim::Inserted(_)));
        let second = RaidHandle::new(raid("battle:1"));
        assert!(matches!(registry.claim(second), Claim::Existing(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_claim_replaces_ended_raid() {
        let registry = RaidRegistry::new();
        let first = RaidHandle::new(raid("battle:1"));
        first.lock().finish(RaidOutcome::Aborted, "test");
        registry.claim(first);
        let second = RaidHandle::new(raid("battle:1"));
        let Claim::Inserted(handle) = registry.claim(second) else {
            panic!("Ended raid should be replaced");
        };
        assert!(!handle.lock().is_over());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_honours_retention() {
        let registry = RaidRegistry::new();
        let ended = RaidHandle::new(raid("battle:1"));
        registry.claim(Arc::clone(&ended));
        registry.claim(RaidHandle::new(raid("battle:2")));
        ended.mark_ended(Instant::now());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(registry.sweep(Instant::now(), Duration::from_secs(15)).is_empty());

        tokio::time::advance(Duration::from_secs(6)).await;
        let removed = registry.sweep(Instant::now(), Duration::from_secs(15));
        assert_eq!(removed, vec!["battle:1".to_string()]);
        assert!(registry.get("battle:2").is_some(), "Running raid untouched");
    }
}
