use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per group, created on first use and dropped once nobody
/// holds or waits on it.
///
/// Held across the whole read-aggregate-replace cycle so two mutations of the
/// same group never recompute from the same stale ledger. Always acquire it
/// before opening a storage transaction.
#[derive(Clone, Default)]
pub struct GroupLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl GroupLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, group_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Only the map itself still references an idle lock.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(group_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub async fn tracked_groups(&self) -> usize {
        self.locks.lock().await.len()
    }
}
