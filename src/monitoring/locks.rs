use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::target::TargetRef;

/// Per-target critical sections for state transitions and escalation.
#[derive(Default)]
pub struct TargetLocks {
    locks: DashMap<TargetRef, Arc<Mutex<()>>>,
}

impl TargetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, target: TargetRef) -> OwnedMutexGuard<()> {
        // Clone the handle out so no map shard stays locked across the await.
        let lock = self.locks.entry(target).or_default().value().clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_target_is_serialized() {
        let locks = Arc::new(TargetLocks::new());
        let guard = locks.acquire(TargetRef::website(1)).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(TargetRef::website(1)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // A different target is not blocked.
        let _other = locks.acquire(TargetRef::heartbeat(1)).await;

        drop(guard);
        contender.await.unwrap();
    }
}
