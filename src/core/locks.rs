//! Per-batch serialization of batch-level mutations.
//!
//! Execute, resume and single-relation retries all rewrite a batch's status and
//! counters. Holding the batch's lock for the whole call keeps two of them from
//! interleaving on the same batch; different batches never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Registry of one async mutex per batch id.
#[derive(Debug, Default)]
pub struct BatchLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl BatchLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `batch_id`. Access ends when the guard drops.
    pub async fn acquire(&self, batch_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries only referenced by the map are idle
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(batch_id).or_default())
        };
        trace!(batch_id, "Waiting for batch lock");
        lock.lock_owned().await
    }

    /// Whether some caller currently holds the lock for `batch_id`.
    pub async fn is_locked(&self, batch_id: i64) -> bool {
        self.locks
            .lock()
            .await
            .get(&batch_id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}
