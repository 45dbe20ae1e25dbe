//! Per-pull-request mutual exclusion for store mutations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Keyed async mutex: one writer per pull request, unrelated pull requests
/// proceed in parallel.
///
/// Entries that nobody holds or waits on are pruned on the next acquisition,
/// so the map stays bounded by the number of PRs with in-flight work.
#[derive(Debug, Default)]
pub(crate) struct PrLocks {
    slots: Mutex<HashMap<u64, Arc<AsyncMutex<()>>>>,
}

impl PrLocks {
    /// Waits until no other mutation for `pr` is in flight.
    pub(crate) async fn lock(&self, pr: u64) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(pr).or_default())
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
