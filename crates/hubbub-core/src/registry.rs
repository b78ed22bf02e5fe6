//! Process-wide set of running connections.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::connection::BotConnection;

/// Snapshot-style registry: readers clone an immutable `Arc` of the
/// current membership, writers atomically replace it. A reader never
/// observes a half-updated membership.
#[derive(Default)]
pub struct BotRegistry {
    inner: RwLock<Arc<Vec<Arc<BotConnection>>>>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current membership, in registration order.
    pub fn snapshot(&self) -> Arc<Vec<Arc<BotConnection>>> {
        self.inner.read().clone()
    }

    pub fn get(&self, server_id: &str) -> Option<Arc<BotConnection>> {
        self.snapshot()
            .iter()
            .find(|b| b.server_id() == server_id)
            .cloned()
    }

    /// Add a connection. A connection already registered under the same
    /// server id is dropped from the membership and returned so the caller
    /// can tear it down.
    pub fn insert(&self, bot: Arc<BotConnection>) -> Option<Arc<BotConnection>> {
        let mut guard = self.inner.write();
        let mut next: Vec<Arc<BotConnection>> = guard.iter().cloned().collect();
        let old = next
            .iter()
            .position(|b| b.server_id() == bot.server_id())
            .map(|i| next.remove(i));
        next.push(bot);
        *guard = Arc::new(next);
        old
    }

    /// Remove a connection and tear it down: its cleanups run and its
    /// modules are dropped.
    pub async fn remove(&self, server_id: &str) -> bool {
        let removed = {
            let mut guard = self.inner.write();
            let mut next: Vec<Arc<BotConnection>> = guard.iter().cloned().collect();
            let old = next
                .iter()
                .position(|b| b.server_id() == server_id)
                .map(|i| next.remove(i));
            *guard = Arc::new(next);
            old
        };
        match removed {
            Some(bot) => {
                bot.teardown().await;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
