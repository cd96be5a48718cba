//! Subscriber lists with explicit, documented emission semantics.
//!
//! The layer re-publishes transport events at the extended level, and
//! every emission point shares the same rules:
//!
//! - subscribers run synchronously, in insertion order
//! - emission iterates a snapshot taken before the first invocation, so
//!   subscribing or unsubscribing from inside a handler never affects
//!   the current round
//! - unsubscribing an unknown id is a no-op

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Opaque handle returned by [`EventHub::subscribe`], used to remove the
/// subscription later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// An ordered subscriber list for one event kind.
pub struct EventHub<A> {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber<A>)>>,
}

impl<A> Default for EventHub<A> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            subscribers: RwLock::new(Vec::new()),
        }
    }
}

impl<A> EventHub<A> {
    /// Adds a subscriber at the end of the list.
    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write().push((id, Arc::new(f)));
        id
    }

    /// Removes a subscriber. No-op if the id was never issued here or
    /// was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.write().retain(|(sid, _)| *sid != id);
    }

    /// Invokes every current subscriber with `arg`, in insertion order.
    ///
    /// The list is snapshotted first and the lock released, so handlers
    /// may subscribe, unsubscribe, or emit re-entrantly.
    pub fn emit(&self, arg: &A) {
        let snapshot: Vec<Subscriber<A>> =
            self.read().iter().map(|(_, s)| Arc::clone(s)).collect();
        for subscriber in snapshot {
            subscriber(arg);
        }
    }

    /// Current number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.read().len()
    }

    fn read(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, Vec<(SubscriptionId, Subscriber<A>)>> {
        self.subscribers
            .read()
            .expect("event hub lock poisoned")
    }

    fn write(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, Vec<(SubscriptionId, Subscriber<A>)>> {
        self.subscribers
            .write()
            .expect("event hub lock poisoned")
    }
}
