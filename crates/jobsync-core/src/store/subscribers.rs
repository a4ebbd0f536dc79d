//! Subscriber registry with per-listener panic isolation.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::error;

/// Callback invoked with the full state after every store mutation.
pub type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Identifier of a registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

pub(crate) struct Registry<S> {
    listeners: Mutex<Vec<(SubscriberId, Listener<S>)>>,
    next_id: AtomicU64,
}

impl<S> Registry<S> {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn add(&self, listener: Listener<S>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Call every listener with `state`.
    ///
    /// The listener list is copied first, so a callback may subscribe or
    /// unsubscribe without deadlocking. A panicking listener is logged and
    /// skipped; the rest still run.
    pub(crate) fn emit(&self, state: &S) {
        let listeners: Vec<_> = self.lock().clone();

        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| (*listener)(state))).is_err() {
                error!(subscriber = id.0, "Store subscriber panicked during emission");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriberId, Listener<S>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by `JobStore::subscribe`.
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription<S> {
    id: SubscriberId,
    registry: Weak<Registry<S>>,
}

impl<S> Subscription<S> {
    pub(crate) const fn new(id: SubscriberId, registry: Weak<Registry<S>>) -> Self {
        Self { id, registry }
    }

    /// ID of the registered listener.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the listener. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.id))
    }
}

impl<S> std::fmt::Debug for Subscription<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
