//! Engine status broadcast.
//!
//! A single writer (the engine handle) publishes lifecycle states; any
//! number of subscribers observe them in publish order, with consecutive
//! duplicates dropped before fan-out. Delivery is synchronous on the
//! publisher's task — there is no hidden queue, just a last-value cell
//! compared before notifying.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Lifecycle state of the engine behind the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Initializing,
    Ready,
    Busy,
    Failed(String),
    Restarting,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Ready => write!(f, "ready"),
            Self::Busy => write!(f, "busy"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Restarting => write!(f, "restarting"),
        }
    }
}

type Listener = Arc<dyn Fn(&EngineStatus) + Send + Sync>;

#[derive(Default)]
struct Inner {
    last: Option<EngineStatus>,
    listeners: Vec<(u64, Listener)>,
    next_id: u64,
}

/// De-duplicating, ordered status stream. Cheap to clone; clones share the
/// same stream.
#[derive(Clone, Default)]
pub struct StatusBroadcaster {
    inner: Arc<Mutex<Inner>>,
}

impl StatusBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a status. A value equal to the previous one is dropped, so a
    /// listener never observes the same status twice in a row.
    pub fn publish(&self, status: EngineStatus) {
        let to_notify: Vec<(u64, Listener)> = {
            let mut inner = self.lock();
            if inner.last.as_ref() == Some(&status) {
                return;
            }
            inner.last = Some(status.clone());
            inner.listeners.clone()
        };

        // The lock is not held across callbacks, so a listener may
        // subscribe or unsubscribe from within one. An unsubscribe that
        // lands between the snapshot above and the callback below wins.
        for (id, listener) in to_notify {
            if self.is_subscribed(id) {
                listener(&status);
            }
        }
    }

    /// The most recently published status, if any.
    #[must_use]
    pub fn current(&self) -> Option<EngineStatus> {
        self.lock().last.clone()
    }

    /// Register a listener for subsequent statuses. No replay of the
    /// current value; read [`current`](Self::current) for that.
    pub fn subscribe(
        &self,
        listener: impl Fn(&EngineStatus) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, Arc::new(listener)));
        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    fn is_subscribed(&self, id: u64) -> bool {
        self.lock().listeners.iter().any(|(l, _)| *l == id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle for releasing one subscription.
pub struct Subscription {
    inner: Weak<Mutex<Inner>>,
    id: u64,
}

impl Subscription {
    /// Stop deliveries to this listener. Releasing twice is a no-op; after
    /// this returns the listener is never invoked again.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.listeners.retain(|(id, _)| *id != self.id);
        }
    }
}
