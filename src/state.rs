//! Versioned state containers.
//!
//! Each published state in the pipeline (the current detection set, the
//! sheet state) is owned by exactly one component and observed by everyone
//! else through a [`StateCell`]. Readers poll a [`StateWatcher`], which only
//! yields when the version advanced; that is what drives "re-render only on
//! change" without a UI framework.
//!
//! `publish_at` takes an explicit sequence number and rejects anything not
//! newer than the last accepted publish. The scheduler uses it so a slow
//! in-flight result can never overwrite a result from a later tick.

use std::sync::{Arc, Mutex};

struct Slot<T> {
    version: u64,
    value: T,
}

/// Single-writer, many-reader versioned container.
pub struct StateCell<T> {
    inner: Arc<Mutex<Slot<T>>>,
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> StateCell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Slot {
                version: 0,
                value: initial,
            })),
        }
    }

    /// Replace the value unconditionally. Returns the new version.
    pub fn publish(&self, value: T) -> u64 {
        let mut slot = self.lock();
        slot.version += 1;
        slot.value = value;
        slot.version
    }

    /// Replace the value only if `version` is newer than the last accepted
    /// publish. Returns false (value untouched) for stale versions.
    pub fn publish_at(&self, version: u64, value: T) -> bool {
        let mut slot = self.lock();
        if version <= slot.version {
            return false;
        }
        slot.version = version;
        slot.value = value;
        true
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    /// Current (version, value) pair.
    pub fn versioned(&self) -> (u64, T) {
        let slot = self.lock();
        (slot.version, slot.value.clone())
    }

    /// A watcher positioned at the initial version; it yields on the first
    /// publish after subscription, not on the initial value.
    pub fn subscribe(&self) -> StateWatcher<T> {
        StateWatcher {
            cell: self.clone(),
            seen: 0,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot<T>> {
        // Single-writer discipline makes poisoning unreachable in practice;
        // recover with the inner state rather than propagating a panic.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Polling subscriber for a [`StateCell`].
pub struct StateWatcher<T> {
    cell: StateCell<T>,
    seen: u64,
}

impl<T: Clone> StateWatcher<T> {
    /// The current value, if it changed since the last poll.
    pub fn poll(&mut self) -> Option<T> {
        let (version, value) = self.cell.versioned();
        if version > self.seen {
            self.seen = version;
            Some(value)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_yields_only_on_change() {
        let cell = StateCell::new(0u32);
        let mut watcher = cell.subscribe();

        // Version 0 is the initial value; nothing published yet.
        assert_eq!(watcher.poll(), None);

        cell.publish(7);
        assert_eq!(watcher.poll(), Some(7));
        assert_eq!(watcher.poll(), None);

        cell.publish(8);
        cell.publish(9);
        // Intermediate values may be skipped; only the latest is observable.
        assert_eq!(watcher.poll(), Some(9));
    }

    #[test]
    fn stale_sequence_is_rejected() {
        let cell = StateCell::new(Vec::<u32>::new());
        assert!(cell.publish_at(2, vec![2]));
        assert!(!cell.publish_at(1, vec![1]));
        assert!(!cell.publish_at(2, vec![22]));
        assert_eq!(cell.get(), vec![2]);
        assert!(cell.publish_at(3, vec![3]));
        assert_eq!(cell.versioned(), (3, vec![3]));
    }
}
