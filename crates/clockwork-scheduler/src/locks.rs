//! Per-task execution locks.
//!
//! At most one execution per task id may be in flight at a time, counting
//! both scheduled runs and manual triggers. The guard releases on drop, so
//! the lock is returned on every exit path, including panics unwinding
//! through a worker.

use std::sync::Arc;

use dashmap::DashMap;

/// Hands out non-blocking, single-holder locks keyed by task id.
pub trait LockProvider: Send + Sync {
    /// Try to take the lock for `key`. `None` means another execution holds
    /// it; callers treat that as "skip", never as an error.
    fn try_acquire(&self, key: &str) -> Option<LockGuard>;
}

/// Held lock; releasing happens in `Drop`.
pub struct LockGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LockGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// In-process [`LockProvider`] backed by a concurrent set of held keys.
///
/// Sufficient for the single-node deployment; a multi-node setup would put a
/// distributed implementation behind the same trait.
#[derive(Default)]
pub struct InProcessLocks {
    held: Arc<DashMap<String, ()>>,
}

impl InProcessLocks {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockProvider for InProcessLocks {
    fn try_acquire(&self, key: &str) -> Option<LockGuard> {
        match self.held.entry(key.to_string()) {
            dashmap::Entry::Occupied(_) => None,
            dashmap::Entry::Vacant(slot) => {
                slot.insert(());
                let held = Arc::clone(&self.held);
                let key = key.to_string();
                Some(LockGuard::new(move || {
                    held.remove(&key);
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let locks = InProcessLocks::new();
        let guard = locks.try_acquire("t1");
        assert!(guard.is_some());
        assert!(locks.try_acquire("t1").is_none());
    }

    #[test]
    fn distinct_keys_do_not_contend() {
        let locks = InProcessLocks::new();
        let _a = locks.try_acquire("a").unwrap();
        assert!(locks.try_acquire("b").is_some());
    }

    #[test]
    fn drop_releases_the_lock() {
        let locks = InProcessLocks::new();
        drop(locks.try_acquire("t1").unwrap());
        assert!(locks.try_acquire("t1").is_some());
    }

    #[test]
    fn release_survives_a_panicking_holder() {
        let locks = Arc::new(InProcessLocks::new());
        let inner = Arc::clone(&locks);
        let result = std::thread::spawn(move || {
            let _guard = inner.try_acquire("t1").unwrap();
            panic!("worker blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(locks.try_acquire("t1").is_some());
    }
}
