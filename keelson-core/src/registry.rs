//! Thread-safe session registry: a coarse-locked map from session id to a
//! non-owning handle.
//!
//! Registry operations are infrequent relative to I/O (one insert/remove per
//! connection lifetime versus thousands of reads/writes), so a single
//! `parking_lot::Mutex` around a `hashbrown::HashMap` is the right trade —
//! no need for sharding or lock-free structures here.

use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Monotonic 64-bit session id generator, unique within one façade.
#[derive(Debug, Default)]
pub struct SessionIdAllocator(AtomicU64);

impl SessionIdAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    /// Allocate the next id.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Thread-safe mapping from session id to a non-owning (`Weak`) handle.
///
/// The registry never extends a session's lifetime: `get` promotes to a
/// strong reference only for the duration the caller holds it — a session is
/// reachable through at most one non-owning handle in the registry, and
/// through a strong reference only while an async operation is genuinely
/// outstanding.
pub struct SessionRegistry<T> {
    inner: Mutex<HashMap<u64, Weak<T>>>,
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SessionRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Insert `session` under `id`. Returns `false` (no-op) if `id` was
    /// already present and still resolves to a live session.
    pub fn insert(&self, id: u64, session: &Arc<T>) -> bool {
        let mut guard = self.inner.lock();
        if let Some(existing) = guard.get(&id) {
            if existing.strong_count() > 0 {
                return false;
            }
        }
        guard.insert(id, Arc::downgrade(session));
        true
    }

    /// Look up `id`, promoting to a strong reference. Returns `None` if the
    /// session has already been released.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<Arc<T>> {
        self.inner.lock().get(&id).and_then(Weak::upgrade)
    }

    /// Remove `id` from the registry, returning the handle that was stored.
    pub fn remove(&self, id: u64) -> Option<Weak<T>> {
        self.inner.lock().remove(&id)
    }

    /// Number of entries currently tracked, live or stale.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
