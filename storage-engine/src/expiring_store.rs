use parking_lot::{Mutex, RwLock};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// A stored value and the instant it stops being served.
///
/// `expires_at == None` marks an entry set with a zero TTL: it lives until an
/// explicit `delete` or `clear`.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

/// Deadlines waiting for the sweeper.
///
/// Each key is queued once, under its earliest pending deadline. Re-setting a
/// key does not queue it again unless the new deadline is sooner; when a queued
/// deadline turns out to belong to a refreshed entry, the entry's current
/// deadline is queued in its place.
#[derive(Default)]
struct Deadlines {
    heap: BinaryHeap<Reverse<(Instant, String)>>,
    queued: HashMap<String, Instant>,
}

struct Inner<V> {
    name: String,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    deadlines: Mutex<Deadlines>,
    evictions: AtomicU64,
}

/// Process-local map from string keys to values with a per-entry absolute expiry.
///
/// Expired entries are never returned: `get` checks the deadline on every read
/// and removes the entry it found expired. A sweeper task started with
/// [`ExpiringStore::spawn_sweeper`] additionally drops expired entries nobody
/// reads again; it is cleanup only, correctness comes from the read-side check.
///
/// The handle is cheap to clone; all clones share the same entries.
pub struct ExpiringStore<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for ExpiringStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> ExpiringStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                entries: RwLock::new(HashMap::new()),
                deadlines: Mutex::new(Deadlines::default()),
                evictions: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Store `value` under `key` until `now + ttl`, replacing any previous entry.
    ///
    /// A zero `ttl` stores the value without a deadline: it is never swept and
    /// never expires on read, so it stays until `delete` or `clear`.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.set_if(key, value, ttl, |_| true);
    }

    /// Like [`set`](Self::set), but a live entry is only replaced when
    /// `replace(&current)` agrees. Missing and expired entries are always
    /// replaced. The check and the write happen under one write lock.
    ///
    /// Returns whether `value` was stored.
    pub fn set_if<F>(&self, key: impl Into<String>, value: V, ttl: Duration, replace: F) -> bool
    where
        F: FnOnce(&V) -> bool,
    {
        let key = key.into();
        let now = Instant::now();
        let expires_at = (!ttl.is_zero()).then(|| now + ttl);

        {
            let mut entries = self.inner.entries.write();
            if let Some(current) = entries.get(&key) {
                if !current.is_expired(now) && !replace(&current.value) {
                    return false;
                }
            }
            entries.insert(key.clone(), CacheEntry { value, expires_at });
        }

        if let Some(at) = expires_at {
            self.queue_deadline(key, at);
        }
        true
    }

    /// Return the value if present and not yet expired.
    ///
    /// Missing and expired keys look the same to the caller. An expired entry
    /// found here is removed; concurrent readers of the same expired key all get
    /// `None` and exactly one of them performs the removal.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        {
            let entries = self.inner.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        self.remove_if_expired(key, now);
        None
    }

    /// Remove `key`. Returns whether an entry (expired or not) was present.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.entries.write().remove(key).is_some()
    }

    /// Drop every entry. Readers see either the full store or the empty one.
    pub fn clear(&self) {
        let mut entries = self.inner.entries.write();
        entries.clear();
        let mut deadlines = self.inner.deadlines.lock();
        deadlines.heap.clear();
        deadlines.queued.clear();
    }

    /// Number of stored entries, including expired ones not yet removed.
    pub fn size(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Total expired entries removed so far, by reads or by the sweeper.
    pub fn evictions(&self) -> u64 {
        self.inner.evictions.load(Ordering::Relaxed)
    }

    /// Process every deadline that has passed and remove the keys that are
    /// still expired. Keys refreshed since their deadline was queued are kept
    /// and queued again under their current deadline.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();

        let due: Vec<String> = {
            let mut deadlines = self.inner.deadlines.lock();
            let mut due = Vec::new();
            while deadlines
                .heap
                .peek()
                .is_some_and(|Reverse((at, _))| *at <= now)
            {
                let Some(Reverse((at, key))) = deadlines.heap.pop() else {
                    break;
                };
                // Superseded by a sooner deadline for the same key.
                if deadlines.queued.get(&key) != Some(&at) {
                    continue;
                }
                deadlines.queued.remove(&key);
                due.push(key);
            }
            due
        };

        let mut removed = 0;
        for key in due {
            if self.remove_if_expired(&key, now) {
                removed += 1;
                continue;
            }
            let refreshed = self
                .inner
                .entries
                .read()
                .get(&key)
                .and_then(|entry| entry.expires_at);
            if let Some(at) = refreshed {
                self.queue_deadline(key, at);
            }
        }
        removed
    }

    /// Start the periodic eviction task for this store.
    ///
    /// The task only holds a weak reference, so it ends on its own once every
    /// handle to the store is dropped. Dropping the returned handle stops it too.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperHandle {
        let weak = Arc::downgrade(&self.inner);
        let interval = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let store = ExpiringStore { inner };
                let removed = store.purge_expired();
                if removed > 0 {
                    debug!(
                        "Swept {} expired entr{} from '{}'",
                        removed,
                        if removed == 1 { "y" } else { "ies" },
                        store.name()
                    );
                }
            }
        });

        SweeperHandle { handle }
    }

    fn queue_deadline(&self, key: String, at: Instant) {
        let mut deadlines = self.inner.deadlines.lock();
        if deadlines.queued.get(&key).is_none_or(|queued| at < *queued) {
            deadlines.queued.insert(key.clone(), at);
            deadlines.heap.push(Reverse((at, key)));
        }
    }

    #[cfg(test)]
    fn queued_deadlines(&self) -> usize {
        self.inner.deadlines.lock().heap.len()
    }

    fn remove_if_expired(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.inner.entries.write();

        // Re-check under the write lock: another reader may have removed it, or
        // a writer may have refreshed it since our read.
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            self.inner.evictions.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }
}

impl<V> Debug for ExpiringStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("name", &self.inner.name)
            .field("entry_count", &self.inner.entries.read().len())
            .field("evictions", &self.inner.evictions.load(Ordering::Relaxed))
            .finish()
    }
}

/// Owns the sweeper task of one store; aborts it when dropped.
#[derive(Debug)]
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn shutdown(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
