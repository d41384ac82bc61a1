//! Bounded, thread-safe chunk store with LRU eviction.
//!
//! The cache owns chunk lifetime. Evicting an entry runs the eviction
//! callback synchronously on the evicting thread, after the internal lock is
//! released, so callbacks may read the cache again. The default callback
//! clears the chunk so any other holder of its handle sees empty storage.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::chunk::ChunkHandle;
use super::location::Location;
use super::lru::LruTracker;
use super::resolver::ChunkResolver;

type EvictionCallback = Box<dyn Fn(Location, &ChunkHandle) + Send + Sync>;

struct CacheInner {
    chunks: HashMap<Location, ChunkHandle>,
    lru: LruTracker,
    capacity: usize,
    evictions: u64,
}

impl CacheInner {
    /// Remove least recently used entries until within capacity.
    fn evict_over_capacity(&mut self, evicted: &mut Vec<(Location, ChunkHandle)>) {
        while self.chunks.len() > self.capacity {
            let Some(location) = self.lru.pop_oldest() else {
                break;
            };
            if let Some(handle) = self.chunks.remove(&location) {
                self.evictions += 1;
                evicted.push((location, handle));
            }
        }
    }
}

/// Location-keyed chunk cache with a capacity bound.
///
/// Safe for concurrent use; every operation takes `&self`.
pub struct ChunkCache {
    inner: Mutex<CacheInner>,
    on_evict: EvictionCallback,
}

impl ChunkCache {
    /// Create a cache whose eviction callback clears the evicted chunk.
    pub fn new(capacity: usize) -> Self {
        Self::with_eviction_callback(capacity, |_, handle| handle.write().clear())
    }

    /// Create a cache with a custom eviction callback.
    ///
    /// The callback is responsible for releasing the chunk's resources.
    pub fn with_eviction_callback(
        capacity: usize,
        on_evict: impl Fn(Location, &ChunkHandle) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                chunks: HashMap::new(),
                lru: LruTracker::new(),
                capacity: capacity.max(1),
                evictions: 0,
            }),
            on_evict: Box::new(on_evict),
        }
    }

    /// Look up a chunk and mark it as recently used.
    pub fn get(&self, location: Location) -> Option<ChunkHandle> {
        let mut inner = self.inner.lock();
        let handle = inner.chunks.get(&location).cloned()?;
        inner.lru.touch(location);
        Some(handle)
    }

    /// Look up a chunk without affecting eviction order.
    pub fn peek(&self, location: Location) -> Option<ChunkHandle> {
        self.inner.lock().chunks.get(&location).cloned()
    }

    pub fn contains(&self, location: Location) -> bool {
        self.inner.lock().chunks.contains_key(&location)
    }

    /// Insert a chunk under its own location.
    ///
    /// A different chunk already cached at that location is evicted first;
    /// re-inserting the same handle only marks it as recently used. Least
    /// recently used entries are then evicted while over capacity.
    pub fn put(&self, handle: ChunkHandle) {
        let location = handle.read().location();
        let mut evicted = Vec::new();
        {
            let mut inner = self.inner.lock();
            if let Some(previous) = inner.chunks.insert(location, Arc::clone(&handle)) {
                if !Arc::ptr_eq(&previous, &handle) {
                    inner.evictions += 1;
                    evicted.push((location, previous));
                }
            }
            inner.lru.touch(location);
            inner.evict_over_capacity(&mut evicted);
        }
        self.notify_evicted(evicted);
    }

    /// Evict one entry. Returns false if nothing was cached there.
    pub fn evict(&self, location: Location) -> bool {
        let handle = {
            let mut inner = self.inner.lock();
            let Some(handle) = inner.chunks.remove(&location) else {
                return false;
            };
            inner.lru.remove(location);
            inner.evictions += 1;
            handle
        };
        self.notify_evicted(vec![(location, handle)]);
        true
    }

    /// Evict every entry.
    pub fn evict_all(&self) {
        let evicted: Vec<_> = {
            let mut inner = self.inner.lock();
            inner.lru.clear();
            inner.evictions += inner.chunks.len() as u64;
            inner.chunks.drain().collect()
        };
        self.notify_evicted(evicted);
    }

    /// Run deferred bookkeeping now: drop stale LRU records and evict down
    /// to capacity.
    ///
    /// Returns the number of entries evicted.
    pub fn maintain(&self) -> usize {
        let mut evicted = Vec::new();
        let compacted = {
            let mut inner = self.inner.lock();
            let compacted = inner.lru.compact();
            inner.evict_over_capacity(&mut evicted);
            compacted
        };
        let count = evicted.len();
        if compacted > 0 || count > 0 {
            log::debug!("cache maintenance: {} stale records dropped, {} chunks evicted", compacted, count);
        }
        self.notify_evicted(evicted);
        count
    }

    /// Number of cached chunks.
    pub fn len(&self) -> usize {
        self.inner.lock().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().chunks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Change the capacity bound.
    ///
    /// Shrinking does not evict immediately; excess entries are evicted on
    /// the next [`put`](Self::put) or [`maintain`](Self::maintain).
    pub fn set_capacity(&self, capacity: usize) {
        self.inner.lock().capacity = capacity.max(1);
    }

    /// Snapshot of cached locations, in no particular order.
    pub fn locations(&self) -> Vec<Location> {
        self.inner.lock().chunks.keys().copied().collect()
    }

    /// Total number of evictions since creation.
    pub fn eviction_count(&self) -> u64 {
        self.inner.lock().evictions
    }

    fn notify_evicted(&self, evicted: Vec<(Location, ChunkHandle)>) {
        for (location, handle) in evicted {
            let attached = handle.read().attach_count();
            if attached > 0 {
                log::warn!(
                    "evicting chunk {} while still attached by {} pager(s); detach before evicting",
                    location,
                    attached
                );
            }
            (self.on_evict)(location, &handle);
        }
    }
}

impl ChunkResolver for ChunkCache {
    fn get(&self, location: Location) -> Option<ChunkHandle> {
        self.peek(location)
    }
}

impl fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ChunkCache")
            .field("len", &inner.chunks.len())
            .field("capacity", &inner.capacity)
            .field("evictions", &inner.evictions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, BlockDef};
    use crate::chunk::chunk::Chunk;
    use crate::chunk::dims::ChunkDims;
    use parking_lot::RwLock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn handle(x: i32) -> ChunkHandle {
        let mut chunk = Chunk::new(Location::new(x, 0, 0), ChunkDims::new(2, 2, 2));
        chunk.set_block(0, 0, 0, Some(Block::new(BlockDef::solid("stone"))));
        Arc::new(RwLock::new(chunk))
    }

    fn loc(x: i32) -> Location {
        Location::new(x, 0, 0)
    }

    #[test]
    fn put_and_get() {
        let cache = ChunkCache::new(4);
        let chunk = handle(1);
        cache.put(Arc::clone(&chunk));

        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&cache.get(loc(1)).unwrap(), &chunk));
        assert!(cache.get(loc(2)).is_none());
    }

    #[test]
    fn evict_clears_chunk() {
        let cache = ChunkCache::new(4);
        let chunk = handle(1);
        cache.put(Arc::clone(&chunk));

        assert!(cache.evict(loc(1)));
        assert!(cache.get(loc(1)).is_none());
        assert!(chunk.read().is_cleared());
        assert!(!cache.evict(loc(1)));
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = ChunkCache::new(2);
        let first = handle(0);
        cache.put(Arc::clone(&first));
        cache.put(handle(1));
        cache.get(loc(0)); // 1 is now oldest
        cache.put(handle(2));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(loc(0)));
        assert!(!cache.contains(loc(1)));
        assert!(cache.contains(loc(2)));
        assert!(!first.read().is_cleared());
        assert_eq!(cache.eviction_count(), 1);
    }

    #[test]
    fn peek_does_not_touch() {
        let cache = ChunkCache::new(2);
        cache.put(handle(0));
        cache.put(handle(1));
        cache.peek(loc(0));
        ChunkResolver::get(&cache, loc(0));
        cache.put(handle(2));

        assert!(!cache.contains(loc(0)));
    }

    #[test]
    fn replacing_evicts_previous_chunk() {
        let cache = ChunkCache::new(4);
        let old = handle(1);
        let new = handle(1);
        cache.put(Arc::clone(&old));
        cache.put(Arc::clone(&new));

        assert_eq!(cache.len(), 1);
        assert!(old.read().is_cleared());
        assert!(!new.read().is_cleared());
        assert!(Arc::ptr_eq(&cache.get(loc(1)).unwrap(), &new));
    }

    #[test]
    fn reinserting_same_handle_keeps_it() {
        let cache = ChunkCache::new(4);
        let chunk = handle(1);
        cache.put(Arc::clone(&chunk));
        cache.put(Arc::clone(&chunk));

        assert_eq!(cache.len(), 1);
        assert!(!chunk.read().is_cleared());
        assert_eq!(cache.eviction_count(), 0);
    }

    #[test]
    fn attached_chunk_is_still_evicted() {
        let cache = ChunkCache::new(4);
        let chunk = handle(1);
        chunk.write().mark_attached();
        cache.put(Arc::clone(&chunk));

        assert!(cache.evict(loc(1)));
        assert!(chunk.read().is_cleared());
    }

    #[test]
    fn evict_all() {
        let cache = ChunkCache::new(8);
        let chunks: Vec<_> = (0..5).map(handle).collect();
        for chunk in &chunks {
            cache.put(Arc::clone(chunk));
        }

        cache.evict_all();

        assert!(cache.is_empty());
        assert!(chunks.iter().all(|c| c.read().is_cleared()));
    }

    #[test]
    fn shrink_is_applied_by_maintain() {
        let cache = ChunkCache::new(8);
        for x in 0..6 {
            cache.put(handle(x));
        }
        cache.get(loc(0));

        cache.set_capacity(2);
        assert_eq!(cache.len(), 6);

        assert_eq!(cache.maintain(), 4);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(loc(0)));
        assert!(cache.contains(loc(5)));
    }

    #[test]
    fn custom_callback_runs_per_eviction() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let cache = ChunkCache::with_eviction_callback(1, move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let first = handle(0);
        cache.put(Arc::clone(&first));
        cache.put(handle(1));
        cache.evict(loc(1));

        assert_eq!(count.load(Ordering::SeqCst), 2);
        // Custom callback does not clear.
        assert!(!first.read().is_cleared());
    }

    #[test]
    fn callback_may_reenter_cache() {
        let cache = Arc::new(ChunkCache::new(4));
        let weak = Arc::downgrade(&cache);
        let cache2 = ChunkCache::with_eviction_callback(4, move |location, _| {
            if let Some(other) = weak.upgrade() {
                other.evict(location);
            }
        });
        cache.put(handle(3));
        cache2.put(handle(3));
        cache2.evict(loc(3));

        assert!(!cache.contains(loc(3)));
    }
}
