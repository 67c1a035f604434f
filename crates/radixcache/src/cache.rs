//! Cache facade: an LRU ring riding on a reference-counted store

use std::sync::Arc;

use parking_lot::Mutex;
use radixstore::{Error, Result};

use crate::backend::{RcStore, Storage};
use crate::lru::{LruRing, Touch};
use crate::stats::{CacheEvent, CacheStats};

/// Bounded cache combining a [`RcStore`] with an [`LruRing`]
///
/// The ring keeps at most `ring_size` entries alive on its own. Entries a
/// caller has pinned through [`fetch`](Self::fetch) stay alive until the
/// caller releases them, whether or not they are still in the ring.
#[derive(Debug)]
pub struct Cache<S: Storage> {
    /// Ring owning the store it drives
    ring: LruRing<RcStore<S>>,

    /// Cache statistics
    stats: Arc<CacheStats>,
}

impl<S: Storage> Cache<S> {
    /// Create a cache over `store` with a ring of `ring_size` slots
    pub fn new(ring_size: usize, store: RcStore<S>) -> Result<Self> {
        Ok(Self {
            ring: LruRing::new(ring_size, store)?,
            stats: Arc::new(CacheStats::new()),
        })
    }

    /// Get a value, loading it on a miss
    ///
    /// # Arguments
    /// * `key` - Key to look up
    /// * `load` - Produces the value when `key` is not resident
    ///
    /// # Returns
    /// * `Result<&S::Value>` - The value, pinned for the caller. Every
    ///   successful fetch must be paired with a [`release`](Self::release).
    pub fn fetch<F>(&mut self, key: u64, load: F) -> Result<&S::Value>
    where
        F: FnOnce(u64) -> Result<S::Value>,
    {
        let store = self.ring.backend_mut();
        store.storage().validate(key)?;

        if store.contains(key) {
            store.retain(key)?;
            self.stats.record(CacheEvent::Hit);
        } else {
            self.stats.record(CacheEvent::Miss);
            let value = load(key)?;
            store.put(key, value)?;
            self.stats.record(CacheEvent::Insert);
        }

        match self.ring.touch(key) {
            Ok(touch) => self.record(touch),
            Err(err) => {
                // Drop the caller's pin so a failed fetch holds nothing
                self.ring.backend_mut().release(key)?;
                return Err(err);
            }
        }

        self.ring.backend().peek(key).ok_or(Error::NotFound(key))
    }

    /// Store a value that only the cache holds
    ///
    /// The reference taken by the insert is handed to the ring, so the
    /// value lives until the ring evicts it. Inserting a resident key keeps
    /// the resident value and discards `value` through the cleanup callback.
    pub fn insert(&mut self, key: u64, value: S::Value) -> Result<()> {
        self.ring.backend_mut().put(key, value)?;
        self.stats.record(CacheEvent::Insert);

        match self.ring.touch_retained(key) {
            Ok(touch) => self.record(touch),
            Err(err) => {
                // The ring did not take the reference, so nobody holds it
                self.ring.backend_mut().release(key)?;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Drop a pin taken by [`fetch`](Self::fetch)
    pub fn release(&mut self, key: u64) -> Result<()> {
        self.ring.backend_mut().release(key)
    }

    /// Look at a resident value without pinning it
    pub fn peek(&self, key: u64) -> Option<&S::Value> {
        self.ring.backend().peek(key)
    }

    /// Check if `key` is resident
    pub fn contains(&self, key: u64) -> bool {
        self.ring.backend().contains(key)
    }

    /// Number of resident entries (ring-held or pinned)
    pub fn resident(&self) -> usize {
        self.ring.backend().len()
    }

    /// Number of occupied ring slots
    pub fn ring_len(&self) -> usize {
        self.ring.len()
    }

    /// Borrow the ring
    pub fn ring(&self) -> &LruRing<RcStore<S>> {
        &self.ring
    }

    /// Borrow the store
    pub fn store(&self) -> &RcStore<S> {
        self.ring.backend()
    }

    /// Release every ring slot; pinned entries stay resident
    pub fn clear_ring(&mut self) -> Result<()> {
        self.ring.clear()
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Shared handle to the statistics
    pub fn stats_handle(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    fn record(&self, touch: Touch) {
        match touch {
            Touch::Coalesced => self.stats.record(CacheEvent::Coalesced),
            Touch::Inserted { evicted: Some(_) } => {
                self.stats.record(CacheEvent::Eviction)
            }
            Touch::Inserted { evicted: None } => {}
        }
    }
}

/// [`Cache`] shareable across threads
///
/// One lock is held across each whole operation; nothing inside the cache
/// synchronizes on its own.
pub struct SharedCache<S: Storage> {
    cache: Arc<Mutex<Cache<S>>>,
    stats: Arc<CacheStats>,
}

impl<S: Storage> SharedCache<S> {
    /// Wrap a cache
    pub fn new(cache: Cache<S>) -> Self {
        let stats = cache.stats_handle();
        Self {
            cache: Arc::new(Mutex::new(cache)),
            stats,
        }
    }

    /// Fetch `key` and run `read` on the value while the lock is held
    ///
    /// The caller's pin is dropped before returning; afterwards only the ring
    /// keeps the entry alive.
    pub fn fetch_with<L, F, R>(&self, key: u64, load: L, read: F) -> Result<R>
    where
        L: FnOnce(u64) -> Result<S::Value>,
        F: FnOnce(&S::Value) -> R,
    {
        let mut cache = self.cache.lock();
        let result = read(cache.fetch(key, load)?);
        cache.release(key)?;
        Ok(result)
    }

    /// Store a value that only the cache holds
    pub fn insert(&self, key: u64, value: S::Value) -> Result<()> {
        self.cache.lock().insert(key, value)
    }

    /// Drop a pin
    pub fn release(&self, key: u64) -> Result<()> {
        self.cache.lock().release(key)
    }

    /// Run several operations under one lock
    pub fn with<R>(&self, f: impl FnOnce(&mut Cache<S>) -> R) -> R {
        f(&mut self.cache.lock())
    }

    /// Number of resident entries
    pub fn resident(&self) -> usize {
        self.cache.lock().resident()
    }

    /// Get cache statistics without taking the lock
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<S: Storage> Clone for SharedCache<S> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            stats: Arc::clone(&self.stats),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::RcArray;
    use crate::hash::RcHashMap;
    use crate::rc_radix::RcRadixTree;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn decode(key: u64) -> Result<Vec<u8>> {
        Ok(key.to_le_bytes().to_vec())
    }

    #[test]
    fn test_fetch_miss_then_hit() {
        let mut cache = Cache::new(4, RcRadixTree::new(drop)).unwrap();

        assert_eq!(cache.fetch(1 << 33, decode).unwrap()[4], 2);
        cache.release(1 << 33).unwrap();
        assert_eq!(cache.stats().count(CacheEvent::Miss), 1);

        cache.fetch(1 << 33, |_| panic!("resident key reloaded")).unwrap();
        cache.release(1 << 33).unwrap();
        assert_eq!(cache.stats().count(CacheEvent::Hit), 1);
        assert_eq!(cache.stats().count(CacheEvent::Coalesced), 1);

        // Only the ring's reference is left
        assert_eq!(cache.store().ref_count(1 << 33), Some(1));
    }

    #[test]
    fn test_fetch_pins_until_release() {
        let mut cache = Cache::new(1, RcHashMap::new(2, drop).unwrap()).unwrap();

        cache.fetch(10, decode).unwrap();
        // Evict 10 from the ring; the caller's pin keeps it resident
        cache.fetch(11, decode).unwrap();
        cache.release(11).unwrap();
        assert!(cache.contains(10));
        assert_eq!(cache.stats().count(CacheEvent::Eviction), 1);

        cache.release(10).unwrap();
        assert!(!cache.contains(10));
        assert_eq!(cache.resident(), 1);
    }

    #[test]
    fn test_insert_hands_reference_to_ring() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&cleaned);
        let store = RcArray::new(4, move |_: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        let mut cache = Cache::new(2, store).unwrap();

        cache.insert(0, 100).unwrap();
        cache.insert(1, 101).unwrap();
        assert_eq!(cache.store().ref_count(0), Some(1));

        cache.insert(2, 102).unwrap();
        assert!(!cache.contains(0));
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
        assert_eq!(cache.resident(), 2);
        assert_eq!(cache.ring_len(), 2);
    }

    #[test]
    fn test_insert_resident_key_keeps_value() {
        let mut cache = Cache::new(2, RcArray::new(4, drop).unwrap()).unwrap();
        cache.insert(3, 'a').unwrap();
        cache.insert(3, 'b').unwrap();

        assert_eq!(cache.peek(3), Some(&'a'));
        assert_eq!(cache.store().ref_count(3), Some(1));
        assert_eq!(cache.stats().count(CacheEvent::Coalesced), 1);
    }

    #[test]
    fn test_failed_insert_gives_back_reference() {
        let mut cache = Cache::new(2, RcArray::new(4, drop).unwrap()).unwrap();
        cache.insert(0, 'a').unwrap();
        // Drop the ring's reference behind its back; its slot now names a dead key
        cache.release(0).unwrap();
        cache.insert(1, 'b').unwrap();

        // Evicting the dead key fails, and the new value must not linger
        assert_eq!(cache.insert(2, 'c').unwrap_err(), Error::NotFound(0));
        assert!(!cache.contains(2));
        assert_eq!(cache.store().ref_count(2), None);
        assert_eq!(cache.resident(), 1);
        assert_eq!(cache.ring().keys().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_load_error_changes_nothing() {
        let mut cache: Cache<_> = Cache::new(2, RcRadixTree::<u8>::new(drop)).unwrap();

        let err = cache.fetch(5, |key| Err(Error::NotFound(key))).unwrap_err();
        assert_eq!(err, Error::NotFound(5));
        assert_eq!(cache.resident(), 0);
        assert_eq!(cache.ring_len(), 0);
    }

    #[test]
    fn test_out_of_range_skips_load() {
        let mut cache = Cache::new(2, RcArray::new(4, drop).unwrap()).unwrap();

        let err = cache
            .fetch(9, |_| -> Result<u8> { panic!("load called for invalid key") })
            .unwrap_err();
        assert_eq!(err, Error::OutOfRange { key: 9, len: 4 });
    }

    #[test]
    fn test_clear_ring_keeps_pinned() {
        let mut cache = Cache::new(4, RcRadixTree::new(drop)).unwrap();
        cache.fetch(1, decode).unwrap();
        cache.insert(2, vec![2]).unwrap();

        cache.clear_ring().unwrap();
        assert!(cache.contains(1));
        assert!(!cache.contains(2));

        cache.release(1).unwrap();
        assert_eq!(cache.resident(), 0);
    }

    #[test]
    fn test_shared_cache_across_threads() {
        let store = RcHashMap::new(8, drop).unwrap();
        let shared = SharedCache::new(Cache::new(16, store).unwrap());

        thread::scope(|scope| {
            for worker in 0..4u64 {
                let shared = shared.clone();
                scope.spawn(move || {
                    for i in 0..500u64 {
                        let key = (i * 7 + worker) % 64;
                        let len = shared.fetch_with(key, decode, |v| v.len()).unwrap();
                        assert_eq!(len, 8);
                    }
                });
            }
        });

        assert_eq!(shared.stats().snapshot().lookups(), 2000);
        // No caller pins remain, so only ring-held entries are resident
        shared.with(|cache| {
            assert!(cache.resident() <= cache.ring_len());
            assert!(cache.ring().keys().all(|key| cache.contains(key)));
        });
        assert!(shared.resident() <= 16);
    }
}
