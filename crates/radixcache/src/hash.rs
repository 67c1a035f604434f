//! Sharded hash map storage for arbitrary keys
//!
//! Keys are spread over a fixed number of independent maps. The shard is
//! picked by a seeded hash of the key, so the same key always lands in the
//! same shard for the lifetime of the storage.

use std::collections::HashMap;

use ahash::RandomState;
use radixstore::{Error, Result};

use crate::backend::{RcStore, Storage};
use crate::counted::Counted;

/// Reference-counted store over sharded hash maps
pub type RcHashMap<T> = RcStore<HashStorage<T>>;

// Fixed seeds keep the key-to-shard mapping reproducible across runs
const SHARD_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Fixed set of hash map shards
#[derive(Debug)]
pub struct HashStorage<T> {
    shards: Vec<HashMap<u64, Counted<T>, RandomState>>,
    selector: RandomState,
    len: usize,
}

impl<T> HashStorage<T> {
    /// Create `shard_count` empty shards (at least one)
    pub fn new(shard_count: usize) -> Result<Self> {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::new();
        shards.try_reserve_exact(shard_count)?;
        for _ in 0..shard_count {
            shards.push(HashMap::with_hasher(RandomState::new()));
        }

        Ok(Self {
            shards,
            selector: RandomState::with_seeds(
                SHARD_SEEDS[0],
                SHARD_SEEDS[1],
                SHARD_SEEDS[2],
                SHARD_SEEDS[3],
            ),
            len: 0,
        })
    }

    /// Number of shards
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard that holds (or would hold) `key`
    pub fn shard_for_key(&self, key: u64) -> usize {
        (self.selector.hash_one(key) % self.shards.len() as u64) as usize
    }

    /// Number of entries in one shard
    pub fn shard_len(&self, shard: usize) -> usize {
        self.shards.get(shard).map_or(0, HashMap::len)
    }
}

impl<T> Storage for HashStorage<T> {
    type Value = T;

    fn get(&self, key: u64) -> Option<&Counted<T>> {
        self.shards[self.shard_for_key(key)].get(&key)
    }

    fn get_mut(&mut self, key: u64) -> Option<&mut Counted<T>> {
        let shard = self.shard_for_key(key);
        self.shards[shard].get_mut(&key)
    }

    fn insert(&mut self, key: u64, entry: Counted<T>) -> Result<&mut Counted<T>> {
        let index = self.shard_for_key(key);
        let shard = &mut self.shards[index];
        if shard.contains_key(&key) {
            return Err(Error::AlreadyPresent(key));
        }
        shard.try_reserve(1)?;
        self.len += 1;
        Ok(shard.entry(key).or_insert(entry))
    }

    fn remove(&mut self, key: u64) -> Option<Counted<T>> {
        let shard = self.shard_for_key(key);
        let entry = self.shards[shard].remove(&key)?;
        self.len -= 1;
        Some(entry)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        for shard in &mut self.shards {
            *shard = HashMap::with_hasher(RandomState::new());
        }
        self.len = 0;
    }
}

impl<T> RcStore<HashStorage<T>> {
    /// Create a store with `shard_count` hash map shards
    ///
    /// # Arguments
    /// * `shard_count` - Number of shards, fixed for the store's lifetime (min 1)
    /// * `cleanup` - Called with each value that leaves the store
    pub fn new<F>(shard_count: usize, cleanup: F) -> Result<Self>
    where
        F: FnMut(T) + Send + 'static,
    {
        Ok(Self::with_storage(HashStorage::new(shard_count)?, cleanup))
    }
}
