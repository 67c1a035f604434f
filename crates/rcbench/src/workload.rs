//! Hot/cold block lookup workload

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, ensure, Result};
use radixcache::{Cache, RcStore, Storage};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

/// Bytes per cached block
pub const BLOCK_SIZE: usize = 512;

/// Cached block contents
pub type Block = Vec<u8>;

const SPARSE_BASE: u64 = 1 << 32;
const SPARSE_STRIDE: u64 = 4093;

/// Spread block numbers over a wide, sparse key range
pub fn sparse_key(block: u64) -> u64 {
    SPARSE_BASE.wrapping_add(block.wrapping_mul(SPARSE_STRIDE))
}

/// "Read" a block: its key repeated over the whole block
fn load_block(key: u64) -> radixcache::Result<Block> {
    Ok(key.to_le_bytes().repeat(BLOCK_SIZE / 8))
}

/// Counts blocks handed back by the store
#[derive(Debug, Clone, Default)]
pub struct Recycler {
    destroyed: Arc<AtomicU64>,
}

impl Recycler {
    /// Cleanup callback to install in a store
    pub fn callback(&self) -> impl FnMut(Block) + Send + 'static {
        let destroyed = Arc::clone(&self.destroyed);
        move |_block| {
            destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Blocks destroyed so far
    pub fn destroyed(&self) -> u64 {
        self.destroyed.load(Ordering::Relaxed)
    }
}

/// Workload parameters
#[derive(Debug, Clone)]
pub struct Workload {
    pub keys: u64,
    pub ops: u64,
    pub hot_fraction: f64,
    pub pinned: usize,
    pub ring_size: usize,
    pub seed: u64,
}

/// Outcome of a run
#[derive(Debug, Serialize)]
pub struct Report {
    pub backend: &'static str,
    pub ring_size: usize,
    pub keys: u64,
    pub ops: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub coalesced: u64,
    pub hit_ratio: f64,
    pub peak_resident: usize,
    pub destroyed: u64,
    pub elapsed_ms: f64,
    pub ops_per_sec: f64,
}

impl Report {
    /// Print a human-readable summary
    pub fn print(&self) {
        println!("\nrcbench ({} backend)", self.backend);
        println!("   Ring size:      {}", self.ring_size);
        println!("   Blocks:         {}", self.keys);
        println!("   Lookups:        {}", self.ops);
        println!(
            "   Hits / misses:  {} / {} ({:.2}%)",
            self.hits,
            self.misses,
            self.hit_ratio * 100.0
        );
        println!("   Evictions:      {}", self.evictions);
        println!("   Coalesced:      {}", self.coalesced);
        println!("   Peak resident:  {}", self.peak_resident);
        println!("   Destroyed:      {}", self.destroyed);
        println!(
            "   Elapsed:        {:.1} ms ({:.0} ops/s)",
            self.elapsed_ms, self.ops_per_sec
        );
    }
}

impl Workload {
    /// Draw the next block number
    fn next_block(&self, rng: &mut SmallRng) -> u64 {
        let hot = (self.keys / 10).max(1);
        if rng.random_bool(self.hot_fraction) {
            rng.random_range(0..hot)
        } else {
            rng.random_range(0..self.keys)
        }
    }

    /// Run the workload through a cache over `store`
    ///
    /// # Arguments
    /// * `backend` - Name reported for the backend
    /// * `store` - Empty store whose cleanup callback came from `recycler`
    /// * `key_of` - Maps a block number into the store's key domain
    /// * `recycler` - Counts the blocks the store destroys
    ///
    /// # Returns
    /// * `Result<Report>` - Statistics, after every pin and ring slot has
    ///   been released and the store is empty again
    pub fn run<S, K>(
        &self,
        backend: &'static str,
        store: RcStore<S>,
        key_of: K,
        recycler: &Recycler,
    ) -> Result<Report>
    where
        S: Storage<Value = Block>,
        K: Fn(u64) -> u64,
    {
        let mut cache = Cache::new(self.ring_size, store)?;
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let mut pins = VecDeque::with_capacity(self.pinned + 1);
        let mut peak_resident = 0;
        let destroyed_before = recycler.destroyed();

        let start = Instant::now();
        for _ in 0..self.ops {
            let key = key_of(self.next_block(&mut rng));

            let block = cache.fetch(key, load_block)?;
            if block[..8] != key.to_le_bytes() {
                bail!("block {key} returned another block's contents");
            }

            pins.push_back(key);
            while pins.len() > self.pinned {
                if let Some(old) = pins.pop_front() {
                    cache.release(old)?;
                }
            }
            peak_resident = peak_resident.max(cache.resident());
        }
        let elapsed = start.elapsed();

        debug!(pinned = pins.len(), "releasing outstanding pins");
        for key in pins.drain(..) {
            cache.release(key)?;
        }
        cache.clear_ring()?;
        ensure!(
            cache.resident() == 0,
            "{} blocks still resident after teardown",
            cache.resident()
        );

        let stats = cache.stats().snapshot();
        let destroyed = recycler.destroyed() - destroyed_before;
        ensure!(
            destroyed == stats.inserts,
            "{} blocks loaded but {} destroyed",
            stats.inserts,
            destroyed
        );

        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let ops_per_sec = if elapsed.is_zero() {
            0.0
        } else {
            self.ops as f64 / elapsed.as_secs_f64()
        };
        info!("Finished {} lookups in {:.1} ms", self.ops, elapsed_ms);

        Ok(Report {
            backend,
            ring_size: self.ring_size,
            keys: self.keys,
            ops: self.ops,
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            coalesced: stats.coalesced,
            hit_ratio: stats.hit_ratio(),
            peak_resident,
            destroyed,
            elapsed_ms,
            ops_per_sec,
        })
    }
}
