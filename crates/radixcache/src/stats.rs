//! Counters for what a cache does with each key
//!
//! Every fetch is either a hit or a miss (the loader ran). The ring is
//! counted separately: a touch either coalesces or claims a slot, and claiming
//! a slot that still names another key is an eviction.

use std::sync::atomic::{AtomicU64, Ordering};

/// Something the cache did once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEvent {
    /// A fetch found the key resident
    Hit,
    /// A fetch had to call the loader
    Miss,
    /// A value was moved into the store
    Insert,
    /// A ring slot was taken from a previous key
    Eviction,
    /// A touch was absorbed because the key was just touched
    Coalesced,
}

impl CacheEvent {
    /// Every event kind
    pub const ALL: [CacheEvent; 5] = [
        CacheEvent::Hit,
        CacheEvent::Miss,
        CacheEvent::Insert,
        CacheEvent::Eviction,
        CacheEvent::Coalesced,
    ];
}

/// Event counters shared between a cache and its observers
///
/// Updates are relaxed: a snapshot taken while another thread works may mix
/// counts from slightly different moments.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    coalesced: AtomicU64,
}

impl CacheStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one `event`
    pub fn record(&self, event: CacheEvent) {
        self.counter(event).fetch_add(1, Ordering::Relaxed);
    }

    /// How many times `event` happened
    pub fn count(&self, event: CacheEvent) -> u64 {
        self.counter(event).load(Ordering::Relaxed)
    }

    /// Copy all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.count(CacheEvent::Hit),
            misses: self.count(CacheEvent::Miss),
            inserts: self.count(CacheEvent::Insert),
            evictions: self.count(CacheEvent::Eviction),
            coalesced: self.count(CacheEvent::Coalesced),
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        for event in CacheEvent::ALL {
            self.counter(event).store(0, Ordering::Relaxed);
        }
    }

    fn counter(&self, event: CacheEvent) -> &AtomicU64 {
        match event {
            CacheEvent::Hit => &self.hits,
            CacheEvent::Miss => &self.misses,
            CacheEvent::Insert => &self.inserts,
            CacheEvent::Eviction => &self.evictions,
            CacheEvent::Coalesced => &self.coalesced,
        }
    }
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Fetches that found the key resident
    pub hits: u64,
    /// Fetches that ran the loader
    pub misses: u64,
    /// Values moved into the store, loaded or inserted
    pub inserts: u64,
    /// Ring slots taken from a previous key
    pub evictions: u64,
    /// Touches the ring absorbed
    pub coalesced: u64,
}

impl StatsSnapshot {
    /// Number of fetches
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Share of fetches that were hits, 0.0 when nothing was fetched
    pub fn hit_ratio(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            lookups => self.hits as f64 / lookups as f64,
        }
    }
}
