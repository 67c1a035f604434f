//! Approximate LRU eviction ring
//!
//! A fixed-size circular buffer of keys. Every slot holds one reference on a
//! backend entry; writing a key into a slot releases the key it replaces.
//! This bounds how many entries the ring keeps alive without tracking exact
//! recency, and without knowing how the backend stores its entries.

use radixstore::Result;
use tracing::warn;

use crate::backend::{RcStore, Storage};

/// What a ring needs from the store it drives
pub trait LruBackend {
    /// Add a reference to `key`
    fn retain(&mut self, key: u64) -> Result<()>;

    /// Drop a reference to `key`
    fn release(&mut self, key: u64) -> Result<()>;
}

impl<S: Storage> LruBackend for RcStore<S> {
    fn retain(&mut self, key: u64) -> Result<()> {
        RcStore::retain(self, key).map(|_| ())
    }

    fn release(&mut self, key: u64) -> Result<()> {
        RcStore::release(self, key)
    }
}

impl<B: LruBackend + ?Sized> LruBackend for &mut B {
    fn retain(&mut self, key: u64) -> Result<()> {
        (**self).retain(key)
    }

    fn release(&mut self, key: u64) -> Result<()> {
        (**self).release(key)
    }
}

/// Outcome of a touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Touch {
    /// The key was just touched; the ring did not change
    Coalesced,
    /// The key was written into the next slot
    Inserted {
        /// Key released to make room, if the slot was occupied
        evicted: Option<u64>,
    },
}

/// Ring of recently used keys holding references into a backend
#[derive(Debug)]
pub struct LruRing<B: LruBackend> {
    backend: B,
    items: Vec<Option<u64>>,
    ring_index: usize,
}

impl<B: LruBackend> LruRing<B> {
    /// Create a ring with `size` slots over `backend`
    ///
    /// A size of 0 disables the ring: every touch is a no-op.
    pub fn new(size: usize, backend: B) -> Result<Self> {
        let mut items = Vec::new();
        items.try_reserve_exact(size)?;
        items.resize(size, None);

        Ok(Self {
            backend,
            items,
            ring_index: 0,
        })
    }

    /// Mark `key` as recently used
    ///
    /// Advances to the next slot, releases its previous occupant and retains
    /// `key` in the backend. A key that occupies the current or the next slot
    /// is left alone, so immediate repeats cost nothing.
    pub fn touch(&mut self, key: u64) -> Result<Touch> {
        self.advance(key, false)
    }

    /// Like [`touch`](Self::touch), for a key the caller has already retained
    ///
    /// The caller's reference is handed over to the ring instead of taking a
    /// new one. If the touch coalesces, the handed-over reference is released.
    /// If the touch fails, the reference stays with the caller.
    pub fn touch_retained(&mut self, key: u64) -> Result<Touch> {
        self.advance(key, true)
    }

    /// Release every occupied slot, in ring order
    ///
    /// All slots are emptied even if some releases fail; the first failure
    /// is returned.
    pub fn clear(&mut self) -> Result<()> {
        let mut result = Ok(());
        for slot in self.items.iter_mut() {
            if let Some(key) = slot.take() {
                if let Err(err) = self.backend.release(key) {
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
        }
        self.ring_index = 0;
        result
    }

    /// Number of slots
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.items.iter().filter(|slot| slot.is_some()).count()
    }

    /// Check if no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.items.iter().all(Option::is_none)
    }

    /// Check if `key` occupies a slot
    pub fn contains(&self, key: u64) -> bool {
        self.items.contains(&Some(key))
    }

    /// Occupied slots in ring order
    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.items.iter().filter_map(|slot| *slot)
    }

    /// Borrow the backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Borrow the backend mutably
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn advance(&mut self, key: u64, already_retained: bool) -> Result<Touch> {
        if self.items.is_empty() {
            if already_retained {
                self.backend.release(key)?;
            }
            return Ok(Touch::Coalesced);
        }

        let last = self.items[self.ring_index];
        let next = (self.ring_index + 1) % self.items.len();
        let old = self.items[next];

        if old == Some(key) || last == Some(key) {
            if already_retained {
                self.backend.release(key)?;
            }
            return Ok(Touch::Coalesced);
        }

        self.ring_index = next;
        if let Some(old_key) = old {
            self.items[next] = None;
            self.backend.release(old_key)?;
        }

        if !already_retained {
            self.backend.retain(key)?;
        }
        self.items[next] = Some(key);

        Ok(Touch::Inserted { evicted: old })
    }
}

impl<B: LruBackend> Drop for LruRing<B> {
    fn drop(&mut self) {
        if let Err(err) = self.clear() {
            warn!(error = %err, "releasing ring slots on drop failed");
        }
    }
}
