//! Arena pool: fixed-size element allocator with free-list recycling
//!
//! Elements live in chunks that never reallocate, so a [`PoolHandle`] stays
//! valid for the lifetime of the pool. Each new chunk holds twice as many
//! elements as the previous one. Recycled slots are threaded onto a LIFO free
//! list and handed out again before any fresh slot is carved from a chunk.

use std::mem;
use std::ops::{Index, IndexMut};

use tracing::trace;

use crate::error::{Error, Result};

/// Number of elements in the first chunk
pub const INITIAL_CHUNK_LEN: usize = 8;

/// Stable address of an element inside an [`ArenaPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    chunk: u32,
    slot: u32,
}

impl PoolHandle {
    /// Index of the chunk holding the element
    pub fn chunk(self) -> usize {
        self.chunk as usize
    }

    /// Position of the element inside its chunk
    pub fn slot(self) -> usize {
        self.slot as usize
    }
}

/// A slot is either linked into the free list or holds a live element.
#[derive(Debug)]
enum Slot<T> {
    Free { next: Option<PoolHandle> },
    Live(T),
}

/// Chunked allocator handing out [`PoolHandle`]s
#[derive(Debug)]
pub struct ArenaPool<T> {
    chunks: Vec<Vec<Slot<T>>>,
    next_chunk_len: usize,
    free_head: Option<PoolHandle>,
    free_len: usize,
    live: usize,
}

impl<T> ArenaPool<T> {
    /// Create an empty pool. No memory is allocated until the first `alloc`.
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            next_chunk_len: INITIAL_CHUNK_LEN,
            free_head: None,
            free_len: 0,
            live: 0,
        }
    }

    /// Store `value` in a free slot and return its handle
    ///
    /// Recycled slots are reused first (most recently recycled first). When the
    /// free list is empty the value goes into the active chunk, and a new,
    /// twice-as-large chunk is allocated once the active one is full.
    ///
    /// # Returns
    /// * `Result<PoolHandle>` - Handle to the stored value, or `Alloc`/`Overflow`
    pub fn alloc(&mut self, value: T) -> Result<PoolHandle> {
        if let Some(handle) = self.free_head {
            let slot = &mut self.chunks[handle.chunk()][handle.slot()];
            debug_assert!(matches!(slot, Slot::Free { .. }));
            let previous = mem::replace(slot, Slot::Live(value));
            self.free_head = match previous {
                Slot::Free { next } => next,
                Slot::Live(_) => None,
            };
            self.free_len -= 1;
            self.live += 1;
            return Ok(handle);
        }

        if self.room() == 0 {
            self.add_chunk()?;
        }

        let chunk_index = self.chunks.len() - 1;
        let chunk = &mut self.chunks[chunk_index];
        let handle = PoolHandle {
            chunk: u32::try_from(chunk_index).map_err(|_| Error::Overflow)?,
            slot: u32::try_from(chunk.len()).map_err(|_| Error::Overflow)?,
        };
        chunk.push(Slot::Live(value));
        self.live += 1;
        Ok(handle)
    }

    /// Return a slot to the free list, handing back the value it held
    ///
    /// Recycling a handle whose slot is already free, or that points past
    /// the slots carved so far, is a no-op and returns `None`. Handles carry
    /// no pool identity: a handle from another pool that lands on a live slot
    /// here recycles that slot.
    pub fn recycle(&mut self, handle: PoolHandle) -> Option<T> {
        let slot = self
            .chunks
            .get_mut(handle.chunk())?
            .get_mut(handle.slot())?;
        if matches!(slot, Slot::Free { .. }) {
            return None;
        }

        let previous = mem::replace(
            slot,
            Slot::Free {
                next: self.free_head,
            },
        );
        self.free_head = Some(handle);
        self.free_len += 1;
        self.live -= 1;

        match previous {
            Slot::Live(value) => Some(value),
            Slot::Free { .. } => None,
        }
    }

    /// Get a live element
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        match self.chunks.get(handle.chunk())?.get(handle.slot())? {
            Slot::Live(value) => Some(value),
            Slot::Free { .. } => None,
        }
    }

    /// Get a live element mutably
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        match self.chunks.get_mut(handle.chunk())?.get_mut(handle.slot())? {
            Slot::Live(value) => Some(value),
            Slot::Free { .. } => None,
        }
    }

    /// Make sure the next `additional` calls to `alloc` cannot fail
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        while self.free_len.saturating_add(self.room()) < additional {
            self.add_chunk()?;
        }
        Ok(())
    }

    /// Number of live elements
    pub fn len(&self) -> usize {
        self.live
    }

    /// Check if the pool holds no live elements
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of chunks allocated so far
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Drop every element and free all chunks
    ///
    /// All previously issued handles become invalid.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.next_chunk_len = INITIAL_CHUNK_LEN;
        self.free_head = None;
        self.free_len = 0;
        self.live = 0;
    }

    fn room(&self) -> usize {
        self.chunks
            .last()
            .map_or(0, |chunk| chunk.capacity() - chunk.len())
    }

    fn add_chunk(&mut self) -> Result<()> {
        let len = self.next_chunk_len;
        let next_len = len.checked_mul(2).ok_or(Error::Overflow)?;
        len.checked_mul(mem::size_of::<Slot<T>>())
            .ok_or(Error::Overflow)?;

        let mut chunk = Vec::new();
        chunk.try_reserve_exact(len)?;
        self.chunks.try_reserve(1)?;
        self.chunks.push(chunk);
        self.next_chunk_len = next_len;

        trace!(chunks = self.chunks.len(), elements = len, "arena chunk added");
        Ok(())
    }
}

impl<T> Default for ArenaPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<PoolHandle> for ArenaPool<T> {
    type Output = T;

    fn index(&self, handle: PoolHandle) -> &T {
        match self.get(handle) {
            Some(value) => value,
            None => panic!("stale pool handle {:?}", handle),
        }
    }
}

impl<T> IndexMut<PoolHandle> for ArenaPool<T> {
    fn index_mut(&mut self, handle: PoolHandle) -> &mut T {
        match self.get_mut(handle) {
            Some(value) => value,
            None => panic!("stale pool handle {:?}", handle),
        }
    }
}
