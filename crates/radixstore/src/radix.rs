//! Sparse array keyed by `u64`, stored as a 256-way radix tree
//!
//! Every level of the tree consumes one byte of the key. The tree starts one
//! level deep (keys `0..=255`) and grows on demand: the existing root becomes
//! child 0 of a fresh root, so no existing subtree is ever moved. Keys are
//! passed through [`encode_key`] before traversal, which keeps old keys on
//! their original path after growth.
//!
//! Branches and leaves come from two separate [`ArenaPool`]s.

use tracing::trace;

use crate::error::{Error, Result};
use crate::pool::{ArenaPool, PoolHandle};

/// Bits of the key consumed per level
pub const RADIX_BITS: u32 = 8;

/// Fan-out of a branch
pub const RADIX_SIZE: usize = 1 << RADIX_BITS;

const RADIX_MASK: u64 = (RADIX_SIZE - 1) as u64;

/// Deepest tree needed to address every `u64`
pub const MAX_DEPTH: u32 = u64::BITS / RADIX_BITS;

/// Reverse the order of the lowest `depth` radix digits of `key`.
///
/// Traversal reads the encoded key least-significant digit first, which
/// visits the digits of the real key most-significant first. Both growth and
/// lookup rely on this: a key below the old capacity has a leading zero digit
/// at the new depth, which selects child 0, the wrapped old root.
pub fn encode_key(key: u64, depth: u32) -> u64 {
    let mut encoded = 0;
    let mut rest = key;
    for _ in 0..depth {
        encoded = (encoded << RADIX_BITS) | (rest & RADIX_MASK);
        rest >>= RADIX_BITS;
    }
    encoded
}

/// Largest key addressable by a tree of `depth` levels
pub fn capacity_for_depth(depth: u32) -> u64 {
    if depth >= MAX_DEPTH {
        u64::MAX
    } else {
        (1u64 << (RADIX_BITS * depth)) - 1
    }
}

fn depth_for_key(key: u64) -> u32 {
    let mut depth = 1;
    while capacity_for_depth(depth) < key {
        depth += 1;
    }
    depth
}

fn digit(encoded: u64) -> usize {
    (encoded & RADIX_MASK) as usize
}

#[derive(Debug)]
struct Branch {
    children: [Option<PoolHandle>; RADIX_SIZE],
    occupied: u16,
}

impl Branch {
    fn new() -> Self {
        Self {
            children: [None; RADIX_SIZE],
            occupied: 0,
        }
    }
}

/// Radix tree mapping `u64` keys to values of type `T`
#[derive(Debug)]
pub struct RadixTree<T> {
    depth: u32,
    root: Option<PoolHandle>,
    branches: ArenaPool<Branch>,
    leaves: ArenaPool<T>,
}

impl<T> RadixTree<T> {
    /// Create an empty tree addressing keys `0..=255`
    pub fn new() -> Self {
        Self {
            depth: 1,
            root: None,
            branches: ArenaPool::new(),
            leaves: ArenaPool::new(),
        }
    }

    /// Largest key the tree can currently address without growing
    pub fn capacity(&self) -> u64 {
        capacity_for_depth(self.depth)
    }

    /// Number of branch levels between the root and the leaves
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Check if the tree holds no values
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Get the value stored under `key`
    pub fn get(&self, key: u64) -> Option<&T> {
        let leaf = self.leaf_handle(key)?;
        self.leaves.get(leaf)
    }

    /// Get the value stored under `key` mutably
    pub fn get_mut(&mut self, key: u64) -> Option<&mut T> {
        let leaf = self.leaf_handle(key)?;
        self.leaves.get_mut(leaf)
    }

    /// Check if `key` is present
    pub fn contains(&self, key: u64) -> bool {
        self.leaf_handle(key).is_some()
    }

    /// Allocate a leaf for `key` holding `T::default()`
    pub fn new_leaf(&mut self, key: u64) -> Result<&mut T>
    where
        T: Default,
    {
        self.put(key, T::default())
    }

    /// Store `value` under `key`
    ///
    /// Existing values are never overwritten.
    ///
    /// # Returns
    /// * `Result<&mut T>` - The stored value, or `AlreadyPresent` if `key` is
    ///   taken. On any error the tree is left unchanged.
    pub fn put(&mut self, key: u64, value: T) -> Result<&mut T> {
        if self.contains(key) {
            return Err(Error::AlreadyPresent(key));
        }

        // Reserve every node this insert may create so that an allocation
        // failure cannot leave a half-built path behind.
        let target = depth_for_key(key).max(self.depth);
        let growth = match self.root {
            Some(_) => target - self.depth,
            None => 0,
        };
        self.branches.reserve((growth + target) as usize)?;
        self.leaves.reserve(1)?;

        self.resize(key)?;

        let mut encoded = encode_key(key, self.depth);
        let mut node = match self.root {
            Some(root) => root,
            None => {
                let root = self.branches.alloc(Branch::new())?;
                self.root = Some(root);
                root
            }
        };

        for _ in 1..self.depth {
            let index = digit(encoded);
            let existing = self.branches[node].children[index];
            node = match existing {
                Some(child) => child,
                None => {
                    let child = self.branches.alloc(Branch::new())?;
                    let branch = &mut self.branches[node];
                    branch.children[index] = Some(child);
                    branch.occupied += 1;
                    child
                }
            };
            encoded >>= RADIX_BITS;
        }

        let leaf = self.leaves.alloc(value)?;
        let branch = &mut self.branches[node];
        branch.children[digit(encoded)] = Some(leaf);
        branch.occupied += 1;

        Ok(&mut self.leaves[leaf])
    }

    /// Remove `key`, returning its value
    ///
    /// Branches left empty are recycled bottom-up. Capacity is kept.
    pub fn delete(&mut self, key: u64) -> Result<T> {
        let leaf = self.leaf_handle(key).ok_or(Error::NotFound(key))?;

        let depth = self.depth as usize;
        let mut path: [Option<(PoolHandle, usize)>; MAX_DEPTH as usize] =
            [None; MAX_DEPTH as usize];
        let mut encoded = encode_key(key, self.depth);
        let mut node = self.root.ok_or(Error::NotFound(key))?;
        for (level, entry) in path.iter_mut().enumerate().take(depth) {
            let index = digit(encoded);
            *entry = Some((node, index));
            if level + 1 < depth {
                node = self.branches[node].children[index].ok_or(Error::NotFound(key))?;
                encoded >>= RADIX_BITS;
            }
        }

        let value = self.leaves.recycle(leaf).ok_or(Error::NotFound(key))?;

        for level in (0..depth).rev() {
            let Some((node, index)) = path[level] else {
                break;
            };
            let branch = &mut self.branches[node];
            branch.children[index] = None;
            branch.occupied -= 1;
            if branch.occupied > 0 {
                break;
            }
            self.branches.recycle(node);
            if level == 0 {
                self.root = None;
            }
        }

        Ok(value)
    }

    /// Drop every value and node, returning the tree to its initial state
    pub fn clear(&mut self) {
        self.branches.clear();
        self.leaves.clear();
        self.root = None;
        self.depth = 1;
    }

    fn resize(&mut self, key: u64) -> Result<()> {
        while self.capacity() < key {
            if let Some(old_root) = self.root {
                let mut branch = Branch::new();
                branch.children[0] = Some(old_root);
                branch.occupied = 1;
                self.root = Some(self.branches.alloc(branch)?);
            }
            self.depth += 1;
            trace!(depth = self.depth, capacity = self.capacity(), "radix tree grew");
        }
        Ok(())
    }

    fn leaf_handle(&self, key: u64) -> Option<PoolHandle> {
        if key > self.capacity() {
            return None;
        }

        let mut node = self.root?;
        let mut encoded = encode_key(key, self.depth);
        for _ in 1..self.depth {
            node = self.branches.get(node)?.children[digit(encoded)]?;
            encoded >>= RADIX_BITS;
        }
        self.branches.get(node)?.children[digit(encoded)]
    }
}

impl<T> Default for RadixTree<T> {
    fn default() -> Self {
        Self::new()
    }
}
