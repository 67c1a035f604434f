//! Radix tree storage for sparse keys over the whole `u64` range
//!
//! Each leaf holds the reference count next to the value, so a lookup
//! reaches both with a single traversal.

use radixstore::{RadixTree, Result};

use crate::backend::{RcStore, Storage};
use crate::counted::Counted;

/// Reference-counted store over a radix tree
pub type RcRadixTree<T> = RcStore<RadixStorage<T>>;

/// Radix tree whose leaves are `(count, value)` pairs
#[derive(Debug)]
pub struct RadixStorage<T> {
    tree: RadixTree<Counted<T>>,
}

impl<T> RadixStorage<T> {
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            tree: RadixTree::new(),
        }
    }

    /// Borrow the underlying tree
    pub fn tree(&self) -> &RadixTree<Counted<T>> {
        &self.tree
    }
}

impl<T> Default for RadixStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Storage for RadixStorage<T> {
    type Value = T;

    fn get(&self, key: u64) -> Option<&Counted<T>> {
        self.tree.get(key)
    }

    fn get_mut(&mut self, key: u64) -> Option<&mut Counted<T>> {
        self.tree.get_mut(key)
    }

    fn insert(&mut self, key: u64, entry: Counted<T>) -> Result<&mut Counted<T>> {
        self.tree.put(key, entry)
    }

    fn remove(&mut self, key: u64) -> Option<Counted<T>> {
        self.tree.delete(key).ok()
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn clear(&mut self) {
        self.tree.clear();
    }
}

impl<T> RcStore<RadixStorage<T>> {
    /// Create an empty store
    ///
    /// # Arguments
    /// * `cleanup` - Called with each value that leaves the store
    pub fn new<F>(cleanup: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        Self::with_storage(RadixStorage::new(), cleanup)
    }
}
