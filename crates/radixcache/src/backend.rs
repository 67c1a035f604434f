//! Reference-counted key/value stores
//!
//! [`RcStore`] implements the counting rules once; the [`Storage`] it wraps
//! only decides where the `(count, value)` pairs live. Three storages ship
//! with the crate:
//!
//! - [`ArrayStorage`](crate::array::ArrayStorage): dense slots for a small,
//!   fixed key domain
//! - [`HashStorage`](crate::hash::HashStorage): a fixed number of hash map
//!   shards for arbitrary keys
//! - [`RadixStorage`](crate::rc_radix::RadixStorage): a radix tree for
//!   sparse keys over the whole `u64` range
//!
//! Rules shared by every store:
//! - `put` of a new key stores the value with a count of 1
//! - `put` of a present key hands the new value to the cleanup callback and
//!   adds a reference to the stored one (merge, never overwrite)
//! - `retain` of an absent key fails with `NotFound`, it never creates one
//! - `release` dropping the count to zero removes the key and hands the value
//!   to the cleanup callback, exactly once

use std::fmt;

use radixstore::{Error, Result};
use tracing::warn;

use crate::counted::{CleanupFn, Counted};

/// Where a [`RcStore`] keeps its entries
pub trait Storage {
    /// Type of the stored values
    type Value;

    /// Reject keys the storage can never hold
    fn validate(&self, key: u64) -> Result<()> {
        let _ = key;
        Ok(())
    }

    /// Look up an entry
    fn get(&self, key: u64) -> Option<&Counted<Self::Value>>;

    /// Look up an entry mutably
    fn get_mut(&mut self, key: u64) -> Option<&mut Counted<Self::Value>>;

    /// Store an entry for a key that is not present
    ///
    /// An occupied key is left untouched and `AlreadyPresent` is returned;
    /// the rejected entry is dropped.
    fn insert(
        &mut self,
        key: u64,
        entry: Counted<Self::Value>,
    ) -> Result<&mut Counted<Self::Value>>;

    /// Take an entry out
    fn remove(&mut self, key: u64) -> Option<Counted<Self::Value>>;

    /// Number of stored entries
    fn len(&self) -> usize;

    /// Check if no entries are stored
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry
    fn clear(&mut self);
}

/// Reference-counted store over a [`Storage`]
pub struct RcStore<S: Storage> {
    storage: S,
    cleanup: CleanupFn<S::Value>,
}

impl<S: Storage> RcStore<S> {
    /// Wrap `storage`, calling `cleanup` on every value that leaves the store
    pub fn with_storage<F>(storage: S, cleanup: F) -> Self
    where
        F: FnMut(S::Value) + Send + 'static,
    {
        Self {
            storage,
            cleanup: Box::new(cleanup),
        }
    }

    /// Insert `value` under `key`, or add a reference if `key` is present
    ///
    /// # Arguments
    /// * `key` - Key to store under
    /// * `value` - Value to move in; discarded through the cleanup callback
    ///   if `key` already holds a value
    ///
    /// # Returns
    /// * `Result<&S::Value>` - The stored value, now holding one more reference.
    ///   On `Overflow` the entry is unchanged and `value` is dropped.
    pub fn put(&mut self, key: u64, value: S::Value) -> Result<&S::Value> {
        self.storage.validate(key)?;

        if self.storage.get(key).is_some() {
            let entry = self.storage.get_mut(key).ok_or(Error::NotFound(key))?;
            // Count first: an overflow must not reach the cleanup callback
            entry.retain()?;
            (self.cleanup)(value);
            return Ok(entry.value());
        }

        let entry = self.storage.insert(key, Counted::new(value))?;
        Ok(entry.value())
    }

    /// Add a reference to the value under `key`
    ///
    /// # Returns
    /// * `Result<&S::Value>` - The value, or `NotFound` if `key` is absent
    pub fn retain(&mut self, key: u64) -> Result<&S::Value> {
        self.storage.validate(key)?;
        let entry = self.storage.get_mut(key).ok_or(Error::NotFound(key))?;
        entry.retain()?;
        Ok(entry.value())
    }

    /// Drop a reference to the value under `key`
    ///
    /// Releasing the last reference removes `key` and passes its value to the
    /// cleanup callback. Releasing an absent key fails with `NotFound` and
    /// changes nothing.
    pub fn release(&mut self, key: u64) -> Result<()> {
        self.storage.validate(key)?;
        let entry = self.storage.get_mut(key).ok_or(Error::NotFound(key))?;
        if entry.release() {
            if let Some(entry) = self.storage.remove(key) {
                (self.cleanup)(entry.into_inner());
            }
        }
        Ok(())
    }

    /// Look at a value without touching its reference count
    pub fn peek(&self, key: u64) -> Option<&S::Value> {
        self.storage.get(key).map(Counted::value)
    }

    /// Current reference count of `key`, if present
    pub fn ref_count(&self, key: u64) -> Option<u32> {
        self.storage.get(key).map(Counted::count)
    }

    /// Check if `key` is present
    pub fn contains(&self, key: u64) -> bool {
        self.storage.get(key).is_some()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Borrow the underlying storage
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Tear down the storage
    ///
    /// Every key must have been released first. If entries remain, nothing is
    /// torn down and `Outstanding` is returned so the caller can release them;
    /// the cleanup callback is never invoked from here.
    pub fn cleanup(&mut self) -> Result<()> {
        let outstanding = self.storage.len();
        if outstanding > 0 {
            warn!(outstanding, "cleanup with retained entries");
            return Err(Error::Outstanding(outstanding));
        }
        self.storage.clear();
        Ok(())
    }
}

impl<S: Storage> fmt::Debug for RcStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RcStore")
            .field("len", &self.storage.len())
            .finish_non_exhaustive()
    }
}
