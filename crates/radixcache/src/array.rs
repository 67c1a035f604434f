//! Dense array storage for small, pre-bounded key domains

use radixstore::{Error, Result};

use crate::backend::{RcStore, Storage};
use crate::counted::Counted;

/// Reference-counted store indexed directly by key
pub type RcArray<T> = RcStore<ArrayStorage<T>>;

/// One slot per key in `0..len`
#[derive(Debug)]
pub struct ArrayStorage<T> {
    slots: Vec<Option<Counted<T>>>,
    len: usize,
}

impl<T> ArrayStorage<T> {
    /// Allocate `len` empty slots
    pub fn new(len: usize) -> Result<Self> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(len)?;
        slots.resize_with(len, || None);
        Ok(Self { slots, len: 0 })
    }

    /// Size of the key domain
    pub fn domain(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, key: u64) -> Option<usize> {
        usize::try_from(key)
            .ok()
            .filter(|&index| index < self.slots.len())
    }
}

impl<T> Storage for ArrayStorage<T> {
    type Value = T;

    fn validate(&self, key: u64) -> Result<()> {
        match self.index(key) {
            Some(_) => Ok(()),
            None => Err(Error::OutOfRange {
                key,
                len: self.slots.len(),
            }),
        }
    }

    fn get(&self, key: u64) -> Option<&Counted<T>> {
        self.slots.get(self.index(key)?)?.as_ref()
    }

    fn get_mut(&mut self, key: u64) -> Option<&mut Counted<T>> {
        let index = self.index(key)?;
        self.slots[index].as_mut()
    }

    fn insert(&mut self, key: u64, entry: Counted<T>) -> Result<&mut Counted<T>> {
        self.validate(key)?;
        let index = self.index(key).ok_or(Error::NotFound(key))?;
        let slot = &mut self.slots[index];
        if slot.is_some() {
            return Err(Error::AlreadyPresent(key));
        }
        self.len += 1;
        Ok(slot.insert(entry))
    }

    fn remove(&mut self, key: u64) -> Option<Counted<T>> {
        let index = self.index(key)?;
        let entry = self.slots[index].take()?;
        self.len -= 1;
        Some(entry)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.len = 0;
    }
}

impl<T> RcStore<ArrayStorage<T>> {
    /// Create a store for keys `0..len`
    ///
    /// # Arguments
    /// * `len` - Size of the key domain; larger keys are rejected with `OutOfRange`
    /// * `cleanup` - Called with each value that leaves the store
    pub fn new<F>(len: usize, cleanup: F) -> Result<Self>
    where
        F: FnMut(T) + Send + 'static,
    {
        Ok(Self::with_storage(ArrayStorage::new(len)?, cleanup))
    }
}
