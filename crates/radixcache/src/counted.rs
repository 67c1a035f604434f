//! Reference-count header stored next to each cached value

use radixstore::{Error, Result};

/// Callback invoked with a value when its last reference is released,
/// or when a duplicate `put` discards the caller's value.
pub type CleanupFn<T> = Box<dyn FnMut(T) + Send>;

/// A value together with its reference count
///
/// The count is at least 1 for as long as the value is stored.
#[derive(Debug)]
pub struct Counted<T> {
    count: u32,
    value: T,
}

impl<T> Counted<T> {
    /// Wrap `value` with a count of 1
    pub fn new(value: T) -> Self {
        Self { count: 1, value }
    }

    #[cfg(test)]
    pub(crate) fn with_count(value: T, count: u32) -> Self {
        Self { count, value }
    }

    /// Current reference count
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Borrow the value
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Add a reference
    pub fn retain(&mut self) -> Result<()> {
        self.count = self.count.checked_add(1).ok_or(Error::Overflow)?;
        Ok(())
    }

    /// Drop a reference. Returns `true` when the last one is gone.
    pub fn release(&mut self) -> bool {
        self.count -= 1;
        self.count == 0
    }

    /// Unwrap the value
    pub fn into_inner(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retain_release() {
        let mut counted = Counted::new("block");
        assert_eq!(counted.count(), 1);

        counted.retain().unwrap();
        assert_eq!(counted.count(), 2);

        assert!(!counted.release());
        assert!(counted.release());
        assert_eq!(counted.into_inner(), "block");
    }

    #[test]
    fn test_retain_overflow() {
        let mut counted = Counted {
            count: u32::MAX,
            value: 0u8,
        };
        assert_eq!(counted.retain(), Err(Error::Overflow));
        assert_eq!(counted.count(), u32::MAX);
    }
}
