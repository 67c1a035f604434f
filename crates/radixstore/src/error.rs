//! Error types for radixstore and the cache layers built on it

use std::collections::TryReserveError;
use std::fmt;

/// Result type alias for radixstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for pool, tree and backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Memory for a chunk, node or slot could not be allocated
    Alloc,

    /// A size or count computation would have wrapped
    Overflow,

    /// Key not present
    NotFound(u64),

    /// Key already present (radix tree insert does not overwrite)
    AlreadyPresent(u64),

    /// Key outside a fixed-size key domain
    OutOfRange {
        /// Offending key
        key: u64,
        /// Length of the domain
        len: usize,
    },

    /// Teardown requested while entries are still retained
    Outstanding(usize),
}

impl Error {
    /// Negative status code for callers that bridge to integer return conventions.
    ///
    /// Every variant maps to a distinct value; zero is never returned.
    pub fn code(&self) -> i32 {
        match self {
            Error::Alloc => -1,
            Error::Overflow => -2,
            Error::NotFound(_) => -3,
            Error::AlreadyPresent(_) => -4,
            Error::OutOfRange { .. } => -5,
            Error::Outstanding(_) => -6,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Alloc => write!(f, "Allocation failed"),
            Error::Overflow => write!(f, "Integer overflow in size computation"),
            Error::NotFound(key) => write!(f, "Key not found: {}", key),
            Error::AlreadyPresent(key) => write!(f, "Key already present: {}", key),
            Error::OutOfRange { key, len } => {
                write!(f, "Key out of range: {} (domain holds {} keys)", key, len)
            }
            Error::Outstanding(count) => {
                write!(f, "Cleanup with {} entries still retained", count)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Error::Alloc
    }
}
