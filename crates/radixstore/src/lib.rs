//! # radixstore
//!
//! Storage primitives for sparse, `u64`-keyed caches.
//!
//! ## Architecture
//! - **ArenaPool**: chunked allocator with a free list, stable handles
//! - **RadixTree**: 256-way trie built from two arena pools (branches, leaves)
//! - **Error**: shared error type, also used by the cache layer
//!
//! Nothing here is synchronized. Share an instance across threads only
//! behind a lock held for the whole operation.

#![warn(missing_docs)]

mod error;
pub mod pool;
pub mod radix;

pub use error::{Error, Result};
pub use pool::{ArenaPool, PoolHandle};
pub use radix::{encode_key, RadixTree};
