//! # radixcache
//!
//! Bounded, reference-counted caches for objects keyed by a `u64`
//! (block numbers, inode numbers).
//!
//! ## Architecture
//! - **RcStore**: reference counting over a pluggable [`Storage`]
//!   ([`RcArray`], [`RcHashMap`], [`RcRadixTree`])
//! - **LruRing**: approximate-LRU ring driving any [`LruBackend`]
//! - **Cache**: ring + store + statistics; [`SharedCache`] puts it behind a lock
//!
//! A value is destroyed (its cleanup callback runs) exactly when its last
//! reference is released. The ring only bounds the references it holds
//! itself; callers may keep other entries alive through their own pins.

#![warn(missing_docs)]

pub mod array;
pub mod backend;
mod cache;
pub mod counted;
pub mod hash;
pub mod lru;
pub mod rc_radix;
mod stats;

pub use array::RcArray;
pub use backend::{RcStore, Storage};
pub use cache::{Cache, SharedCache};
pub use counted::{CleanupFn, Counted};
pub use hash::RcHashMap;
pub use lru::{LruBackend, LruRing, Touch};
pub use rc_radix::RcRadixTree;
pub use radixstore::{Error, Result};
pub use stats::{CacheEvent, CacheStats, StatsSnapshot};
