use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use radixcache::{
    Error, LruBackend, LruRing, RcArray, RcHashMap, RcRadixTree, RcStore, Result, Storage,
};

type Log = Arc<Mutex<Vec<u64>>>;

fn recorder() -> (Log, impl FnMut(u64) + Send + 'static) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    (log, move |value| sink.lock().unwrap().push(value))
}

/// Wraps a store and logs every call the ring makes
struct Spy<B> {
    inner: B,
    retains: Vec<u64>,
    releases: Vec<u64>,
}

impl<B> Spy<B> {
    fn new(inner: B) -> Self {
        Self {
            inner,
            retains: Vec::new(),
            releases: Vec::new(),
        }
    }
}

impl<B: LruBackend> LruBackend for Spy<B> {
    fn retain(&mut self, key: u64) -> Result<()> {
        self.retains.push(key);
        self.inner.retain(key)
    }

    fn release(&mut self, key: u64) -> Result<()> {
        self.releases.push(key);
        self.inner.release(key)
    }
}

#[test]
fn test_radix_store_put_retain_release() {
    let (log, cleanup) = recorder();
    let mut store = RcRadixTree::new(cleanup);

    assert_eq!(*store.put(4242424, 42).unwrap(), 42);
    assert_eq!(*store.retain(4242424).unwrap(), 42);
    assert_eq!(store.ref_count(4242424), Some(2));

    store.release(4242424).unwrap();
    assert!(log.lock().unwrap().is_empty());
    store.release(4242424).unwrap();

    assert_eq!(*log.lock().unwrap(), vec![42]);
    assert!(!store.contains(4242424));
    assert_eq!(store.retain(4242424).map(|v| *v), Err(Error::NotFound(4242424)));
    store.cleanup().unwrap();
}

#[test]
fn test_lru_of_two_over_array_of_four() {
    let (log, cleanup) = recorder();
    let mut store = RcArray::new(4, cleanup).unwrap();
    for key in 0..4u64 {
        store.put(key, key + 100).unwrap();
    }

    {
        let mut ring = LruRing::new(2, Spy::new(&mut store)).unwrap();
        ring.touch(0).unwrap();
        ring.touch(1).unwrap();
        ring.touch(2).unwrap();

        assert_eq!(ring.backend().releases, vec![0]);
        assert!(!ring.contains(0));
        assert!(ring.contains(1));
        assert!(ring.contains(2));

        let inner = &ring.backend().inner;
        assert_eq!(inner.ref_count(0), Some(1));
        assert_eq!(inner.ref_count(1), Some(2));
        assert_eq!(inner.ref_count(2), Some(2));
    }

    // Dropping the ring gave back its references on 1 and 2
    assert_eq!(store.ref_count(1), Some(1));
    assert_eq!(store.ref_count(2), Some(1));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_ring_of_n_touched_with_n_plus_one_keys() {
    const N: u64 = 5;
    let mut store = RcHashMap::new(4, drop).unwrap();
    for key in 0..=N {
        store.put(key, key).unwrap();
    }

    let mut ring = LruRing::new(N as usize, Spy::new(&mut store)).unwrap();
    for key in 0..=N {
        ring.touch(key).unwrap();
        assert!(ring.len() <= N as usize);
    }

    assert_eq!(ring.backend().retains.len() as u64, N + 1);
    assert_eq!(ring.backend().releases, vec![0]);
}

#[test]
fn test_repeated_touch_is_free() {
    let mut store = RcRadixTree::new(drop);
    store.put(77, ()).unwrap();

    let mut ring = LruRing::new(3, Spy::new(&mut store)).unwrap();
    for _ in 0..10 {
        ring.touch(77).unwrap();
    }

    assert_eq!(ring.backend().retains, vec![77]);
    assert!(ring.backend().releases.is_empty());
}

#[test]
fn test_ring_releases_to_zero_run_cleanup() {
    let (log, cleanup) = recorder();
    let mut store = RcRadixTree::new(cleanup);
    let mut ring_store = LruRing::new(2, &mut store).unwrap();

    // Values handed straight to the ring live only as long as their slot
    for key in [1u64 << 40, 2 << 40, 3 << 40] {
        ring_store.backend_mut().put(key, key).unwrap();
        ring_store.touch_retained(key).unwrap();
    }
    drop(ring_store);

    assert_eq!(*log.lock().unwrap(), vec![1 << 40, 2 << 40, 3 << 40]);
    assert!(store.is_empty());
}

#[test]
fn test_release_absent_has_no_side_effect() {
    let (log, cleanup) = recorder();
    let mut store = RcArray::new(4, cleanup).unwrap();
    store.put(1, 11).unwrap();

    assert_eq!(store.release(2), Err(Error::NotFound(2)));
    assert_eq!(store.ref_count(1), Some(1));
    assert_eq!(store.len(), 1);
    assert!(log.lock().unwrap().is_empty());
}

#[derive(Debug, Clone)]
enum Op {
    Put(u64),
    Retain(u64),
    Release(u64),
}

fn arb_op(key: BoxedStrategy<u64>) -> impl Strategy<Value = Op> {
    prop_oneof![
        key.clone().prop_map(Op::Put),
        key.clone().prop_map(Op::Retain),
        key.prop_map(Op::Release),
    ]
}

/// Small keys plus the largest key, for stores over the whole `u64` range
fn wide_op() -> impl Strategy<Value = Op> {
    arb_op(prop_oneof![0u64..8, Just(u64::MAX)].boxed())
}

/// Keys inside an array of 8 slots
fn dense_op() -> impl Strategy<Value = Op> {
    arb_op((0u64..8).boxed())
}

fn check_balance<S: Storage<Value = u64>>(
    mut store: RcStore<S>,
    log: Log,
    ops: Vec<Op>,
) -> std::result::Result<(), TestCaseError> {
    let mut model: HashMap<u64, u32> = HashMap::new();
    let mut puts = 0usize;

    for op in ops {
        match op {
            Op::Put(key) => {
                store.put(key, key).unwrap();
                puts += 1;
                *model.entry(key).or_insert(0) += 1;
            }
            Op::Retain(key) => {
                let result = store.retain(key).map(|v| *v);
                if model.contains_key(&key) {
                    prop_assert_eq!(result, Ok(key));
                    *model.get_mut(&key).unwrap() += 1;
                } else {
                    prop_assert_eq!(result, Err(Error::NotFound(key)));
                }
            }
            Op::Release(key) => {
                let result = store.release(key);
                match model.get_mut(&key) {
                    Some(count) => {
                        prop_assert_eq!(result, Ok(()));
                        *count -= 1;
                        if *count == 0 {
                            model.remove(&key);
                        }
                    }
                    None => prop_assert_eq!(result, Err(Error::NotFound(key))),
                }
            }
        }

        for (key, count) in &model {
            prop_assert_eq!(store.ref_count(*key), Some(*count));
        }
        prop_assert_eq!(store.len(), model.len());
    }

    // Each put is cleaned up once: merged duplicates at once, the rest on
    // their last release. Only the values still live are outstanding.
    prop_assert_eq!(log.lock().unwrap().len(), puts - model.len());
    Ok(())
}

proptest! {
    /// A key disappears exactly when releases catch up with puts and retains.
    #[test]
    fn refcounts_balance_array(ops in prop::collection::vec(dense_op(), 1..150)) {
        let (log, cleanup) = recorder();
        check_balance(RcArray::new(8, cleanup).unwrap(), log, ops)?;
    }

    #[test]
    fn refcounts_balance_hash(ops in prop::collection::vec(wide_op(), 1..150)) {
        let (log, cleanup) = recorder();
        check_balance(RcHashMap::new(3, cleanup).unwrap(), log, ops)?;
    }

    #[test]
    fn refcounts_balance_radix(ops in prop::collection::vec(wide_op(), 1..150)) {
        let (log, cleanup) = recorder();
        check_balance(RcRadixTree::new(cleanup), log, ops)?;
    }

    /// The ring never pins more distinct keys than it has slots.
    #[test]
    fn ring_bounds_live_references(
        size in 1usize..6,
        keys in prop::collection::vec(0u64..12, 1..100),
    ) {
        let mut store = RcArray::new(12, drop).unwrap();
        let mut ring = LruRing::new(size, &mut store).unwrap();
        for key in keys {
            ring.backend_mut().put(key, key).unwrap();
            ring.touch_retained(key).unwrap();
            prop_assert!(ring.backend().len() <= size);
        }
        drop(ring);
        prop_assert!(store.is_empty());
    }
}
