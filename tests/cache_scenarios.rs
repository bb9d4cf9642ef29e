// ==============================================
// PIN CACHE SCENARIOS (integration)
// ==============================================

use std::sync::{Arc, Mutex};

use pincache::prelude::*;

fn k(n: u32) -> [u8; 4] {
    n.to_le_bytes()
}

fn small_cache(max_entries: usize) -> PinCache<IntegerKey> {
    CacheBuilder::new(max_entries)
        .entry_size(4)
        .key_size(4)
        .key_ops(IntegerKey)
        .try_build()
        .unwrap()
}

// ==============================================
// Eviction
// ==============================================

#[test]
fn third_add_evicts_least_recently_used() {
    let mut cache = small_cache(2);
    cache.add(&k(1), Some(&k(100))).unwrap();
    cache.add(&k(2), Some(&k(200))).unwrap();
    cache.add(&k(3), Some(&k(300))).unwrap();

    assert_eq!(
        cache.lookup(&k(1), Some(&mut [0u8; 4])),
        Err(CacheError::NotFound)
    );
    let mut out = [0u8; 4];
    cache.lookup(&k(3), Some(&mut out)).unwrap();
    assert_eq!(u32::from_le_bytes(out), 300);
    assert_eq!(cache.len(), 2);
}

#[test]
fn lookup_refreshes_recency_before_eviction() {
    let mut cache = small_cache(3);
    for n in 1..=3 {
        cache.add(&k(n), Some(&k(n * 10))).unwrap();
    }
    cache.lookup(&k(1), Some(&mut [0u8; 4])).unwrap();
    cache.add(&k(4), Some(&k(40))).unwrap();

    assert!(cache.contains(&k(1)));
    assert!(!cache.contains(&k(2)));
    assert_eq!(cache.recency_keys(), vec![k(4).to_vec(), k(1).to_vec(), k(3).to_vec()]);
}

#[test]
fn eviction_skips_pinned_tail() {
    let mut cache = small_cache(2);
    let pinned = cache.add(&k(1), None).unwrap();
    cache.add(&k(2), Some(&k(20))).unwrap();
    cache.add(&k(3), Some(&k(30))).unwrap();

    assert!(cache.contains(&k(1)));
    assert!(!cache.contains(&k(2)));
    assert_eq!(cache.lock_count(pinned), Ok(1));
}

#[test]
fn all_pinned_rejects_add_with_full() {
    let mut cache = small_cache(3);
    for n in 0..3 {
        cache.add(&k(n), None).unwrap();
    }
    assert_eq!(cache.add(&k(99), Some(&k(1))), Err(CacheError::Full));
    assert_eq!(cache.len(), 3);
    assert!(!cache.contains(&k(99)));
    assert!(cache.check_invariants().is_ok());
}

// ==============================================
// Pinning
// ==============================================

#[test]
fn duplicate_add_while_pinned_reports_already_exists() {
    let mut cache = small_cache(4);
    let first = cache.add(&k(5), None).unwrap();
    assert_eq!(cache.add(&k(5), Some(&k(1))), Err(CacheError::AlreadyExists));
    assert_eq!(cache.add(&k(5), None), Err(CacheError::AlreadyExists));
    assert_eq!(cache.lock_count(first), Ok(1));
    assert_eq!(cache.len(), 1);
}

#[test]
fn pinned_write_then_lookup_returns_same_handle() {
    let mut cache = small_cache(4);
    let entry = cache.add(&k(7), None).unwrap();
    assert_eq!(cache.value(entry).unwrap(), &[0u8; 4]);
    cache.value_mut(entry).unwrap().copy_from_slice(&k(77));
    cache.unlock_entry(entry).unwrap();

    let again = cache.lookup(&k(7), None).unwrap();
    assert_eq!(again, entry);
    assert_eq!(cache.value(again).unwrap(), &k(77));
    cache.unlock_entry(again).unwrap();
    assert_eq!(cache.unlock_entry(again), Err(CacheError::Unlocked));
    assert_eq!(cache.lock_count(again), Ok(0));
}

#[test]
fn pins_nest_and_block_deletion() {
    let mut cache = small_cache(4);
    let entry = cache.add(&k(1), None).unwrap();
    cache.lookup(&k(1), None).unwrap();
    assert_eq!(cache.lock_count(entry), Ok(2));

    assert_eq!(cache.delete_by_key(&k(1)), Err(CacheError::Locked));
    cache.unlock_entry(entry).unwrap();
    assert_eq!(cache.delete_entry(entry), Err(CacheError::Locked));
    cache.unlock_entry(entry).unwrap();
    cache.delete_entry(entry).unwrap();

    assert!(cache.is_empty());
    assert_eq!(cache.lock_count(entry), Err(CacheError::NotFound));
}

#[test]
fn raw_handles_round_trip() {
    let mut cache = small_cache(4);
    let entry = cache.add(&k(3), Some(&k(30))).unwrap();
    let raw = entry.into_raw();
    assert_eq!(cache.value(EntryRef::from_raw(raw)).unwrap(), &k(30));
    assert!(cache.value(EntryRef::from_raw(u64::from(u32::MAX))).is_err());
}

#[test]
fn handles_outlive_their_entry_without_aliasing_the_next_one() {
    let mut cache = small_cache(1);
    let first = cache.add(&k(1), Some(&k(10))).unwrap();
    cache.delete_by_key(&k(1)).unwrap();
    let second = cache.add(&k(2), Some(&k(20))).unwrap();
    assert_eq!(cache.delete_entry(first), Err(CacheError::NotFound));
    assert!(cache.contains(&k(2)));

    // Eviction hands the slot straight to the next key.
    let third = cache.add(&k(3), Some(&k(30))).unwrap();
    assert!(!cache.contains(&k(2)));
    for stale in [first, second] {
        assert_eq!(cache.value(stale), Err(CacheError::NotFound));
        assert_eq!(cache.unlock_entry(stale), Err(CacheError::NotFound));
        assert_eq!(cache.delete_entry(stale), Err(CacheError::NotFound));
    }
    assert_eq!(cache.value(third).unwrap(), &k(30));
    assert_eq!(cache.len(), 1);
    cache.check_invariants().unwrap();
}

// ==============================================
// Argument checking
// ==============================================

#[test]
fn wrong_lengths_fail_without_mutation() {
    let mut cache = small_cache(2);
    assert_eq!(cache.add(&[1, 2, 3], Some(&k(1))), Err(CacheError::Failure));
    assert_eq!(cache.add(&k(1), Some(&[0u8; 3])), Err(CacheError::Failure));
    cache.add(&k(1), Some(&k(10))).unwrap();
    assert_eq!(
        cache.lookup(&k(1), Some(&mut [0u8; 8])),
        Err(CacheError::Failure)
    );
    assert_eq!(cache.delete_by_key(&[0u8; 5]), Err(CacheError::Failure));
    assert_eq!(cache.len(), 1);
    assert!(cache.check_invariants().is_ok());
}

// ==============================================
// Clean and destroy
// ==============================================

fn recording_cache(seen: &Arc<Mutex<Vec<(u32, u32)>>>) -> PinCache {
    let sink = Arc::clone(seen);
    CacheBuilder::new(4)
        .entry_size(4)
        .key_size(4)
        .on_free_entry(move |key, value| {
            let key = u32::from_le_bytes(key.try_into().unwrap());
            let value = u32::from_le_bytes((&*value).try_into().unwrap());
            sink.lock().unwrap().push((key, value));
        })
        .try_build()
        .unwrap()
}

#[test]
fn clean_runs_hook_once_per_entry() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut cache = recording_cache(&seen);
    for n in 1..=3 {
        cache.add(&k(n), Some(&k(n * 100))).unwrap();
    }

    cache.clean().unwrap();
    assert!(cache.is_empty());
    let mut calls = seen.lock().unwrap().clone();
    calls.sort_unstable();
    assert_eq!(calls, vec![(1, 100), (2, 200), (3, 300)]);

    // The cache is usable again after a clean.
    cache.add(&k(9), Some(&k(900))).unwrap();
    assert_eq!(cache.len(), 1);
    assert!(cache.check_invariants().is_ok());
}

#[test]
fn clean_refuses_while_pinned() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut cache = recording_cache(&seen);
    let entry = cache.add(&k(1), None).unwrap();
    cache.add(&k(2), Some(&k(2))).unwrap();

    assert_eq!(cache.clean(), Err(CacheError::Locked));
    assert_eq!(cache.len(), 2);
    assert!(seen.lock().unwrap().is_empty());

    cache.unlock_entry(entry).unwrap();
    cache.clean().unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[test]
fn destroy_runs_hook_on_pinned_entries_too() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut cache = recording_cache(&seen);
    cache.add(&k(1), None).unwrap();
    cache.add(&k(2), Some(&k(20))).unwrap();

    cache.destroy();
    let mut calls = seen.lock().unwrap().clone();
    calls.sort_unstable();
    assert_eq!(calls, vec![(1, 0), (2, 20)]);
}

#[test]
fn drop_runs_hook_once() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let mut cache = recording_cache(&seen);
        cache.add(&k(4), Some(&k(40))).unwrap();
    }
    assert_eq!(seen.lock().unwrap().as_slice(), &[(4, 40)]);
}

#[test]
fn cache_can_move_across_threads() {
    let mut cache = small_cache(8);
    cache.add(&k(1), Some(&k(10))).unwrap();
    let handle = std::thread::spawn(move || {
        let mut out = [0u8; 4];
        cache.lookup(&k(1), Some(&mut out)).unwrap();
        u32::from_le_bytes(out)
    });
    assert_eq!(handle.join().unwrap(), 10);
}
