#![no_main]

use libfuzzer_sys::fuzz_target;
use pincache::prelude::*;

// Fuzz arbitrary operation sequences on PinCache
//
// Tests random sequences of add, lookup, pin, unlock, delete and clean,
// including forged handles, and checks the structural invariants after
// every step.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let capacity = usize::from(data[0] % 16) + 1;
    let Ok(mut cache) = CacheBuilder::new(capacity)
        .entry_size(4)
        .key_size(2)
        .try_build()
    else {
        return;
    };
    let mut handles: Vec<EntryRef> = Vec::new();

    let mut idx = 1;
    while idx + 1 < data.len() {
        let op = data[idx] % 9;
        let key = [data[idx + 1] % 32, 0];

        match op {
            0 => {
                // add with a value
                let value = u32::from(data[idx + 1]).to_le_bytes();
                if let Ok(entry) = cache.add(&key, Some(&value)) {
                    handles.push(entry);
                    assert_eq!(cache.lock_count(entry), Ok(0));
                }
            }
            1 => {
                // add pinned
                match cache.add(&key, None) {
                    Ok(entry) => {
                        assert_eq!(cache.lock_count(entry), Ok(1));
                        handles.push(entry);
                    }
                    Err(err) => assert!(matches!(
                        err,
                        CacheError::AlreadyExists | CacheError::Full
                    )),
                }
            }
            2 => {
                // lookup with copy-out
                let mut out = [0u8; 4];
                let _ = cache.lookup(&key, Some(&mut out));
            }
            3 => {
                // pin
                if let Ok(entry) = cache.lookup(&key, None) {
                    assert!(cache.lock_count(entry).is_ok_and(|n| n > 0));
                }
            }
            4 => {
                // unlock a known handle, possibly stale
                if let Some(&entry) = handles.get(usize::from(data[idx + 1]) % handles.len().max(1)) {
                    let before = cache.lock_count(entry);
                    match cache.unlock_entry(entry) {
                        Ok(()) => assert_eq!(cache.lock_count(entry), before.map(|n| n - 1)),
                        Err(CacheError::Unlocked) => assert_eq!(before, Ok(0)),
                        Err(_) => {}
                    }
                }
            }
            5 => {
                // delete by key
                let existed = cache.contains(&key);
                match cache.delete_by_key(&key) {
                    Ok(()) => assert!(existed && !cache.contains(&key)),
                    Err(CacheError::Locked) => assert!(cache.contains(&key)),
                    Err(_) => assert!(!existed),
                }
            }
            6 => {
                // delete by handle
                if let Some(&entry) = handles.get(usize::from(data[idx + 1]) % handles.len().max(1)) {
                    let _ = cache.delete_entry(entry);
                }
            }
            7 => {
                // forged handle
                let forged = EntryRef::from_raw(u64::from(data[idx + 1]) * 7919);
                let _ = cache.lock_count(forged);
                let _ = cache.unlock_entry(forged);
            }
            8 => {
                // clean
                let len = cache.len();
                match cache.clean() {
                    Ok(()) => {
                        assert!(cache.is_empty());
                        handles.clear();
                    }
                    Err(_) => assert_eq!(cache.len(), len),
                }
            }
            _ => unreachable!(),
        }

        assert!(cache.len() <= capacity);
        if let Err(err) = cache.check_invariants() {
            panic!("{err}");
        }
        idx += 2;
    }

    cache.destroy();
});
