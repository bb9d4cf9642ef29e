#![no_main]

use libfuzzer_sys::fuzz_target;
use pincache::error::PoolError;
use pincache::store::arena::{ElementRef, PoolArena, SubPoolId, SubPoolSpec};

// Fuzz arbitrary acquire/release/write sequences on PoolArena
//
// Tracks which handles are live and checks counts, zeroing on release and
// rejection of stale handles.
fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    let specs = [
        SubPoolSpec::new(usize::from(data[0] % 24) + 1, usize::from(data[1] % 16) + 1),
        SubPoolSpec::new(usize::from(data[2] % 40) + 1, 3),
    ];
    let Ok(len) = PoolArena::compute_total_length(&specs) else {
        return;
    };
    let Ok(mut arena) = PoolArena::initialize(vec![0u8; len].into_boxed_slice(), &specs) else {
        return;
    };
    let mut live: Vec<ElementRef> = Vec::new();

    for pair in data[3..].chunks_exact(2) {
        let pool = SubPoolId::new(u16::from(pair[0] & 1));
        match (pair[0] >> 1) % 4 {
            0 => match arena.acquire(pool) {
                Ok(elem) => {
                    assert!(arena.payload(elem).unwrap().iter().all(|&b| b == 0));
                    live.push(elem);
                }
                Err(err) => {
                    assert!(matches!(err, PoolError::Exhausted { .. }));
                    assert_eq!(arena.free_count(pool), 0);
                }
            },
            1 if !live.is_empty() => {
                let elem = live.swap_remove(usize::from(pair[1]) % live.len());
                arena.release(elem.sub_pool(), elem).unwrap();
                assert!(arena.release(elem.sub_pool(), elem).is_err());
            }
            2 if !live.is_empty() => {
                let elem = live[usize::from(pair[1]) % live.len()];
                arena.payload_mut(elem).unwrap().fill(pair[1]);
                arena.set_reserved(elem, u32::from(pair[1])).unwrap();
                assert_eq!(arena.reserved(elem), Ok(u32::from(pair[1])));
            }
            _ => {
                let forged = ElementRef::new(pool, u32::from(pair[1]));
                if !live.contains(&forged) {
                    assert!(!arena.is_in_use(forged));
                }
            }
        }

        for index in 0..2u16 {
            let pool = SubPoolId::new(index);
            let held = live.iter().filter(|elem| elem.sub_pool() == pool).count();
            assert_eq!(arena.in_use(pool), held);
            assert_eq!(arena.in_use(pool) + arena.free_count(pool), arena.capacity(pool));
        }
    }
});
