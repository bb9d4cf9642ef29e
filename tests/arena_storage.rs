// ==============================================
// ARENA + HASH INDEX (integration)
// ==============================================
//
// Exercises the storage layers through their public API, the way an
// embedder building its own structure on the arena would.

use pincache::error::{CacheError, PoolError};
use pincache::key::IntegerKey;
use pincache::store::allocator::{ArenaAllocator, HeapAllocator};
use pincache::store::arena::{PoolArena, SubPoolId, SubPoolSpec};
use pincache::store::hash_index::{HashIndex, HashPools};

const SPECS: [SubPoolSpec; 2] = [SubPoolSpec::new(10, 25), SubPoolSpec::new(24, 25)];

#[test]
fn buffer_one_byte_short_is_rejected() {
    let len = PoolArena::compute_total_length(&SPECS).unwrap();
    let mut allocator = HeapAllocator;

    let buffer = allocator.allocate(len - 1).unwrap();
    let err = PoolArena::initialize(buffer, &SPECS).unwrap_err();
    assert!(matches!(err.error(), PoolError::ShortBuffer { .. }));
    allocator.release(err.into_buffer());

    let buffer = allocator.allocate(len).unwrap();
    let arena = PoolArena::initialize(buffer, &SPECS).unwrap();
    assert_eq!(arena.sub_pool_count(), 2);
    allocator.release(arena.into_buffer());
}

#[test]
fn every_sub_pool_exhausts_and_recovers_independently() {
    let len = PoolArena::compute_total_length(&SPECS).unwrap();
    let mut arena = PoolArena::initialize(vec![0u8; len].into_boxed_slice(), &SPECS).unwrap();
    let (small, large) = (SubPoolId::new(0), SubPoolId::new(1));

    let held: Vec<_> = (0..25).map(|_| arena.acquire(small).unwrap()).collect();
    assert!(matches!(arena.acquire(small), Err(PoolError::Exhausted { .. })));
    assert_eq!(arena.free_count(large), 25);
    let other = arena.acquire(large).unwrap();

    for elem in &held {
        arena.release(small, *elem).unwrap();
    }
    assert!(matches!(
        arena.release(small, held[0]),
        Err(PoolError::NotInUse { .. })
    ));
    assert!(arena.release(small, other).is_err());
    arena.release(large, other).unwrap();
    assert_eq!(arena.in_use(small) + arena.in_use(large), 0);
}

#[test]
fn hash_index_shares_an_arena_with_other_pools() {
    let pools = HashPools::starting_at(1);
    let mut specs = vec![SubPoolSpec::new(16, 8)];
    specs.extend(HashIndex::<IntegerKey>::sub_pools(8, 4).unwrap());
    let len = PoolArena::compute_total_length(&specs).unwrap();
    let mut arena = PoolArena::initialize(vec![0u8; len].into_boxed_slice(), &specs).unwrap();
    let mut index = HashIndex::initialize(&mut arena, pools, 8, 4, IntegerKey).unwrap();

    let mut chains = Vec::new();
    for n in 0..8u32 {
        chains.push(index.insert(&mut arena, &n.to_le_bytes(), n * 2).unwrap());
    }
    assert_eq!(index.count(&arena), 8);
    assert_eq!(
        index.insert(&mut arena, &99u32.to_le_bytes(), 0),
        Err(CacheError::Full)
    );

    let chain = index.find(&arena, &5u32.to_le_bytes()).unwrap();
    assert_eq!(chain, chains[5]);
    assert_eq!(index.cache_node_of(&arena, chain), Ok(10));

    index.remove(&mut arena, &5u32.to_le_bytes(), chain).unwrap();
    assert!(index.find(&arena, &5u32.to_le_bytes()).is_none());
    assert_eq!(
        index.remove(&mut arena, &5u32.to_le_bytes(), chain),
        Err(CacheError::NotFound)
    );

    // The unrelated first sub-pool is untouched by index traffic.
    assert_eq!(arena.free_count(SubPoolId::new(0)), 8);

    index.destroy(&mut arena).unwrap();
    assert_eq!(arena.in_use(pools.chains), 0);
    assert_eq!(arena.in_use(pools.keys), 0);
}
