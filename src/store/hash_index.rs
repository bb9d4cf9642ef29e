//! Separate-chaining hash index stored inside a [`PoolArena`].
//!
//! Maps fixed-size byte keys to an opaque 32-bit back-reference (the cache
//! node that owns the key). Nothing lives on the heap: the control block,
//! the bucket array, chain nodes and key copies are all arena elements.
//!
//! ## Architecture
//!
//! ```text
//!   control ─► HashControl { entry_count, bits, bucket_count, max_entries }
//!
//!   buckets ─► [ IntrusiveList; 2^bits ]        (one element, zeroed = all empty)
//!                 │
//!                 ▼  threaded through the chain sub-pool's node slots
//!   chain   ─► ChainRecord { cache_node, bucket, key } ──► key element (key_size bytes)
//! ```
//!
//! Bucket selection is golden-ratio multiplicative hashing on the
//! [`KeyOps::to_number`] value: `(n * 0x9E37_0001) >> (32 - bits)`. The
//! result is always below `2^bits`, and the bucket array holds exactly
//! `2^bits` heads.
//!
//! ## Operations
//! - `insert`: O(1), appends to the bucket chain (duplicates are the
//!   caller's concern)
//! - `find`: O(chain length), first match wins
//! - `remove`: O(1) given the chain reference
//! - `clear` / `destroy`: O(buckets + entries)

use std::mem::size_of;
use std::ops::ControlFlow;

use bytemuck::{Pod, Zeroable};

use crate::ds::intrusive_list::{IntrusiveList, LinkStore, NodeId};
use crate::error::{CacheError, ConfigError, PoolError};
use crate::key::KeyOps;
use crate::store::arena::{ElementRef, PoolArena, SubPoolId, SubPoolSpec};

/// Multiplier of the bucket hash.
pub const GOLDEN_RATIO_PRIME_32: u32 = 0x9E37_0001;

/// Upper bound on the bucket exponent.
pub const MAX_BUCKET_BITS: u32 = 31;

const BUCKET_SIZE: usize = size_of::<IntrusiveList>();

/// Smallest `b >= 1` with `2^b >= max_entries`, capped at [`MAX_BUCKET_BITS`].
pub fn bit_width_for(max_entries: usize) -> u32 {
    let mut bits = 1;
    while bits < MAX_BUCKET_BITS && (1usize << bits) < max_entries {
        bits += 1;
    }
    bits
}

/// Number of buckets allocated for `max_entries`.
#[inline]
pub fn bucket_count_for(max_entries: usize) -> usize {
    1usize << bit_width_for(max_entries)
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct HashControl {
    entry_count: u32,
    bits: u32,
    bucket_count: u32,
    max_entries: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ChainRecord {
    cache_node: u32,
    bucket: u32,
    key: u32,
    _pad: u32,
}

/// The four arena sub-pools an index occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashPools {
    pub control: SubPoolId,
    pub buckets: SubPoolId,
    pub chains: SubPoolId,
    pub keys: SubPoolId,
}

impl HashPools {
    /// Four consecutive sub-pool ids beginning at `first`.
    pub const fn starting_at(first: u16) -> Self {
        Self {
            control: SubPoolId::new(first),
            buckets: SubPoolId::new(first + 1),
            chains: SubPoolId::new(first + 2),
            keys: SubPoolId::new(first + 3),
        }
    }
}

/// Handle to one chain node of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainRef(u32);

impl ChainRef {
    /// Handle for chain slot `slot`; validated on use.
    #[inline]
    pub const fn from_slot(slot: u32) -> Self {
        Self(slot)
    }

    /// Slot of the chain node in the chain sub-pool.
    #[inline]
    pub const fn slot(self) -> u32 {
        self.0
    }
}

/// Separate-chaining index over arena storage.
#[derive(Debug)]
pub struct HashIndex<K> {
    pools: HashPools,
    control: ElementRef,
    buckets: ElementRef,
    bits: u32,
    bucket_count: usize,
    key_size: usize,
    key_ops: K,
}

impl<K: KeyOps> HashIndex<K> {
    /// Sub-pool specs for an index of `max_entries` keys of `key_size` bytes,
    /// in [`HashPools`] order.
    pub fn sub_pools(max_entries: usize, key_size: usize) -> Result<[SubPoolSpec; 4], ConfigError> {
        let bucket_bytes = bucket_count_for(max_entries)
            .checked_mul(BUCKET_SIZE)
            .ok_or_else(|| ConfigError::new("bucket array size overflows usize"))?;
        Ok([
            SubPoolSpec::new(size_of::<HashControl>(), 1),
            SubPoolSpec::new(bucket_bytes, 1),
            SubPoolSpec::new(size_of::<ChainRecord>(), max_entries),
            SubPoolSpec::new(key_size, max_entries),
        ])
    }

    /// Acquires the control block and bucket array from `arena`.
    pub fn initialize(
        arena: &mut PoolArena,
        pools: HashPools,
        max_entries: usize,
        key_size: usize,
        key_ops: K,
    ) -> Result<Self, PoolError> {
        let bits = bit_width_for(max_entries);
        let bucket_count = 1usize << bits;

        let control = arena.acquire(pools.control)?;
        let buckets = match arena.acquire(pools.buckets) {
            Ok(buckets) => buckets,
            Err(err) => {
                arena.release_or_warn(pools.control, control);
                return Err(err);
            },
        };

        let header = HashControl {
            entry_count: 0,
            bits,
            bucket_count: bucket_count as u32,
            max_entries: u32::try_from(max_entries).unwrap_or(u32::MAX),
        };
        let stamped = arena
            .payload_mut(buckets)
            .map(|heads| heads.fill(0))
            .and_then(|()| arena.write(control, &header));
        if let Err(err) = stamped {
            arena.release_or_warn(pools.buckets, buckets);
            arena.release_or_warn(pools.control, control);
            return Err(err);
        }

        Ok(Self {
            pools,
            control,
            buckets,
            bits,
            bucket_count,
            key_size,
            key_ops,
        })
    }

    /// Bucket index of `key`.
    #[inline]
    pub fn hash_of(&self, key: &[u8]) -> usize {
        let number = self.key_ops.to_number(key);
        (number.wrapping_mul(GOLDEN_RATIO_PRIME_32) >> (32 - self.bits)) as usize
    }

    /// Bucket exponent.
    #[inline]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of buckets.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Key comparison capability.
    #[inline]
    pub fn key_ops(&self) -> &K {
        &self.key_ops
    }

    /// Number of indexed keys.
    pub fn count(&self, arena: &PoolArena) -> usize {
        arena
            .read::<HashControl>(self.control)
            .map_or(0, |control| control.entry_count as usize)
    }

    /// Number of chain nodes in bucket `bucket`.
    pub fn bucket_len(&self, arena: &PoolArena, bucket: usize) -> usize {
        self.bucket(arena, bucket).map_or(0, |list| list.len())
    }

    /// Appends `key` to its bucket with back-reference `cache_node`.
    ///
    /// Does not check for an existing equal key. On failure every element
    /// acquired by this call is released again.
    pub fn insert(
        &mut self,
        arena: &mut PoolArena,
        key: &[u8],
        cache_node: u32,
    ) -> Result<ChainRef, CacheError> {
        if key.len() != self.key_size {
            return Err(CacheError::Failure);
        }

        let chain = arena.acquire(self.pools.chains)?;
        let key_elem = match arena.acquire(self.pools.keys) {
            Ok(elem) => elem,
            Err(err) => {
                arena.release_or_warn(self.pools.chains, chain);
                return Err(err.into());
            },
        };

        match self.link_chain(arena, chain, key_elem, key, cache_node) {
            Ok(()) => Ok(ChainRef(chain.slot())),
            Err(err) => {
                arena.release_or_warn(self.pools.keys, key_elem);
                arena.release_or_warn(self.pools.chains, chain);
                Err(err)
            },
        }
    }

    fn link_chain(
        &self,
        arena: &mut PoolArena,
        chain: ElementRef,
        key_elem: ElementRef,
        key: &[u8],
        cache_node: u32,
    ) -> Result<(), CacheError> {
        let bucket = self.hash_of(key);
        let node = chain.node().ok_or(CacheError::Failure)?;

        arena.payload_mut(key_elem)?.copy_from_slice(key);
        arena.write(
            chain,
            &ChainRecord {
                cache_node,
                bucket: bucket as u32,
                key: key_elem.slot(),
                _pad: 0,
            },
        )?;

        let mut list = self.bucket(arena, bucket)?;
        if !list.push_back(&mut arena.nodes_mut(self.pools.chains)?, node) {
            return Err(CacheError::Failure);
        }
        self.set_bucket(arena, bucket, &list)?;
        self.adjust_count(arena, 1)?;
        Ok(())
    }

    /// Unlinks `chain`, which must hold `key`, and releases its storage.
    ///
    /// Returns `NotFound` if `chain` is not a live member of `key`'s bucket.
    pub fn remove(
        &mut self,
        arena: &mut PoolArena,
        key: &[u8],
        chain: ChainRef,
    ) -> Result<(), CacheError> {
        let bucket = self.hash_of(key);
        self.remove_at(arena, bucket, chain)
    }

    /// Like [`remove`](Self::remove), with the bucket already computed by
    /// [`hash_of`](Self::hash_of).
    pub fn remove_at(
        &mut self,
        arena: &mut PoolArena,
        bucket: usize,
        chain: ChainRef,
    ) -> Result<(), CacheError> {
        let elem = ElementRef::new(self.pools.chains, chain.0);
        let record: ChainRecord = arena.read(elem).map_err(|_| CacheError::NotFound)?;
        if record.bucket as usize != bucket {
            return Err(CacheError::NotFound);
        }
        let node = elem.node().ok_or(CacheError::Failure)?;

        let mut list = self.bucket(arena, bucket)?;
        if !list.remove(&mut arena.nodes_mut(self.pools.chains)?, node) {
            return Err(CacheError::NotFound);
        }
        self.set_bucket(arena, bucket, &list)?;

        arena.release(self.pools.keys, ElementRef::new(self.pools.keys, record.key))?;
        arena.release(self.pools.chains, elem)?;
        self.adjust_count(arena, -1)?;
        Ok(())
    }

    /// Returns the first chain node in `key`'s bucket whose key compares equal.
    pub fn find(&self, arena: &PoolArena, key: &[u8]) -> Option<ChainRef> {
        if key.len() != self.key_size {
            return None;
        }
        let list = self.bucket(arena, self.hash_of(key)).ok()?;
        let nodes = arena.nodes(self.pools.chains).ok()?;

        list.foreach_with(&nodes, key, |wanted, node| {
            match self.key_at(arena, node) {
                Some(stored) if self.key_ops.compare(stored, wanted).is_equal() => {
                    ControlFlow::Break(())
                },
                _ => ControlFlow::Continue(()),
            }
        })
        .map(|node| ChainRef(node.get()))
    }

    /// Back-reference stored with `chain`.
    pub fn cache_node_of(&self, arena: &PoolArena, chain: ChainRef) -> Result<u32, CacheError> {
        let record: ChainRecord = arena.read(ElementRef::new(self.pools.chains, chain.0))?;
        Ok(record.cache_node)
    }

    /// Key copy held by `chain`.
    pub fn key_of<'a>(&self, arena: &'a PoolArena, chain: ChainRef) -> Option<&'a [u8]> {
        self.key_at(arena, NodeId::new(chain.0)?)
    }

    /// Releases every chain node and key copy; keeps the bucket array.
    pub fn clear(&mut self, arena: &mut PoolArena) -> Result<(), CacheError> {
        let mut remaining = self.count(arena);
        for bucket in 0..self.bucket_count {
            if remaining == 0 {
                break;
            }
            let mut list = self.bucket(arena, bucket)?;
            if list.is_empty() {
                continue;
            }
            loop {
                let popped = list.pop_front(&mut arena.nodes_mut(self.pools.chains)?);
                let Some(node) = popped else {
                    break;
                };
                let elem = ElementRef::new(self.pools.chains, node.get());
                let record: ChainRecord = arena.read(elem)?;
                arena.release(self.pools.keys, ElementRef::new(self.pools.keys, record.key))?;
                arena.release(self.pools.chains, elem)?;
                remaining = remaining.saturating_sub(1);
            }
            self.set_bucket(arena, bucket, &list)?;
        }

        let mut control: HashControl = arena.read(self.control)?;
        control.entry_count = 0;
        arena.write(self.control, &control)?;
        Ok(())
    }

    /// Clears the index, then releases the bucket array and control block.
    ///
    /// The index is unusable afterwards: every operation reports an empty
    /// index or an error.
    pub fn destroy(&mut self, arena: &mut PoolArena) -> Result<(), CacheError> {
        self.clear(arena)?;
        arena.release(self.pools.buckets, self.buckets)?;
        arena.release(self.pools.control, self.control)?;
        Ok(())
    }

    fn key_at<'a>(&self, arena: &'a PoolArena, node: NodeId) -> Option<&'a [u8]> {
        let record: ChainRecord = arena
            .read(ElementRef::new(self.pools.chains, node.get()))
            .ok()?;
        arena
            .payload(ElementRef::new(self.pools.keys, record.key))
            .ok()
    }

    fn bucket(&self, arena: &PoolArena, bucket: usize) -> Result<IntrusiveList, PoolError> {
        arena.read_at(self.buckets, bucket_offset(bucket)?)
    }

    fn set_bucket(
        &self,
        arena: &mut PoolArena,
        bucket: usize,
        list: &IntrusiveList,
    ) -> Result<(), PoolError> {
        arena.write_at(self.buckets, bucket_offset(bucket)?, list)
    }

    fn adjust_count(&self, arena: &mut PoolArena, delta: i32) -> Result<(), PoolError> {
        let mut control: HashControl = arena.read(self.control)?;
        control.entry_count = control.entry_count.saturating_add_signed(delta);
        arena.write(self.control, &control)
    }

    #[cfg(any(test, debug_assertions))]
    /// Checks bucket membership and the entry counter.
    pub fn debug_validate_invariants(&self, arena: &PoolArena) {
        let nodes = arena.nodes(self.pools.chains).expect("chain pool missing");
        let mut total = 0usize;
        for bucket in 0..self.bucket_count {
            let list = self.bucket(arena, bucket).expect("bucket unreadable");
            list.debug_validate_invariants(&nodes);
            for node in list.iter(&nodes) {
                let record: ChainRecord = arena
                    .read(ElementRef::new(self.pools.chains, node.get()))
                    .expect("chain record unreadable");
                assert_eq!(record.bucket as usize, bucket);
                let key = self.key_at(arena, node).expect("chain key unreadable");
                assert_eq!(self.hash_of(key), bucket);
            }
            total += list.len();
        }
        assert_eq!(total, self.count(arena));
        assert!(nodes.node_count() >= total);
    }
}

fn bucket_offset(bucket: usize) -> Result<usize, PoolError> {
    bucket
        .checked_mul(BUCKET_SIZE)
        .ok_or(PoolError::InvalidLayout)
}
