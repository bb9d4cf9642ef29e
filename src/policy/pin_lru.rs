//! Bounded LRU cache with reference-counted pinning over a pool arena.
//!
//! `PinCache` stores fixed-size values under fixed-size byte keys. All of its
//! state lives in one buffer obtained from an [`ArenaAllocator`] at creation:
//! value slots, owned key copies, cache node records, the recency list links
//! and the whole [`HashIndex`].
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │ PinCache                                                             │
//!   │                                                                      │
//!   │   HashIndex: key ──► chain ──► cache node slot                       │
//!   │                                                                      │
//!   │   recency (IntrusiveList over cache node link slots)                 │
//!   │     head (MRU) ─► [n3] ◄──► [n0] ◄──► [n7] ◄── tail (LRU)            │
//!   │                                                                      │
//!   │   CacheNodeRecord { chain, value, key, lock_counter }                │
//!   │        │                 │       └──► owned key copy (key_size)      │
//!   │        │                 └──► value slot (entry_size) ── reserved ─┐ │
//!   │        └──► index chain node                       back-reference ◄┘ │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pinning
//!
//! `lookup(key, None)` and `add(key, None)` hand out the value slot and bump
//! the entry's lock counter; the caller reads or writes through
//! [`PinCache::value`] / [`PinCache::value_mut`] and pairs each pin with one
//! [`PinCache::unlock_entry`]. Pinned entries are never evicted and refuse
//! deletion with [`CacheError::Locked`]. Supplying a buffer copies bytes
//! instead and leaves the counter alone.
//!
//! ## Eviction
//!
//! When the cache is full, `add` scans the recency list from the tail and
//! reuses the storage of the first unpinned entry. If every entry is pinned
//! the add fails with [`CacheError::Full`].
//!
//! | Operation       | Time                       |
//! |-----------------|----------------------------|
//! | `lookup`        | O(chain length)            |
//! | `add`           | O(chain length + pinned)   |
//! | `delete_*`      | O(chain length)            |
//! | `unlock_entry`  | O(1)                       |
//! | `clean`         | O(buckets + entries)       |
//!
//! ## Example
//!
//! ```
//! use pincache::builder::CacheBuilder;
//!
//! let mut cache = CacheBuilder::new(2).entry_size(4).key_size(4).try_build().unwrap();
//! cache.add(&1u32.to_le_bytes(), Some(&100u32.to_le_bytes())).unwrap();
//! cache.add(&2u32.to_le_bytes(), Some(&200u32.to_le_bytes())).unwrap();
//! cache.add(&3u32.to_le_bytes(), Some(&300u32.to_le_bytes())).unwrap();
//!
//! // Key 1 was the least recently touched.
//! assert!(!cache.contains(&1u32.to_le_bytes()));
//!
//! let mut out = [0u8; 4];
//! cache.lookup(&3u32.to_le_bytes(), Some(&mut out)).unwrap();
//! assert_eq!(u32::from_le_bytes(out), 300);
//! assert_eq!(cache.len(), 2);
//! ```

use std::fmt;
use std::mem::size_of;
use std::ops::ControlFlow;

use bytemuck::{Pod, Zeroable};

use crate::builder::CacheConfig;
use crate::ds::intrusive_list::{IntrusiveList, NodeId};
use crate::error::{CacheError, ConfigError, CreateError, InvariantError, PoolError};
use crate::key::{ByteKey, KeyOps};
use crate::store::allocator::ArenaAllocator;
use crate::store::arena::{ArenaLayout, ElementRef, PoolArena, SubPoolId, SubPoolSpec};
use crate::store::hash_index::{ChainRef, HashIndex, HashPools};

#[cfg(feature = "metrics")]
use crate::metrics::metrics_impl::PinCacheMetrics;
#[cfg(feature = "metrics")]
use crate::metrics::snapshot::PinCacheMetricsSnapshot;
#[cfg(feature = "metrics")]
use crate::metrics::traits::{
    CoreMetricsRecorder, MetricsSnapshotProvider, PinCacheMetricsReadRecorder,
    PinCacheMetricsRecorder,
};

const VALUES: SubPoolId = SubPoolId::new(0);
const KEYS: SubPoolId = SubPoolId::new(1);
const CACHE_NODES: SubPoolId = SubPoolId::new(2);
const HASH_POOLS: HashPools = HashPools::starting_at(3);

/// Boxed allocator owned by a cache.
pub type BoxedAllocator = Box<dyn ArenaAllocator + Send>;

/// Callback run once per resident entry when the cache is cleaned or torn
/// down. Receives the key and the value bytes.
pub type FreeEntryHook = Box<dyn FnMut(&[u8], &mut [u8]) + Send>;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CacheNodeRecord {
    chain: u32,
    value: u32,
    key: u32,
    lock_counter: u32,
}

/// Handle to a resident entry's value slot.
///
/// Pairs the value slot with the slot's generation at the time the handle
/// was issued. Stays valid until the entry is deleted, evicted or cleaned;
/// after that the slot's generation moves on, so the handle reports
/// `NotFound` even once the slot holds another key. Forged handles are
/// rejected by every operation that takes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryRef {
    slot: u32,
    generation: u32,
}

impl EntryRef {
    #[inline]
    const fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Rebuilds a handle from [`into_raw`](Self::into_raw).
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self::new(raw as u32, (raw >> 32) as u32)
    }

    /// Raw form of the handle (`generation << 32 | slot`), for embedding in
    /// foreign structures.
    #[inline]
    pub const fn into_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.slot as u64
    }

    #[inline]
    const fn elem(self) -> ElementRef {
        ElementRef::new(VALUES, self.slot)
    }
}

struct Storage {
    node: ElementRef,
    value: ElementRef,
    key: ElementRef,
}

/// Fixed-capacity key/value cache with pinning and LRU replacement.
///
/// Not thread-safe; wrap in a lock to share between threads.
pub struct PinCache<K: KeyOps = ByteKey> {
    arena: PoolArena,
    index: HashIndex<K>,
    recency: IntrusiveList,
    max_entries: usize,
    entry_size: usize,
    key_size: usize,
    allocator: BoxedAllocator,
    on_free_entry: Option<FreeEntryHook>,
    torn_down: bool,
    #[cfg(feature = "metrics")]
    metrics: PinCacheMetrics,
}

impl<K: KeyOps> PinCache<K> {
    /// Sub-pool specs of a cache with `config`, in sub-pool id order.
    pub fn sub_pool_specs(config: &CacheConfig) -> Result<Vec<SubPoolSpec>, ConfigError> {
        let max = config.max_entries;
        let mut specs = vec![
            SubPoolSpec::new(config.entry_size, max),
            SubPoolSpec::new(config.key_size, max),
            SubPoolSpec::new(size_of::<CacheNodeRecord>(), max),
        ];
        specs.extend(HashIndex::<K>::sub_pools(max, config.key_size)?);
        Ok(specs)
    }

    /// Creates a cache whose storage comes from one `allocator` request.
    ///
    /// Prefer [`CacheBuilder`](crate::builder::CacheBuilder) for the common
    /// cases.
    pub fn create(
        config: CacheConfig,
        key_ops: K,
        mut allocator: BoxedAllocator,
        on_free_entry: Option<FreeEntryHook>,
    ) -> Result<Self, CreateError> {
        config.validate()?;
        let layout = ArenaLayout::compute(&Self::sub_pool_specs(&config)?)?;
        let requested = layout.total_len();

        let buffer = allocator
            .allocate(requested)
            .ok_or(CreateError::AllocationFailed { requested })?;
        let mut arena = match PoolArena::with_layout(buffer, layout) {
            Ok(arena) => arena,
            Err(err) => {
                let (error, buffer) = err.into_parts();
                allocator.release(buffer);
                return Err(CreateError::Layout(error));
            },
        };
        let index = match HashIndex::initialize(
            &mut arena,
            HASH_POOLS,
            config.max_entries,
            config.key_size,
            key_ops,
        ) {
            Ok(index) => index,
            Err(error) => {
                allocator.release(arena.into_buffer());
                return Err(CreateError::Layout(error));
            },
        };

        tracing::debug!(
            max_entries = config.max_entries,
            entry_size = config.entry_size,
            key_size = config.key_size,
            buckets = index.bucket_count(),
            arena_bytes = requested,
            "pin cache created"
        );

        Ok(Self {
            arena,
            index,
            recency: IntrusiveList::new(),
            max_entries: config.max_entries,
            entry_size: config.entry_size,
            key_size: config.key_size,
            allocator,
            on_free_entry,
            torn_down: false,
            #[cfg(feature = "metrics")]
            metrics: PinCacheMetrics::default(),
        })
    }

    /// Maximum number of resident entries.
    #[inline]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of resident entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.count(&self.arena)
    }

    /// Returns `true` if no entry is resident.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes per value.
    #[inline]
    pub fn entry_size(&self) -> usize {
        self.entry_size
    }

    /// Bytes per key.
    #[inline]
    pub fn key_size(&self) -> usize {
        self.key_size
    }

    /// Returns `true` if `key` is resident. Does not touch recency.
    pub fn contains(&self, key: &[u8]) -> bool {
        let found = key.len() == self.key_size && self.index.find(&self.arena, key).is_some();

        #[cfg(feature = "metrics")]
        {
            self.metrics.record_contains_call();
            if found {
                self.metrics.record_contains_hit();
            }
        }
        found
    }

    /// Looks up `key` and promotes it to most recently used.
    ///
    /// With `dst`, copies the value into it (`dst` must be `entry_size`
    /// bytes). Without, pins the entry; the caller must pair the pin with
    /// [`unlock_entry`](Self::unlock_entry).
    pub fn lookup(&mut self, key: &[u8], dst: Option<&mut [u8]>) -> Result<EntryRef, CacheError> {
        self.check_key(key)?;
        if dst.as_ref().is_some_and(|dst| dst.len() != self.entry_size) {
            return Err(CacheError::Failure);
        }

        let Some(chain) = self.index.find(&self.arena, key) else {
            #[cfg(feature = "metrics")]
            self.metrics.record_get_miss();
            return Err(CacheError::NotFound);
        };
        let (node, mut record) = self.node_of_chain(chain)?;
        let value = ElementRef::new(VALUES, record.value);
        let generation = self.arena.generation(value)?;

        match dst {
            Some(dst) => dst.copy_from_slice(self.arena.payload(value)?),
            None => {
                record.lock_counter = record
                    .lock_counter
                    .checked_add(1)
                    .ok_or(CacheError::Failure)?;
                self.arena.write(node, &record)?;
                #[cfg(feature = "metrics")]
                self.metrics.record_pin();
            },
        }
        self.promote(node)?;

        #[cfg(feature = "metrics")]
        self.metrics.record_get_hit();

        Ok(EntryRef::new(record.value, generation))
    }

    /// Inserts `key`, evicting the least recently used unpinned entry if the
    /// cache is full.
    ///
    /// With `src`, copies it in (`src` must be `entry_size` bytes) and leaves
    /// the entry unpinned. Without, the value is zeroed and the entry is
    /// pinned so the caller can fill it through [`value_mut`](Self::value_mut).
    pub fn add(&mut self, key: &[u8], src: Option<&[u8]>) -> Result<EntryRef, CacheError> {
        #[cfg(feature = "metrics")]
        self.metrics.record_insert_call();

        self.check_key(key)?;
        if src.is_some_and(|src| src.len() != self.entry_size) {
            return Err(CacheError::Failure);
        }
        if self.index.find(&self.arena, key).is_some() {
            #[cfg(feature = "metrics")]
            self.metrics.record_insert_duplicate();
            return Err(CacheError::AlreadyExists);
        }

        let storage = if self.len() >= self.max_entries {
            self.evict_one()?
        } else {
            self.acquire_storage()?
        };

        let bound = self
            .arena
            .generation(storage.value)
            .map_err(CacheError::from)
            .and_then(|generation| {
                self.bind(&storage, key, src)?;
                Ok(EntryRef::new(storage.value.slot(), generation))
            });
        if bound.is_err() {
            self.release_storage(&storage);
        }

        #[cfg(feature = "metrics")]
        if bound.is_ok() {
            self.metrics.record_insert_new();
        }

        bound
    }

    /// Deletes the entry stored under `key`.
    pub fn delete_by_key(&mut self, key: &[u8]) -> Result<(), CacheError> {
        #[cfg(feature = "metrics")]
        self.metrics.record_delete_call();

        self.check_key(key)?;
        let chain = self
            .index
            .find(&self.arena, key)
            .ok_or(CacheError::NotFound)?;
        let (node, record) = self.node_of_chain(chain)?;
        self.delete_node(node, record)
    }

    /// Deletes the entry behind `entry`.
    pub fn delete_entry(&mut self, entry: EntryRef) -> Result<(), CacheError> {
        #[cfg(feature = "metrics")]
        self.metrics.record_delete_call();

        let (node, record) = self.resolve(entry)?;
        self.delete_node(node, record)
    }

    /// Releases one pin taken by `lookup`/`add` without a buffer.
    ///
    /// Returns `Unlocked` if the entry holds no pin. Recency is unchanged.
    pub fn unlock_entry(&mut self, entry: EntryRef) -> Result<(), CacheError> {
        #[cfg(feature = "metrics")]
        self.metrics.record_unlock_call();

        let (node, mut record) = self.resolve(entry)?;
        if record.lock_counter == 0 {
            tracing::warn!(entry = entry.slot, "unlock of an entry that holds no pin");
            #[cfg(feature = "metrics")]
            self.metrics.record_unpaired_unlock();
            return Err(CacheError::Unlocked);
        }
        record.lock_counter -= 1;
        self.arena.write(node, &record)?;
        Ok(())
    }

    /// Number of pins currently held on `entry`.
    pub fn lock_count(&self, entry: EntryRef) -> Result<u32, CacheError> {
        self.resolve(entry).map(|(_, record)| record.lock_counter)
    }

    /// Value bytes of `entry`.
    pub fn value(&self, entry: EntryRef) -> Result<&[u8], CacheError> {
        self.resolve(entry)?;
        Ok(self.arena.payload(entry.elem())?)
    }

    /// Mutable value bytes of `entry`.
    pub fn value_mut(&mut self, entry: EntryRef) -> Result<&mut [u8], CacheError> {
        self.resolve(entry)?;
        Ok(self.arena.payload_mut(entry.elem())?)
    }

    /// Keys from most to least recently used.
    pub fn recency_keys(&self) -> Vec<Vec<u8>> {
        let Ok(nodes) = self.arena.nodes(CACHE_NODES) else {
            return Vec::new();
        };
        self.recency
            .iter(&nodes)
            .filter_map(|id| {
                let record: CacheNodeRecord = self.arena.read(node_elem(id)).ok()?;
                let key = self.arena.payload(ElementRef::new(KEYS, record.key)).ok()?;
                Some(key.to_vec())
            })
            .collect()
    }

    /// Empties the cache, running the free-entry hook on every entry.
    ///
    /// Fails with `Locked`, changing nothing, while any entry is pinned.
    pub fn clean(&mut self) -> Result<(), CacheError> {
        if self.pinned_count()? > 0 {
            return Err(CacheError::Locked);
        }
        let released = self.release_all();

        #[cfg(feature = "metrics")]
        self.metrics.record_clear();

        tracing::debug!(entries = released, "pin cache cleaned");
        Ok(())
    }

    /// Tears the cache down and returns its buffer to the allocator.
    ///
    /// Runs the free-entry hook on every entry, pinned or not. Dropping the
    /// cache does the same.
    pub fn destroy(mut self) {
        self.teardown();
    }

    /// Checks the agreement between index, recency list and node records.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let len = self.len();
        if len > self.max_entries {
            return Err(InvariantError::new(format!(
                "{len} entries exceed capacity {}",
                self.max_entries
            )));
        }
        if self.recency.len() != len {
            return Err(InvariantError::new(format!(
                "recency list holds {} nodes but the index holds {len} keys",
                self.recency.len()
            )));
        }
        for pool in [VALUES, KEYS, CACHE_NODES] {
            if self.arena.in_use(pool) != len {
                return Err(InvariantError::new(format!(
                    "sub-pool {} has {} elements in use for {len} entries",
                    pool.index(),
                    self.arena.in_use(pool)
                )));
            }
        }

        let nodes = self
            .arena
            .nodes(CACHE_NODES)
            .map_err(|err| InvariantError::new(err.to_string()))?;
        for id in self.recency.iter(&nodes) {
            let node = node_elem(id);
            let record: CacheNodeRecord = self
                .arena
                .read(node)
                .map_err(|err| InvariantError::new(err.to_string()))?;

            let chain = ChainRef::from_slot(record.chain);
            if self.index.cache_node_of(&self.arena, chain) != Ok(id.get()) {
                return Err(InvariantError::new(format!(
                    "chain {} does not point back at cache node {}",
                    record.chain,
                    id.get()
                )));
            }
            if self.arena.reserved(ElementRef::new(VALUES, record.value)) != Ok(id.get() + 1) {
                return Err(InvariantError::new(format!(
                    "value {} does not point back at cache node {}",
                    record.value,
                    id.get()
                )));
            }
            let own_key = self.arena.payload(ElementRef::new(KEYS, record.key)).ok();
            let indexed_key = self.index.key_of(&self.arena, chain);
            if own_key.is_none() || own_key != indexed_key {
                return Err(InvariantError::new(format!(
                    "key copies of cache node {} disagree",
                    id.get()
                )));
            }
            if self.index.find(&self.arena, own_key.unwrap_or_default()) != Some(chain) {
                return Err(InvariantError::new(format!(
                    "cache node {} is not reachable from the index",
                    id.get()
                )));
            }
        }
        Ok(())
    }

    #[cfg(any(test, debug_assertions))]
    /// Panics if any internal invariant is violated.
    pub fn debug_validate_invariants(&self) {
        if let Err(err) = self.check_invariants() {
            panic!("pin cache invariant violated: {err}");
        }
        self.arena.debug_validate_invariants();
        self.index.debug_validate_invariants(&self.arena);
        if let Ok(nodes) = self.arena.nodes(CACHE_NODES) {
            self.recency.debug_validate_invariants(&nodes);
        }
    }

    fn check_key(&self, key: &[u8]) -> Result<(), CacheError> {
        if key.len() == self.key_size {
            Ok(())
        } else {
            Err(CacheError::Failure)
        }
    }

    fn node_of_chain(&self, chain: ChainRef) -> Result<(ElementRef, CacheNodeRecord), CacheError> {
        let slot = self.index.cache_node_of(&self.arena, chain)?;
        let node = ElementRef::new(CACHE_NODES, slot);
        Ok((node, self.arena.read(node)?))
    }

    /// Maps a caller handle to its cache node through the value's reserved
    /// back-reference.
    fn resolve(&self, entry: EntryRef) -> Result<(ElementRef, CacheNodeRecord), CacheError> {
        let reserved = match self.arena.reserved(entry.elem()) {
            Ok(reserved) => reserved,
            Err(PoolError::NotInUse { .. }) => return Err(CacheError::NotFound),
            Err(err) => {
                tracing::warn!(entry = entry.slot, error = %err, "rejecting entry handle");
                return Err(CacheError::Failure);
            },
        };
        let slot = reserved.checked_sub(1).ok_or(CacheError::NotFound)?;
        let node = ElementRef::new(CACHE_NODES, slot);
        let record: CacheNodeRecord = self.arena.read(node)?;
        if record.value != entry.slot {
            tracing::warn!(entry = entry.slot, node = slot, "entry handle back-reference mismatch");
            return Err(CacheError::Failure);
        }
        if self.arena.generation(entry.elem())? != entry.generation {
            return Err(CacheError::NotFound);
        }
        Ok((node, record))
    }

    fn promote(&mut self, node: ElementRef) -> Result<(), CacheError> {
        let id = node.node().ok_or(CacheError::Failure)?;
        if self
            .recency
            .move_to_front(&mut self.arena.nodes_mut(CACHE_NODES)?, id)
        {
            Ok(())
        } else {
            Err(CacheError::Failure)
        }
    }

    fn acquire_storage(&mut self) -> Result<Storage, CacheError> {
        let value = self.arena.acquire(VALUES)?;
        let key = match self.arena.acquire(KEYS) {
            Ok(key) => key,
            Err(err) => {
                self.arena.release_or_warn(VALUES, value);
                return Err(err.into());
            },
        };
        let node = match self.arena.acquire(CACHE_NODES) {
            Ok(node) => node,
            Err(err) => {
                self.arena.release_or_warn(KEYS, key);
                self.arena.release_or_warn(VALUES, value);
                return Err(err.into());
            },
        };
        Ok(Storage { node, value, key })
    }

    fn release_storage(&mut self, storage: &Storage) {
        for (pool, elem) in [
            (CACHE_NODES, storage.node),
            (KEYS, storage.key),
            (VALUES, storage.value),
        ] {
            if let Err(err) = self.arena.release(pool, elem) {
                tracing::warn!(sub_pool = pool.index(), slot = elem.slot(), error = %err, "release failed");
            }
        }
    }

    /// Indexes `key` on detached storage and links it at the recency head.
    fn bind(&mut self, storage: &Storage, key: &[u8], src: Option<&[u8]>) -> Result<(), CacheError> {
        let id = storage.node.node().ok_or(CacheError::Failure)?;
        self.arena.payload_mut(storage.key)?.copy_from_slice(key);

        let chain = self
            .index
            .insert(&mut self.arena, key, storage.node.slot())?;
        let record = CacheNodeRecord {
            chain: chain.slot(),
            value: storage.value.slot(),
            key: storage.key.slot(),
            lock_counter: u32::from(src.is_none()),
        };

        let linked = self
            .arena
            .write(storage.node, &record)
            .and_then(|()| self.arena.set_reserved(storage.value, id.get() + 1))
            .and_then(|()| {
                let value = self.arena.payload_mut(storage.value)?;
                match src {
                    Some(src) => value.copy_from_slice(src),
                    None => value.fill(0),
                }
                Ok(())
            })
            .map_err(CacheError::from)
            .and_then(|()| {
                let mut nodes = self.arena.nodes_mut(CACHE_NODES)?;
                if self.recency.push_front(&mut nodes, id) {
                    Ok(())
                } else {
                    Err(CacheError::Failure)
                }
            });

        if let Err(err) = linked {
            if let Err(rollback) = self.index.remove(&mut self.arena, key, chain) {
                tracing::warn!(chain = chain.slot(), error = %rollback, "index rollback failed");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Detaches the least recently used unpinned entry and returns its
    /// storage for reuse.
    fn evict_one(&mut self) -> Result<Storage, CacheError> {
        #[cfg(feature = "metrics")]
        self.metrics.record_evict_call();

        let victim = {
            let nodes = self.arena.nodes(CACHE_NODES)?;
            let arena = &self.arena;
            #[cfg(feature = "metrics")]
            let metrics = &mut self.metrics;
            self.recency.reverse_foreach(&nodes, |id| {
                #[cfg(feature = "metrics")]
                metrics.record_evict_scan_step();
                match arena.read::<CacheNodeRecord>(node_elem(id)) {
                    Ok(record) if record.lock_counter == 0 => ControlFlow::Break(()),
                    _ => ControlFlow::Continue(()),
                }
            })
        };

        let Some(victim) = victim else {
            tracing::trace!(entries = self.recency.len(), "every entry is pinned");
            #[cfg(feature = "metrics")]
            self.metrics.record_full_rejection();
            return Err(CacheError::Full);
        };

        let node = node_elem(victim);
        let record: CacheNodeRecord = self.arena.read(node)?;
        let value = ElementRef::new(VALUES, record.value);
        // Handles issued for the victim must not resolve to the next owner.
        self.arena.renew(value)?;
        self.unlink(node, &record)?;
        tracing::trace!(node = victim.get(), value = record.value, "evicting entry");

        #[cfg(feature = "metrics")]
        self.metrics.record_evicted_entry();

        Ok(Storage {
            node,
            value,
            key: ElementRef::new(KEYS, record.key),
        })
    }

    /// Removes a cache node from the index and the recency list, keeping its
    /// storage acquired.
    fn unlink(&mut self, node: ElementRef, record: &CacheNodeRecord) -> Result<(), CacheError> {
        let id = node.node().ok_or(CacheError::Failure)?;
        let bucket = self
            .index
            .hash_of(self.arena.payload(ElementRef::new(KEYS, record.key))?);
        self.index
            .remove_at(&mut self.arena, bucket, ChainRef::from_slot(record.chain))?;
        self.recency
            .remove(&mut self.arena.nodes_mut(CACHE_NODES)?, id);
        Ok(())
    }

    fn delete_node(&mut self, node: ElementRef, record: CacheNodeRecord) -> Result<(), CacheError> {
        if record.lock_counter > 0 {
            #[cfg(feature = "metrics")]
            self.metrics.record_delete_locked();
            return Err(CacheError::Locked);
        }
        self.unlink(node, &record)?;
        self.release_storage(&Storage {
            node,
            value: ElementRef::new(VALUES, record.value),
            key: ElementRef::new(KEYS, record.key),
        });

        #[cfg(feature = "metrics")]
        self.metrics.record_deleted_entry();
        Ok(())
    }

    fn pinned_count(&self) -> Result<usize, CacheError> {
        let nodes = self.arena.nodes(CACHE_NODES)?;
        Ok(self
            .recency
            .iter(&nodes)
            .filter(|&id| {
                self.arena
                    .read::<CacheNodeRecord>(node_elem(id))
                    .is_ok_and(|record| record.lock_counter > 0)
            })
            .count())
    }

    /// Runs the free-entry hook on every entry and releases all entry
    /// storage. Returns the number of entries released.
    fn release_all(&mut self) -> usize {
        let mut released = 0;
        loop {
            let popped = match self.arena.nodes_mut(CACHE_NODES) {
                Ok(mut nodes) => self.recency.pop_back(&mut nodes),
                Err(_) => None,
            };
            let Some(id) = popped else {
                break;
            };
            let node = node_elem(id);
            let Ok(record) = self.arena.read::<CacheNodeRecord>(node) else {
                continue;
            };
            let key = ElementRef::new(KEYS, record.key);
            let value = ElementRef::new(VALUES, record.value);

            if let Some(hook) = self.on_free_entry.as_mut() {
                match self.arena.payload_pair(key, value) {
                    Ok((key, value)) => hook(key, value),
                    Err(err) => tracing::warn!(node = id.get(), error = %err, "skipping free-entry hook"),
                }
            }
            self.release_storage(&Storage { node, value, key });
            released += 1;
        }

        if let Err(err) = self.index.clear(&mut self.arena) {
            tracing::warn!(error = %err, "hash index clear failed");
        }
        self.recency = IntrusiveList::new();
        released
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        let released = self.release_all();
        if let Err(err) = self.index.destroy(&mut self.arena) {
            tracing::warn!(error = %err, "hash index teardown failed");
        }
        let buffer = self.arena.take_buffer();
        tracing::debug!(entries = released, buffer_len = buffer.len(), "pin cache destroyed");
        self.allocator.release(buffer);
    }
}

impl<K: KeyOps> Drop for PinCache<K> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<K: KeyOps> fmt::Debug for PinCache<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinCache")
            .field("len", &self.len())
            .field("max_entries", &self.max_entries)
            .field("entry_size", &self.entry_size)
            .field("key_size", &self.key_size)
            .field("buckets", &self.index.bucket_count())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "metrics")]
impl<K: KeyOps> PinCache<K> {
    /// Counters recorded since creation plus current gauges.
    pub fn metrics_snapshot(&self) -> PinCacheMetricsSnapshot {
        let mut snapshot = self.metrics.snapshot();
        snapshot.cache_len = self.len();
        snapshot.capacity = self.max_entries;
        snapshot.pinned_entries = self.pinned_count().unwrap_or(0);
        snapshot
    }
}

#[cfg(feature = "metrics")]
impl<K: KeyOps> MetricsSnapshotProvider<PinCacheMetricsSnapshot> for PinCache<K> {
    fn snapshot(&self) -> PinCacheMetricsSnapshot {
        self.metrics_snapshot()
    }
}

#[inline]
fn node_elem(id: NodeId) -> ElementRef {
    ElementRef::new(CACHE_NODES, id.get())
}
