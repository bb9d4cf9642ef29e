//! Memory pool arena carved out of one caller-supplied buffer.
//!
//! The arena takes a single `Box<[u8]>` and a list of [`SubPoolSpec`]s and
//! partitions the buffer into N sub-pools of fixed-size elements. After
//! initialization no further allocation happens: acquire and release are
//! O(1) free-list operations on node slots inside the buffer.
//!
//! ## Architecture
//!
//! ```text
//!   buffer
//!   ┌──────────────────────────── sub-pool 0 ────────────────────────────┐┌── sub-pool 1 ──
//!   │ ControlBlock │ Link × count │ [Header|payload] × count              ││ ControlBlock …
//!   │ tag, sizes,  │ prev/next    │ Header { tag, node, reserved, state,  ││
//!   │ in_use, free │ per node     │          generation }                 ││
//!   │              │              │ payload padded to 8 bytes             ││
//!   └──────────────┴──────────────┴───────────────────────────────────────┘└────────────────
//!
//!   ElementRef { sub_pool, slot }  ──►  node slot `slot`  ──►  payload slot `slot`
//! ```
//!
//! Every record in the buffer is `Pod` and accessed through `bytemuck` copies,
//! so the buffer needs no particular alignment.
//!
//! ## Validation
//!
//! Every element header carries a tag and a back-reference to its node,
//! stamped at initialization. Handle-taking operations check, in order: the
//! sub-pool exists, the slot is in range, the tag and back-reference match,
//! and the element is in use. A failed check leaves the arena untouched.
//!
//! Each header also carries a generation that changes every time the element
//! is released or [renewed](PoolArena::renew). Callers that hand out
//! long-lived references to an element store the generation alongside the
//! slot and compare it on use, so a reference taken before the slot was
//! recycled no longer resolves.
//!
//! ## Example
//!
//! ```
//! use pincache::store::arena::{PoolArena, SubPoolId, SubPoolSpec};
//!
//! let specs = [SubPoolSpec::new(24, 4)];
//! let len = PoolArena::compute_total_length(&specs).unwrap();
//! let mut arena = PoolArena::initialize(vec![0u8; len].into_boxed_slice(), &specs).unwrap();
//!
//! let pool = SubPoolId::new(0);
//! let elem = arena.acquire(pool).unwrap();
//! arena.payload_mut(elem).unwrap()[0] = 7;
//! assert_eq!(arena.in_use(pool), 1);
//! arena.release(pool, elem).unwrap();
//! assert_eq!(arena.free_count(pool), 4);
//! ```

use std::fmt;
use std::mem::size_of;

use bytemuck::{Pod, Zeroable};

use crate::ds::intrusive_list::{IntrusiveList, Link, LinkStore, LinkStoreMut, NodeId, encode};
use crate::error::{ConfigError, PoolError};

const ELEMENT_TAG: u32 = 0x504c_4554;
const CONTROL_TAG: u32 = 0x504c_4354;
const STATE_FREE: u32 = 0;
const STATE_IN_USE: u32 = 1;

const WORD: usize = 8;
const CONTROL_SIZE: usize = size_of::<ControlBlock>();
const HEADER_SIZE: usize = size_of::<ElementHeader>();
const LINK_SIZE: usize = size_of::<Link>();

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ControlBlock {
    tag: u32,
    elem_size: u32,
    count: u32,
    in_use: u32,
    free: IntrusiveList,
    _pad: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ElementHeader {
    tag: u32,
    node: u32,
    reserved: u32,
    state: u32,
    generation: u32,
    _pad: u32,
}

const _: () = assert!(CONTROL_SIZE % WORD == 0);
const _: () = assert!(HEADER_SIZE % WORD == 0);

/// Index of a sub-pool within a [`PoolArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubPoolId(u16);

impl SubPoolId {
    /// Creates a sub-pool id from its position in the spec list.
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the position of this sub-pool in the spec list.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Element size and count of one sub-pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubPoolSpec {
    /// Payload bytes per element (rounded up to 8 in the buffer).
    pub elem_size: usize,
    /// Number of elements.
    pub count: usize,
}

impl SubPoolSpec {
    /// Creates a spec for `count` elements of `elem_size` bytes.
    #[inline]
    pub const fn new(elem_size: usize, count: usize) -> Self {
        Self { elem_size, count }
    }
}

/// Handle to one element of a sub-pool.
///
/// Handles are plain indices; the arena validates them on every use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pool: SubPoolId,
    slot: u32,
}

impl ElementRef {
    /// Creates a handle for `slot` in `pool` without checking it.
    #[inline]
    pub const fn new(pool: SubPoolId, slot: u32) -> Self {
        Self { pool, slot }
    }

    /// Sub-pool this element belongs to.
    #[inline]
    pub const fn sub_pool(self) -> SubPoolId {
        self.pool
    }

    /// Slot index within the sub-pool.
    #[inline]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Node id of this element in its sub-pool's link slots.
    #[inline]
    pub const fn node(self) -> Option<NodeId> {
        NodeId::new(self.slot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SubPoolLayout {
    control: usize,
    nodes: usize,
    payloads: usize,
    elem_size: usize,
    stride: usize,
    count: u32,
}

impl SubPoolLayout {
    #[inline]
    fn header_offset(&self, slot: u32) -> usize {
        self.payloads + slot as usize * self.stride
    }

    #[inline]
    fn payload_offset(&self, slot: u32) -> usize {
        self.header_offset(slot) + HEADER_SIZE
    }

    #[inline]
    fn nodes_range(&self) -> std::ops::Range<usize> {
        self.nodes..self.nodes + self.count as usize * LINK_SIZE
    }
}

/// Byte offsets of every sub-pool region, computed from a spec list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaLayout {
    pools: Vec<SubPoolLayout>,
    total_len: usize,
}

impl ArenaLayout {
    /// Computes the layout for `specs`.
    ///
    /// Fails if the list is empty, a sub-pool has no elements, an element
    /// count exceeds the node id range, or the total size overflows.
    pub fn compute(specs: &[SubPoolSpec]) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::new("arena needs at least one sub-pool"));
        }
        if specs.len() > usize::from(u16::MAX) {
            return Err(ConfigError::new("too many sub-pools"));
        }

        let overflow = || ConfigError::new("arena size overflows usize");
        let mut pools = Vec::with_capacity(specs.len());
        let mut offset = 0usize;

        for (index, spec) in specs.iter().enumerate() {
            if spec.count == 0 {
                return Err(ConfigError::new(format!(
                    "sub-pool {index} must have at least one element"
                )));
            }
            let count = u32::try_from(spec.count)
                .ok()
                .filter(|&count| count - 1 <= NodeId::MAX_INDEX)
                .ok_or_else(|| {
                    ConfigError::new(format!("sub-pool {index} has too many elements"))
                })?;
            if u32::try_from(spec.elem_size).is_err() {
                return Err(ConfigError::new(format!(
                    "sub-pool {index} element size does not fit in 32 bits"
                )));
            }

            let padded = spec
                .elem_size
                .checked_next_multiple_of(WORD)
                .ok_or_else(overflow)?;
            let stride = padded.checked_add(HEADER_SIZE).ok_or_else(overflow)?;

            let control = offset;
            let nodes = control.checked_add(CONTROL_SIZE).ok_or_else(overflow)?;
            let node_bytes = spec.count.checked_mul(LINK_SIZE).ok_or_else(overflow)?;
            let payloads = nodes.checked_add(node_bytes).ok_or_else(overflow)?;
            let payload_bytes = spec.count.checked_mul(stride).ok_or_else(overflow)?;
            offset = payloads.checked_add(payload_bytes).ok_or_else(overflow)?;

            pools.push(SubPoolLayout {
                control,
                nodes,
                payloads,
                elem_size: spec.elem_size,
                stride,
                count,
            });
        }

        Ok(Self {
            pools,
            total_len: offset,
        })
    }

    /// Exact number of bytes the arena occupies.
    #[inline]
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// Number of sub-pools.
    #[inline]
    pub fn sub_pool_count(&self) -> usize {
        self.pools.len()
    }
}

/// Initialization failure; hands the buffer back so the caller can free it.
#[derive(thiserror::Error)]
#[error("arena initialization failed: {error}")]
pub struct ArenaInitError {
    error: PoolError,
    buffer: Box<[u8]>,
}

impl ArenaInitError {
    /// The underlying pool error.
    #[inline]
    pub fn error(&self) -> PoolError {
        self.error
    }

    /// Recovers the rejected buffer.
    #[inline]
    pub fn into_buffer(self) -> Box<[u8]> {
        self.buffer
    }

    /// Splits into the pool error and the rejected buffer.
    #[inline]
    pub fn into_parts(self) -> (PoolError, Box<[u8]>) {
        (self.error, self.buffer)
    }
}

impl fmt::Debug for ArenaInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaInitError")
            .field("error", &self.error)
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}

/// Read-only view of a sub-pool's node slots.
#[derive(Clone, Copy)]
pub struct NodeSlots<'a> {
    bytes: &'a [u8],
}

/// Mutable view of a sub-pool's node slots.
pub struct NodeSlotsMut<'a> {
    bytes: &'a mut [u8],
}

#[inline]
fn link_range(id: NodeId) -> Option<std::ops::Range<usize>> {
    let start = id.index().checked_mul(LINK_SIZE)?;
    Some(start..start.checked_add(LINK_SIZE)?)
}

impl LinkStore for NodeSlots<'_> {
    #[inline]
    fn link(&self, id: NodeId) -> Option<Link> {
        let bytes = self.bytes.get(link_range(id)?)?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    #[inline]
    fn node_count(&self) -> usize {
        self.bytes.len() / LINK_SIZE
    }
}

impl LinkStore for NodeSlotsMut<'_> {
    #[inline]
    fn link(&self, id: NodeId) -> Option<Link> {
        NodeSlots { bytes: self.bytes }.link(id)
    }

    #[inline]
    fn node_count(&self) -> usize {
        self.bytes.len() / LINK_SIZE
    }
}

impl LinkStoreMut for NodeSlotsMut<'_> {
    #[inline]
    fn set_link(&mut self, id: NodeId, link: Link) -> bool {
        let Some(range) = link_range(id) else {
            return false;
        };
        match self.bytes.get_mut(range) {
            Some(slot) => {
                slot.copy_from_slice(bytemuck::bytes_of(&link));
                true
            },
            None => false,
        }
    }
}

/// Fixed-capacity multi-pool allocator over one byte buffer.
pub struct PoolArena {
    buffer: Box<[u8]>,
    layout: ArenaLayout,
}

impl PoolArena {
    /// Returns the exact buffer length needed to host `specs`.
    pub fn compute_total_length(specs: &[SubPoolSpec]) -> Result<usize, ConfigError> {
        ArenaLayout::compute(specs).map(|layout| layout.total_len())
    }

    /// Lays out `specs` inside `buffer`.
    ///
    /// A buffer whose layout cannot be computed, or which is shorter than
    /// the computed length, is returned inside the error.
    pub fn initialize(buffer: Box<[u8]>, specs: &[SubPoolSpec]) -> Result<Self, ArenaInitError> {
        match ArenaLayout::compute(specs) {
            Ok(layout) => Self::with_layout(buffer, layout),
            Err(err) => {
                tracing::warn!(error = %err, "rejecting arena specs");
                Err(ArenaInitError {
                    error: PoolError::InvalidLayout,
                    buffer,
                })
            },
        }
    }

    /// Lays out a precomputed [`ArenaLayout`] inside `buffer`.
    pub fn with_layout(mut buffer: Box<[u8]>, layout: ArenaLayout) -> Result<Self, ArenaInitError> {
        if buffer.len() < layout.total_len {
            return Err(ArenaInitError {
                error: PoolError::ShortBuffer {
                    required: layout.total_len,
                    provided: buffer.len(),
                },
                buffer,
            });
        }

        buffer[..layout.total_len].fill(0);

        for pool in &layout.pools {
            for slot in 0..pool.count {
                let header = ElementHeader {
                    tag: ELEMENT_TAG,
                    node: encode(NodeId::new(slot)),
                    reserved: 0,
                    state: STATE_FREE,
                    generation: 0,
                    _pad: 0,
                };
                write_pod(&mut buffer, pool.header_offset(slot), &header);
            }

            let mut free = IntrusiveList::new();
            let mut nodes = NodeSlotsMut {
                bytes: &mut buffer[pool.nodes_range()],
            };
            for node in (0..pool.count).filter_map(NodeId::new) {
                free.push_back(&mut nodes, node);
            }

            let control = ControlBlock {
                tag: CONTROL_TAG,
                elem_size: pool.elem_size as u32,
                count: pool.count,
                in_use: 0,
                free,
                _pad: 0,
            };
            write_pod(&mut buffer, pool.control, &control);
        }

        tracing::debug!(
            sub_pools = layout.pools.len(),
            total_len = layout.total_len,
            buffer_len = buffer.len(),
            "pool arena initialized"
        );

        Ok(Self { buffer, layout })
    }

    /// Number of sub-pools.
    #[inline]
    pub fn sub_pool_count(&self) -> usize {
        self.layout.pools.len()
    }

    /// Bytes occupied by the layout (may be less than the buffer length).
    #[inline]
    pub fn total_len(&self) -> usize {
        self.layout.total_len
    }

    /// Number of elements in `pool`; 0 for an unknown sub-pool.
    pub fn capacity(&self, pool: SubPoolId) -> usize {
        self.pool_layout(pool).map_or(0, |layout| layout.count as usize)
    }

    /// Number of acquired elements in `pool`; 0 for an unknown sub-pool.
    pub fn in_use(&self, pool: SubPoolId) -> usize {
        self.pool_layout(pool)
            .map_or(0, |layout| self.control(layout).in_use as usize)
    }

    /// Number of free elements in `pool`; 0 for an unknown sub-pool.
    pub fn free_count(&self, pool: SubPoolId) -> usize {
        self.pool_layout(pool)
            .map_or(0, |layout| self.control(layout).free.len())
    }

    /// Payload size of elements in `pool`, as requested in its spec.
    pub fn elem_size(&self, pool: SubPoolId) -> usize {
        self.pool_layout(pool).map_or(0, |layout| layout.elem_size)
    }

    /// Takes one element off the free-list of `pool`.
    pub fn acquire(&mut self, pool: SubPoolId) -> Result<ElementRef, PoolError> {
        let layout = *self.pool_layout(pool)?;
        let mut control = self.control(&layout);

        let node = {
            let mut nodes = NodeSlotsMut {
                bytes: &mut self.buffer[layout.nodes_range()],
            };
            control.free.pop_front(&mut nodes)
        }
        .ok_or(PoolError::Exhausted { sub_pool: pool.0 })?;

        let slot = node.get();
        let mut header: ElementHeader = read_pod(&self.buffer, layout.header_offset(slot));
        header.state = STATE_IN_USE;
        write_pod(&mut self.buffer, layout.header_offset(slot), &header);

        control.in_use += 1;
        write_pod(&mut self.buffer, layout.control, &control);

        Ok(ElementRef { pool, slot })
    }

    /// Returns `elem` to the free-list of `pool`.
    ///
    /// Clears the reserved slot, zeroes the payload and advances the
    /// element's generation. The element's node must already be unlinked from
    /// any caller list, otherwise the release fails with
    /// [`PoolError::StillLinked`].
    pub fn release(&mut self, pool: SubPoolId, elem: ElementRef) -> Result<(), PoolError> {
        if elem.pool != pool {
            return Err(PoolError::OutOfRange {
                sub_pool: pool.0,
                slot: elem.slot,
            });
        }
        let (layout, mut header) = self.validate(elem)?;
        let node = NodeId::new(elem.slot).ok_or(PoolError::OutOfRange {
            sub_pool: pool.0,
            slot: elem.slot,
        })?;

        let mut control = self.control(&layout);
        let linked = {
            let nodes = NodeSlots {
                bytes: &self.buffer[layout.nodes_range()],
            };
            nodes.link(node).is_none_or(|link| !link.is_unlinked())
        };
        if linked {
            return Err(PoolError::StillLinked {
                sub_pool: pool.0,
                slot: elem.slot,
            });
        }

        let payload = layout.payload_offset(elem.slot);
        self.buffer[payload..payload + layout.elem_size].fill(0);

        header.reserved = 0;
        header.state = STATE_FREE;
        header.generation = header.generation.wrapping_add(1);
        write_pod(&mut self.buffer, layout.header_offset(elem.slot), &header);

        {
            let mut nodes = NodeSlotsMut {
                bytes: &mut self.buffer[layout.nodes_range()],
            };
            control.free.push_front(&mut nodes, node);
        }
        control.in_use -= 1;
        write_pod(&mut self.buffer, layout.control, &control);
        Ok(())
    }

    /// Releases `elem` on an error path, logging instead of returning a
    /// failure. Returns `true` if the element went back to the free-list.
    pub fn release_or_warn(&mut self, pool: SubPoolId, elem: ElementRef) -> bool {
        match self.release(pool, elem) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(sub_pool = pool.0, slot = elem.slot, error = %err, "rollback release failed");
                false
            },
        }
    }

    /// Returns `true` if `elem` passes validation and is acquired.
    pub fn is_in_use(&self, elem: ElementRef) -> bool {
        self.validate(elem).is_ok()
    }

    /// Stores a caller-defined back-reference on `elem`.
    pub fn set_reserved(&mut self, elem: ElementRef, value: u32) -> Result<(), PoolError> {
        let (layout, mut header) = self.validate(elem)?;
        header.reserved = value;
        write_pod(&mut self.buffer, layout.header_offset(elem.slot), &header);
        Ok(())
    }

    /// Returns the back-reference stored on `elem` (0 if never set).
    pub fn reserved(&self, elem: ElementRef) -> Result<u32, PoolError> {
        self.validate(elem).map(|(_, header)| header.reserved)
    }

    /// Current generation of an acquired element.
    pub fn generation(&self, elem: ElementRef) -> Result<u32, PoolError> {
        self.validate(elem).map(|(_, header)| header.generation)
    }

    /// Advances the generation of an acquired element that is being handed
    /// to a new owner without going through the free-list. Returns the new
    /// generation.
    pub fn renew(&mut self, elem: ElementRef) -> Result<u32, PoolError> {
        let (layout, mut header) = self.validate(elem)?;
        header.generation = header.generation.wrapping_add(1);
        write_pod(&mut self.buffer, layout.header_offset(elem.slot), &header);
        Ok(header.generation)
    }

    /// Payload bytes of an acquired element.
    pub fn payload(&self, elem: ElementRef) -> Result<&[u8], PoolError> {
        let (layout, _) = self.validate(elem)?;
        let start = layout.payload_offset(elem.slot);
        Ok(&self.buffer[start..start + layout.elem_size])
    }

    /// Mutable payload bytes of an acquired element.
    pub fn payload_mut(&mut self, elem: ElementRef) -> Result<&mut [u8], PoolError> {
        let (layout, _) = self.validate(elem)?;
        let start = layout.payload_offset(elem.slot);
        Ok(&mut self.buffer[start..start + layout.elem_size])
    }

    /// Reads a `Pod` record from the start of the payload.
    #[inline]
    pub fn read<T: Pod>(&self, elem: ElementRef) -> Result<T, PoolError> {
        self.read_at(elem, 0)
    }

    /// Reads a `Pod` record at `offset` bytes into the payload.
    pub fn read_at<T: Pod>(&self, elem: ElementRef, offset: usize) -> Result<T, PoolError> {
        let payload = self.payload(elem)?;
        let bytes = record_range::<T>(offset)
            .and_then(|range| payload.get(range))
            .ok_or(PoolError::OutOfRange {
                sub_pool: elem.pool.0,
                slot: elem.slot,
            })?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Writes a `Pod` record at the start of the payload.
    #[inline]
    pub fn write<T: Pod>(&mut self, elem: ElementRef, value: &T) -> Result<(), PoolError> {
        self.write_at(elem, 0, value)
    }

    /// Writes a `Pod` record at `offset` bytes into the payload.
    pub fn write_at<T: Pod>(
        &mut self,
        elem: ElementRef,
        offset: usize,
        value: &T,
    ) -> Result<(), PoolError> {
        let out_of_range = PoolError::OutOfRange {
            sub_pool: elem.pool.0,
            slot: elem.slot,
        };
        let payload = self.payload_mut(elem)?;
        let bytes = record_range::<T>(offset)
            .and_then(|range| payload.get_mut(range))
            .ok_or(out_of_range)?;
        bytes.copy_from_slice(bytemuck::bytes_of(value));
        Ok(())
    }

    /// Link slots of `pool`, for threading acquired elements through lists.
    pub fn nodes(&self, pool: SubPoolId) -> Result<NodeSlots<'_>, PoolError> {
        let layout = self.pool_layout(pool)?;
        Ok(NodeSlots {
            bytes: &self.buffer[layout.nodes_range()],
        })
    }

    /// Mutable link slots of `pool`.
    ///
    /// Only acquired elements may be linked by the caller; free elements
    /// belong to the arena's free-list.
    pub fn nodes_mut(&mut self, pool: SubPoolId) -> Result<NodeSlotsMut<'_>, PoolError> {
        let range = self.pool_layout(pool)?.nodes_range();
        Ok(NodeSlotsMut {
            bytes: &mut self.buffer[range],
        })
    }

    /// Payloads of two distinct elements, the second one writable.
    pub fn payload_pair(
        &mut self,
        shared: ElementRef,
        exclusive: ElementRef,
    ) -> Result<(&[u8], &mut [u8]), PoolError> {
        let (shared_layout, _) = self.validate(shared)?;
        let (exclusive_layout, _) = self.validate(exclusive)?;
        let s = shared_layout.payload_offset(shared.slot);
        let s = s..s + shared_layout.elem_size;
        let e = exclusive_layout.payload_offset(exclusive.slot);
        let e = e..e + exclusive_layout.elem_size;

        if s.start < e.end && e.start < s.end {
            return Err(PoolError::OutOfRange {
                sub_pool: exclusive.pool.0,
                slot: exclusive.slot,
            });
        }
        if s.start < e.start {
            let (low, high) = self.buffer.split_at_mut(e.start);
            Ok((&low[s], &mut high[..e.end - e.start]))
        } else {
            let (low, high) = self.buffer.split_at_mut(s.start);
            Ok((&high[..s.end - s.start], &mut low[e]))
        }
    }

    /// Gives the backing buffer back to the caller.
    #[inline]
    pub fn into_buffer(self) -> Box<[u8]> {
        self.buffer
    }

    /// Detaches the backing buffer, leaving an arena with no sub-pools.
    ///
    /// Every later operation fails with [`PoolError::UnknownSubPool`].
    pub fn take_buffer(&mut self) -> Box<[u8]> {
        self.layout = ArenaLayout {
            pools: Vec::new(),
            total_len: 0,
        };
        std::mem::take(&mut self.buffer)
    }

    fn pool_layout(&self, pool: SubPoolId) -> Result<&SubPoolLayout, PoolError> {
        self.layout
            .pools
            .get(pool.index())
            .ok_or(PoolError::UnknownSubPool { sub_pool: pool.0 })
    }

    #[inline]
    fn control(&self, layout: &SubPoolLayout) -> ControlBlock {
        read_pod(&self.buffer, layout.control)
    }

    fn validate(&self, elem: ElementRef) -> Result<(SubPoolLayout, ElementHeader), PoolError> {
        let layout = *self.pool_layout(elem.pool)?;
        let (sub_pool, slot) = (elem.pool.0, elem.slot);
        if slot >= layout.count {
            return Err(PoolError::OutOfRange { sub_pool, slot });
        }

        let header: ElementHeader = read_pod(&self.buffer, layout.header_offset(slot));
        if header.tag != ELEMENT_TAG || header.node != encode(NodeId::new(slot)) {
            tracing::warn!(sub_pool, slot, tag = header.tag, "element failed tag validation");
            return Err(PoolError::BadTag { sub_pool, slot });
        }
        if header.state != STATE_IN_USE {
            return Err(PoolError::NotInUse { sub_pool, slot });
        }
        Ok((layout, header))
    }

    #[cfg(any(test, debug_assertions))]
    /// Checks every sub-pool's free-list against its control block and
    /// element headers.
    pub fn debug_validate_invariants(&self) {
        for layout in &self.layout.pools {
            let control = self.control(layout);
            assert_eq!(control.tag, CONTROL_TAG);
            assert_eq!(control.count, layout.count);
            let nodes = NodeSlots {
                bytes: &self.buffer[layout.nodes_range()],
            };
            control.free.debug_validate_invariants(&nodes);
            assert_eq!(
                control.free.len() + control.in_use as usize,
                layout.count as usize
            );
            for node in control.free.iter(&nodes) {
                let header: ElementHeader = read_pod(&self.buffer, layout.header_offset(node.get()));
                assert_eq!(header.state, STATE_FREE);
                assert_eq!(header.reserved, 0);
            }
        }
    }
}

impl fmt::Debug for PoolArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolArena")
            .field("sub_pools", &self.layout.pools.len())
            .field("total_len", &self.layout.total_len)
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}

#[inline]
fn record_range<T: Pod>(offset: usize) -> Option<std::ops::Range<usize>> {
    Some(offset..offset.checked_add(size_of::<T>())?)
}

#[inline]
fn read_pod<T: Pod>(buffer: &[u8], offset: usize) -> T {
    bytemuck::pod_read_unaligned(&buffer[offset..offset + size_of::<T>()])
}

#[inline]
fn write_pod<T: Pod>(buffer: &mut [u8], offset: usize, value: &T) {
    buffer[offset..offset + size_of::<T>()].copy_from_slice(bytemuck::bytes_of(value));
}
