//! Intrusive doubly linked list over an external link table.
//!
//! The list itself is three words (`head`, `tail`, `len`). Node links live in
//! whatever storage the caller threads through each call: a plain `[Link]`
//! slice, or the node slots of a [`PoolArena`](crate::store::arena::PoolArena)
//! sub-pool. This lets one element be parked on a sub-pool free-list, then
//! moved onto a hash chain or the recency list without copying it.
//!
//! ## Architecture
//!
//! ```text
//!   link store (&mut [Link] or arena node slots)
//!   ┌────────┬──────────────────────────────┐
//!   │ NodeId │ Link { prev, next }          │
//!   ├────────┼──────────────────────────────┤
//!   │ 0      │ { prev: None,    next: 2 }   │
//!   │ 1      │ { unlinked }                 │
//!   │ 2      │ { prev: 0,       next: 3 }   │
//!   │ 3      │ { prev: 2,       next: None }│
//!   └────────┴──────────────────────────────┘
//!
//!   IntrusiveList { head: 0, tail: 3, len: 3 }
//!   head ─► [0] ◄──► [2] ◄──► [3] ◄── tail
//! ```
//!
//! Links and list heads are `Pod`: an id is stored as `index + 1` so an
//! all-zero record means "unlinked" / "empty". Zeroing a region of memory is
//! therefore a valid way to reset every list it contains. A linked node whose
//! neighbour is a list end stores `u32::MAX` for that side, so a node that is
//! the only member of some list is never mistaken for a detached one.
//!
//! ## Operations
//! - `push_front` / `push_back`: O(1), refuses nodes that are already linked
//! - `pop_front` / `pop_back` / `remove`: O(1)
//! - `move_to_front` / `move_to_back`: O(1) detach + attach
//! - `foreach` / `reverse_foreach` / `foreach_with`: O(n), early exit via
//!   [`ControlFlow::Break`]
//!
//! Every operation on an empty list or with an id outside the link store is
//! a no-op reported through `false` / `None`.
//!
//! `debug_validate_invariants()` is available in debug/test builds.

use std::ops::ControlFlow;

use bytemuck::{Pod, Zeroable};

/// Index of a node inside a [`LinkStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Largest representable node index.
    pub const MAX_INDEX: u32 = u32::MAX - 2;

    /// Creates a node id, or `None` if `index` exceeds [`Self::MAX_INDEX`].
    #[inline]
    pub const fn new(index: u32) -> Option<Self> {
        if index <= Self::MAX_INDEX {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Returns the slot index of this node.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw `u32` index.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

#[inline]
pub(crate) const fn encode(id: Option<NodeId>) -> u32 {
    match id {
        Some(id) => id.0 + 1,
        None => 0,
    }
}

/// Link value of a list end.
const END: u32 = u32::MAX;

#[inline]
const fn encode_link(id: Option<NodeId>) -> u32 {
    match id {
        Some(id) => id.0 + 1,
        None => END,
    }
}

#[inline]
pub(crate) const fn decode(raw: u32) -> Option<NodeId> {
    match raw {
        0 | END => None,
        raw => Some(NodeId(raw - 1)),
    }
}

/// Prev/next links of one node.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Link {
    prev: u32,
    next: u32,
}

impl Link {
    /// A node that is not a member of any list.
    pub const UNLINKED: Self = Self { prev: 0, next: 0 };

    #[inline]
    const fn new(prev: Option<NodeId>, next: Option<NodeId>) -> Self {
        Self {
            prev: encode_link(prev),
            next: encode_link(next),
        }
    }

    /// Previous node, if any.
    #[inline]
    pub const fn prev(&self) -> Option<NodeId> {
        decode(self.prev)
    }

    /// Next node, if any.
    #[inline]
    pub const fn next(&self) -> Option<NodeId> {
        decode(self.next)
    }

    /// Returns `true` if the node is not a member of any list.
    #[inline]
    pub const fn is_unlinked(&self) -> bool {
        self.prev == 0 && self.next == 0
    }
}

/// Read access to node links.
pub trait LinkStore {
    /// Returns the links of `id`, or `None` if `id` is out of range.
    fn link(&self, id: NodeId) -> Option<Link>;

    /// Number of addressable nodes.
    fn node_count(&self) -> usize;
}

/// Write access to node links.
pub trait LinkStoreMut: LinkStore {
    /// Overwrites the links of `id`; returns `false` if `id` is out of range.
    fn set_link(&mut self, id: NodeId, link: Link) -> bool;
}

impl LinkStore for [Link] {
    #[inline]
    fn link(&self, id: NodeId) -> Option<Link> {
        self.get(id.index()).copied()
    }

    #[inline]
    fn node_count(&self) -> usize {
        self.len()
    }
}

impl LinkStoreMut for [Link] {
    #[inline]
    fn set_link(&mut self, id: NodeId, link: Link) -> bool {
        match self.get_mut(id.index()) {
            Some(slot) => {
                *slot = link;
                true
            },
            None => false,
        }
    }
}

impl LinkStore for Vec<Link> {
    #[inline]
    fn link(&self, id: NodeId) -> Option<Link> {
        self.as_slice().link(id)
    }

    #[inline]
    fn node_count(&self) -> usize {
        self.len()
    }
}

impl LinkStoreMut for Vec<Link> {
    #[inline]
    fn set_link(&mut self, id: NodeId, link: Link) -> bool {
        self.as_mut_slice().set_link(id, link)
    }
}

/// Doubly linked list whose nodes live in an external [`LinkStore`].
///
/// The list does not know which store it belongs to; callers must always
/// pass the same store for a given list.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct IntrusiveList {
    head: u32,
    tail: u32,
    len: u32,
}

impl IntrusiveList {
    /// Creates an empty list.
    pub const fn new() -> Self {
        Self {
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Returns the number of nodes in the list.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Returns `true` if the list is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the node at the front (MRU end) of the list.
    #[inline]
    pub const fn front(&self) -> Option<NodeId> {
        decode(self.head)
    }

    /// Returns the node at the back (LRU end) of the list.
    #[inline]
    pub const fn back(&self) -> Option<NodeId> {
        decode(self.tail)
    }

    /// Links a detached node at the front; returns `false` if `id` is out of
    /// range or already linked into any list of this store.
    pub fn push_front<S: LinkStoreMut + ?Sized>(&mut self, store: &mut S, id: NodeId) -> bool {
        self.is_detached(store, id) && self.attach_front(store, id)
    }

    /// Links a detached node at the back; returns `false` if `id` is out of
    /// range or already linked into any list of this store.
    pub fn push_back<S: LinkStoreMut + ?Sized>(&mut self, store: &mut S, id: NodeId) -> bool {
        self.is_detached(store, id) && self.attach_back(store, id)
    }

    /// Unlinks and returns the front node.
    pub fn pop_front<S: LinkStoreMut + ?Sized>(&mut self, store: &mut S) -> Option<NodeId> {
        let id = self.front()?;
        self.detach(store, id).then_some(id)
    }

    /// Unlinks and returns the back node.
    pub fn pop_back<S: LinkStoreMut + ?Sized>(&mut self, store: &mut S) -> Option<NodeId> {
        let id = self.back()?;
        self.detach(store, id).then_some(id)
    }

    /// Unlinks `id`; returns `false` if `id` is not a member of this list.
    pub fn remove<S: LinkStoreMut + ?Sized>(&mut self, store: &mut S, id: NodeId) -> bool {
        self.detach(store, id)
    }

    /// Moves a member node to the front; returns `false` if `id` is not a
    /// member of this list.
    pub fn move_to_front<S: LinkStoreMut + ?Sized>(&mut self, store: &mut S, id: NodeId) -> bool {
        if self.front() == Some(id) {
            return true;
        }
        self.detach(store, id) && self.attach_front(store, id)
    }

    /// Moves a member node to the back; returns `false` if `id` is not a
    /// member of this list.
    pub fn move_to_back<S: LinkStoreMut + ?Sized>(&mut self, store: &mut S, id: NodeId) -> bool {
        if self.back() == Some(id) {
            return true;
        }
        self.detach(store, id) && self.attach_back(store, id)
    }

    /// Unlinks every node and empties the list.
    pub fn clear<S: LinkStoreMut + ?Sized>(&mut self, store: &mut S) {
        while self.pop_front(store).is_some() {}
        *self = Self::new();
    }

    /// Returns `true` if `id` is linked into this list.
    ///
    /// O(1): checks that the neighbours of `id` point back at it.
    pub fn contains<S: LinkStore + ?Sized>(&self, store: &S, id: NodeId) -> bool {
        self.membership(store, id).is_some()
    }

    /// Returns an iterator of node ids from front to back.
    pub fn iter<'a, S: LinkStore + ?Sized>(&self, store: &'a S) -> Iter<'a, S> {
        Iter {
            store,
            current: self.front(),
            remaining: self.len(),
            forward: true,
        }
    }

    /// Returns an iterator of node ids from back to front.
    pub fn iter_rev<'a, S: LinkStore + ?Sized>(&self, store: &'a S) -> Iter<'a, S> {
        Iter {
            store,
            current: self.back(),
            remaining: self.len(),
            forward: false,
        }
    }

    /// Visits nodes front to back until `visit` breaks.
    ///
    /// Returns the node the visitor stopped at, or `None` if every node was
    /// visited (or the list is empty).
    pub fn foreach<S, F>(&self, store: &S, mut visit: F) -> Option<NodeId>
    where
        S: LinkStore + ?Sized,
        F: FnMut(NodeId) -> ControlFlow<()>,
    {
        self.iter(store).find(|&id| visit(id).is_break())
    }

    /// Visits nodes back to front until `visit` breaks.
    pub fn reverse_foreach<S, F>(&self, store: &S, mut visit: F) -> Option<NodeId>
    where
        S: LinkStore + ?Sized,
        F: FnMut(NodeId) -> ControlFlow<()>,
    {
        self.iter_rev(store).find(|&id| visit(id).is_break())
    }

    /// Like [`foreach`](Self::foreach), passing `ctx` to every visit.
    pub fn foreach_with<S, C, F>(&self, store: &S, ctx: &C, mut visit: F) -> Option<NodeId>
    where
        S: LinkStore + ?Sized,
        C: ?Sized,
        F: FnMut(&C, NodeId) -> ControlFlow<()>,
    {
        self.iter(store).find(|&id| visit(ctx, id).is_break())
    }

    fn is_detached<S: LinkStore + ?Sized>(&self, store: &S, id: NodeId) -> bool {
        store.link(id).is_some_and(|link| link.is_unlinked())
    }

    /// Returns the links of `id` if its neighbours (or the list ends) agree
    /// that it belongs here.
    fn membership<S: LinkStore + ?Sized>(&self, store: &S, id: NodeId) -> Option<Link> {
        if self.is_empty() {
            return None;
        }
        let link = store.link(id)?;

        match link.prev() {
            Some(prev_id) => {
                if store.link(prev_id)?.next() != Some(id) {
                    return None;
                }
            },
            None => {
                if self.front() != Some(id) {
                    return None;
                }
            },
        }

        match link.next() {
            Some(next_id) => {
                if store.link(next_id)?.prev() != Some(id) {
                    return None;
                }
            },
            None => {
                if self.back() != Some(id) {
                    return None;
                }
            },
        }

        Some(link)
    }

    fn detach<S: LinkStoreMut + ?Sized>(&mut self, store: &mut S, id: NodeId) -> bool {
        let Some(link) = self.membership(store, id) else {
            return false;
        };
        let (prev, next) = (link.prev(), link.next());

        if let Some(prev_id) = prev {
            if let Some(prev_link) = store.link(prev_id) {
                store.set_link(prev_id, Link::new(prev_link.prev(), next));
            }
        } else {
            self.head = encode(next);
        }

        if let Some(next_id) = next {
            if let Some(next_link) = store.link(next_id) {
                store.set_link(next_id, Link::new(prev, next_link.next()));
            }
        } else {
            self.tail = encode(prev);
        }

        store.set_link(id, Link::UNLINKED);
        self.len -= 1;
        true
    }

    fn attach_front<S: LinkStoreMut + ?Sized>(&mut self, store: &mut S, id: NodeId) -> bool {
        let old_head = self.front();
        if !store.set_link(id, Link::new(None, old_head)) {
            return false;
        }
        if let Some(old_head) = old_head {
            if let Some(head_link) = store.link(old_head) {
                store.set_link(old_head, Link::new(Some(id), head_link.next()));
            }
        } else {
            self.tail = encode(Some(id));
        }
        self.head = encode(Some(id));
        self.len += 1;
        true
    }

    fn attach_back<S: LinkStoreMut + ?Sized>(&mut self, store: &mut S, id: NodeId) -> bool {
        let old_tail = self.back();
        if !store.set_link(id, Link::new(old_tail, None)) {
            return false;
        }
        if let Some(old_tail) = old_tail {
            if let Some(tail_link) = store.link(old_tail) {
                store.set_link(old_tail, Link::new(tail_link.prev(), Some(id)));
            }
        } else {
            self.head = encode(Some(id));
        }
        self.tail = encode(Some(id));
        self.len += 1;
        true
    }

    #[cfg(any(test, debug_assertions))]
    /// Returns the list order as node ids from head to tail.
    pub fn debug_snapshot_ids<S: LinkStore + ?Sized>(&self, store: &S) -> Vec<NodeId> {
        self.iter(store).collect()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants<S: LinkStore + ?Sized>(&self, store: &S) {
        if self.front().is_none() || self.back().is_none() {
            assert!(self.front().is_none());
            assert!(self.back().is_none());
            assert_eq!(self.len(), 0);
            return;
        }

        let mut seen = std::collections::HashSet::new();
        let mut count = 0usize;
        let mut current = self.front();
        let mut prev = None;

        while let Some(id) = current {
            assert!(seen.insert(id));
            let link = store.link(id).expect("node missing");
            assert_eq!(link.prev(), prev);
            if let Some(next_id) = link.next() {
                let next_link = store.link(next_id).expect("next node missing");
                assert_eq!(next_link.prev(), Some(id));
            } else {
                assert_eq!(self.back(), Some(id));
            }

            prev = Some(id);
            current = link.next();
            count += 1;
            assert!(count <= self.len());
        }

        assert_eq!(count, self.len());
    }
}

/// Iterator over node ids of an [`IntrusiveList`].
///
/// Bounded by the list length, so a corrupted link table cannot make it loop
/// forever.
pub struct Iter<'a, S: ?Sized> {
    store: &'a S,
    current: Option<NodeId>,
    remaining: usize,
    forward: bool,
}

impl<S: LinkStore + ?Sized> Iterator for Iter<'_, S> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.current?;
        let link = self.store.link(id)?;
        self.current = if self.forward {
            link.next()
        } else {
            link.prev()
        };
        self.remaining -= 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: u32) -> NodeId {
        NodeId::new(index).unwrap()
    }

    fn table(n: usize) -> Vec<Link> {
        vec![Link::UNLINKED; n]
    }

    #[test]
    fn intrusive_list_basic_ops() {
        let mut links = table(5);
        let mut list = IntrusiveList::new();
        assert!(list.push_front(&mut links, id(0)));
        assert!(list.push_back(&mut links, id(1)));
        assert!(list.push_back(&mut links, id(2)));

        assert_eq!(list.front(), Some(id(0)));
        assert_eq!(list.back(), Some(id(2)));
        assert_eq!(list.len(), 3);

        assert!(list.move_to_front(&mut links, id(2)));
        assert_eq!(list.front(), Some(id(2)));
        assert_eq!(list.back(), Some(id(1)));

        assert!(list.remove(&mut links, id(1)));
        assert_eq!(list.len(), 2);

        assert_eq!(list.pop_front(&mut links), Some(id(2)));
        assert_eq!(list.pop_back(&mut links), Some(id(0)));
        assert!(list.is_empty());
        assert!(!list.contains(&links, id(0)));
        list.debug_validate_invariants(&links);
    }

    #[test]
    fn intrusive_list_five_nodes_mixed_ends() {
        let mut links = table(5);
        let mut list = IntrusiveList::new();
        list.push_front(&mut links, id(0));
        list.push_front(&mut links, id(1));
        list.push_front(&mut links, id(2));
        list.push_back(&mut links, id(3));
        list.push_back(&mut links, id(4));
        assert_eq!(list.len(), 5);

        list.remove(&mut links, id(0));
        list.remove(&mut links, id(1));
        assert_eq!(list.len(), 3);

        list.pop_back(&mut links);
        list.pop_front(&mut links);
        assert!(!list.is_empty());
        assert_eq!(list.len(), 1);
        assert_eq!(list.front(), Some(id(3)));
        assert_eq!(list.back(), Some(id(3)));

        list.clear(&mut links);
        assert_eq!(list.len(), 0);
        assert_eq!(list.foreach(&links, |_| ControlFlow::Continue(())), None);
        assert!(links.iter().all(Link::is_unlinked));
    }

    #[test]
    fn intrusive_list_iter_order() {
        let mut links = table(3);
        let mut list = IntrusiveList::new();
        for i in 0..3 {
            list.push_back(&mut links, id(i));
        }
        let forward: Vec<_> = list.iter(&links).map(NodeId::get).collect();
        assert_eq!(forward, vec![0, 1, 2]);
        let backward: Vec<_> = list.iter_rev(&links).map(NodeId::get).collect();
        assert_eq!(backward, vec![2, 1, 0]);
    }

    #[test]
    fn intrusive_list_move_to_front_back_edges() {
        let mut links = table(3);
        let mut list = IntrusiveList::new();
        let (a, b, c) = (id(0), id(1), id(2));
        list.push_back(&mut links, a);
        list.push_back(&mut links, b);
        list.push_back(&mut links, c);

        assert!(list.move_to_front(&mut links, a));
        assert_eq!(list.debug_snapshot_ids(&links), vec![a, b, c]);

        assert!(list.move_to_back(&mut links, a));
        assert_eq!(list.debug_snapshot_ids(&links), vec![b, c, a]);

        assert!(list.move_to_front(&mut links, c));
        assert_eq!(list.debug_snapshot_ids(&links), vec![c, b, a]);

        assert!(list.contains(&links, b));
        list.debug_validate_invariants(&links);
    }

    #[test]
    fn intrusive_list_remove_middle_and_ends() {
        let mut links = table(3);
        let mut list = IntrusiveList::new();
        let (a, b, c) = (id(0), id(1), id(2));
        list.push_back(&mut links, a);
        list.push_back(&mut links, b);
        list.push_back(&mut links, c);

        assert!(list.remove(&mut links, b));
        assert_eq!(list.debug_snapshot_ids(&links), vec![a, c]);

        assert!(list.remove(&mut links, a));
        assert_eq!(list.front(), Some(c));
        assert_eq!(list.back(), Some(c));

        assert!(list.remove(&mut links, c));
        assert!(list.is_empty());
        assert_eq!(list.front(), None);
        assert_eq!(list.back(), None);
    }

    #[test]
    fn empty_list_operations_are_noops() {
        let mut links = table(2);
        let mut list = IntrusiveList::new();
        assert_eq!(list.pop_front(&mut links), None);
        assert_eq!(list.pop_back(&mut links), None);
        assert!(!list.remove(&mut links, id(0)));
        assert!(!list.move_to_front(&mut links, id(0)));
        assert!(!list.move_to_back(&mut links, id(1)));
        assert_eq!(list.reverse_foreach(&links, |_| ControlFlow::Break(())), None);
    }

    #[test]
    fn out_of_range_node_is_rejected() {
        let mut links = table(2);
        let mut list = IntrusiveList::new();
        assert!(!list.push_front(&mut links, id(7)));
        assert!(!list.push_back(&mut links, id(2)));
        assert!(list.is_empty());
        assert!(!list.remove(&mut links, id(9)));
    }

    #[test]
    fn double_push_is_refused() {
        let mut links = table(3);
        let mut list = IntrusiveList::new();
        assert!(list.push_back(&mut links, id(0)));
        assert!(!list.push_back(&mut links, id(0)));
        assert!(list.push_back(&mut links, id(1)));
        assert!(!list.push_front(&mut links, id(1)));
        assert!(!list.push_front(&mut links, id(0)));
        assert_eq!(list.len(), 2);
        list.debug_validate_invariants(&links);
    }

    #[test]
    fn remove_refuses_nodes_of_another_list() {
        let mut links = table(4);
        let mut first = IntrusiveList::new();
        let mut second = IntrusiveList::new();
        first.push_back(&mut links, id(0));
        first.push_back(&mut links, id(1));
        second.push_back(&mut links, id(2));
        second.push_back(&mut links, id(3));

        assert!(!first.remove(&mut links, id(2)));
        assert!(!first.remove(&mut links, id(3)));
        assert!(!first.move_to_front(&mut links, id(3)));
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        first.debug_validate_invariants(&links);
        second.debug_validate_invariants(&links);
    }

    #[test]
    fn foreach_stops_at_first_break() {
        let mut links = table(5);
        let mut list = IntrusiveList::new();
        for i in 0..5 {
            list.push_back(&mut links, id(i));
        }

        let mut visited = Vec::new();
        let stopped = list.foreach(&links, |node| {
            visited.push(node.get());
            if node.get() == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(stopped, Some(id(2)));
        assert_eq!(visited, vec![0, 1, 2]);

        let stopped = list.reverse_foreach(&links, |node| {
            if node.get() < 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(stopped, Some(id(2)));

        let completed = list.foreach(&links, |_| ControlFlow::Continue(()));
        assert_eq!(completed, None);
    }

    #[test]
    fn foreach_with_threads_context() {
        let mut links = table(4);
        let mut list = IntrusiveList::new();
        for i in 0..4 {
            list.push_back(&mut links, id(i));
        }
        let keys = [10u32, 20, 30, 40];
        let found = list.foreach_with(&links, &30u32, |wanted, node| {
            if keys[node.index()] == *wanted {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(found, Some(id(2)));

        let missing = list.foreach_with(&links, &99u32, |wanted, node| {
            if keys[node.index()] == *wanted {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(missing, None);
    }

    #[test]
    fn sole_member_is_not_detached() {
        let mut links = table(2);
        let mut first = IntrusiveList::new();
        let mut second = IntrusiveList::new();
        assert!(first.push_back(&mut links, id(0)));
        assert!(!links[0].is_unlinked());
        assert_eq!(links[0].prev(), None);
        assert_eq!(links[0].next(), None);

        assert!(!second.push_front(&mut links, id(0)));
        assert!(!second.push_back(&mut links, id(0)));
        assert!(second.is_empty());
        assert!(first.contains(&links, id(0)));

        assert_eq!(first.pop_front(&mut links), Some(id(0)));
        assert!(links[0].is_unlinked());
        assert!(second.push_back(&mut links, id(0)));
        second.debug_validate_invariants(&links);
    }

    #[test]
    fn zeroed_list_is_empty() {
        let list: IntrusiveList = bytemuck::Zeroable::zeroed();
        assert!(list.is_empty());
        assert_eq!(list, IntrusiveList::new());
        assert!(Link::zeroed().is_unlinked());
    }

    #[test]
    fn node_id_bounds() {
        assert!(NodeId::new(NodeId::MAX_INDEX).is_some());
        assert!(NodeId::new(u32::MAX - 1).is_none());
        assert!(NodeId::new(u32::MAX).is_none());
        assert_eq!(decode(encode_link(None)), None);
        assert_eq!(decode(encode_link(Some(id(NodeId::MAX_INDEX)))), Some(id(NodeId::MAX_INDEX)));
        assert_eq!(decode(encode(Some(id(41)))), Some(id(41)));
        assert_eq!(decode(encode(None)), None);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::VecDeque;

        #[derive(Debug, Clone)]
        enum Op {
            PushFront(u32),
            PushBack(u32),
            PopFront,
            PopBack,
            Remove(u32),
            MoveToFront(u32),
            MoveToBack(u32),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u32..16).prop_map(Op::PushFront),
                (0u32..16).prop_map(Op::PushBack),
                Just(Op::PopFront),
                Just(Op::PopBack),
                (0u32..16).prop_map(Op::Remove),
                (0u32..16).prop_map(Op::MoveToFront),
                (0u32..16).prop_map(Op::MoveToBack),
            ]
        }

        proptest! {
            #[test]
            fn prop_matches_vecdeque_model(ops in prop::collection::vec(op_strategy(), 0..200)) {
                let mut links = table(16);
                let mut list = IntrusiveList::new();
                let mut model: VecDeque<u32> = VecDeque::new();

                for op in ops {
                    match op {
                        Op::PushFront(i) => {
                            let pushed = list.push_front(&mut links, id(i));
                            prop_assert_eq!(pushed, !model.contains(&i));
                            if pushed {
                                model.push_front(i);
                            }
                        },
                        Op::PushBack(i) => {
                            let pushed = list.push_back(&mut links, id(i));
                            prop_assert_eq!(pushed, !model.contains(&i));
                            if pushed {
                                model.push_back(i);
                            }
                        },
                        Op::PopFront => {
                            prop_assert_eq!(list.pop_front(&mut links).map(NodeId::get), model.pop_front());
                        },
                        Op::PopBack => {
                            prop_assert_eq!(list.pop_back(&mut links).map(NodeId::get), model.pop_back());
                        },
                        Op::Remove(i) => {
                            let expected = model.iter().position(|&v| v == i);
                            prop_assert_eq!(list.remove(&mut links, id(i)), expected.is_some());
                            if let Some(pos) = expected {
                                model.remove(pos);
                            }
                        },
                        Op::MoveToFront(i) => {
                            let expected = model.iter().position(|&v| v == i);
                            prop_assert_eq!(list.move_to_front(&mut links, id(i)), expected.is_some());
                            if let Some(pos) = expected {
                                model.remove(pos);
                                model.push_front(i);
                            }
                        },
                        Op::MoveToBack(i) => {
                            let expected = model.iter().position(|&v| v == i);
                            prop_assert_eq!(list.move_to_back(&mut links, id(i)), expected.is_some());
                            if let Some(pos) = expected {
                                model.remove(pos);
                                model.push_back(i);
                            }
                        },
                    }

                    list.debug_validate_invariants(&links);
                    let order: Vec<u32> = list.iter(&links).map(NodeId::get).collect();
                    prop_assert_eq!(order, model.iter().copied().collect::<Vec<_>>());
                }
            }
        }
    }
}
