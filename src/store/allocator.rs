//! Source of the single backing buffer of a cache.
//!
//! A cache asks its [`ArenaAllocator`] for exactly one buffer at creation and
//! hands it back exactly once at teardown. Between the two calls no other
//! allocation is made on behalf of cached entries.
//!
//! ```
//! use pincache::store::allocator::{ArenaAllocator, HeapAllocator};
//!
//! let mut alloc = HeapAllocator;
//! let buf = alloc.allocate(128).unwrap();
//! assert_eq!(buf.len(), 128);
//! alloc.release(buf);
//! ```

/// Provides and reclaims the backing buffer of a pool arena.
pub trait ArenaAllocator {
    /// Returns a buffer of at least `len` bytes, or `None` if unavailable.
    fn allocate(&mut self, len: usize) -> Option<Box<[u8]>>;

    /// Takes back a buffer previously returned by [`allocate`](Self::allocate).
    fn release(&mut self, buffer: Box<[u8]>);
}

/// Allocates zeroed buffers on the global heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapAllocator;

impl ArenaAllocator for HeapAllocator {
    fn allocate(&mut self, len: usize) -> Option<Box<[u8]>> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(len).ok()?;
        buffer.resize(len, 0u8);
        Some(buffer.into_boxed_slice())
    }

    fn release(&mut self, buffer: Box<[u8]>) {
        drop(buffer);
    }
}

impl<A: ArenaAllocator + ?Sized> ArenaAllocator for Box<A> {
    #[inline]
    fn allocate(&mut self, len: usize) -> Option<Box<[u8]>> {
        (**self).allocate(len)
    }

    #[inline]
    fn release(&mut self, buffer: Box<[u8]>) {
        (**self).release(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_allocator_returns_zeroed_buffer() {
        let mut alloc = HeapAllocator;
        let buf = alloc.allocate(64).unwrap();
        assert_eq!(buf.len(), 64);
        assert!(buf.iter().all(|&b| b == 0));
        alloc.release(buf);
    }

    #[test]
    fn heap_allocator_refuses_impossible_request() {
        assert!(HeapAllocator.allocate(usize::MAX).is_none());
    }

    #[test]
    fn boxed_allocator_forwards() {
        let mut alloc: Box<dyn ArenaAllocator> = Box::new(HeapAllocator);
        let buf = alloc.allocate(3).unwrap();
        assert_eq!(buf.len(), 3);
        alloc.release(buf);
    }
}
