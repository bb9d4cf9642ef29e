//! pincache: a bounded, pinnable LRU cache living in one arena buffer.
//!
//! The crate is layered bottom-up:
//!
//! - [`ds::intrusive_list`]: index-linked doubly linked list whose links are
//!   stored by the caller;
//! - [`store::arena`]: fixed-size element sub-pools carved out of one byte
//!   buffer, with tag validation and per-sub-pool free lists;
//! - [`store::hash_index`]: chained hash index with its buckets, chain nodes
//!   and key copies all held in the arena;
//! - [`policy::pin_lru`]: the cache engine with lookup, add, delete, pinning
//!   and least-recently-used eviction.
//!
//! Most users only need [`builder::CacheBuilder`] and the types in
//! [`prelude`].

pub mod builder;
pub mod ds;
pub mod error;
pub mod key;
pub mod policy;
pub mod store;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;
