//! Error types for the pincache library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Outcome taxonomy of cache operations (`NotFound`,
//!   `Locked`, `Unlocked`, `Full`, `Failure`, `AlreadyExists`).
//! - [`PoolError`]: Failures reported by the memory pool arena (exhausted
//!   sub-pool, forged or corrupt element handle, short buffer).
//! - [`CreateError`]: Returned when a cache cannot be created.
//! - [`ConfigError`]: Returned when cache configuration parameters are invalid
//!   (e.g. zero capacity, zero entry size).
//! - [`InvariantError`]: Returned when internal data-structure invariants are
//!   violated (`check_invariants` methods).
//!
//! ## Example Usage
//!
//! ```
//! use pincache::builder::CacheBuilder;
//! use pincache::error::{CacheError, CreateError};
//!
//! // Invalid capacity is caught without panicking
//! let bad = CacheBuilder::new(0).entry_size(4).key_size(4).try_build();
//! assert!(matches!(bad, Err(CreateError::Config(_))));
//!
//! let mut cache = CacheBuilder::new(1).entry_size(4).key_size(4).try_build().unwrap();
//! assert_eq!(cache.delete_by_key(&1u32.to_le_bytes()), Err(CacheError::NotFound));
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Outcome of a failed cache operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum CacheError {
    /// The key or entry is not resident.
    #[error("entry not found")]
    NotFound,
    /// The entry is pinned (`lock_counter > 0`).
    #[error("entry is locked")]
    Locked,
    /// Unlock was called on an entry whose lock counter is already zero.
    #[error("entry is already unlocked")]
    Unlocked,
    /// Capacity is exhausted and every resident entry is pinned.
    #[error("cache is full and every entry is locked")]
    Full,
    /// Invalid argument, forged handle or corrupted element.
    #[error("invalid argument or corrupted entry")]
    Failure,
    /// `add` was called with a key that is already resident.
    #[error("key already exists")]
    AlreadyExists,
}

impl From<PoolError> for CacheError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Exhausted { .. } => Self::Full,
            _ => Self::Failure,
        }
    }
}

// ---------------------------------------------------------------------------
// PoolError
// ---------------------------------------------------------------------------

/// Failure reported by the memory pool arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum PoolError {
    /// The sub-pool id does not name a sub-pool of this arena.
    #[error("unknown sub-pool {sub_pool}")]
    UnknownSubPool {
        /// Requested sub-pool.
        sub_pool: u16,
    },
    /// Every element of the sub-pool is in use.
    #[error("sub-pool {sub_pool} is exhausted")]
    Exhausted {
        /// Exhausted sub-pool.
        sub_pool: u16,
    },
    /// The element handle names a slot past the end of its sub-pool, or was
    /// issued for a different sub-pool.
    #[error("slot {slot} is out of range for sub-pool {sub_pool}")]
    OutOfRange {
        /// Sub-pool the handle was checked against.
        sub_pool: u16,
        /// Offending slot.
        slot: u32,
    },
    /// The element header does not carry the arena validation tag.
    #[error("element {slot} of sub-pool {sub_pool} failed tag validation")]
    BadTag {
        /// Sub-pool of the element.
        sub_pool: u16,
        /// Slot of the element.
        slot: u32,
    },
    /// The element is on the free-list.
    #[error("element {slot} of sub-pool {sub_pool} is not in use")]
    NotInUse {
        /// Sub-pool of the element.
        sub_pool: u16,
        /// Slot of the element.
        slot: u32,
    },
    /// The element's node is still threaded through a caller list.
    #[error("element {slot} of sub-pool {sub_pool} is still linked")]
    StillLinked {
        /// Sub-pool of the element.
        sub_pool: u16,
        /// Slot of the element.
        slot: u32,
    },
    /// The sub-pool specs cannot be laid out (see [`ConfigError`]).
    #[error("sub-pool specs cannot be laid out")]
    InvalidLayout,
    /// The buffer is smaller than the computed layout.
    #[error("buffer of {provided} bytes is smaller than the required {required} bytes")]
    ShortBuffer {
        /// Bytes required by the layout.
        required: usize,
        /// Bytes supplied.
        provided: usize,
    },
}

// ---------------------------------------------------------------------------
// CreateError
// ---------------------------------------------------------------------------

/// Error returned when a cache cannot be created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreateError {
    /// Configuration parameters were rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The allocator returned no buffer.
    #[error("allocator could not provide {requested} bytes")]
    AllocationFailed {
        /// Bytes requested from the allocator.
        requested: usize,
    },
    /// The allocator's buffer could not be laid out.
    #[error("arena layout failed: {0}")]
    Layout(#[from] PoolError),
}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by [`PinCache::check_invariants`](crate::policy::pin_lru::PinCache::check_invariants).
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`CacheConfig::validate`](crate::builder::CacheConfig::validate)
/// and [`PoolArena::compute_total_length`](crate::store::arena::PoolArena::compute_total_length).
/// Carries a human-readable description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use pincache::builder::CacheConfig;
///
/// let err = CacheConfig::new(0, 8, 8).validate().unwrap_err();
/// assert!(err.to_string().contains("max_entries"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
