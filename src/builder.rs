//! Cache configuration and builder.
//!
//! [`CacheConfig`] holds the three sizes fixed at creation. [`CacheBuilder`]
//! adds the pluggable parts (key ops, allocator, free-entry hook) and
//! creates a [`PinCache`].
//!
//! ## Example
//!
//! ```rust
//! use pincache::builder::CacheBuilder;
//! use pincache::key::IntegerKey;
//!
//! let mut cache = CacheBuilder::new(100)
//!     .entry_size(16)
//!     .key_size(8)
//!     .key_ops(IntegerKey)
//!     .try_build()
//!     .unwrap();
//!
//! cache.add(&42u64.to_le_bytes(), Some(&[7u8; 16])).unwrap();
//! assert!(cache.contains(&42u64.to_le_bytes()));
//! ```

use std::fmt;

use crate::ds::intrusive_list::NodeId;
use crate::error::{ConfigError, CreateError};
use crate::key::{ByteKey, KeyOps};
use crate::policy::pin_lru::{BoxedAllocator, FreeEntryHook, PinCache};
use crate::store::allocator::{ArenaAllocator, HeapAllocator};

/// Sizes fixed for the lifetime of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CacheConfig {
    /// Maximum number of resident entries.
    pub max_entries: usize,
    /// Bytes per value.
    pub entry_size: usize,
    /// Bytes per key.
    pub key_size: usize,
}

impl CacheConfig {
    /// Creates a configuration.
    pub const fn new(max_entries: usize, entry_size: usize, key_size: usize) -> Self {
        Self {
            max_entries,
            entry_size,
            key_size,
        }
    }

    /// Checks that every size is non-zero and the capacity is addressable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::new("max_entries must be > 0"));
        }
        if self.max_entries - 1 > NodeId::MAX_INDEX as usize {
            return Err(ConfigError::new(format!(
                "max_entries must be <= {}",
                u64::from(NodeId::MAX_INDEX) + 1
            )));
        }
        if self.entry_size == 0 {
            return Err(ConfigError::new("entry_size must be > 0"));
        }
        if self.key_size == 0 {
            return Err(ConfigError::new("key_size must be > 0"));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(1024, 8, 8)
    }
}

/// Builder for [`PinCache`] instances.
pub struct CacheBuilder<K = ByteKey> {
    config: CacheConfig,
    key_ops: K,
    allocator: Option<BoxedAllocator>,
    on_free_entry: Option<FreeEntryHook>,
}

impl CacheBuilder<ByteKey> {
    /// Creates a builder for `max_entries` entries with 8-byte keys and values.
    pub fn new(max_entries: usize) -> Self {
        Self::from_config(CacheConfig {
            max_entries,
            ..CacheConfig::default()
        })
    }

    /// Creates a builder from a full configuration.
    pub fn from_config(config: CacheConfig) -> Self {
        Self {
            config,
            key_ops: ByteKey,
            allocator: None,
            on_free_entry: None,
        }
    }
}

impl<K: KeyOps> CacheBuilder<K> {
    /// Sets the value size in bytes.
    pub fn entry_size(mut self, entry_size: usize) -> Self {
        self.config.entry_size = entry_size;
        self
    }

    /// Sets the key size in bytes.
    pub fn key_size(mut self, key_size: usize) -> Self {
        self.config.key_size = key_size;
        self
    }

    /// Replaces the key comparison and key-to-number capability.
    pub fn key_ops<K2: KeyOps>(self, key_ops: K2) -> CacheBuilder<K2> {
        CacheBuilder {
            config: self.config,
            key_ops,
            allocator: self.allocator,
            on_free_entry: self.on_free_entry,
        }
    }

    /// Supplies the allocator of the backing buffer ([`HeapAllocator`] by
    /// default).
    pub fn allocator<A>(mut self, allocator: A) -> Self
    where
        A: ArenaAllocator + Send + 'static,
    {
        self.allocator = Some(Box::new(allocator));
        self
    }

    /// Installs a callback run on every entry during `clean` and teardown.
    pub fn on_free_entry<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&[u8], &mut [u8]) + Send + 'static,
    {
        self.on_free_entry = Some(Box::new(hook));
        self
    }

    /// Configuration the cache will be built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Creates the cache.
    pub fn try_build(self) -> Result<PinCache<K>, CreateError> {
        let allocator: BoxedAllocator = match self.allocator {
            Some(allocator) => allocator,
            None => Box::new(HeapAllocator),
        };
        PinCache::create(self.config, self.key_ops, allocator, self.on_free_entry)
    }
}

impl<K> fmt::Debug for CacheBuilder<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("config", &self.config)
            .field("allocator", &self.allocator.is_some())
            .field("on_free_entry", &self.on_free_entry.is_some())
            .finish_non_exhaustive()
    }
}
