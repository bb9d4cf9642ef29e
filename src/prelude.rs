pub use crate::builder::{CacheBuilder, CacheConfig};
pub use crate::error::{CacheError, CreateError, PoolError};
pub use crate::key::{ByteKey, IntegerKey, KeyOps, KeyOrdering};
pub use crate::policy::pin_lru::{EntryRef, PinCache};
pub use crate::store::allocator::{ArenaAllocator, HeapAllocator};

#[cfg(feature = "metrics")]
pub use crate::metrics::snapshot::PinCacheMetricsSnapshot;
