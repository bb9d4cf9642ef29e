//! Arena storage: the buffer allocator seam, the sub-pool arena and the hash
//! index built on top of it.

pub mod allocator;
pub mod arena;
pub mod hash_index;
