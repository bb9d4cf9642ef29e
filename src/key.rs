//! Key comparison and key-to-number capability.
//!
//! Keys are fixed-size byte regions (`key_size` bytes, set at creation).
//! A [`KeyOps`] implementation decides when two keys are the same and maps a
//! key onto the 32-bit number the hash index scatters into buckets.
//!
//! ```
//! use pincache::key::{ByteKey, KeyOps, KeyOrdering};
//!
//! let ops = ByteKey;
//! assert_eq!(ops.compare(b"abcd", b"abcd"), KeyOrdering::Equal);
//! assert!(!ops.compare(b"abcd", b"abce").is_equal());
//! assert_eq!(ops.to_number(b"abcd"), ops.to_number(b"abcd"));
//! ```

use std::hash::Hasher;

use rustc_hash::FxHasher;

/// Result of comparing two keys.
///
/// Only [`KeyOrdering::Equal`] is significant to the cache; ordered variants
/// exist for comparators that can rank keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyOrdering {
    Equal,
    NotEqual,
    Less,
    Greater,
}

impl KeyOrdering {
    /// Returns `true` for [`KeyOrdering::Equal`].
    #[inline]
    pub const fn is_equal(self) -> bool {
        matches!(self, Self::Equal)
    }
}

impl From<std::cmp::Ordering> for KeyOrdering {
    fn from(ordering: std::cmp::Ordering) -> Self {
        match ordering {
            std::cmp::Ordering::Equal => Self::Equal,
            std::cmp::Ordering::Less => Self::Less,
            std::cmp::Ordering::Greater => Self::Greater,
        }
    }
}

/// Key capability required by the hash index.
///
/// Both methods receive exactly `key_size` bytes.
///
/// # Contract
///
/// - `compare` must be an equivalence over the key region: reflexive,
///   symmetric and transitive in its `Equal` answers.
/// - `to_number` must be total and deterministic, and keys that compare
///   `Equal` must map to the same number. Its spread directly decides hash
///   chain length; a constant function degrades every lookup to O(n).
pub trait KeyOps {
    /// Compares two keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> KeyOrdering;

    /// Maps a key onto a 32-bit number.
    fn to_number(&self, key: &[u8]) -> u32;
}

/// Byte-wise key equality with an FxHash-derived number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteKey;

impl KeyOps for ByteKey {
    #[inline]
    fn compare(&self, a: &[u8], b: &[u8]) -> KeyOrdering {
        a.cmp(b).into()
    }

    #[inline]
    fn to_number(&self, key: &[u8]) -> u32 {
        let mut hasher = FxHasher::default();
        hasher.write(key);
        let hash = hasher.finish();
        (hash ^ (hash >> 32)) as u32
    }
}

/// Keys holding a little-endian integer in their first bytes.
///
/// The number is the integer itself (truncated to 32 bits), which keeps
/// sequential ids spread by the index's multiplicative hash. Useful when
/// keys are already well-distributed ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegerKey;

impl KeyOps for IntegerKey {
    #[inline]
    fn compare(&self, a: &[u8], b: &[u8]) -> KeyOrdering {
        if a == b {
            KeyOrdering::Equal
        } else {
            KeyOrdering::NotEqual
        }
    }

    #[inline]
    fn to_number(&self, key: &[u8]) -> u32 {
        let mut word = [0u8; 4];
        let len = key.len().min(4);
        word[..len].copy_from_slice(&key[..len]);
        u32::from_le_bytes(word)
    }
}

impl<F, G> KeyOps for (F, G)
where
    F: Fn(&[u8], &[u8]) -> KeyOrdering,
    G: Fn(&[u8]) -> u32,
{
    #[inline]
    fn compare(&self, a: &[u8], b: &[u8]) -> KeyOrdering {
        (self.0)(a, b)
    }

    #[inline]
    fn to_number(&self, key: &[u8]) -> u32 {
        (self.1)(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_key_equality_and_order() {
        assert_eq!(ByteKey.compare(b"aa", b"aa"), KeyOrdering::Equal);
        assert_eq!(ByteKey.compare(b"aa", b"ab"), KeyOrdering::Less);
        assert_eq!(ByteKey.compare(b"ab", b"aa"), KeyOrdering::Greater);
    }

    #[test]
    fn byte_key_number_is_deterministic() {
        let a = ByteKey.to_number(&42u64.to_le_bytes());
        let b = ByteKey.to_number(&42u64.to_le_bytes());
        assert_eq!(a, b);
        assert_ne!(a, ByteKey.to_number(&43u64.to_le_bytes()));
    }

    #[test]
    fn integer_key_reads_little_endian_prefix() {
        assert_eq!(IntegerKey.to_number(&7u32.to_le_bytes()), 7);
        assert_eq!(IntegerKey.to_number(&0x1_0000_0005u64.to_le_bytes()), 5);
        assert_eq!(IntegerKey.to_number(&[3u8]), 3);
        assert!(IntegerKey.compare(&[1, 2], &[1, 2]).is_equal());
        assert_eq!(IntegerKey.compare(&[1, 2], &[2, 1]), KeyOrdering::NotEqual);
    }

    #[test]
    fn closure_pair_implements_key_ops() {
        let ops = (
            |a: &[u8], b: &[u8]| {
                if a[0] == b[0] {
                    KeyOrdering::Equal
                } else {
                    KeyOrdering::NotEqual
                }
            },
            |key: &[u8]| u32::from(key[0]),
        );
        assert!(ops.compare(&[9, 1], &[9, 2]).is_equal());
        assert_eq!(ops.to_number(&[200, 0]), 200);
    }
}
