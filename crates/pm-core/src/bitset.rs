//! Fixed-width bit-vectors over the `NUM_NAMES` object-name space.
//!
//! These back the scheduler's hot path: conflict detection is nothing more
//! than AND/OR over the underlying words, which is also the only operation
//! the reference hardware design performs here. A `Vec`- or set-based
//! representation would work too, but an array of machine words known at
//! compile time is what the bit-parallel tournament actually dispatches to.

use crate::config::NUM_NAME_WORDS;
use crate::ident::ObjectName;

/// A `NUM_NAMES`-wide bit-vector, one bit per [`ObjectName`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NameSet {
    words: [u64; NUM_NAME_WORDS],
}

impl NameSet {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            words: [0u64; NUM_NAME_WORDS],
        }
    }

    /// Sets the bit for `name`.
    pub fn insert(&mut self, name: ObjectName) {
        let idx = name.bit_index();
        self.words[idx / 64] |= 1u64 << (idx % 64);
    }

    /// Returns whether `name`'s bit is set.
    #[must_use]
    pub fn contains(&self, name: ObjectName) -> bool {
        let idx = name.bit_index();
        (self.words[idx / 64] >> (idx % 64)) & 1 == 1
    }

    /// Returns `true` if `self` and `other` share no set bit.
    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == 0)
    }

    /// In-place union with `other`.
    pub fn union_with(&mut self, other: &Self) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= b;
        }
    }

    /// Returns the union of `self` and `other` without mutating either.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut out = *self;
        out.union_with(other);
        out
    }

    /// Bitwise AND of `self` and `other`.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut out = Self::empty();
        for ((o, a), b) in out.words.iter_mut().zip(self.words.iter()).zip(other.words.iter()) {
            *o = a & b;
        }
        out
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Iterates set bits as [`ObjectName`]s, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ObjectName> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, word)| {
            (0..64).filter_map(move |bit| {
                if (word >> bit) & 1 == 1 {
                    Some(ObjectName::from_bit_index(word_idx * 64 + bit))
                } else {
                    None
                }
            })
        })
    }
}

/// A narrow bit-vector over scheduling-pool positions (`POOL` bits wide).
/// Used for the `indices` field of a [`crate::scheduler::TransactionSet`] and
/// for the dispatcher's `pendingFlags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolMask(pub u32);

impl PoolMask {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn bit(position: usize) -> Self {
        Self(1u32 << position)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Index of the lowest set bit, if any.
    #[must_use]
    pub const fn lowest(self) -> Option<u32> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros())
        }
    }

    #[must_use]
    pub const fn clear_bit(self, bit: u32) -> Self {
        Self(self.0 & !(1u32 << bit))
    }

    #[must_use]
    pub const fn has_bit(self, bit: u32) -> bool {
        (self.0 >> bit) & 1 == 1
    }

    #[must_use]
    pub const fn set_bit(self, bit: u32) -> Self {
        Self(self.0 | (1u32 << bit))
    }

    /// Shifts right by one bit, dropping bit 0 (used to turn the tournament
    /// winner's `indices` into the dispatcher's `pendingFlags`, which drops
    /// the always-present running-set position).
    #[must_use]
    pub const fn shift_right_one(self) -> Self {
        Self(self.0 >> 1)
    }
}
