use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use serde::{Deserialize, Serialize};

/// Capability bitmask.
///
/// Masks compare as unsigned integers, which is what makes the single-bit
/// partition scans in the action engine a range lookup: all actions governed
/// by the same single bit share one key and sort contiguously.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CapMask(u128);

impl CapMask {
    pub const EMPTY: CapMask = CapMask(0);

    /// Mask with the single bit at `index` set. Indices run 0..128.
    pub const fn bit(index: u32) -> Self {
        assert!(index < 128, "capability bit index out of range");
        CapMask(1u128 << index)
    }

    pub const fn from_bits(bits: u128) -> Self {
        CapMask(bits)
    }

    pub const fn bits(&self) -> u128 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn intersects(&self, other: CapMask) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn population_count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate the set bit indices from highest to lowest.
    pub fn iter_bits_desc(&self) -> BitsDesc {
        BitsDesc(self.0)
    }
}

impl Not for CapMask {
    type Output = CapMask;

    fn not(self) -> CapMask {
        CapMask(!self.0)
    }
}

impl BitAnd for CapMask {
    type Output = CapMask;

    fn bitand(self, rhs: CapMask) -> CapMask {
        CapMask(self.0 & rhs.0)
    }
}

impl BitOr for CapMask {
    type Output = CapMask;

    fn bitor(self, rhs: CapMask) -> CapMask {
        CapMask(self.0 | rhs.0)
    }
}

impl fmt::Display for CapMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Descending iterator over set bit indices.
pub struct BitsDesc(u128);

impl Iterator for BitsDesc {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        let index = 127 - self.0.leading_zeros();
        self.0 &= !(1u128 << index);
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersects_and_population() {
        let a = CapMask::from_bits(0b011);
        let b = CapMask::from_bits(0b010);
        assert!(a.intersects(b));
        assert!(!CapMask::EMPTY.intersects(a));
        assert_eq!(a.population_count(), 2);
        assert_eq!(b.population_count(), 1);
    }

    #[test]
    fn masks_order_as_integers() {
        assert!(CapMask::bit(0) < CapMask::bit(1));
        assert!(CapMask::EMPTY < CapMask::bit(0));
        assert!(CapMask::bit(100) > CapMask::from_bits(u64::MAX as u128));
    }

    #[test]
    fn bits_iterate_descending() {
        let mask = CapMask::from_bits(0b1011);
        let bits: Vec<u32> = mask.iter_bits_desc().collect();
        assert_eq!(bits, vec![3, 1, 0]);
        assert_eq!(CapMask::EMPTY.iter_bits_desc().count(), 0);
    }

    #[test]
    fn not_flips_every_bit() {
        let mask = CapMask::from_bits(0b101);
        assert!(!(!mask).intersects(mask));
        assert!((!mask).intersects(CapMask::bit(1)));
    }
}
