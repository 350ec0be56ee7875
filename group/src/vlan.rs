// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A group's 4096-bit VLAN id filter.
//!
//! Ground truth: `original_source/kernel/lang/vlan.c`. The kernel helper's `-1` ("match every
//! VID") case has an inner loop that increments the *outer* loop's index instead of its own —
//! almost certainly a typo, since it leaves most of the bitmap untouched. That is not reproduced
//! here: `-1` is implemented as a direct fill of all 4096 bits (spec.md §9 Open Questions).

use concurrency::sync::Mutex;

/// Number of VLAN ids a filter can track, one bit per VID (0..4095).
pub const VLAN_BITMAP_BITS: usize = 4096;
const WORDS: usize = VLAN_BITMAP_BITS / 64;

/// A group's VLAN filter: a 4096-bit membership bitmap.
pub struct VlanFilter {
    bits: Mutex<[u64; WORDS]>,
}

impl VlanFilter {
    /// An empty filter: no VID is allowed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bits: Mutex::new([0u64; WORDS]),
        }
    }

    /// Set or clear membership for `vid`. `vid == -1` sets/clears every VID at once.
    ///
    /// Out-of-range positive `vid` (`>= 4096`) is ignored: the control surface validates
    /// `vid ∈ [-1, 4094]` before calling this (spec.md §6 `GROUP_VLAN_FILT`).
    pub fn set(&self, vid: i32, on: bool) {
        let mut bits = self.bits.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if vid == -1 {
            let fill = if on { u64::MAX } else { 0 };
            bits.fill(fill);
            return;
        }
        let Ok(vid) = usize::try_from(vid) else {
            return;
        };
        if vid >= VLAN_BITMAP_BITS {
            return;
        }
        let word = vid / 64;
        let bit = 1u64 << (vid % 64);
        if on {
            bits[word] |= bit;
        } else {
            bits[word] &= !bit;
        }
    }

    /// True iff `vid` is currently allowed through this filter.
    #[must_use]
    pub fn contains(&self, vid: u16) -> bool {
        let vid = vid as usize;
        if vid >= VLAN_BITMAP_BITS {
            return false;
        }
        let bits = self.bits.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        bits[vid / 64] & (1u64 << (vid % 64)) != 0
    }
}

impl Default for VlanFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::VlanFilter;

    #[test]
    fn set_then_contains() {
        let f = VlanFilter::new();
        assert!(!f.contains(100));
        f.set(100, true);
        assert!(f.contains(100));
        f.set(100, false);
        assert!(!f.contains(100));
    }

    #[test]
    fn minus_one_fills_every_bit() {
        let f = VlanFilter::new();
        f.set(-1, true);
        assert!(f.contains(0));
        assert!(f.contains(4095));
        f.set(-1, false);
        assert!(!f.contains(4095));
    }

    #[test]
    fn out_of_range_vid_is_ignored() {
        let f = VlanFilter::new();
        f.set(5000, true);
        assert!(!f.contains(5000_u16.min(4095)));
    }
}
