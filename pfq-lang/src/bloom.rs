// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A small fixed-size bloom filter over `u64` keys, backing the `bloom*` predicate family
//! (spec.md §4.4.5's "bloom family").
//!
//! `original_source/` carries no bloom-filter module to ground this against (the retrieved
//! kernel sources stop at the classic filter/predicate primitives), so this is a from-scratch,
//! deliberately simple implementation: two independent multiplicative hashes over a bit vector,
//! the textbook minimum for a usable bloom filter. See `DESIGN.md`.

use concurrency::sync::atomic::{AtomicU64, Ordering};
use std::net::IpAddr;

/// Fold an IP address down to the `u64` key space [`BloomFilter`] indexes on.
///
/// IPv4 addresses occupy the low 32 bits verbatim. IPv6 addresses are folded by XORing their
/// high and low 64-bit halves, the same collapse `ahash`-based packet hashing uses elsewhere in
/// this crate family rather than truncating to the first 8 bytes.
#[must_use]
pub fn ip_addr_key(addr: IpAddr) -> u64 {
    match addr {
        IpAddr::V4(v4) => u64::from(u32::from_be_bytes(v4.octets())),
        IpAddr::V6(v6) => {
            let octets = v6.octets();
            let mut hi = [0u8; 8];
            let mut lo = [0u8; 8];
            hi.copy_from_slice(&octets[0..8]);
            lo.copy_from_slice(&octets[8..16]);
            u64::from_be_bytes(hi) ^ u64::from_be_bytes(lo)
        }
    }
}

/// A bloom filter over `u64` keys (e.g. an IP address encoded as a `u32`/`u128` folded to `u64`).
#[derive(Debug)]
pub struct BloomFilter {
    bits: Vec<AtomicU64>,
    bits_len: u64,
}

const K: u32 = 2;

impl BloomFilter {
    /// Build an empty filter with at least `bits` bits of storage.
    #[must_use]
    pub fn new(bits: usize) -> Self {
        let words = bits.div_ceil(64).max(1);
        Self {
            bits: (0..words).map(|_| AtomicU64::new(0)).collect(),
            bits_len: (words * 64) as u64,
        }
    }

    fn indices(&self, key: u64) -> [u64; K as usize] {
        let h1 = key.wrapping_mul(0x9E37_79B9_7F4A_7C15).rotate_left(31);
        let h2 = key
            .wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
            .rotate_left(17)
            .wrapping_add(1);
        [h1 % self.bits_len, h2 % self.bits_len]
    }

    /// Insert `key` into the filter.
    pub fn insert(&self, key: u64) {
        for idx in self.indices(key) {
            let word = (idx / 64) as usize;
            let bit = 1u64 << (idx % 64);
            self.bits[word].fetch_or(bit, Ordering::Relaxed);
        }
    }

    /// True if `key` may be a member (false positives possible, false negatives never).
    #[must_use]
    pub fn contains(&self, key: u64) -> bool {
        self.indices(key).into_iter().all(|idx| {
            let word = (idx / 64) as usize;
            let bit = 1u64 << (idx % 64);
            self.bits[word].load(Ordering::Relaxed) & bit != 0
        })
    }
}

#[cfg(test)]
mod test {
    use super::{BloomFilter, ip_addr_key};
    use std::net::IpAddr;

    #[test]
    fn inserted_key_is_reported_present() {
        let f = BloomFilter::new(1024);
        f.insert(42);
        assert!(f.contains(42));
    }

    #[test]
    fn absent_key_is_usually_reported_absent() {
        let f = BloomFilter::new(4096);
        for k in 0..16 {
            f.insert(k);
        }
        assert!(!f.contains(1_000_000));
    }

    #[test]
    fn ip_addr_key_is_stable_and_version_distinct() {
        let v4: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(ip_addr_key(v4), ip_addr_key(v4));
        assert_eq!(ip_addr_key(v4), 0x0A00_0001);

        let v6: IpAddr = "::1".parse().unwrap();
        assert_eq!(ip_addr_key(v6), 1);
    }
}
