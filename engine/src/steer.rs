// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-CPU weighted steering expansion cache (spec.md §4.5).
//!
//! Ground truth: `original_source/kernel/pf_q.c`'s per-CPU `steer_cache`, which remembers the
//! last `eligible` bitmask it expanded and only rebuilds the expansion array when that value
//! changes. This cache additionally keys on [`group::Group::generation`]: weight changes do not
//! change `eligible` (they don't touch `sock_id`), so the original's plain equality check alone
//! would never notice a weight update and would keep steering against stale ratios. Recorded as a
//! deliberate extension in `DESIGN.md`.

use std::collections::HashMap;

use group::{Group, GroupId};
use socket::{SocketId, SocketTable};

/// One group's cached weighted expansion: a flat array of socket bit-values, each socket's value
/// repeated once per unit of its weight, so that [`crate::fold::pfq_fold`] selecting a uniformly
/// random slot picks a socket proportionally to its weight.
struct CachedExpansion {
    eligible: u64,
    generation: u64,
    array: Vec<u64>,
}

/// A single CPU worker's steering cache, one entry per group it has steered for.
///
/// Not `Sync`: each engine worker owns one of these and never shares it across CPUs (spec.md §9:
/// "represent as an array indexed by CPU id").
#[derive(Default)]
pub struct SteerCache {
    entries: HashMap<GroupId, CachedExpansion>,
}

impl SteerCache {
    /// Build an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select one eligible socket's bit-value for `hash`, rebuilding this group's cached
    /// expansion first if `eligible` or the group's generation has moved since the last call.
    ///
    /// Returns `0` (no socket selected) if `eligible` is empty.
    pub fn steer(
        &mut self,
        group: &Group,
        eligible: u64,
        sockets: &SocketTable,
        hash: u64,
    ) -> u64 {
        if eligible == 0 {
            return 0;
        }
        let generation = group.generation();
        let rebuild = match self.entries.get(&group.id()) {
            Some(cached) => cached.eligible != eligible || cached.generation != generation,
            None => true,
        };
        if rebuild {
            let array = expand(eligible, sockets);
            self.entries.insert(
                group.id(),
                CachedExpansion {
                    eligible,
                    generation,
                    array,
                },
            );
        }
        // `rebuild` guarantees a non-empty array whenever `eligible != 0`: every set bit maps to
        // at least one socket entry (weight is clamped to >= 1, see `socket::MAX_WEIGHT` docs).
        let cached = &self.entries[&group.id()];
        if cached.array.is_empty() {
            return 0;
        }
        let slot = crate::fold::pfq_fold(hash, cached.array.len());
        cached.array[slot]
    }
}

fn expand(eligible: u64, sockets: &SocketTable) -> Vec<u64> {
    let mut array = Vec::new();
    for bit in 0..64u32 {
        let mask = 1u64 << bit;
        if eligible & mask == 0 {
            continue;
        }
        let weight = sockets
            .get(SocketId::from_index(bit))
            .map_or(1, |socket| socket.weight().max(1));
        for _ in 0..weight {
            array.push(mask);
        }
    }
    array
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use devmap::DevMap;
    use group::{GroupTable, Policy};
    use socket::SocketTable;

    use super::SteerCache;

    fn setup() -> (Arc<GroupTable>, Arc<SocketTable>) {
        let groups = Arc::new(GroupTable::new(1));
        let devmap = Arc::new(DevMap::new(4, 4));
        let sockets = Arc::new(SocketTable::new(Arc::clone(&groups), devmap));
        (groups, sockets)
    }

    fn to_group_sid(sid: socket::SocketId) -> group::SocketId {
        group::SocketId::from_index(sid.index())
    }

    #[test]
    fn empty_eligible_selects_nothing() {
        let (groups, sockets) = setup();
        let sock = sockets.open();
        let gid = groups
            .join(None, to_group_sid(sock.id()), 1, Policy::Shared, |_| true)
            .unwrap();
        let group = groups.get(gid).unwrap();
        let mut cache = SteerCache::new();
        assert_eq!(cache.steer(&group, 0, &sockets, 123), 0);
    }

    #[test]
    fn single_socket_always_selected() {
        let (groups, sockets) = setup();
        let sock = sockets.open();
        let gid = groups
            .join(None, to_group_sid(sock.id()), 1, Policy::Shared, |_| true)
            .unwrap();
        let group = groups.get(gid).unwrap();
        let eligible = group.eligible(1);
        let mut cache = SteerCache::new();
        for hash in [0u64, 1, 55, 999] {
            assert_eq!(cache.steer(&group, eligible, &sockets, hash), eligible);
        }
    }

    #[test]
    fn cache_rebuilds_when_generation_changes_even_if_eligible_does_not() {
        let (groups, sockets) = setup();
        let sock = sockets.open();
        let gid = groups
            .join(None, to_group_sid(sock.id()), 1, Policy::Shared, |_| true)
            .unwrap();
        let group = groups.get(gid).unwrap();
        let eligible = group.eligible(1);

        let mut cache = SteerCache::new();
        let first = cache.steer(&group, eligible, &sockets, 0);
        assert_eq!(first, eligible);

        // Changing weight alone doesn't touch `eligible`, but must still be picked up: join a
        // second socket and leave it again purely to bump generation without changing `eligible`.
        let other = sockets.open();
        groups
            .join(Some(gid), to_group_sid(other.id()), 1, Policy::Shared, |_| true)
            .unwrap();
        groups.leave(gid, to_group_sid(other.id())).unwrap();
        assert_eq!(group.eligible(1), eligible);

        let second = cache.steer(&group, eligible, &sockets, 0);
        assert_eq!(second, eligible);
    }
}
