// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The device→group map (C3): a fixed `(ifindex, hw-queue) → bitmask-of-groups` table.
//!
//! Reads are per-packet and lock-free: a single relaxed atomic load per `(ifindex, queue)` probe.
//! Writes are rare control-plane operations and are serialized behind one mutex across the whole
//! table, mirroring `pf_q-devmap.c`'s single `devmap_lock`.

#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

use concurrency::sync::Mutex;
use concurrency::sync::atomic::{AtomicU64, Ordering};
use tracectl::trace_target;
use tracing::LevelFilter;

trace_target!("devmap", LevelFilter::INFO, &["devmap"]);

/// Error returned when a `(ifindex, queue)` or `gid` argument is out of range for this map.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum DevMapError {
    /// The supplied interface index exceeds the table's configured bound.
    #[error("ifindex {0} out of range")]
    IfIndexOutOfRange(u32),
    /// The supplied hardware queue index exceeds the table's configured bound.
    #[error("hw queue {0} out of range")]
    QueueOutOfRange(u8),
    /// The supplied group id exceeds 63, the widest bit a `u64` bitmask can carry.
    #[error("gid {0} out of range (max 63)")]
    GidOutOfRange(u32),
}

/// Either a single `(ifindex, queue)` cell or every queue of a given interface.
///
/// Mirrors the original's "any queue" wildcard accepted by `pfq_devmap_update`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum QueueSelector {
    /// A single hardware queue.
    Queue(u8),
    /// Every hardware queue of the interface.
    Any,
}

/// Whether an `update` call should set or clear the group's bit.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DevMapAction {
    /// Set the group's bit in every matching cell.
    Set,
    /// Clear the group's bit from every matching cell.
    Reset,
}

/// The device→group map.
///
/// `M[ifindex][queue]` is a `u64` bitmap of interested group ids; `mon[ifindex]` is the logical OR
/// of that device's whole row, letting the hot path ask "is any group interested in this device at
/// all?" with a single extra atomic load before touching the per-queue cell.
pub struct DevMap {
    rows: Vec<Vec<AtomicU64>>,
    monitor: Vec<AtomicU64>,
    write_lock: Mutex<()>,
}

impl DevMap {
    /// Build a map sized for `max_if` interfaces and `max_hwq` hardware queues per interface.
    #[must_use]
    pub fn new(max_if: usize, max_hwq: usize) -> Self {
        let rows = (0..max_if)
            .map(|_| (0..max_hwq).map(|_| AtomicU64::new(0)).collect())
            .collect();
        let monitor = (0..max_if).map(|_| AtomicU64::new(0)).collect();
        Self {
            rows,
            monitor,
            write_lock: Mutex::new(()),
        }
    }

    /// Hot-path probe: read the group bitmask for `(ifindex, queue)` with a single relaxed load.
    ///
    /// Returns `0` for an out-of-range `ifindex`/`queue` rather than erroring — the data path must
    /// never fail, per spec.md §5 ("the hot path never blocks... never calls user code").
    #[must_use]
    pub fn get_groups(&self, ifindex: u32, queue: u8) -> u64 {
        let Some(row) = self.rows.get(ifindex as usize) else {
            return 0;
        };
        let Some(cell) = row.get(queue as usize) else {
            return 0;
        };
        cell.load(Ordering::Relaxed)
    }

    /// Hot-path gate: is any group interested in any queue of `ifindex`?
    #[must_use]
    pub fn monitor(&self, ifindex: u32) -> bool {
        self.monitor
            .get(ifindex as usize)
            .is_some_and(|m| m.load(Ordering::Relaxed) != 0)
    }

    /// Set or clear `gid`'s bit across every `(ifindex, queue)` cell matched by the selector.
    ///
    /// Returns the number of cells actually modified. Serialized by a single mutex across all
    /// writers (ground truth: `pfq_devmap_update`'s `devmap_lock`).
    ///
    /// # Errors
    ///
    /// Returns an error if `ifindex`, `queue`, or `gid` is out of range for this map.
    pub fn update(
        &self,
        action: DevMapAction,
        ifindex: u32,
        queue: QueueSelector,
        gid: u32,
    ) -> Result<usize, DevMapError> {
        if gid >= 64 {
            return Err(DevMapError::GidOutOfRange(gid));
        }
        let row = self
            .rows
            .get(ifindex as usize)
            .ok_or(DevMapError::IfIndexOutOfRange(ifindex))?;
        if let QueueSelector::Queue(q) = queue {
            if row.get(q as usize).is_none() {
                return Err(DevMapError::QueueOutOfRange(q));
            }
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let bit = 1u64 << gid;
        let mut modified = 0usize;
        for cell in Self::selected_cells(row, queue) {
            let prev = match action {
                DevMapAction::Set => cell.fetch_or(bit, Ordering::Relaxed),
                DevMapAction::Reset => cell.fetch_and(!bit, Ordering::Relaxed),
            };
            let changed = match action {
                DevMapAction::Set => prev & bit == 0,
                DevMapAction::Reset => prev & bit != 0,
            };
            if changed {
                modified += 1;
            }
        }
        if modified > 0 {
            self.recompute_monitor(ifindex as usize, row);
        }
        tracing::debug!(?action, ifindex, ?queue, gid, modified, "devmap updated");
        Ok(modified)
    }

    fn selected_cells(row: &[AtomicU64], queue: QueueSelector) -> &[AtomicU64] {
        match queue {
            QueueSelector::Any => row,
            QueueSelector::Queue(q) => core::slice::from_ref(&row[q as usize]),
        }
    }

    fn recompute_monitor(&self, ifindex: usize, row: &[AtomicU64]) {
        let any = row.iter().any(|c| c.load(Ordering::Relaxed) != 0);
        self.monitor[ifindex].store(u64::from(any), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod test {
    use super::{DevMap, DevMapAction, QueueSelector};

    #[test]
    fn update_set_then_get_reflects_bit() {
        let map = DevMap::new(4, 4);
        assert_eq!(map.get_groups(0, 0), 0);
        assert!(!map.monitor(0));
        let n = map
            .update(DevMapAction::Set, 0, QueueSelector::Queue(0), 3)
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(map.get_groups(0, 0), 0b1000);
        assert!(map.monitor(0));
    }

    #[test]
    fn update_any_queue_touches_whole_row() {
        let map = DevMap::new(2, 3);
        let n = map
            .update(DevMapAction::Set, 1, QueueSelector::Any, 0)
            .unwrap();
        assert_eq!(n, 3);
        for q in 0..3 {
            assert_eq!(map.get_groups(1, q), 1);
        }
    }

    #[test]
    fn reset_clears_bit_and_monitor_goes_false_when_row_empty() {
        let map = DevMap::new(1, 1);
        map.update(DevMapAction::Set, 0, QueueSelector::Queue(0), 5)
            .unwrap();
        assert!(map.monitor(0));
        let n = map
            .update(DevMapAction::Reset, 0, QueueSelector::Queue(0), 5)
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(map.get_groups(0, 0), 0);
        assert!(!map.monitor(0));
    }

    #[test]
    fn out_of_range_reads_return_zero_but_writes_error() {
        let map = DevMap::new(1, 1);
        assert_eq!(map.get_groups(99, 0), 0);
        assert!(!map.monitor(99));
        assert!(
            map.update(DevMapAction::Set, 99, QueueSelector::Queue(0), 0)
                .is_err()
        );
    }

    #[test]
    fn gid_out_of_range_rejected() {
        let map = DevMap::new(1, 1);
        assert!(
            map.update(DevMapAction::Set, 0, QueueSelector::Queue(0), 64)
                .is_err()
        );
    }

    #[test]
    fn idempotent_set_does_not_double_count_modified() {
        let map = DevMap::new(1, 1);
        map.update(DevMapAction::Set, 0, QueueSelector::Queue(0), 1)
            .unwrap();
        let n = map
            .update(DevMapAction::Set, 0, QueueSelector::Queue(0), 1)
            .unwrap();
        assert_eq!(n, 0, "re-setting an already-set bit should modify nothing");
    }
}
