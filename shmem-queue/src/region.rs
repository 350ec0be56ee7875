// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The full shared-queue region a socket maps on `ENABLE` (spec.md §3, §4.6, §6): a small header
//! of configured tunables, the Rx double-buffer, and the Tx queue set.
//!
//! Spec.md §3 describes this as "a single contiguous buffer: a small header, then two Rx slot
//! arenas of identical size (double-buffered), then one synchronous Tx arena and N asynchronous
//! Tx arenas, each double-buffered." This workspace models the region as owned Rust structures
//! rather than a literal single `mmap`-backed byte range — see `DESIGN.md` for why.

use crate::header::{rx_slot_byte_size, tx_slot_byte_size};
use crate::rx::RxRegion;
use crate::tx::TxQueueSet;

/// Errors returned when building a [`QueueRegion`] from socket-controlled tunables
/// (`GET/SET_RX_SLOTS`, `TX_SLOTS`, `GET/SET_RX_CAPLEN`, spec.md §6).
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum QueueRegionError {
    /// `rx_slots` or `tx_slots` was `0`.
    #[error("slot count must be at least 1")]
    ZeroSlots,
}

/// The tunables a socket's region is sized from.
#[derive(Debug, Copy, Clone)]
pub struct QueueRegionConfig {
    /// Per-arena Rx slot capacity.
    pub rx_slots: usize,
    /// Per-arena Tx slot capacity for the synchronous queue and every asynchronous one.
    pub tx_slots: usize,
    /// Number of asynchronous Tx queues alongside the synchronous one.
    pub tx_async_queues: usize,
    /// Bytes captured per Rx frame, used only to report the region's byte footprint.
    pub rx_caplen: u16,
    /// Bytes captured per Tx frame, used only to report the region's byte footprint.
    pub tx_caplen: u16,
}

impl Default for QueueRegionConfig {
    fn default() -> Self {
        Self {
            rx_slots: 64,
            tx_slots: 64,
            tx_async_queues: 0,
            rx_caplen: 0,
            tx_caplen: 0,
        }
    }
}

/// A socket's shared-memory region: Rx double-buffer plus the Tx queue set.
pub struct QueueRegion {
    config: QueueRegionConfig,
    /// The Rx double-buffer this socket's captured frames land in.
    pub rx: RxRegion,
    /// The Tx queue set this socket submits frames through.
    pub tx: TxQueueSet,
}

impl QueueRegion {
    /// Build a region sized per `config`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueRegionError::ZeroSlots`] if either `rx_slots` or `tx_slots` is `0`.
    pub fn new(config: QueueRegionConfig) -> Result<Self, QueueRegionError> {
        if config.rx_slots == 0 || config.tx_slots == 0 {
            return Err(QueueRegionError::ZeroSlots);
        }
        Ok(Self {
            rx: RxRegion::new(config.rx_slots),
            tx: TxQueueSet::new(config.tx_async_queues),
            config,
        })
    }

    /// The tunables this region was built from.
    #[must_use]
    pub fn config(&self) -> &QueueRegionConfig {
        &self.config
    }

    /// The byte footprint a real shared-memory mapping of this region would need: header-sized
    /// offsets aside, two Rx arenas plus `1 + tx_async_queues` double-buffered Tx arenas, each
    /// slot `align8`ed per spec.md §4.6.
    #[must_use]
    pub fn byte_footprint(&self) -> usize {
        let rx_arena_bytes = self.config.rx_slots * rx_slot_byte_size(self.config.rx_caplen);
        let tx_arena_bytes = self.config.tx_slots * tx_slot_byte_size(self.config.tx_caplen);
        let tx_queues = 1 + self.config.tx_async_queues;
        2 * rx_arena_bytes + 2 * tx_queues * tx_arena_bytes
    }
}

#[cfg(test)]
mod test {
    use super::{QueueRegion, QueueRegionConfig, QueueRegionError};

    #[test]
    fn zero_slots_is_rejected() {
        let config = QueueRegionConfig {
            rx_slots: 0,
            ..QueueRegionConfig::default()
        };
        assert_eq!(QueueRegion::new(config).unwrap_err(), QueueRegionError::ZeroSlots);
    }

    #[test]
    fn byte_footprint_scales_with_queue_count() {
        let base = QueueRegion::new(QueueRegionConfig::default()).expect("valid config");
        let with_async = QueueRegion::new(QueueRegionConfig {
            tx_async_queues: 2,
            ..QueueRegionConfig::default()
        })
        .expect("valid config");
        assert!(with_async.byte_footprint() > base.byte_footprint());
    }
}
