// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The NIC-facing side a worker hands coalesced batches to.

use shmem_queue::TxSlot;

/// Where a worker submits a coalesced Tx batch (spec.md §4.7: "drains them to designated NIC
/// device/queue pairs").
///
/// This crate does not itself speak to a NIC; `dpdk`/the kernel driver implement [`TxSink`] and
/// are handed to a [`crate::TxWorkerPool`] at construction.
pub trait TxSink: Send + Sync + 'static {
    /// Submit `slots` to `(ifindex, qindex)`. Returns the number actually transmitted; a
    /// shortfall is the caller's `disc` count (spec.md §4.5 step 4).
    fn transmit(&self, ifindex: u32, qindex: u8, slots: &[TxSlot]) -> usize;
}
