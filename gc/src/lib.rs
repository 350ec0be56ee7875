// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The GC batch (C2): a per-CPU bounded queue of in-flight packets with a lazy forwarding log
//! (spec.md §4.1).
//!
//! Ground truth for the shape of this module: `original_source/kernel/pf_q-percpu.c` builds one
//! of these per online CPU at startup, pre-sized to the `capt_batch_len` tunable, and never grows
//! it; admission past capacity accounts the frame as lost and frees it rather than blocking or
//! reallocating. [`PerCpuBatch`] keeps that shape: a fixed-capacity `ArrayVec` of packets plus a
//! running lost counter, with [`PerCpuBatch::get_lazy_endpoints`] walking every packet's
//! [`net::packet::ForwardingLog`] to build the batch-wide union the engine (C7) flushes
//! bulk forwards against once per batch.

#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

use arrayvec::ArrayVec;
use net::buffer::PacketBufferMut;
use net::packet::Packet;
use net::packet::ForwardTarget;
use tracectl::trace_target;
use tracing::LevelFilter;

trace_target!("gc", LevelFilter::INFO, &["gc"]);

/// Hard upper bound on a batch's capacity, matching spec.md §6's `capt_batch_len ∈ [1, 64]`.
///
/// [`PerCpuBatch::new`] enforces this at construction; it exists so the batch can be backed by a
/// fixed-size `ArrayVec` rather than a heap-allocated, potentially-growing `Vec`.
pub const MAX_BATCH_LEN: usize = 64;

/// A handle to a packet admitted into a [`PerCpuBatch`].
///
/// Carries the batch's generation at admission time alongside the slot index, so a handle from a
/// batch that has since been [`PerCpuBatch::reset`] is recognizably stale rather than silently
/// resolving to whatever packet now occupies that slot.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BatchHandle {
    generation: u32,
    index: u32,
}

/// The union of every forwarding target recorded across a batch's packets, plus whether any
/// packet in the batch asked for host-stack delivery.
///
/// This is the batch-wide *aggregate* spec.md §4.1 names: deduplicated per target so the engine
/// can prepare each distinct `(ifindex, queue)` destination once per flush, while the
/// per-descriptor [`net::packet::ForwardingLog`]s a caller walks during the flush itself
/// still carry whatever multiplicity each packet actually needs.
#[derive(Debug, Default, Clone)]
pub struct EndpointAggregate {
    targets: Vec<ForwardTarget>,
    any_to_kernel: bool,
}

impl EndpointAggregate {
    /// Every distinct forwarding target touched by this batch, in first-seen order.
    #[must_use]
    pub fn targets(&self) -> &[ForwardTarget] {
        &self.targets
    }

    /// Whether at least one packet in the batch asked for host-stack delivery.
    #[must_use]
    pub fn any_to_kernel(&self) -> bool {
        self.any_to_kernel
    }

    fn record(&mut self, target: ForwardTarget) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }
}

/// A per-CPU bounded batch of in-flight packets (spec.md §4.1, C2).
///
/// One instance is built per online CPU at startup, sized to the configured `capt_batch_len`
/// (ground truth: `pf_q-percpu.c`'s per-CPU bring-up), and reused batch over batch via
/// [`PerCpuBatch::reset`] rather than reallocated.
pub struct PerCpuBatch<Buf: PacketBufferMut> {
    capacity: usize,
    generation: u32,
    frames: ArrayVec<Packet<Buf>, MAX_BATCH_LEN>,
    lost: u64,
}

impl<Buf: PacketBufferMut> PerCpuBatch<Buf> {
    /// Build a batch holding up to `capacity` packets.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is `0` or exceeds [`MAX_BATCH_LEN`]; both are configuration errors the
    /// caller (`engine`, reading `capt_batch_len`) must validate before bring-up, mirroring
    /// `config`'s tunable-range checks elsewhere in this workspace.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "GC batch capacity must be at least 1");
        assert!(
            capacity <= MAX_BATCH_LEN,
            "GC batch capacity {capacity} exceeds MAX_BATCH_LEN ({MAX_BATCH_LEN})"
        );
        Self {
            capacity,
            generation: 0,
            frames: ArrayVec::new(),
            lost: 0,
        }
    }

    /// Admit `frame` into the batch.
    ///
    /// Returns the [`BatchHandle`] the caller can use to look the packet back up later, or `None`
    /// if the batch is already at capacity. On failure the frame is dropped here — spec.md §4.1's
    /// "accounted lost and freed to the OS" — and [`PerCpuBatch::lost`] is incremented.
    pub fn make_buff(&mut self, frame: Packet<Buf>) -> Option<BatchHandle> {
        if self.frames.len() >= self.capacity {
            self.lost += 1;
            tracing::trace!(lost = self.lost, "GC batch full, dropping frame");
            return None;
        }
        let index = self.frames.len();
        self.frames.push(frame);
        Some(BatchHandle {
            generation: self.generation,
            index: u32::try_from(index).expect("index bounded by MAX_BATCH_LEN"),
        })
    }

    /// Current occupancy.
    #[must_use]
    pub fn size(&self) -> usize {
        self.frames.len()
    }

    /// The capacity this batch was built with.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames dropped on admission failure since the last [`PerCpuBatch::reset`].
    #[must_use]
    pub fn lost(&self) -> u64 {
        self.lost
    }

    /// Look up a packet by handle, rejecting handles from a since-reset generation.
    #[must_use]
    pub fn get(&self, handle: BatchHandle) -> Option<&Packet<Buf>> {
        if handle.generation != self.generation {
            return None;
        }
        self.frames.get(handle.index as usize)
    }

    /// Mutable lookup, for the engine to run a program against the packet in place.
    #[must_use]
    pub fn get_mut(&mut self, handle: BatchHandle) -> Option<&mut Packet<Buf>> {
        if handle.generation != self.generation {
            return None;
        }
        self.frames.get_mut(handle.index as usize)
    }

    /// Every packet currently admitted, in admission order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Packet<Buf>> + '_ {
        self.frames.iter_mut()
    }

    /// Empty the batch, invalidating every handle issued since the last reset and clearing the
    /// per-descriptor forwarding logs carried by the packets being evicted.
    ///
    /// The lost counter is a running total across the batch's whole lifetime and is not reset
    /// here; it is read and folded into the global `lost` stat by the engine, not by the batch.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// The union of every forwarding target recorded across the batch's packets (spec.md §4.1).
    #[must_use]
    pub fn get_lazy_endpoints(&self) -> EndpointAggregate {
        let mut aggregate = EndpointAggregate::default();
        for frame in &self.frames {
            let log = &frame.get_meta().fwd_log;
            for target in log.targets() {
                aggregate.record(*target);
            }
            if log.to_kernel() {
                aggregate.any_to_kernel = true;
            }
        }
        aggregate
    }
}

#[cfg(test)]
mod test {
    use super::{MAX_BATCH_LEN, PerCpuBatch};
    use net::buffer::TestBuffer;
    use net::packet::{ForwardTarget, HwQueue, InterfaceId};
    use net::packet::test_utils::build_test_udp_ipv4_packet;

    fn packet() -> net::packet::Packet<TestBuffer> {
        build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 1, 2)
    }

    #[test]
    fn admits_up_to_capacity_then_counts_lost() {
        let mut batch: PerCpuBatch<TestBuffer> = PerCpuBatch::new(2);
        assert!(batch.make_buff(packet()).is_some());
        assert!(batch.make_buff(packet()).is_some());
        assert_eq!(batch.size(), 2);
        assert!(batch.make_buff(packet()).is_none());
        assert_eq!(batch.lost(), 1);
    }

    #[test]
    fn reset_invalidates_prior_handles() {
        let mut batch: PerCpuBatch<TestBuffer> = PerCpuBatch::new(4);
        let handle = batch.make_buff(packet()).expect("room in batch");
        assert!(batch.get(handle).is_some());
        batch.reset();
        assert_eq!(batch.size(), 0);
        assert!(batch.get(handle).is_none());
    }

    #[test]
    fn lazy_endpoints_deduplicate_targets_across_the_batch() {
        let mut batch: PerCpuBatch<TestBuffer> = PerCpuBatch::new(4);
        let target = ForwardTarget {
            ifindex: InterfaceId::new(7),
            queue: HwQueue::new(0),
        };

        let mut first = packet();
        first.get_meta_mut().fwd_log.push(target);
        let mut second = packet();
        second.get_meta_mut().fwd_log.push(target);
        second.get_meta_mut().fwd_log.mark_to_kernel();

        batch.make_buff(first);
        batch.make_buff(second);

        let aggregate = batch.get_lazy_endpoints();
        assert_eq!(aggregate.targets(), &[target]);
        assert!(aggregate.any_to_kernel());
    }

    #[test]
    #[should_panic(expected = "at least 1")]
    fn zero_capacity_is_rejected() {
        let _: PerCpuBatch<TestBuffer> = PerCpuBatch::new(0);
    }

    #[test]
    #[should_panic(expected = "exceeds MAX_BATCH_LEN")]
    fn over_max_capacity_is_rejected() {
        let _: PerCpuBatch<TestBuffer> = PerCpuBatch::new(MAX_BATCH_LEN + 1);
    }
}
