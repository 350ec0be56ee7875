// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The per-CPU batched Rx engine loop (C7, spec.md §4.5): classify, filter, evaluate, fan out,
//! forward, recycle.
//!
//! Ground truth: `original_source/kernel/pf_q.c`'s `pfq_receive_batch`, one call per per-CPU
//! batch once it fills or a timer fires (the timer/bring-up plumbing itself is the `dataplane`
//! binary's concern, spec.md §1's "per-CPU bootstrap/teardown" non-goal; this crate only owns the
//! five-step loop body).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use devmap::DevMap;
use gc::PerCpuBatch;
use group::{GroupId, GroupStats, GroupTable};
use net::buffer::PacketBufferMut;
use net::packet::{DoneReason, HwQueue, InterfaceId};
use shmem_queue::{RxSlot, RxSlotHeader};
use socket::{SocketId, SocketStats, SocketTable};
use tracectl::trace_target;
use tracing::LevelFilter;

use crate::fold::finalize_hash;
use crate::steer::SteerCache;

trace_target!("pfq-engine", LevelFilter::INFO, &["engine"]);

/// Bulk-forward collaborator: hands this CPU's batch-accumulated per-device forwarding list to
/// whatever sends frames out a NIC queue (spec.md §4.5 step 4, §9 "use an existing... the core
/// treats it as a black box"). Mirrors [`tx_workers::TxSink`]'s shape on the Tx side of this
/// workspace; this is the Rx-side equivalent for lazily-recorded `forward`/`bridge`/`tee`/`tap`
/// actions.
pub trait ForwardSink: Send + Sync {
    /// Send `frames` (in order) out `(ifindex, queue)`. Returns the number actually sent; a
    /// shortfall is accounted as a discard by the caller.
    fn forward(&self, ifindex: InterfaceId, queue: HwQueue, frames: &[&[u8]]) -> usize;
}

/// Host-stack injection collaborator (spec.md §4.5 step 5): hands a directly-captured frame whose
/// program asked for kernel delivery back to the networking stack the engine bypassed on ingress.
pub trait HostStackSink: Send + Sync {
    /// Push one frame onto the host network stack.
    fn inject(&self, frame: &[u8]);
}

/// Per-batch counters the caller folds into whatever global stats it exposes (spec.md §4.5 step
/// 1: `global.recv += |batch|`). Not owned by any crate in this workspace's existing stats
/// structs, since it is the one count that belongs to neither a specific group nor a specific
/// socket (see `DESIGN.md`).
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchStats {
    /// Frames admitted into this batch.
    pub recv: u64,
    /// Frames the GC batch itself rejected on admission (read from [`PerCpuBatch::lost`]).
    pub lost: u64,
    /// Bulk-forward shortfall: frames a [`ForwardSink`] failed to send, summed across every
    /// target this batch flushed.
    pub forward_disc: u64,
}

struct PreparedFrame {
    bytes: Vec<u8>,
    iif: InterfaceId,
    hw_queue: HwQueue,
    mark: u32,
}

struct Delivery {
    gid: GroupId,
    mark: u32,
    state: u32,
    vlan_tci: u16,
    frwd: u64,
    kern: u64,
}

/// One CPU worker's engine state: its GC batch, its steering expansion cache, and the shared
/// tables every CPU worker reads (spec.md §9: "do not share mutable state across CPUs").
pub struct Engine<Buf: PacketBufferMut + Sync + 'static> {
    cpu: usize,
    batch: PerCpuBatch<Buf>,
    steer: SteerCache,
    devmap: Arc<DevMap>,
    groups: Arc<GroupTable>,
    sockets: Arc<SocketTable>,
    publish_index: HashMap<SocketId, u32>,
}

impl<Buf: PacketBufferMut + Sync + 'static> Engine<Buf> {
    /// Build a worker bound to CPU `cpu`, owning a batch of `capacity` slots over the given
    /// shared tables.
    #[must_use]
    pub fn new(cpu: usize, capacity: usize, devmap: Arc<DevMap>, groups: Arc<GroupTable>, sockets: Arc<SocketTable>) -> Self {
        Self {
            cpu,
            batch: PerCpuBatch::new(capacity),
            steer: SteerCache::new(),
            devmap,
            groups,
            sockets,
            publish_index: HashMap::new(),
        }
    }

    /// Admit a captured frame into this worker's batch.
    ///
    /// Returns `false` if the batch is already full (spec.md §4.1: the frame is accounted lost
    /// and freed here by dropping it, after marking it done so its `Drop` impl stays quiet).
    pub fn admit(&mut self, mut frame: net::packet::Packet<Buf>) -> bool {
        if self.batch.size() >= self.batch.capacity() {
            frame.done(DoneReason::InternalFailure);
            return false;
        }
        self.batch.make_buff(frame).is_some()
    }

    /// Current batch occupancy.
    #[must_use]
    pub fn batch_len(&self) -> usize {
        self.batch.size()
    }

    /// Run the five-step engine loop (spec.md §4.5) over the current batch, then reset it.
    ///
    /// `forward` drains the batch's lazily-recorded forwarding targets (step 4); `host` receives
    /// directly-captured frames whose program asked for kernel delivery (step 5).
    pub fn run_batch(&mut self, forward: &dyn ForwardSink, host: &dyn HostStackSink) -> BatchStats {
        let mut stats = BatchStats {
            recv: self.batch.size() as u64,
            lost: self.batch.lost(),
            forward_disc: 0,
        };

        // Step 1: classify every packet's interested-group mask and the batch-wide union.
        let mut batch_group_mask = 0u64;
        for pkt in self.batch.iter_mut() {
            let iif = pkt.get_meta().iif;
            let hw_queue = pkt.get_meta().hw_queue;
            let mask = self.devmap.get_groups(iif.get_id(), hw_queue.get());
            pkt.get_meta_mut().group_mask = mask;
            batch_group_mask |= mask;
        }

        // Step 2: per-group pass, low-order group bit first. Each dispatch decision is recorded
        // immediately against the packet it came from, deduplicated per (packet, socket) so a
        // packet selected into the same socket by two different groups is only copied once
        // (mirrors `sock_queue[sid]`'s bit-per-packet semantics: setting a bit twice is a no-op).
        let mut deliveries: HashMap<(u32, usize), Delivery> = HashMap::new();
        for bit in 0..64u32 {
            if batch_group_mask & (1 << bit) == 0 {
                continue;
            }
            let gid = GroupId::from_index(bit);
            let Some(group) = self.groups.get(gid) else {
                continue;
            };

            for (index, pkt) in self.batch.iter_mut().enumerate() {
                if pkt.get_meta().group_mask & (1 << bit) == 0 {
                    continue;
                }

                let mut delta = GroupStats { recv: 1, ..GroupStats::default() };

                // Classic-BPF filtering is delegated to an external interpreter this workspace
                // does not vendor (spec.md §9 non-goal); a group with a filter installed is
                // accepted unconditionally here rather than evaluated.
                let _ = group.filter();

                if group.vlan_filters_enabled() {
                    let allowed = pkt
                        .get_headers()
                        .vlan
                        .first()
                        .is_some_and(|v| group.vlan_allows(u16::from(v.vid())));
                    if !allowed {
                        delta.drop = 1;
                        group.record_stats(self.cpu, &delta);
                        continue;
                    }
                }

                pkt.get_meta_mut().reset_fanout();

                if let Some(program) = group.program() {
                    let before_targets = pkt.get_meta().fwd_log.num_targets();
                    let before_kernel = pkt.get_meta().fwd_log.to_kernel();
                    if let Some(compiled) = program
                        .as_any()
                        .downcast_ref::<pfq_lang::CompiledProgram<Buf>>()
                    {
                        compiled.eval(pkt);
                    }
                    let after_targets = pkt.get_meta().fwd_log.num_targets();
                    let after_kernel = pkt.get_meta().fwd_log.to_kernel();
                    delta.frwd = (after_targets - before_targets) as u64;
                    delta.kern = u64::from(after_kernel && !before_kernel);

                    if pkt.get_meta().fanout.action.is_drop() {
                        delta.drop = 1;
                        group.record_stats(self.cpu, &delta);
                        continue;
                    }
                }
                group.record_stats(self.cpu, &delta);

                let fanout = pkt.get_meta().fanout;
                let eligible = group.eligible(fanout.class_mask);
                let sock_mask = if fanout.action.is_steering() {
                    self.steer.steer(&group, eligible, &self.sockets, finalize_hash(fanout.hash))
                } else {
                    eligible
                };
                if sock_mask == 0 {
                    continue;
                }

                let vlan_tci = pkt
                    .get_headers()
                    .vlan
                    .first()
                    .map_or(0, |v| u16::from(v.vid()));
                for sid_bit in 0..64u32 {
                    if sock_mask & (1 << sid_bit) == 0 {
                        continue;
                    }
                    // Dedup the RX delivery itself (one copy per packet per socket), but fold
                    // every matching group's frwd/kern into the running delivery instead of
                    // dropping a later group's contribution: a socket's stats must still reflect
                    // every group whose program actually forwarded/injected this packet, even
                    // though the packet itself is only copied to the socket once.
                    deliveries
                        .entry((sid_bit, index))
                        .and_modify(|d| {
                            d.frwd += delta.frwd;
                            d.kern += delta.kern;
                        })
                        .or_insert(Delivery {
                            gid,
                            mark: pkt.get_meta().mark,
                            state: pkt.get_meta().state,
                            vlan_tci,
                            frwd: delta.frwd,
                            kern: delta.kern,
                        });
                }
            }
        }

        // Snapshot raw bytes once, keyed by batch position, for steps 3-5.
        let prepared: Vec<PreparedFrame> = self
            .batch
            .iter_mut()
            .map(|pkt| PreparedFrame {
                bytes: pkt.get_buf().as_ref().map(|b| b.as_ref().to_vec()).unwrap_or_default(),
                iif: pkt.get_meta().iif,
                hw_queue: pkt.get_meta().hw_queue,
                mark: pkt.get_meta().mark,
            })
            .collect();

        // Step 3: per-socket copy.
        let mut by_socket: HashMap<u32, Vec<(usize, &Delivery)>> = HashMap::new();
        for ((sid_bit, index), delivery) in &deliveries {
            by_socket.entry(*sid_bit).or_default().push((*index, delivery));
        }
        for (sid_bit, mut entries) in by_socket {
            entries.sort_by_key(|(index, _)| *index);
            let sid = SocketId::from_index(sid_bit);
            let Some(socket) = self.sockets.get(sid) else {
                continue;
            };
            let caplen_cfg = socket.rx_caplen();
            let slots: Vec<RxSlot> = entries
                .iter()
                .map(|(index, delivery)| {
                    let frame = &prepared[*index];
                    let full_len = frame.bytes.len();
                    let caplen = if caplen_cfg == 0 { full_len } else { full_len.min(caplen_cfg) };
                    let (tstamp_sec, tstamp_nsec) = if socket.rx_tstamp() {
                        wall_clock()
                    } else {
                        (0, 0)
                    };
                    RxSlot {
                        header: RxSlotHeader {
                            tstamp_sec,
                            tstamp_nsec,
                            caplen: u16::try_from(caplen).unwrap_or(u16::MAX),
                            len: u16::try_from(full_len).unwrap_or(u16::MAX),
                            ifindex: i32::try_from(frame.iif.get_id()).unwrap_or(i32::MAX),
                            gid: i32::try_from(delivery.gid.index()).unwrap_or(-1),
                            mark: delivery.mark,
                            state: delivery.state,
                            vlan_tci: delivery.vlan_tci,
                            queue: frame.hw_queue.get(),
                            commit: 0,
                        },
                        payload: frame.bytes[..caplen].to_vec(),
                    }
                })
                .collect();

            let recv = entries.len() as u64;
            let frwd: u64 = entries.iter().map(|(_, delivery)| delivery.frwd).sum();
            let kern: u64 = entries.iter().map(|(_, delivery)| delivery.kern).sum();
            socket.record_stats(&SocketStats { recv, frwd, kern, ..SocketStats::default() });

            let next_index = self.publish_index.entry(sid).or_insert(0);
            if socket.publish_rx(*next_index, slots) {
                *next_index = next_index.wrapping_add(1);
            }
        }

        // Step 4: bulk forward, grouped by target device in arrival order.
        let mut by_target: HashMap<(InterfaceId, HwQueue), Vec<usize>> = HashMap::new();
        let mut any_to_kernel = vec![false; prepared.len()];
        for (index, pkt) in self.batch.iter_mut().enumerate() {
            for target in pkt.get_meta().fwd_log.targets() {
                by_target.entry((target.ifindex, target.queue)).or_default().push(index);
            }
            any_to_kernel[index] = pkt.get_meta().fwd_log.to_kernel();
        }
        for ((ifindex, queue), indices) in &by_target {
            let frames: Vec<&[u8]> = indices.iter().map(|i| prepared[*i].bytes.as_slice()).collect();
            let sent = forward.forward(*ifindex, *queue, &frames);
            if sent < frames.len() {
                stats.forward_disc += (frames.len() - sent) as u64;
            }
        }

        // Step 5: kernel copy & recycle. Every packet must be marked done before the batch reset
        // below drops it (`net::packet::Packet`'s `Drop` impl logs if it isn't).
        let delivered_indices: std::collections::HashSet<usize> =
            deliveries.keys().map(|(_, index)| *index).collect();
        let forwarded_indices: std::collections::HashSet<usize> =
            by_target.values().flatten().copied().collect();
        for (index, pkt) in self.batch.iter_mut().enumerate() {
            let direct = pkt.get_meta().direct();
            let to_kernel = any_to_kernel[index];
            if direct && to_kernel {
                host.inject(&prepared[index].bytes);
                pkt.done(DoneReason::Delivered);
            } else if delivered_indices.contains(&index) || forwarded_indices.contains(&index) || to_kernel {
                pkt.done(DoneReason::Delivered);
            } else if pkt.get_meta().fanout.action.is_drop() {
                pkt.done(DoneReason::Filtered);
            } else {
                pkt.done(DoneReason::Unhandled);
            }
        }

        self.batch.reset();
        stats
    }
}

fn wall_clock() -> (u32, u32) {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    (
        u32::try_from(now.as_secs()).unwrap_or(u32::MAX),
        now.subsec_nanos(),
    )
}
