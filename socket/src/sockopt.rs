// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The control-option enum and its payload types (spec.md §6's control surface table).
//!
//! Ground truth: `original_source/kernel/pf_q-sockopt.c`'s `pfq_getsockopt`/`pfq_setsockopt`
//! `switch (optname)`. That file dispatches on a flat `int optname` against `copy_from_user`'d
//! fixed-size structs; here the same surface is a closed enum so every payload is typed and the
//! match in [`crate::table::SocketTable::apply`] is exhaustive.

use group::{GroupId, Policy};

/// `GROUP_JOIN`/`GROUP_LEAVE` payload: `{gid, class_mask, policy}`. `gid = None` on join requests
/// "any free group".
#[derive(Debug, Copy, Clone)]
pub struct GroupJoinArgs {
    /// Target group, or `None` to allocate a fresh one.
    pub gid: Option<GroupId>,
    /// Bitmap of traffic classes to join on.
    pub class_mask: u64,
    /// Policy to install if this join allocates a new group. Ignored when joining an existing one.
    pub policy: Policy,
}

/// `GROUP_BIND`/`GROUP_UNBIND` payload: `{gid, ifindex, qindex}`.
#[derive(Debug, Copy, Clone)]
pub struct GroupBindArgs {
    /// Group whose interest in `(ifindex, qindex)` is being toggled.
    pub gid: GroupId,
    /// Interface index.
    pub ifindex: u32,
    /// Hardware queue selector on that interface.
    pub queue: devmap::QueueSelector,
}

/// `EGRESS_BIND`/`EGRESS_UNBIND` payload: `{ifindex, qindex}`.
#[derive(Debug, Copy, Clone)]
pub struct EgressBindArgs {
    /// Interface index this socket transmits through.
    pub ifindex: u32,
    /// Hardware queue on that interface.
    pub qindex: u8,
}

/// `GROUP_FPROG` payload: a classic BPF program, `{len, insns}`.
#[derive(Debug, Clone, Default)]
pub struct RawFprog {
    /// Instruction count (`insns.len()`, carried separately to mirror the wire payload's
    /// explicit `len` field).
    pub len: u16,
    /// Raw classic-BPF instructions, opaque to this crate (spec.md §9: "use an existing
    /// classic-BPF interpreter library; the core treats it as a black-box predicate").
    pub insns: Vec<u64>,
}

impl group::ClassicFilter for RawFprog {}

/// `GROUP_VLAN_FILT_TOGGLE` payload: `{gid, on}`.
#[derive(Debug, Copy, Clone)]
pub struct VlanFiltToggleArgs {
    /// Group whose VLAN filtering is being toggled.
    pub gid: GroupId,
    /// Whether VLAN filtering should be active.
    pub on: bool,
}

/// `GROUP_VLAN_FILT` payload: `{gid, vid, on}`, `vid ∈ [-1, 4094]`, `-1` meaning "all VIDs".
#[derive(Debug, Copy, Clone)]
pub struct VlanFiltArgs {
    /// Group whose filter bitmap is being modified.
    pub gid: GroupId,
    /// VLAN id to set or clear, or `-1` for "every VID".
    pub vid: i32,
    /// Whether `vid` should be allowed through.
    pub on: bool,
}

/// `TX_BIND`/`TX_UNBIND` payload: `{thread_id, ifindex, qindex}`.
#[derive(Debug, Copy, Clone)]
pub struct TxBindArgs {
    /// Async Tx worker thread this binding applies to.
    pub thread_id: u32,
    /// Interface index to transmit on.
    pub ifindex: u32,
    /// Hardware queue on that interface.
    pub qindex: u8,
}

/// The full control surface, one variant per row of spec.md §6's table.
///
/// Getters return their own payload type from [`crate::table::SocketTable::apply`]; setters
/// return `()` on success. Both directions share one enum, as in the original's single
/// `optname`-keyed `switch`.
#[derive(Debug, Clone)]
pub enum SockOpt {
    /// Map (`Some(addr)`) or unmap (`None`) this socket's shared queue region.
    Enable(Option<u64>),
    /// Read this socket's id.
    GetId,
    /// Read whether this socket is currently enabled.
    GetStatus,
    /// Read this socket's own 8-field stats struct.
    GetStats,
    /// Read a joined group's 4-field stats struct.
    GroupStats(GroupId),
    /// Read a joined group's 64-entry user counter bank.
    GroupCounters(GroupId),
    /// Read whether Rx slots carry a capture timestamp.
    GetRxTstamp,
    /// Set whether Rx slots carry a capture timestamp.
    SetRxTstamp(bool),
    /// Read the configured Rx capture length.
    GetRxCaplen,
    /// Set the configured Rx capture length.
    SetRxCaplen(usize),
    /// Read the configured Rx arena slot count.
    GetRxSlots,
    /// Set the configured Rx arena slot count.
    SetRxSlots(usize),
    /// Read the configured Tx arena slot count.
    GetTxSlots,
    /// Set the configured Tx arena slot count.
    SetTxSlots(usize),
    /// Read this socket's steering weight.
    GetWeight,
    /// Set this socket's steering weight, `[1, MAX_SOCK_MASK]`.
    SetWeight(i32),
    /// Join a group.
    GroupJoin(GroupJoinArgs),
    /// Leave a group.
    GroupLeave(GroupId),
    /// Bind a group to a device/queue in the devmap.
    GroupBind(GroupBindArgs),
    /// Unbind a group from a device/queue in the devmap.
    GroupUnbind(GroupBindArgs),
    /// Bind this socket's egress to a device/queue.
    EgressBind(EgressBindArgs),
    /// Clear this socket's egress binding.
    EgressUnbind,
    /// Install a classic-BPF filter on a group.
    GroupFprog(GroupId, RawFprog),
    /// Toggle a group's VLAN filtering on or off.
    GroupVlanFiltToggle(VlanFiltToggleArgs),
    /// Set or clear one (or, with `vid == -1`, every) VID in a group's VLAN filter.
    GroupVlanFilt(VlanFiltArgs),
    /// Validate a serialized pfq-lang descriptor array bound for a group.
    GroupFunction(GroupId, pfq_lang::ProgramDescr),
    /// Bind an async Tx worker thread to a device/queue.
    TxBind(TxBindArgs),
    /// Unbind an async Tx worker thread.
    TxUnbind(u32),
    /// Flush a Tx queue (`0` = synchronous).
    TxQueue(usize),
}
