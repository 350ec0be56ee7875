// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The group table (C4): per-group membership, policy, filter/program slots, VLAN filtering,
//! and per-CPU counters/stats.
//!
//! Groups are allocated on demand and freed when the last joined socket leaves. Storage is a
//! [`DashMap`] keyed by [`GroupId`], mirroring the sharded-map pattern the rest of this workspace
//! uses for concurrently-read, occasionally-written registries; per-field hot fields inside a
//! group (`filter`, `program`, `sock_id`) are independently atomic/`ArcSwap`-backed so a group
//! lookup never blocks behind an unrelated field's writer (spec.md §5: "per-field atomic fields
//! with release/acquire; structural changes under group lock").

#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod vlan;

pub use vlan::VlanFilter;

use arc_swap::ArcSwapOption;
use concurrency::sync::Mutex;
use concurrency::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use dashmap::DashMap;
use id::DenseId;
use std::sync::Arc;
use tracectl::trace_target;
use tracing::LevelFilter;

trace_target!("group", LevelFilter::INFO, &["group"]);

/// Marker type tagging [`DenseId`] for group identifiers.
#[derive(Debug)]
pub struct GroupMarker;
/// A group's identifier, a dense index in `0..MAX_GROUPS`.
pub type GroupId = DenseId<GroupMarker>;

/// Marker type tagging [`DenseId`] for socket identifiers as seen by the group table.
///
/// Socket ids double as bit positions in a group's per-class membership bitmap, so they are
/// bounded to `0..64` (enforced at [`Group::join`]).
#[derive(Debug)]
pub struct SocketMarker;
/// A socket's identifier, a dense index in `0..64`.
pub type SocketId = DenseId<SocketMarker>;

/// Number of traffic classes a group can partition membership over.
pub const NUM_CLASSES: usize = 64;
/// Widest socket id a group's bitmaps can carry (one bit per socket).
pub const MAX_SOCKETS_PER_GROUP: u32 = 64;
/// Width of the per-group user-addressable counter bank.
pub const NUM_COUNTERS: usize = 64;

/// Who may join a group.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Policy {
    /// Only the owning socket may join.
    Private,
    /// Any socket belonging to the same user id as the owner may join.
    Restricted,
    /// Any socket may join.
    Shared,
    /// The group accepts no further joins (also used as "no such policy" sentinel).
    #[default]
    Undefined,
}

/// Errors raised by group table operations.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum GroupError {
    /// No group exists with the given id.
    #[error("no such group: {0:?}")]
    NoSuchGroup(GroupId),
    /// The operation's policy check failed.
    #[error("group {0:?} join refused by policy")]
    PolicyRefused(GroupId),
    /// The socket id does not fit in a group's 64-bit membership bitmap.
    #[error("socket id {0} out of range (max 63)")]
    SocketIdOutOfRange(u32),
    /// The caller is not joined to the group it is operating on.
    #[error("socket not joined to group {0:?}")]
    NotJoined(GroupId),
    /// No free group id remains for an "allocate any" join.
    #[error("no free group id available")]
    NoFreeGroupId,
}

/// Per-group, per-CPU-summed statistics (spec.md §6: `GET_STATS`/`GROUP_STATS` both return the
/// same 8-field `{recv,lost,drop,sent,disc,fail,frwd,kern}` struct).
///
/// `lost`, `sent`, and `fail` stay at zero for a group's own bank: grounded in
/// `original_source/kernel/pf_q.c`, which only ever `sparse_inc`/`sparse_add`s
/// `this_group->stats`' `recv`/`drop`/`frwd`/`kern` fields — `lost` is a batch-admission event
/// that predates group classification (`global_stats` only, `pf_q.c:447,465`), and `sent`/`fail`
/// are a socket's own Tx submissions (`so->stats`, `pf_q-sockopt.c:816-817`), never a group's.
/// `disc` (bulk-forward shortfall) is tracked per-batch by `engine::BatchStats::forward_disc`
/// instead: by the time a batch's forwarding log is flushed and a shortfall is known, the
/// forwarding log no longer records which group(s) asked for a given target, so there is no
/// group to attribute the shortfall to.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupStats {
    /// Frames classified into this group.
    pub recv: u64,
    /// Frames lost to GC batch-full admission failure, prior to group classification. Always
    /// zero on a group's own bank (see struct docs); kept for parity with the control surface's
    /// shared 8-field stats struct.
    pub lost: u64,
    /// Frames dropped by this group's filter, VLAN filter, or program.
    pub drop: u64,
    /// Frames submitted for transmission on behalf of a socket joined to this group. Always zero
    /// on a group's own bank (see struct docs).
    pub sent: u64,
    /// Bulk-forward shortfall attributable to this group. Always zero on a group's own bank (see
    /// struct docs).
    pub disc: u64,
    /// Transmission attempts that failed, on behalf of a socket joined to this group. Always zero
    /// on a group's own bank (see struct docs).
    pub fail: u64,
    /// Frames forwarded to a device on behalf of this group's program.
    pub frwd: u64,
    /// Frames pushed to the host stack on behalf of this group's program.
    pub kern: u64,
}

impl GroupStats {
    fn add_assign(&mut self, other: &GroupStats) {
        self.recv += other.recv;
        self.lost += other.lost;
        self.drop += other.drop;
        self.sent += other.sent;
        self.disc += other.disc;
        self.fail += other.fail;
        self.frwd += other.frwd;
        self.kern += other.kern;
    }
}

/// The owning socket's acknowledgment of a group's current policy, recorded at join time.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct JoinAck {
    /// The policy value the socket observed and accepted when it joined.
    pub policy: Policy,
}

/// Opaque handle to a compiled pfq-lang program and its argument context, installed on a group.
///
/// `group` does not know how to run a program; it only stores and atomically swaps the handle
/// that `engine` dereferences on its hot path. [`CompiledProgram::as_any`] lets `engine` recover
/// the concrete `pfq_lang::CompiledProgram<Buf>` it installed, the same downcast-through-`Any`
/// pattern `engine`'s own dynamic pipeline stages use to recover a concrete network function.
pub trait CompiledProgram: Send + Sync + 'static {
    /// Type-erased view of `self`, for the installing crate to downcast back to the concrete type
    /// it stored.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Opaque classic-BPF filter handle, installed on a group (spec.md §1 non-goals: the BPF
/// compiler itself lives outside this core).
pub trait ClassicFilter: Send + Sync + 'static {}

/// Per-CPU bank of per-group state that must not be shared mutably across CPUs (spec.md §9:
/// "represent as an array indexed by CPU id, each entry cache-line padded").
#[derive(Debug, Default)]
#[repr(align(64))]
struct PerCpuGroupState {
    stats: GroupStats,
    counters: [u64; NUM_COUNTERS],
}

/// A single group's full state.
pub struct Group {
    gid: GroupId,
    owner: SocketId,
    policy: Policy,
    sock_id: [AtomicU64; NUM_CLASSES],
    pid: DashMap<SocketId, JoinAck>,
    filter: ArcSwapOption<dyn ClassicFilter>,
    program: ArcSwapOption<dyn CompiledProgram>,
    vlan_filters_enabled: AtomicBool,
    vlan_filter: VlanFilter,
    per_cpu: Vec<Mutex<PerCpuGroupState>>,
    generation: AtomicU64,
}

impl Group {
    fn new(gid: GroupId, owner: SocketId, policy: Policy, num_cpus: usize) -> Self {
        Self {
            gid,
            owner,
            policy,
            sock_id: std::array::from_fn(|_| AtomicU64::new(0)),
            pid: DashMap::new(),
            filter: ArcSwapOption::empty(),
            program: ArcSwapOption::empty(),
            vlan_filters_enabled: AtomicBool::new(false),
            vlan_filter: VlanFilter::new(),
            per_cpu: (0..num_cpus.max(1))
                .map(|_| Mutex::new(PerCpuGroupState::default()))
                .collect(),
            generation: AtomicU64::new(0),
        }
    }

    /// This group's id.
    #[must_use]
    pub fn id(&self) -> GroupId {
        self.gid
    }

    /// The socket that allocated this group.
    #[must_use]
    pub fn owner(&self) -> SocketId {
        self.owner
    }

    /// This group's current policy.
    #[must_use]
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Hot-path read: the bitmap of sockets joined on traffic class `class`.
    ///
    /// # Panics
    ///
    /// Panics if `class >= `[`NUM_CLASSES`]; callers own the class-mask bound (spec.md `Class`
    /// is "one of 64 bits").
    #[must_use]
    pub fn sock_id(&self, class: usize) -> u64 {
        self.sock_id[class].load(Ordering::Acquire)
    }

    /// Union of `sock_id[c]` for every class bit set in `class_mask`.
    #[must_use]
    pub fn eligible(&self, class_mask: u64) -> u64 {
        let mut acc = 0u64;
        for class in 0..NUM_CLASSES {
            if class_mask & (1 << class) != 0 {
                acc |= self.sock_id(class);
            }
        }
        acc
    }

    /// Hot-path read: is `sid` joined on any traffic class?
    #[must_use]
    pub fn access(&self, sid: SocketId) -> bool {
        self.pid.contains_key(&sid)
    }

    /// Current classic-BPF filter, if any.
    #[must_use]
    pub fn filter(&self) -> Option<Arc<dyn ClassicFilter>> {
        self.filter.load_full()
    }

    /// Current compiled program, if any.
    #[must_use]
    pub fn program(&self) -> Option<Arc<dyn CompiledProgram>> {
        self.program.load_full()
    }

    /// True iff VLAN filtering is enabled for this group.
    #[must_use]
    pub fn vlan_filters_enabled(&self) -> bool {
        self.vlan_filters_enabled.load(Ordering::Acquire)
    }

    /// True iff `vid` is allowed through this group's VLAN filter.
    #[must_use]
    pub fn vlan_allows(&self, vid: u16) -> bool {
        self.vlan_filter.contains(vid)
    }

    /// Monotonic stamp bumped on every membership or weight-affecting change, used by `engine`
    /// to invalidate its per-CPU steering expansion cache without a full bitmask compare.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Add `delta.recv`/`drop`/`frwd`/`kern` to the calling CPU's counter bank.
    pub fn record_stats(&self, cpu: usize, delta: &GroupStats) {
        let slot = &self.per_cpu[cpu % self.per_cpu.len()];
        let mut guard = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.stats.add_assign(delta);
    }

    /// Read-modify-write one of the 64 user-addressable counters on the calling CPU's bank.
    pub fn bump_counter(&self, cpu: usize, index: usize, delta: i64) {
        let slot = &self.per_cpu[cpu % self.per_cpu.len()];
        let mut guard = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.counters[index] = guard.counters[index].wrapping_add_signed(delta);
    }

    /// Sum this group's stats across every CPU bank.
    #[must_use]
    pub fn stats(&self) -> GroupStats {
        let mut total = GroupStats::default();
        for slot in &self.per_cpu {
            let guard = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            total.add_assign(&guard.stats);
        }
        total
    }

    /// Sum this group's 64 user counters across every CPU bank.
    #[must_use]
    pub fn counters(&self) -> [u64; NUM_COUNTERS] {
        let mut total = [0u64; NUM_COUNTERS];
        for slot in &self.per_cpu {
            let guard = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            for (t, c) in total.iter_mut().zip(guard.counters.iter()) {
                *t += c;
            }
        }
        total
    }

    fn is_empty(&self) -> bool {
        self.sock_id.iter().all(|bits| bits.load(Ordering::Acquire) == 0)
    }
}

/// The group table: allocation, join/leave, and per-group configuration operations.
pub struct GroupTable {
    groups: DashMap<GroupId, Arc<Group>>,
    next_id: AtomicU64,
    num_cpus: usize,
}

impl GroupTable {
    /// Build an empty table. `num_cpus` sizes every group's per-CPU counter/stats bank.
    #[must_use]
    pub fn new(num_cpus: usize) -> Self {
        Self {
            groups: DashMap::new(),
            next_id: AtomicU64::new(0),
            num_cpus,
        }
    }

    /// Look up a group by id.
    #[must_use]
    pub fn get(&self, gid: GroupId) -> Option<Arc<Group>> {
        self.groups.get(&gid).map(|entry| Arc::clone(&entry))
    }

    /// Join `sid` to `gid`, allocating a new group if `gid` is `None` ("any").
    ///
    /// Joining sets `sock_id[c] |= 1<<sid` for every class bit set in `class_mask`. A group is
    /// created implicitly by the first join that requests allocation; an explicit `gid` must
    /// already exist and pass its policy check.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::SocketIdOutOfRange`], [`GroupError::NoSuchGroup`],
    /// [`GroupError::PolicyRefused`], or [`GroupError::NoFreeGroupId`].
    pub fn join(
        &self,
        gid: Option<GroupId>,
        sid: SocketId,
        class_mask: u64,
        policy: Policy,
        same_owner: impl FnOnce(SocketId) -> bool,
    ) -> Result<GroupId, GroupError> {
        if sid.index() >= MAX_SOCKETS_PER_GROUP {
            return Err(GroupError::SocketIdOutOfRange(sid.index()));
        }

        let group = match gid {
            Some(gid) => {
                let group = self.groups.get(&gid).ok_or(GroupError::NoSuchGroup(gid))?;
                Self::check_join_policy(&group, sid, &same_owner)?;
                Arc::clone(&group)
            }
            None => self.allocate(sid, policy)?,
        };

        let bit = 1u64 << sid.index();
        for class in 0..NUM_CLASSES {
            if class_mask & (1 << class) != 0 {
                group.sock_id[class].fetch_or(bit, Ordering::AcqRel);
            }
        }
        group.pid.insert(
            sid,
            JoinAck {
                policy: group.policy,
            },
        );
        group.bump_generation();
        tracing::debug!(gid = ?group.gid, sid = ?sid, class_mask, "socket joined group");
        Ok(group.gid)
    }

    fn check_join_policy(
        group: &Group,
        sid: SocketId,
        same_owner: impl FnOnce(SocketId) -> bool,
    ) -> Result<(), GroupError> {
        let allowed = match group.policy {
            Policy::Private => sid == group.owner,
            Policy::Restricted => sid == group.owner || same_owner(group.owner),
            Policy::Shared => true,
            Policy::Undefined => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(GroupError::PolicyRefused(group.gid))
        }
    }

    fn allocate(&self, owner: SocketId, policy: Policy) -> Result<Arc<Group>, GroupError> {
        if policy == Policy::Undefined {
            return Err(GroupError::PolicyRefused(GroupId::from_index(0)));
        }
        for _ in 0..u32::MAX {
            let candidate = GroupId::from_index(
                u32::try_from(self.next_id.fetch_add(1, Ordering::Relaxed) % u64::from(u32::MAX))
                    .unwrap_or(0),
            );
            if let dashmap::Entry::Vacant(slot) = self.groups.entry(candidate) {
                let group = Arc::new(Group::new(candidate, owner, policy, self.num_cpus));
                slot.insert(group.clone());
                return Ok(group);
            }
        }
        Err(GroupError::NoFreeGroupId)
    }

    /// Leave `gid`: clear `sid`'s bit from every class, freeing the group once no socket remains
    /// joined on any class.
    ///
    /// A `gid` that no longer exists is treated as already left rather than an error: spec.md
    /// §8 requires `leave` after `leave` to be a no-op, and a group's last `leave` call is
    /// exactly what frees it, so a repeated `leave(gid, sid)` on an already-freed group must
    /// still succeed.
    ///
    /// # Errors
    ///
    /// This operation cannot otherwise fail.
    pub fn leave(&self, gid: GroupId, sid: SocketId) -> Result<(), GroupError> {
        let Some(group) = self.groups.get(&gid).map(|e| Arc::clone(&e)) else {
            return Ok(());
        };
        let bit = !(1u64 << sid.index());
        for class in &group.sock_id {
            class.fetch_and(bit, Ordering::AcqRel);
        }
        group.pid.remove(&sid);
        group.bump_generation();
        if group.is_empty() {
            self.groups.remove(&gid);
            tracing::debug!(?gid, "group freed, no sockets remain joined");
        }
        Ok(())
    }

    /// Install (or clear, with `None`) a group's classic-BPF filter.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::NoSuchGroup`] if `gid` does not exist.
    pub fn set_filter(
        &self,
        gid: GroupId,
        filter: Option<Arc<dyn ClassicFilter>>,
    ) -> Result<(), GroupError> {
        let group = self.groups.get(&gid).ok_or(GroupError::NoSuchGroup(gid))?;
        group.filter.store(filter);
        Ok(())
    }

    /// Install (or clear, with `None`) a group's compiled pfq-lang program.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::NoSuchGroup`] if `gid` does not exist.
    pub fn set_program(
        &self,
        gid: GroupId,
        program: Option<Arc<dyn CompiledProgram>>,
    ) -> Result<(), GroupError> {
        let group = self.groups.get(&gid).ok_or(GroupError::NoSuchGroup(gid))?;
        group.program.store(program);
        Ok(())
    }

    /// Enable or disable VLAN filtering for `gid`.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::NoSuchGroup`] if `gid` does not exist.
    pub fn toggle_vlan(&self, gid: GroupId, enabled: bool) -> Result<(), GroupError> {
        let group = self.groups.get(&gid).ok_or(GroupError::NoSuchGroup(gid))?;
        group.vlan_filters_enabled.store(enabled, Ordering::Release);
        Ok(())
    }

    /// Set or clear a single VID (or, with `vid == -1`, every VID) in `gid`'s filter bitmap.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::NoSuchGroup`] if `gid` does not exist.
    pub fn set_vlan_filter(&self, gid: GroupId, vid: i32, on: bool) -> Result<(), GroupError> {
        let group = self.groups.get(&gid).ok_or(GroupError::NoSuchGroup(gid))?;
        group.vlan_filter.set(vid, on);
        Ok(())
    }

    /// True iff `sid` is joined to `gid` on any traffic class.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::NoSuchGroup`] if `gid` does not exist.
    pub fn access(&self, gid: GroupId, sid: SocketId) -> Result<bool, GroupError> {
        let group = self.groups.get(&gid).ok_or(GroupError::NoSuchGroup(gid))?;
        Ok(group.access(sid))
    }

    /// Number of currently-allocated groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True iff no group is currently allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every currently-allocated group id, in no particular order.
    ///
    /// Meant for a stats/control-plane reader that needs to enumerate groups (spec.md §6
    /// `GROUP_STATS`/`GROUP_COUNTERS` are per-`gid`, but a dump-everything view needs the id
    /// set first); the hot path never calls this.
    #[must_use]
    pub fn ids(&self) -> Vec<GroupId> {
        self.groups.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod test {
    use super::{GroupError, GroupTable, Policy, SocketId};

    fn sid(n: u32) -> SocketId {
        SocketId::from_index(n)
    }

    #[test]
    fn join_allocates_and_sets_class_bit() {
        let table = GroupTable::new(1);
        let gid = table.join(None, sid(0), 0b1, Policy::Shared, |_| false).unwrap();
        let group = table.get(gid).unwrap();
        assert_eq!(group.sock_id(0), 1);
        assert!(group.access(sid(0)));
    }

    #[test]
    fn leave_frees_empty_group() {
        let table = GroupTable::new(1);
        let gid = table.join(None, sid(0), 1, Policy::Shared, |_| false).unwrap();
        table.leave(gid, sid(0)).unwrap();
        assert!(table.get(gid).is_none());
    }

    #[test]
    fn leave_then_leave_is_idempotent() {
        let table = GroupTable::new(1);
        let gid = table.join(None, sid(0), 1, Policy::Shared, |_| false).unwrap();
        table.leave(gid, sid(0)).unwrap();
        assert!(table.get(gid).is_none());
        // The group is already gone; a second leave of the same (gid, sid) must still succeed.
        table.leave(gid, sid(0)).unwrap();
        table.leave(gid, sid(1)).unwrap();
    }

    #[test]
    fn private_group_refuses_other_sockets() {
        let table = GroupTable::new(1);
        let gid = table
            .join(None, sid(0), 1, Policy::Private, |_| false)
            .unwrap();
        let err = table.join(Some(gid), sid(1), 1, Policy::Private, |_| false);
        assert!(matches!(err, Err(GroupError::PolicyRefused(_))));
    }

    #[test]
    fn shared_group_accepts_any_socket() {
        let table = GroupTable::new(1);
        let gid = table.join(None, sid(0), 1, Policy::Shared, |_| false).unwrap();
        table.join(Some(gid), sid(1), 0b10, Policy::Shared, |_| false).unwrap();
        let group = table.get(gid).unwrap();
        assert_eq!(group.eligible(0b11), 0b11);
    }

    #[test]
    fn join_then_join_is_idempotent() {
        let table = GroupTable::new(1);
        let gid = table.join(None, sid(0), 1, Policy::Shared, |_| false).unwrap();
        table.join(Some(gid), sid(0), 1, Policy::Shared, |_| false).unwrap();
        let group = table.get(gid).unwrap();
        assert_eq!(group.sock_id(0), 1);
    }

    #[test]
    fn vlan_filter_round_trips() {
        let table = GroupTable::new(1);
        let gid = table.join(None, sid(0), 1, Policy::Shared, |_| false).unwrap();
        table.toggle_vlan(gid, true).unwrap();
        table.set_vlan_filter(gid, 100, true).unwrap();
        let group = table.get(gid).unwrap();
        assert!(group.vlan_filters_enabled());
        assert!(group.vlan_allows(100));
        assert!(!group.vlan_allows(200));
    }

    #[test]
    fn vid_minus_one_allows_every_vid() {
        let table = GroupTable::new(1);
        let gid = table.join(None, sid(0), 1, Policy::Shared, |_| false).unwrap();
        table.set_vlan_filter(gid, -1, true).unwrap();
        let group = table.get(gid).unwrap();
        assert!(group.vlan_allows(1));
        assert!(group.vlan_allows(4094));
    }

    #[test]
    fn stats_sum_across_cpus() {
        let table = GroupTable::new(4);
        let gid = table.join(None, sid(0), 1, Policy::Shared, |_| false).unwrap();
        let group = table.get(gid).unwrap();
        group.record_stats(0, &super::GroupStats { recv: 10, ..Default::default() });
        group.record_stats(1, &super::GroupStats { recv: 5, drop: 2, ..Default::default() });
        let total = group.stats();
        assert_eq!(total.recv, 15);
        assert_eq!(total.drop, 2);
    }
}
