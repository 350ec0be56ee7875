// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The socket table: one [`Socket`] per open control handle, and [`SocketTable::apply`], the
//! single dispatch point every [`crate::SockOpt`] goes through.

use std::sync::Arc;

use concurrency::sync::Mutex;
use concurrency::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use dashmap::DashMap;
use devmap::{DevMap, DevMapAction};
use errno::PfqErrorKind;
use group::{GroupId, GroupTable};
use id::DenseId;
use shmem_queue::{QueueRegion, QueueRegionConfig};

use crate::sockopt::{
    EgressBindArgs, GroupBindArgs, GroupJoinArgs, RawFprog, SockOpt, TxBindArgs, VlanFiltArgs,
    VlanFiltToggleArgs,
};

/// Marker type tagging [`DenseId`] for socket identifiers, this crate's canonical `SocketId`.
///
/// `group`'s own `SocketId` bounds ids to `0..64` for its per-class bitmap; this crate's ids are
/// the same dense index space, converted with [`to_group_id`]/[`from_group_id`] at the boundary
/// rather than sharing one marker type, so `socket` and `group` stay independently buildable
/// subsystems (spec.md's C6/C4 split).
#[derive(Debug)]
pub struct SocketMarker;
/// A socket's identifier.
pub type SocketId = DenseId<SocketMarker>;

#[must_use]
fn to_group_id(sid: SocketId) -> group::SocketId {
    group::SocketId::from_index(sid.index())
}

/// A socket's own 8-field stats struct (spec.md §6 `GET_STATS`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SocketStats {
    /// Frames this socket's captured traffic accounted for.
    pub recv: u64,
    /// Frames lost to GC batch-full admission failure (spec.md §4.1).
    pub lost: u64,
    /// Frames dropped by a group's filter, VLAN filter, or program before reaching this socket.
    pub drop: u64,
    /// Frames this socket submitted for transmission.
    pub sent: u64,
    /// Frames this socket submitted for transmission that were discarded (bulk-forward shortfall).
    pub disc: u64,
    /// Transmission attempts that failed.
    pub fail: u64,
    /// Frames forwarded to a device on behalf of a program run against this socket's traffic.
    pub frwd: u64,
    /// Frames pushed to the host network stack on behalf of this socket's traffic.
    pub kern: u64,
}

impl SocketStats {
    fn add_assign(&mut self, other: &SocketStats) {
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

/// A Tx worker binding installed by `TX_BIND` (spec.md §6, §4.7).
#[derive(Debug, Copy, Clone)]
struct TxBinding {
    thread_id: u32,
    ifindex: u32,
    qindex: u8,
}

/// One open control handle (spec.md §6: "a single control object per socket").
pub struct Socket {
    id: SocketId,
    enabled: AtomicBool,
    region: Mutex<Option<QueueRegion>>,
    rx_tstamp: AtomicBool,
    rx_caplen: AtomicUsize,
    rx_slots: AtomicUsize,
    tx_slots: AtomicUsize,
    weight: AtomicI32,
    stats: Mutex<SocketStats>,
    joined: Mutex<Vec<GroupId>>,
    egress: Mutex<Option<EgressBindArgs>>,
    tx_bindings: Mutex<Vec<TxBinding>>,
    last_error: Mutex<Option<PfqErrorKind>>,
    generation: AtomicU64,
}

/// Upper bound on a socket's steering weight (spec.md §6: `[1, MAX_SOCK_MASK/MAX_ID]`).
#[allow(clippy::cast_possible_wrap)] // group::MAX_SOCKETS_PER_GROUP is 64, well within i32 range
pub const MAX_WEIGHT: i32 = group::MAX_SOCKETS_PER_GROUP as i32;

impl Socket {
    fn new(id: SocketId) -> Self {
        Self {
            id,
            enabled: AtomicBool::new(false),
            region: Mutex::new(None),
            rx_tstamp: AtomicBool::new(false),
            rx_caplen: AtomicUsize::new(0),
            rx_slots: AtomicUsize::new(64),
            tx_slots: AtomicUsize::new(64),
            weight: AtomicI32::new(1),
            stats: Mutex::new(SocketStats::default()),
            joined: Mutex::new(Vec::new()),
            egress: Mutex::new(None),
            tx_bindings: Mutex::new(Vec::new()),
            last_error: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// This socket's id.
    #[must_use]
    pub fn id(&self) -> SocketId {
        self.id
    }

    /// Whether this socket currently has a shared queue region mapped.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// This socket's steering weight.
    #[must_use]
    pub fn weight(&self) -> i32 {
        self.weight.load(Ordering::Acquire)
    }

    /// Monotonic stamp bumped on every change that invalidates the engine's per-CPU steering
    /// expansion cache (weight changes; spec.md §4.5 "cache invalidation").
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The last control-plane error this socket observed, if any (spec.md §7: "the last-error
    /// slot on the socket handle").
    #[must_use]
    pub fn last_error(&self) -> Option<PfqErrorKind> {
        self.lock_last_error().clone()
    }

    fn lock_last_error(&self) -> concurrency::sync::MutexGuard<'_, Option<PfqErrorKind>> {
        self.last_error
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record_error(&self, kind: PfqErrorKind) -> PfqErrorKind {
        *self.lock_last_error() = Some(kind);
        kind
    }

    /// Accumulate a delta into this socket's stats (called by the engine's per-batch stats step,
    /// spec.md §4.5 step 1).
    pub fn record_stats(&self, delta: &SocketStats) {
        let mut guard = self.stats.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.add_assign(delta);
    }

    /// Read this socket's accumulated stats.
    #[must_use]
    pub fn stats(&self) -> SocketStats {
        *self.stats.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Whether this socket wants timestamps re-inlined into delivered frames (`RX_TSTAMP`).
    #[must_use]
    pub fn rx_tstamp(&self) -> bool {
        self.rx_tstamp.load(Ordering::Acquire)
    }

    /// Bytes captured per Rx frame, `0` meaning "whole frame" (`RX_CAPLEN`).
    #[must_use]
    pub fn rx_caplen(&self) -> usize {
        self.rx_caplen.load(Ordering::Acquire)
    }

    /// Configured per-arena Rx slot capacity (`RX_SLOTS`), the bound the engine's per-socket copy
    /// step (spec.md §4.5 step 3) hands to [`shmem_queue::RxConsumer::poll`] indirectly by never
    /// publishing more than this many slots in one batch.
    #[must_use]
    pub fn rx_slots(&self) -> usize {
        self.rx_slots.load(Ordering::Acquire)
    }

    /// Every group this socket is currently joined to.
    #[must_use]
    pub fn joined_groups(&self) -> Vec<GroupId> {
        self.joined.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Publish a batch of captured frames into this socket's Rx shared queue (spec.md §4.5 step
    /// 3). `index` is the caller's (the engine's per-socket cursor) running publish index.
    ///
    /// Returns `false` without publishing if the socket has no mapped region (not `ENABLE`d).
    pub fn publish_rx(&self, index: u32, slots: Vec<shmem_queue::RxSlot>) -> bool {
        let guard = self.region.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(region) = guard.as_ref() else {
            return false;
        };
        region.rx.producer().publish(index, slots);
        true
    }
}

/// The socket table: allocation and [`SockOpt`] dispatch, backed by a [`GroupTable`] and
/// [`DevMap`] it does not own (both are shared with the engine).
pub struct SocketTable {
    sockets: DashMap<SocketId, Arc<Socket>>,
    next_id: AtomicU64,
    groups: Arc<GroupTable>,
    devmap: Arc<DevMap>,
}

impl SocketTable {
    /// Build an empty table dispatching group/devmap operations against the given shared tables.
    #[must_use]
    pub fn new(groups: Arc<GroupTable>, devmap: Arc<DevMap>) -> Self {
        Self {
            sockets: DashMap::new(),
            next_id: AtomicU64::new(0),
            groups,
            devmap,
        }
    }

    /// Open a new socket handle.
    #[must_use]
    pub fn open(&self) -> Arc<Socket> {
        let id = SocketId::from_index(u32::try_from(self.next_id.fetch_add(1, Ordering::Relaxed)).unwrap_or(0));
        let socket = Arc::new(Socket::new(id));
        self.sockets.insert(id, Arc::clone(&socket));
        tracing::debug!(sid = ?id, "socket opened");
        socket
    }

    /// Close a socket handle: leaves every joined group and drops its shared queue region.
    pub fn close(&self, sid: SocketId) {
        if let Some((_, socket)) = self.sockets.remove(&sid) {
            let joined = std::mem::take(&mut *socket.joined.lock().unwrap_or_else(std::sync::PoisonError::into_inner));
            for gid in joined {
                let _ = self.groups.leave(gid, to_group_id(sid));
            }
            tracing::debug!(?sid, "socket closed");
        }
    }

    /// Look up an open socket handle.
    #[must_use]
    pub fn get(&self, sid: SocketId) -> Option<Arc<Socket>> {
        self.sockets.get(&sid).map(|e| Arc::clone(&e))
    }

    /// Every currently-open socket id, in no particular order.
    ///
    /// Meant for a stats/control-plane reader enumerating all sockets; the hot path never calls
    /// this.
    #[must_use]
    pub fn ids(&self) -> Vec<SocketId> {
        self.sockets.iter().map(|entry| *entry.key()).collect()
    }

    /// Dispatch one [`SockOpt`] against `sid`'s handle.
    ///
    /// # Errors
    ///
    /// Returns a [`PfqErrorKind`] naming why the operation was refused; the same kind is recorded
    /// on the socket's last-error slot (spec.md §7).
    #[allow(clippy::too_many_lines)]
    pub fn apply(&self, sid: SocketId, opt: SockOpt) -> Result<SockOptResult, PfqErrorKind> {
        let socket = self.sockets.get(&sid).map(|e| Arc::clone(&e)).ok_or(PfqErrorKind::Invalid)?;
        self.dispatch(&socket, opt).map_err(|kind| socket.record_error(kind))
    }

    fn dispatch(&self, socket: &Socket, opt: SockOpt) -> Result<SockOptResult, PfqErrorKind> {
        match opt {
            SockOpt::Enable(addr) => self.enable(socket, addr).map(|()| SockOptResult::Unit),
            SockOpt::GetId => Ok(SockOptResult::Id(socket.id())),
            SockOpt::GetStatus => Ok(SockOptResult::Status(socket.is_enabled())),
            SockOpt::GetStats => Ok(SockOptResult::Stats(socket.stats())),
            SockOpt::GroupStats(gid) => {
                let group = self.groups.get(gid).ok_or(PfqErrorKind::NoSuchGroup)?;
                Ok(SockOptResult::GroupStats(group.stats()))
            }
            SockOpt::GroupCounters(gid) => {
                let group = self.groups.get(gid).ok_or(PfqErrorKind::NoSuchGroup)?;
                Ok(SockOptResult::GroupCounters(group.counters()))
            }
            SockOpt::GetRxTstamp => Ok(SockOptResult::Bool(socket.rx_tstamp.load(Ordering::Acquire))),
            SockOpt::SetRxTstamp(on) => {
                socket.rx_tstamp.store(on, Ordering::Release);
                Ok(SockOptResult::Unit)
            }
            SockOpt::GetRxCaplen => Ok(SockOptResult::Usize(socket.rx_caplen.load(Ordering::Acquire))),
            SockOpt::SetRxCaplen(n) => {
                socket.rx_caplen.store(n, Ordering::Release);
                Ok(SockOptResult::Unit)
            }
            SockOpt::GetRxSlots => Ok(SockOptResult::Usize(socket.rx_slots.load(Ordering::Acquire))),
            SockOpt::SetRxSlots(n) => self.set_slots(socket, &socket.rx_slots, n),
            SockOpt::GetTxSlots => Ok(SockOptResult::Usize(socket.tx_slots.load(Ordering::Acquire))),
            SockOpt::SetTxSlots(n) => self.set_slots(socket, &socket.tx_slots, n),
            SockOpt::GetWeight => Ok(SockOptResult::Weight(socket.weight())),
            SockOpt::SetWeight(w) => self.set_weight(socket, w),
            SockOpt::GroupJoin(args) => self.group_join(socket, args),
            SockOpt::GroupLeave(gid) => self.group_leave(socket, gid),
            SockOpt::GroupBind(args) => self.group_bind(DevMapAction::Set, args),
            SockOpt::GroupUnbind(args) => self.group_bind(DevMapAction::Reset, args),
            SockOpt::EgressBind(args) => {
                *socket.egress.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(args);
                Ok(SockOptResult::Unit)
            }
            SockOpt::EgressUnbind => {
                *socket.egress.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
                Ok(SockOptResult::Unit)
            }
            SockOpt::GroupFprog(gid, fprog) => self.group_fprog(gid, fprog),
            SockOpt::GroupVlanFiltToggle(args) => self.group_vlan_toggle(args),
            SockOpt::GroupVlanFilt(args) => self.group_vlan_filt(args),
            SockOpt::GroupFunction(gid, descr) => self.group_function(gid, descr),
            SockOpt::TxBind(args) => {
                socket
                    .tx_bindings
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push(TxBinding {
                        thread_id: args.thread_id,
                        ifindex: args.ifindex,
                        qindex: args.qindex,
                    });
                Ok(SockOptResult::Unit)
            }
            SockOpt::TxUnbind(thread_id) => {
                socket
                    .tx_bindings
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .retain(|b| b.thread_id != thread_id);
                Ok(SockOptResult::Unit)
            }
            SockOpt::TxQueue(queue_id) => self.tx_queue(socket, queue_id),
        }
    }

    fn enable(&self, socket: &Socket, addr: Option<u64>) -> Result<(), PfqErrorKind> {
        match addr {
            Some(_) => {
                if socket.is_enabled() {
                    return Err(PfqErrorKind::AlreadyEnabled);
                }
                let config = QueueRegionConfig {
                    rx_slots: socket.rx_slots.load(Ordering::Acquire),
                    tx_slots: socket.tx_slots.load(Ordering::Acquire),
                    rx_caplen: u16::try_from(socket.rx_caplen.load(Ordering::Acquire)).unwrap_or(u16::MAX),
                    ..QueueRegionConfig::default()
                };
                let region = QueueRegion::new(config).map_err(|_| PfqErrorKind::OutOfMemory)?;
                *socket.region.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(region);
                socket.enabled.store(true, Ordering::Release);
                Ok(())
            }
            None => {
                if !socket.is_enabled() {
                    return Err(PfqErrorKind::NotEnabled);
                }
                *socket.region.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
                socket.enabled.store(false, Ordering::Release);
                Ok(())
            }
        }
    }

    fn set_slots(&self, socket: &Socket, slot: &AtomicUsize, n: usize) -> Result<SockOptResult, PfqErrorKind> {
        if n == 0 {
            return Err(PfqErrorKind::BadArgument);
        }
        if socket.is_enabled() {
            return Err(PfqErrorKind::AlreadyEnabled);
        }
        slot.store(n, Ordering::Release);
        Ok(SockOptResult::Unit)
    }

    fn set_weight(&self, socket: &Socket, w: i32) -> Result<SockOptResult, PfqErrorKind> {
        if !(1..=MAX_WEIGHT).contains(&w) {
            return Err(PfqErrorKind::BadArgument);
        }
        socket.weight.store(w, Ordering::Release);
        socket.generation.fetch_add(1, Ordering::AcqRel);
        Ok(SockOptResult::Unit)
    }

    fn group_join(&self, socket: &Socket, args: GroupJoinArgs) -> Result<SockOptResult, PfqErrorKind> {
        if args.class_mask == 0 {
            return Err(PfqErrorKind::BadArgument);
        }
        let gid = self
            .groups
            .join(args.gid, to_group_id(socket.id()), args.class_mask, args.policy, |_| false)
            .map_err(map_group_error)?;
        socket
            .joined
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(gid);
        Ok(SockOptResult::GroupJoined(gid))
    }

    fn group_leave(&self, socket: &Socket, gid: GroupId) -> Result<SockOptResult, PfqErrorKind> {
        self.groups.leave(gid, to_group_id(socket.id())).map_err(map_group_error)?;
        socket
            .joined
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain(|g| *g != gid);
        Ok(SockOptResult::Unit)
    }

    fn group_bind(&self, action: DevMapAction, args: GroupBindArgs) -> Result<SockOptResult, PfqErrorKind> {
        self.devmap
            .update(action, args.ifindex, args.queue, args.gid.index())
            .map(|_| SockOptResult::Unit)
            .map_err(|_| PfqErrorKind::BadArgument)
    }

    fn group_fprog(&self, gid: GroupId, fprog: RawFprog) -> Result<SockOptResult, PfqErrorKind> {
        self.groups
            .set_filter(gid, Some(Arc::new(fprog)))
            .map(|()| SockOptResult::Unit)
            .map_err(map_group_error)
    }

    fn group_vlan_toggle(&self, args: VlanFiltToggleArgs) -> Result<SockOptResult, PfqErrorKind> {
        self.groups
            .toggle_vlan(args.gid, args.on)
            .map(|()| SockOptResult::Unit)
            .map_err(map_group_error)
    }

    fn group_vlan_filt(&self, args: VlanFiltArgs) -> Result<SockOptResult, PfqErrorKind> {
        if !(-1..=4094).contains(&args.vid) {
            return Err(PfqErrorKind::BadArgument);
        }
        self.groups
            .set_vlan_filter(args.gid, args.vid, args.on)
            .map(|()| SockOptResult::Unit)
            .map_err(map_group_error)
    }

    /// Validate a `GROUP_FUNCTION` descriptor array and hand it back for compilation.
    ///
    /// This crate stops at validation rather than also compiling the program: `pfq_lang::compile`
    /// is generic over a concrete packet buffer type and a process-wide symbol catalogue, neither
    /// of which this control-surface crate has any reason to depend on. The caller (the engine,
    /// which does own both) compiles the returned descriptor and installs it with
    /// [`group::GroupTable::set_program`].
    fn group_function(&self, gid: GroupId, descr: pfq_lang::ProgramDescr) -> Result<SockOptResult, PfqErrorKind> {
        if self.groups.get(gid).is_none() {
            return Err(PfqErrorKind::NoSuchGroup);
        }
        pfq_lang::validate(&descr).map_err(|_| PfqErrorKind::BadProgram)?;
        Ok(SockOptResult::ValidatedProgram(gid, descr))
    }

    fn tx_queue(&self, socket: &Socket, queue_id: usize) -> Result<SockOptResult, PfqErrorKind> {
        if !socket.is_enabled() {
            return Err(PfqErrorKind::NotEnabled);
        }
        let guard = socket.region.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let region = guard.as_ref().ok_or(PfqErrorKind::NotEnabled)?;
        let queue = region.tx.queue(queue_id).ok_or(PfqErrorKind::BadArgument)?;
        queue.producer().flush();
        Ok(SockOptResult::Unit)
    }
}

fn map_group_error(err: group::GroupError) -> PfqErrorKind {
    match err {
        group::GroupError::NoSuchGroup(_) => PfqErrorKind::NoSuchGroup,
        group::GroupError::PolicyRefused(_) => PfqErrorKind::PermissionDenied,
        group::GroupError::SocketIdOutOfRange(_) | group::GroupError::NoFreeGroupId => {
            PfqErrorKind::BadArgument
        }
        group::GroupError::NotJoined(_) => PfqErrorKind::NotJoined,
    }
}

/// The result of a successful [`SocketTable::apply`] call, one variant per payload shape spec.md
/// §6's table names.
#[derive(Debug, Clone)]
pub enum SockOptResult {
    /// A setter that returns nothing.
    Unit,
    /// `GET_ID`.
    Id(SocketId),
    /// `GET_STATUS`.
    Status(bool),
    /// `GET_STATS`.
    Stats(SocketStats),
    /// `GROUP_STATS`.
    GroupStats(group::GroupStats),
    /// `GROUP_COUNTERS`.
    GroupCounters([u64; group::NUM_COUNTERS]),
    /// `GET_RX_TSTAMP`.
    Bool(bool),
    /// `GET_RX_CAPLEN`/`GET_RX_SLOTS`/`GET_TX_SLOTS`.
    Usize(usize),
    /// `GET_WEIGHT`.
    Weight(i32),
    /// `GROUP_JOIN`'s resolved group id (equal to the request's `gid` unless it asked for "any").
    GroupJoined(GroupId),
    /// `GROUP_FUNCTION`'s validated descriptor, ready for the caller to compile.
    ValidatedProgram(GroupId, pfq_lang::ProgramDescr),
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use devmap::DevMap;
    use group::{GroupTable, Policy};

    use super::{SockOptResult, SocketTable};
    use crate::sockopt::SockOpt;

    fn table() -> SocketTable {
        SocketTable::new(Arc::new(GroupTable::new(1)), Arc::new(DevMap::new(4, 4)))
    }

    #[test]
    fn enable_requires_a_shm_address_then_maps_a_region() {
        let table = table();
        let socket = table.open();
        assert!(matches!(
            table.apply(socket.id(), SockOpt::Enable(Some(0x1000))),
            Ok(SockOptResult::Unit)
        ));
        assert!(socket.is_enabled());
    }

    #[test]
    fn double_enable_is_rejected() {
        let table = table();
        let socket = table.open();
        table.apply(socket.id(), SockOpt::Enable(Some(0x1000))).unwrap();
        let err = table.apply(socket.id(), SockOpt::Enable(Some(0x2000)));
        assert!(err.is_err());
        assert_eq!(socket.last_error(), err.err());
    }

    #[test]
    fn disable_without_enable_is_rejected() {
        let table = table();
        let socket = table.open();
        assert!(table.apply(socket.id(), SockOpt::Enable(None)).is_err());
    }

    #[test]
    fn weight_out_of_range_is_rejected() {
        let table = table();
        let socket = table.open();
        assert!(table.apply(socket.id(), SockOpt::SetWeight(0)).is_err());
        assert!(table.apply(socket.id(), SockOpt::SetWeight(super::MAX_WEIGHT + 1)).is_err());
        assert!(table.apply(socket.id(), SockOpt::SetWeight(3)).is_ok());
        assert_eq!(socket.weight(), 3);
    }

    #[test]
    fn group_join_then_stats_round_trip() {
        let table = table();
        let socket = table.open();
        let joined = table
            .apply(
                socket.id(),
                SockOpt::GroupJoin(crate::sockopt::GroupJoinArgs {
                    gid: None,
                    class_mask: 1,
                    policy: Policy::Shared,
                }),
            )
            .unwrap();
        let SockOptResult::GroupJoined(gid) = joined else {
            panic!("expected GroupJoined");
        };
        let stats = table.apply(socket.id(), SockOpt::GroupStats(gid)).unwrap();
        assert!(matches!(stats, SockOptResult::GroupStats(_)));
    }

    #[test]
    fn close_leaves_every_joined_group() {
        let table = table();
        let socket = table.open();
        let sid = socket.id();
        let SockOptResult::GroupJoined(gid) = table
            .apply(
                sid,
                SockOpt::GroupJoin(crate::sockopt::GroupJoinArgs {
                    gid: None,
                    class_mask: 1,
                    policy: Policy::Shared,
                }),
            )
            .unwrap()
        else {
            panic!("expected GroupJoined");
        };
        table.close(sid);
        assert!(table.groups.get(gid).is_none(), "leaving the table should free the group");
        assert!(table.get(sid).is_none());
    }
}
