// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![allow(missing_docs)] // TODO

use arrayvec::ArrayVec;
use bitflags::bitflags;
use std::fmt::Display;

/// Every network interface is identified by a small dense index.
///
/// This mirrors the kernel's `ifindex`: it is the key used by the device→group map and by the
/// per-packet forwarding log, not a globally unique handle.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct InterfaceId(u32);
#[allow(unused)]
impl InterfaceId {
    #[must_use]
    pub fn new(val: u32) -> Self {
        Self(val)
    }
    #[must_use]
    pub fn get_id(&self) -> u32 {
        self.0
    }
}

impl Display for InterfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "if{}", self.0)
    }
}

impl From<u32> for InterfaceId {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

/// The hardware receive/transmit queue a packet arrived on (or should be sent on).
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct HwQueue(u8);
impl HwQueue {
    #[must_use]
    pub fn new(val: u8) -> Self {
        Self(val)
    }
    #[must_use]
    pub fn get(&self) -> u8 {
        self.0
    }
}

impl From<u8> for HwQueue {
    fn from(val: u8) -> Self {
        Self(val)
    }
}

/// The verdict produced by a monadic step of a pfq-lang program.
///
/// `Pass`/`Continue` both keep evaluating; the distinction is the one a program author writes
/// down (a property-only predicate step vs. an explicit "keep going"), both fold to "follow the
/// successor link" here. `Steer` carries no payload: the hash to steer on lives in
/// [`Fanout::hash`].
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Action {
    /// Keep the packet, fall through to the next successor.
    #[default]
    Pass,
    /// Drop the packet; no socket, no device will see it.
    Drop,
    /// Deliver to every socket in the eligible set.
    Copy,
    /// Deliver to exactly one socket in the eligible set, chosen by hashing.
    Steer,
    /// Synonym for `Pass`, kept distinct so program authors can express "no verdict yet".
    Continue,
    /// Stop evaluating the program immediately, keeping the current fan-out decision.
    Stop,
}

impl Action {
    #[must_use]
    pub fn is_drop(self) -> bool {
        matches!(self, Action::Drop)
    }
    #[must_use]
    pub fn is_stop(self) -> bool {
        matches!(self, Action::Stop)
    }
    #[must_use]
    pub fn is_steering(self) -> bool {
        matches!(self, Action::Steer)
    }
}

/// The default traffic class bit, used when a program never narrows `class_mask`.
pub const CLASS_DEFAULT: u64 = 1;

/// Fan-out decision accumulated while a pfq-lang program runs against a packet.
///
/// This is the "monad" of spec.md's §4.4/§9: a plain mutable record threaded through evaluation,
/// reset once per `(group, packet)` pair by the engine before the program runs.
#[derive(Debug, Copy, Clone)]
pub struct Fanout {
    /// Bitmask of traffic classes this packet belongs to for eligible-set computation.
    pub class_mask: u64,
    /// The dispatch mode chosen by the program (copy-to-all vs. steer-to-one).
    pub action: Action,
    /// The hash value a `steer_*` action computed; consumed by the engine's fold step.
    pub hash: u64,
}

impl Default for Fanout {
    fn default() -> Self {
        Self {
            class_mask: CLASS_DEFAULT,
            action: Action::Copy,
            hash: 0,
        }
    }
}

/// Maximum number of forwarding targets a single packet can accumulate in one batch pass.
pub const MAX_FORWARD_LOG: usize = 8;

/// One forwarding target recorded by a `forward`/`forwardIO`/`bridge`/`tee`/`tap` action.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ForwardTarget {
    pub ifindex: InterfaceId,
    pub queue: HwQueue,
}

/// Ordered list of forwarding targets accumulated for one packet, plus the "send to host stack"
/// flag, flushed by the engine once per batch (spec.md §4.1/§4.5).
#[derive(Debug, Default, Clone)]
pub struct ForwardingLog {
    targets: ArrayVec<ForwardTarget, MAX_FORWARD_LOG>,
    to_kernel: bool,
}

impl ForwardingLog {
    /// Record a lazy forward to `(ifindex, queue)`. Silently drops the request past capacity;
    /// the caller is expected to have sized `MAX_FORWARD_LOG` generously (see `forward` docs).
    pub fn push(&mut self, target: ForwardTarget) {
        let _ = self.targets.try_push(target);
    }

    /// Mark this packet for delivery to the host network stack.
    pub fn mark_to_kernel(&mut self) {
        self.to_kernel = true;
    }

    #[must_use]
    pub fn to_kernel(&self) -> bool {
        self.to_kernel
    }

    #[must_use]
    pub fn targets(&self) -> &[ForwardTarget] {
        &self.targets
    }

    #[must_use]
    pub fn num_targets(&self) -> usize {
        self.targets.len()
    }

    pub fn clear(&mut self) {
        self.targets.clear();
        self.to_kernel = false;
    }
}

#[allow(unused)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DoneReason {
    /// catch-all for internal issues
    InternalFailure,
    /// the packet does not conform / is malformed and could not be classified
    Malformed,
    /// the packet was administratively filtered (BPF filter, VLAN filter, or program `drop`)
    Filtered,
    /// there exists no support to handle this type of packet
    Unhandled,
    /// the packet buffer was delivered (to a socket, a device, or the kernel)
    Delivered,
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    struct MetaFlags: u16 {
        const INITIALIZED = 0b0000_0001; /* initialized */
        const DIRECT      = 0b0000_0010; /* captured directly from driver, not the kernel stack */
        const KEEP        = 0b0001_0000; /* Keep the Packet even if it should be dropped */
    }
}

#[allow(unused)]
#[derive(Debug, Clone)]
pub struct PacketMeta {
    flags: MetaFlags,
    /// the interface this frame was received on
    pub iif: InterfaceId,
    /// the hardware queue this frame was received on
    pub hw_queue: HwQueue,
    /// per-packet control block: fan-out state threaded through pfq-lang evaluation
    pub fanout: Fanout,
    /// groups whose devmap row matched this packet's `(iif, hw_queue)`
    pub group_mask: u64,
    /// user-controlled 32-bit scalar, set by `put_state`/read by `has_state`
    pub state: u32,
    /// user-controlled 32-bit scalar, set by `mark`/read by `has_mark`
    pub mark: u32,
    /// ordered forwarding targets accumulated by lazy `forward`/`bridge`/`tee`/`tap` actions
    pub fwd_log: ForwardingLog,
    pub done: Option<DoneReason>,
}

impl Default for PacketMeta {
    fn default() -> Self {
        Self::new(false)
    }
}

impl PacketMeta {
    #[must_use]
    pub(crate) fn new(keep: bool) -> Self {
        let mut flags = MetaFlags::INITIALIZED;
        if keep {
            flags |= MetaFlags::KEEP;
        }
        Self {
            flags,
            iif: InterfaceId::default(),
            hw_queue: HwQueue::default(),
            fanout: Fanout::default(),
            group_mask: 0,
            state: 0,
            mark: 0,
            fwd_log: ForwardingLog::default(),
            done: None,
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.flags.contains(MetaFlags::INITIALIZED)
    }
    #[must_use]
    pub fn direct(&self) -> bool {
        self.flags.contains(MetaFlags::DIRECT)
    }
    pub fn set_direct(&mut self, value: bool) {
        if value {
            self.flags.insert(MetaFlags::DIRECT);
        } else {
            self.flags.remove(MetaFlags::DIRECT);
        }
    }
    #[must_use]
    pub fn keep(&self) -> bool {
        self.flags.contains(MetaFlags::KEEP)
    }
    pub fn set_keep(&mut self, value: bool) {
        if value {
            self.flags.insert(MetaFlags::KEEP);
        } else {
            self.flags.remove(MetaFlags::KEEP);
        }
    }

    /// Reset the per-group monad state before running a group's program against this packet.
    ///
    /// Mirrors `pfq_run`'s reset of `action.class_mask`/`type`/`attr` before each group pass.
    pub fn reset_fanout(&mut self) {
        self.fanout = Fanout::default();
        self.state = 0;
    }
}

#[cfg(test)]
pub mod test {
    use super::{Action, CLASS_DEFAULT, ForwardTarget, ForwardingLog, HwQueue, InterfaceId};

    #[test]
    fn forwarding_log_accumulates_targets_in_order() {
        let mut log = ForwardingLog::default();
        log.push(ForwardTarget {
            ifindex: InterfaceId::new(1),
            queue: HwQueue::new(0),
        });
        log.push(ForwardTarget {
            ifindex: InterfaceId::new(2),
            queue: HwQueue::new(3),
        });
        assert_eq!(log.num_targets(), 2);
        assert_eq!(log.targets()[0].ifindex, InterfaceId::new(1));
        assert_eq!(log.targets()[1].queue, HwQueue::new(3));
        assert!(!log.to_kernel());
        log.mark_to_kernel();
        assert!(log.to_kernel());
    }

    #[test]
    fn default_fanout_is_copy_with_default_class() {
        let fanout = super::Fanout::default();
        assert_eq!(fanout.class_mask, CLASS_DEFAULT);
        assert_eq!(fanout.action, Action::Copy);
    }

    #[test]
    fn action_predicates() {
        assert!(Action::Drop.is_drop());
        assert!(Action::Stop.is_stop());
        assert!(Action::Steer.is_steering());
        assert!(!Action::Copy.is_steering());
    }
}
