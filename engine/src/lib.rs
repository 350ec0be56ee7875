// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(
    unsafe_code,
    missing_docs,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::module_name_repetitions)]

//! The per-CPU batched Rx engine (C7, spec.md §4.5): the hot-path loop that ties together the
//! device→group map (`devmap`, C3), the group table (`group`, C4), compiled pfq-lang programs
//! (`pfq-lang`, C5), the GC batch (`gc`, C2), and the shared Rx queues (`shmem-queue`, C6) a
//! captured frame is ultimately delivered through.
//!
//! [`run::Engine`] is the per-CPU worker: it owns one [`gc::PerCpuBatch`] and one
//! [`steer::SteerCache`] (never shared across CPUs, spec.md §9), and reads the process-wide
//! [`devmap::DevMap`], [`group::GroupTable`], and [`socket::SocketTable`] every worker shares.
//! [`fold`] is the hash-selection arithmetic the steering dispatch uses; [`program`] bridges a
//! validated `socket::SockOpt::GroupFunction` descriptor to a compiled, installed program.

pub mod fold;
pub mod program;
mod run;
pub mod steer;

pub use run::{BatchStats, Engine, ForwardSink, HostStackSink};

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use devmap::{DevMap, DevMapAction, QueueSelector};
    use group::{GroupId, Policy};
    use net::buffer::TestBuffer;
    use net::packet::test_utils::{
        build_test_arp_frame, build_test_tcp_ipv4_packet, build_test_udp_ipv4_packet,
        build_test_vlan_udp_ipv4_packet,
    };
    use pfq_lang::{Arg, CombinatorOp, FunctionalDescr, ProgramDescr};
    use socket::{GroupJoinArgs, SockOpt, SocketTable, VlanFiltArgs, VlanFiltToggleArgs};

    use crate::program::ProgramRegistry;
    use crate::run::{Engine, ForwardSink, HostStackSink};

    struct RecordingForward {
        sent: Mutex<Vec<(u32, u8, Vec<u8>)>>,
    }

    impl RecordingForward {
        fn new() -> Self {
            Self { sent: Mutex::new(Vec::new()) }
        }
        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl ForwardSink for RecordingForward {
        fn forward(&self, ifindex: net::packet::InterfaceId, queue: net::packet::HwQueue, frames: &[&[u8]]) -> usize {
            let mut guard = self.sent.lock().unwrap();
            for frame in frames {
                guard.push((ifindex.get_id(), queue.get(), frame.to_vec()));
            }
            frames.len()
        }
    }

    struct NoopHost;
    impl HostStackSink for NoopHost {
        fn inject(&self, _frame: &[u8]) {}
    }

    fn testbed() -> (Arc<DevMap>, Arc<group::GroupTable>, Arc<SocketTable>) {
        let devmap = Arc::new(DevMap::new(8, 4));
        let groups = Arc::new(group::GroupTable::new(1));
        let sockets = Arc::new(SocketTable::new(Arc::clone(&groups), Arc::clone(&devmap)));
        (devmap, groups, sockets)
    }

    fn join_group(sockets: &SocketTable, gid: Option<GroupId>) -> (Arc<socket::Socket>, GroupId) {
        let socket = sockets.open();
        let result = sockets
            .apply(
                socket.id(),
                SockOpt::GroupJoin(GroupJoinArgs { gid, class_mask: 1, policy: Policy::Shared }),
            )
            .unwrap();
        let socket::SockOptResult::GroupJoined(gid) = result else {
            panic!("expected GroupJoined");
        };
        (socket, gid)
    }

    fn enable(socket: &socket::Socket, sockets: &SocketTable) {
        sockets.apply(socket.id(), SockOpt::Enable(Some(0))).unwrap();
    }

    fn bind_device(devmap: &DevMap, ifindex: u32, gid: GroupId) {
        devmap.update(DevMapAction::Set, ifindex, QueueSelector::Any, gid.index()).unwrap();
    }

    fn install_single_node(registry: &ProgramRegistry<TestBuffer>, gid: GroupId, symbol: &str) {
        let descr = ProgramDescr {
            entry_point: 0,
            nodes: vec![FunctionalDescr::Monadic {
                symbol: symbol.to_string(),
                arg: Arg::None,
                right: None,
                left: None,
            }],
        };
        registry.install(gid, &descr).unwrap();
    }

    #[test]
    fn simple_pass_filter_drops_non_matching_traffic() {
        let (devmap, groups, sockets) = testbed();
        let (socket, gid) = join_group(&sockets, None);
        enable(&socket, &sockets);
        bind_device(&devmap, 1, gid);
        let registry: ProgramRegistry<TestBuffer> = ProgramRegistry::new(Arc::clone(&groups));
        install_single_node(&registry, gid, "ip");

        let mut engine: Engine<TestBuffer> = Engine::new(0, 64, Arc::clone(&devmap), Arc::clone(&groups), Arc::clone(&sockets));
        for _ in 0..60 {
            let mut pkt = build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 1, 2);
            pkt.get_meta_mut().iif = net::packet::InterfaceId::new(1);
            engine.admit(pkt);
        }
        for _ in 0..40 {
            let mut pkt = build_test_arp_frame();
            pkt.get_meta_mut().iif = net::packet::InterfaceId::new(1);
            engine.admit(pkt);
        }

        let forward = RecordingForward::new();
        let stats = engine.run_batch(&forward, &NoopHost);
        assert_eq!(stats.recv, 100);

        let group = groups.get(gid).unwrap();
        assert_eq!(group.stats().recv, 100);
        assert_eq!(group.stats().drop, 40);
        assert_eq!(forward.count(), 0);
        assert_eq!(socket.stats().recv, 60);
    }

    #[test]
    fn conditional_tee_forward_keeps_socket_copy_and_records_forward() {
        let (devmap, groups, sockets) = testbed();
        let (socket, gid) = join_group(&sockets, None);
        enable(&socket, &sockets);
        bind_device(&devmap, 1, gid);
        let registry: ProgramRegistry<TestBuffer> = ProgramRegistry::new(Arc::clone(&groups));

        let descr = ProgramDescr {
            entry_point: 0,
            nodes: vec![FunctionalDescr::HighOrder {
                symbol: "tee".to_string(),
                arg: Arg::Device { ifindex: 2, queue: None },
                pindex: 1,
                right: None,
                left: None,
            },
            FunctionalDescr::Predicate {
                symbol: "udp".to_string(),
                arg: Arg::None,
            }],
        };
        registry.install(gid, &descr).unwrap();

        let mut engine: Engine<TestBuffer> = Engine::new(0, 100, Arc::clone(&devmap), Arc::clone(&groups), Arc::clone(&sockets));
        for _ in 0..50 {
            let mut pkt = build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 1, 2);
            pkt.get_meta_mut().iif = net::packet::InterfaceId::new(1);
            engine.admit(pkt);
        }
        for _ in 0..50 {
            let mut pkt = build_test_tcp_ipv4_packet("10.0.0.1", "10.0.0.2", 1, 2);
            pkt.get_meta_mut().iif = net::packet::InterfaceId::new(1);
            engine.admit(pkt);
        }

        let forward = RecordingForward::new();
        let stats = engine.run_batch(&forward, &NoopHost);
        assert_eq!(stats.recv, 100);
        assert_eq!(forward.count(), 50);

        let group = groups.get(gid).unwrap();
        assert_eq!(group.stats().frwd, 50);
        assert_eq!(socket.stats().recv, 100);
        assert_eq!(socket.stats().frwd, 50);
    }

    #[test]
    fn vlan_filter_drops_unlisted_vids() {
        let (devmap, groups, sockets) = testbed();
        let (socket, gid) = join_group(&sockets, None);
        enable(&socket, &sockets);
        bind_device(&devmap, 1, gid);
        sockets
            .apply(socket.id(), SockOpt::GroupVlanFiltToggle(VlanFiltToggleArgs { gid, on: true }))
            .unwrap();
        sockets
            .apply(socket.id(), SockOpt::GroupVlanFilt(VlanFiltArgs { gid, vid: 100, on: true }))
            .unwrap();

        let mut engine: Engine<TestBuffer> = Engine::new(0, 64, Arc::clone(&devmap), Arc::clone(&groups), Arc::clone(&sockets));
        for _ in 0..10 {
            let mut pkt = build_test_vlan_udp_ipv4_packet(100, "10.0.0.1", "10.0.0.2", 1, 2);
            pkt.get_meta_mut().iif = net::packet::InterfaceId::new(1);
            engine.admit(pkt);
        }
        for _ in 0..10 {
            let mut pkt = build_test_vlan_udp_ipv4_packet(200, "10.0.0.1", "10.0.0.2", 1, 2);
            pkt.get_meta_mut().iif = net::packet::InterfaceId::new(1);
            engine.admit(pkt);
        }

        let forward = RecordingForward::new();
        engine.run_batch(&forward, &NoopHost);
        let group = groups.get(gid).unwrap();
        assert_eq!(group.stats().drop, 10);
    }

    #[test]
    fn bulk_forward_preserves_arrival_order() {
        let (devmap, groups, sockets) = testbed();
        let (socket, gid) = join_group(&sockets, None);
        enable(&socket, &sockets);
        bind_device(&devmap, 1, gid);
        let registry: ProgramRegistry<TestBuffer> = ProgramRegistry::new(Arc::clone(&groups));
        let descr = ProgramDescr {
            entry_point: 0,
            nodes: vec![FunctionalDescr::Monadic {
                symbol: "forward".to_string(),
                arg: Arg::Device { ifindex: 2, queue: None },
                right: None,
                left: None,
            }],
        };
        registry.install(gid, &descr).unwrap();

        let mut engine: Engine<TestBuffer> =
            Engine::new(0, 64, Arc::clone(&devmap), Arc::clone(&groups), Arc::clone(&sockets));
        for port in 1u16..=64 {
            let mut pkt = build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", port, 9999);
            pkt.get_meta_mut().iif = net::packet::InterfaceId::new(1);
            engine.admit(pkt);
        }

        let forward = RecordingForward::new();
        engine.run_batch(&forward, &NoopHost);
        assert_eq!(forward.count(), 64);
        let recorded = forward.sent.lock().unwrap();
        // UDP source port sits at a fixed offset in this crate's test frames (14-byte Eth header
        // + 20-byte bare IPv4 header); decoding it back confirms arrival order survived the
        // per-target grouping pass untouched.
        let ports: Vec<u16> = recorded
            .iter()
            .map(|(_, _, frame)| u16::from_be_bytes([frame[34], frame[35]]))
            .collect();
        let expected: Vec<u16> = (1..=64).collect();
        assert_eq!(ports, expected);
    }

    #[test]
    fn weighted_steering_splits_approximately_by_weight() {
        let (devmap, groups, sockets) = testbed();
        let first = sockets.open();
        let joined = sockets
            .apply(first.id(), SockOpt::GroupJoin(GroupJoinArgs { gid: None, class_mask: 1, policy: Policy::Shared }))
            .unwrap();
        let socket::SockOptResult::GroupJoined(gid) = joined else { panic!("expected GroupJoined") };
        enable(&first, &sockets);
        let second = sockets.open();
        sockets
            .apply(second.id(), SockOpt::GroupJoin(GroupJoinArgs { gid: Some(gid), class_mask: 1, policy: Policy::Shared }))
            .unwrap();
        enable(&second, &sockets);
        let third = sockets.open();
        sockets
            .apply(third.id(), SockOpt::GroupJoin(GroupJoinArgs { gid: Some(gid), class_mask: 1, policy: Policy::Shared }))
            .unwrap();
        enable(&third, &sockets);
        sockets.apply(third.id(), SockOpt::SetWeight(2)).unwrap();
        bind_device(&devmap, 1, gid);

        let registry: ProgramRegistry<TestBuffer> = ProgramRegistry::new(Arc::clone(&groups));
        install_single_node(&registry, gid, "steer_flow");

        let mut engine: Engine<TestBuffer> = Engine::new(0, 64, Arc::clone(&devmap), Arc::clone(&groups), Arc::clone(&sockets));
        let mut total = 0;
        for round in 0..150u16 {
            let mut pkt = build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", round, round.wrapping_mul(7));
            pkt.get_meta_mut().iif = net::packet::InterfaceId::new(1);
            if engine.admit(pkt) {
                total += 1;
            }
            if engine.batch_len() == 64 || round == 149 {
                engine.run_batch(&RecordingForward::new(), &NoopHost);
            }
        }
        assert!(total > 0);
        // Each socket's stats count is checked via group eligible-set composition elsewhere
        // (`engine::steer`'s own unit tests); this test only exercises the end-to-end wiring.
    }

    #[allow(dead_code)]
    fn unused_combinator_op_reference(_: CombinatorOp) {}
}
