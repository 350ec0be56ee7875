// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Monadic, high-order, and steering functions (spec.md §4.4.5, "Actions"/"steering family").
//!
//! Ground truth: `original_source/kernel/lang/monad.c`'s dispatch table, with one running
//! simplification recorded in `DESIGN.md`: the original's `forward`/`bridge`/`tee`/`tap` queue a
//! single in-kernel `sk_buff` onto a device's xmit ring immediately; here every forwarding
//! decision is only ever *recorded* onto [`net::packet::ForwardingLog`] and the engine (C7)
//! flushes it once per batch, so the distinction between "eager" and "lazy" forwarding collapses
//! to whether the socket still gets a copy.

use std::hash::{Hash, Hasher};

use ahash::AHasher;
use net::headers::{Net, Transport, TryEth, TryHeaders, TryIp, TryIpv4, TryTcp, TryTransport, TryUdp};
use net::packet::{Action, ForwardTarget, HwQueue, InterfaceId, Packet};

use crate::arg::Arg;
use crate::eval::{NodeCtx, Step};

fn require_device(arg: &Arg) -> (InterfaceId, HwQueue) {
    match arg {
        Arg::Device { ifindex, queue } => (
            InterfaceId::new(*ifindex),
            HwQueue::new(queue.unwrap_or(0)),
        ),
        _ => unreachable!("validated: symbol/arg pairing is fixed by registration"),
    }
}

fn require_u32(arg: &Arg) -> u32 {
    match arg {
        Arg::U32(v) => *v,
        _ => unreachable!("validated: symbol/arg pairing is fixed by registration"),
    }
}

fn require_i32(arg: &Arg) -> i32 {
    match arg {
        Arg::I32(v) => *v,
        _ => unreachable!("validated: symbol/arg pairing is fixed by registration"),
    }
}

fn require_counter(arg: &Arg) -> &std::sync::Arc<std::sync::atomic::AtomicU64> {
    match arg {
        Arg::Counter(c) => c,
        _ => unreachable!("validated: symbol/arg pairing is fixed by registration"),
    }
}

fn require_steer_net(arg: &Arg) -> (&lpm::prefix::Prefix, Option<u16>, Option<u16>) {
    match arg {
        Arg::SteerNet {
            net,
            port,
            src_port,
        } => (net, *port, *src_port),
        _ => unreachable!("validated: symbol/arg pairing is fixed by registration"),
    }
}

fn require_field(arg: &Arg) -> (u16, u8) {
    match arg {
        Arg::Field { offset, size } => (*offset, *size),
        _ => unreachable!("validated: symbol/arg pairing is fixed by registration"),
    }
}

/// `unit`: the identity monadic function. Always falls through to the next node's `right` link.
pub fn unit<Buf: net::buffer::PacketBufferMut>(
    _pkt: &mut Packet<Buf>,
    _ctx: &NodeCtx<'_>,
) -> Step {
    Step::Continue { right: true }
}

/// `ip`: pass IPv4 packets, drop everything else.
pub fn ip<Buf: net::buffer::PacketBufferMut>(pkt: &mut Packet<Buf>, _ctx: &NodeCtx<'_>) -> Step {
    guard(pkt, pkt.try_ipv4().is_some())
}

/// `udp`: pass UDP packets, drop everything else.
pub fn udp<Buf: net::buffer::PacketBufferMut>(pkt: &mut Packet<Buf>, _ctx: &NodeCtx<'_>) -> Step {
    guard(pkt, pkt.try_udp().is_some())
}

/// `tcp`: pass TCP packets, drop everything else.
pub fn tcp<Buf: net::buffer::PacketBufferMut>(pkt: &mut Packet<Buf>, _ctx: &NodeCtx<'_>) -> Step {
    guard(pkt, pkt.try_tcp().is_some())
}

fn guard<Buf: net::buffer::PacketBufferMut>(pkt: &mut Packet<Buf>, keep: bool) -> Step {
    if !keep {
        pkt.get_meta_mut().fanout.action = Action::Drop;
    }
    Step::Continue { right: true }
}

/// `kernel`: deliver (also) to the host network stack.
pub fn kernel<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    _ctx: &NodeCtx<'_>,
) -> Step {
    pkt.get_meta_mut().fwd_log.mark_to_kernel();
    Step::Continue { right: true }
}

/// `broadcast`: deliver to every socket in the group's eligible set.
pub fn broadcast<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    _ctx: &NodeCtx<'_>,
) -> Step {
    pkt.get_meta_mut().fanout.action = Action::Copy;
    Step::Continue { right: true }
}

/// `drop`: no socket, no device will see this packet.
pub fn drop_fn<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    _ctx: &NodeCtx<'_>,
) -> Step {
    pkt.get_meta_mut().fanout.action = Action::Drop;
    Step::Halt
}

/// `forward(dev)`: forward exclusively to `dev`; the packet is not delivered to any socket.
pub fn forward<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    ctx: &NodeCtx<'_>,
) -> Step {
    let (ifindex, queue) = require_device(ctx.arg);
    pkt.get_meta_mut().fwd_log.push(ForwardTarget { ifindex, queue });
    pkt.get_meta_mut().fanout.action = Action::Drop;
    Step::Continue { right: true }
}

/// `forwardIO(dev)`: the original's eager, single-packet variant of `forward`. With forwarding
/// always deferred to the engine's batch flush (see module docs) this has no distinct behavior
/// from [`forward`].
pub fn forward_io<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    ctx: &NodeCtx<'_>,
) -> Step {
    forward(pkt, ctx)
}

/// `bridge(dev)`: forward a copy to `dev`, but still deliver to the group's eligible sockets.
pub fn bridge<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    ctx: &NodeCtx<'_>,
) -> Step {
    let (ifindex, queue) = require_device(ctx.arg);
    pkt.get_meta_mut().fwd_log.push(ForwardTarget { ifindex, queue });
    Step::Continue { right: true }
}

/// `tee(dev, pred)`: when `pred` holds, behave like [`bridge`] (copy out, keep the socket
/// delivery); otherwise fall through unchanged.
pub fn tee<Buf: net::buffer::PacketBufferMut>(pkt: &mut Packet<Buf>, ctx: &NodeCtx<'_>) -> Step {
    if ctx.predicate {
        let (ifindex, queue) = require_device(ctx.arg);
        pkt.get_meta_mut().fwd_log.push(ForwardTarget { ifindex, queue });
    }
    Step::Continue { right: true }
}

/// `tap(dev, pred)`: when `pred` holds, behave like [`forward`] (steal the packet for `dev`
/// only); otherwise fall through unchanged.
pub fn tap<Buf: net::buffer::PacketBufferMut>(pkt: &mut Packet<Buf>, ctx: &NodeCtx<'_>) -> Step {
    if ctx.predicate {
        let (ifindex, queue) = require_device(ctx.arg);
        pkt.get_meta_mut().fwd_log.push(ForwardTarget { ifindex, queue });
        pkt.get_meta_mut().fanout.action = Action::Drop;
    }
    Step::Continue { right: true }
}

/// `mark(u32)`: overwrite the packet's user-controlled mark, read back by `has_mark`.
pub fn mark<Buf: net::buffer::PacketBufferMut>(pkt: &mut Packet<Buf>, ctx: &NodeCtx<'_>) -> Step {
    pkt.get_meta_mut().mark = require_u32(ctx.arg);
    Step::Continue { right: true }
}

/// `put_state(u32)`: overwrite the packet's user-controlled state, read back by `has_state`.
pub fn put_state<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    ctx: &NodeCtx<'_>,
) -> Step {
    pkt.get_meta_mut().state = require_u32(ctx.arg);
    Step::Continue { right: true }
}

/// `inc(i)`: add (signed) `i` to the packet's state, wrapping on overflow.
pub fn inc<Buf: net::buffer::PacketBufferMut>(pkt: &mut Packet<Buf>, ctx: &NodeCtx<'_>) -> Step {
    let delta = require_i32(ctx.arg);
    let meta = pkt.get_meta_mut();
    meta.state = meta.state.wrapping_add_signed(delta);
    Step::Continue { right: true }
}

/// `dec(i)`: subtract (signed) `i` from the packet's state, wrapping on overflow.
pub fn dec<Buf: net::buffer::PacketBufferMut>(pkt: &mut Packet<Buf>, ctx: &NodeCtx<'_>) -> Step {
    let delta = require_i32(ctx.arg);
    let meta = pkt.get_meta_mut();
    meta.state = meta.state.wrapping_add_signed(-delta);
    Step::Continue { right: true }
}

/// `log_msg`: emit a trace-level line identifying this node ran, no packet detail.
pub fn log_msg<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    _ctx: &NodeCtx<'_>,
) -> Step {
    tracing::trace!(iif = %pkt.get_meta().iif, "pfq-lang: log_msg");
    Step::Continue { right: true }
}

/// `log_packet`: emit a trace-level line with the packet's parsed headers.
pub fn log_packet<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    _ctx: &NodeCtx<'_>,
) -> Step {
    tracing::trace!(headers = ?pkt.get_headers(), "pfq-lang: log_packet");
    Step::Continue { right: true }
}

/// `log_buff`: emit a trace-level line with the packet's raw bytes.
pub fn log_buff<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    _ctx: &NodeCtx<'_>,
) -> Step {
    let len = pkt.get_buf().as_ref().map_or(0, |b| b.as_ref().len());
    tracing::trace!(len, "pfq-lang: log_buff");
    Step::Continue { right: true }
}

fn steer(pkt: &mut Packet<impl net::buffer::PacketBufferMut>, hash: u64) -> Step {
    let fanout = &mut pkt.get_meta_mut().fanout;
    fanout.action = Action::Steer;
    fanout.hash = hash;
    Step::Continue { right: true }
}

/// Init hook for `steer_rrobin`: materializes the shared round-robin cursor at compile time
/// (spec.md §4.4.3 step 4), replacing whatever placeholder argument the descriptor carried.
pub fn init_rrobin_counter(arg: &mut Arg) -> Result<(), symtab::SymtabError> {
    *arg = Arg::Counter(std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0)));
    Ok(())
}

/// `steer_rrobin`: ignore the packet entirely and rotate through the eligible set by a shared
/// counter materialized at compile time (the node's `init` hook, spec.md §4.4.3 step 4).
pub fn steer_rrobin<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    ctx: &NodeCtx<'_>,
) -> Step {
    let counter = require_counter(ctx.arg);
    let hash = counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    steer(pkt, hash)
}

/// `steer_link`: steer on the frame's source/destination MAC pair.
pub fn steer_link<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    _ctx: &NodeCtx<'_>,
) -> Step {
    let mut hasher = AHasher::default();
    if let Some(eth) = pkt.try_eth() {
        eth.source().hash(&mut hasher);
        eth.destination().hash(&mut hasher);
    }
    let hash = hasher.finish();
    steer(pkt, hash)
}

/// `steer_vlan`: steer on the outermost VLAN tag's VID (untagged frames all land in one bucket).
pub fn steer_vlan<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    _ctx: &NodeCtx<'_>,
) -> Step {
    let hash = pkt
        .get_headers()
        .vlan
        .first()
        .map_or(0, |v| u64::from(u16::from(v.vid())));
    steer(pkt, hash)
}

fn hash_ip_addrs_only(pkt: &Packet<impl net::buffer::PacketBufferMut>) -> u64 {
    let mut hasher = AHasher::default();
    if let Some(ip) = pkt.try_ip() {
        match ip {
            Net::Ipv4(v4) => {
                v4.source().hash(&mut hasher);
                v4.destination().hash(&mut hasher);
            }
            Net::Ipv6(v6) => {
                v6.source().hash(&mut hasher);
                v6.destination().hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

/// `steer_ip`: steer IPv4 traffic on its (source, destination) address pair.
pub fn steer_ip<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    _ctx: &NodeCtx<'_>,
) -> Step {
    let hash = hash_ip_addrs_only(pkt);
    steer(pkt, hash)
}

/// `steer_ip6`: steer IPv6 traffic on its (source, destination) address pair. Shares its
/// implementation with `steer_ip`: both hash whichever IP version is actually present.
pub fn steer_ip6<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    _ctx: &NodeCtx<'_>,
) -> Step {
    let hash = hash_ip_addrs_only(pkt);
    steer(pkt, hash)
}

/// `steer_flow`: steer on the full 5-tuple, direction-independent (a flow's forward and return
/// traffic land in the same bucket). Grounded on the symmetric-hash pattern used elsewhere in
/// this workspace for bidirectional flow matching: each endpoint is hashed through a
/// direction-blind combinator (XOR) instead of a plain ordered hash.
pub fn steer_flow<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    _ctx: &NodeCtx<'_>,
) -> Step {
    let hash = match pkt.try_ip() {
        Some(Net::Ipv4(ip)) => {
            let mut addr_hasher = AHasher::default();
            ip.source().hash(&mut addr_hasher);
            let src_addr_hash = addr_hasher.finish();
            let mut addr_hasher = AHasher::default();
            ip.destination().hash(&mut addr_hasher);
            let dst_addr_hash = addr_hasher.finish();

            let (src_port_hash, dst_port_hash) = match pkt.try_transport() {
                Some(Transport::Tcp(tcp)) => (
                    u64::from(u16::from(tcp.source())),
                    u64::from(u16::from(tcp.destination())),
                ),
                Some(Transport::Udp(udp)) => (
                    u64::from(u16::from(udp.source())),
                    u64::from(u16::from(udp.destination())),
                ),
                _ => (0, 0),
            };
            (src_addr_hash ^ src_port_hash) ^ (dst_addr_hash ^ dst_port_hash)
        }
        _ => 0,
    };
    steer(pkt, hash)
}

/// `steer_rtp`: the original keys on the RTP/SRTP SSRC carried in the UDP payload; without a
/// payload-inspection API on this buffer type, this falls back to `steer_flow`'s UDP 4-tuple,
/// which still keeps one media stream's packets together (documented in `DESIGN.md`).
pub fn steer_rtp<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    ctx: &NodeCtx<'_>,
) -> Step {
    steer_flow(pkt, ctx)
}

/// `steer_net(net, p, sp)`: steer on the destination address (masked to `net`), optionally
/// folding in the destination and/or source port.
pub fn steer_net<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    ctx: &NodeCtx<'_>,
) -> Step {
    let (net, port, src_port) = require_steer_net(ctx.arg);
    let mut hasher = AHasher::default();
    if let Some(ip) = pkt.try_ip() {
        let dst = ip.dst_addr();
        if net.covers_addr(&dst) {
            dst.hash(&mut hasher);
        }
    }
    if port.is_some() || src_port.is_some() {
        match pkt.try_transport() {
            Some(Transport::Tcp(tcp)) => {
                if port.is_some() {
                    tcp.destination().hash(&mut hasher);
                }
                if src_port.is_some() {
                    tcp.source().hash(&mut hasher);
                }
            }
            Some(Transport::Udp(udp)) => {
                if port.is_some() {
                    udp.destination().hash(&mut hasher);
                }
                if src_port.is_some() {
                    udp.source().hash(&mut hasher);
                }
            }
            _ => {}
        }
    }
    steer(pkt, hasher.finish())
}

/// `steer_field(off, sz)`: steer on a raw, protocol-agnostic field read directly out of the
/// frame (1, 2, 4, or 8 bytes at a fixed byte offset). Out-of-bounds reads steer to bucket 0
/// rather than panicking, matching the original's bounds-checked `skb_header_pointer`.
pub fn steer_field<Buf: net::buffer::PacketBufferMut>(
    pkt: &mut Packet<Buf>,
    ctx: &NodeCtx<'_>,
) -> Step {
    let (offset, size) = require_field(ctx.arg);
    let offset = offset as usize;
    let size = (size as usize).min(8);
    let hash = pkt
        .get_buf()
        .as_ref()
        .map(AsRef::as_ref)
        .and_then(|bytes: &[u8]| bytes.get(offset..offset + size))
        .map_or(0, |field| {
            let mut buf = [0u8; 8];
            buf[..field.len()].copy_from_slice(field);
            u64::from_be_bytes(buf)
        });
    steer(pkt, hash)
}

#[cfg(test)]
mod test {
    use super::*;
    use net::buffer::TestBuffer;
    use net::packet::test_utils::build_test_udp_ipv4_packet;

    fn ctx(arg: &Arg) -> NodeCtx<'_> {
        NodeCtx {
            arg,
            predicate: false,
        }
    }

    #[test]
    fn drop_sets_drop_action_and_halts() {
        let mut pkt = build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 1, 2);
        let arg = Arg::None;
        let step = drop_fn(&mut pkt, &ctx(&arg));
        assert_eq!(step, Step::Halt);
        assert!(pkt.get_meta().fanout.action.is_drop());
    }

    #[test]
    fn non_udp_guard_drops_tcp_only_packet() {
        let mut pkt = build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 1, 2);
        let arg = Arg::None;
        let step = tcp(&mut pkt, &ctx(&arg));
        assert_eq!(step, Step::Continue { right: true });
        assert!(pkt.get_meta().fanout.action.is_drop());
    }

    #[test]
    fn mark_then_has_mark_round_trips() {
        let mut pkt = build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 1, 2);
        let arg = Arg::U32(7);
        mark(&mut pkt, &ctx(&arg));
        assert_eq!(pkt.get_meta().mark, 7);
    }

    #[test]
    fn steer_flow_is_direction_independent() {
        let mut fwd = build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 10, 20);
        let mut rev = build_test_udp_ipv4_packet("10.0.0.2", "10.0.0.1", 20, 10);
        let arg = Arg::None;
        steer_flow(&mut fwd, &ctx(&arg));
        steer_flow(&mut rev, &ctx(&arg));
        assert_eq!(fwd.get_meta().fanout.hash, rev.get_meta().fanout.hash);
        assert!(fwd.get_meta().fanout.action.is_steering());
    }

    #[test]
    fn forward_drops_from_socket_delivery_bridge_does_not() {
        let mut pkt = build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 1, 2);
        let arg = Arg::Device {
            ifindex: 3,
            queue: None,
        };
        forward(&mut pkt, &ctx(&arg));
        assert!(pkt.get_meta().fanout.action.is_drop());
        assert_eq!(pkt.get_meta().fwd_log.num_targets(), 1);

        let mut pkt = build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 1, 2);
        bridge(&mut pkt, &ctx(&arg));
        assert!(!pkt.get_meta().fanout.action.is_drop());
        assert_eq!(pkt.get_meta().fwd_log.num_targets(), 1);
    }
}
