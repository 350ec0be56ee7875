// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Leaf predicates (spec.md §4.4.5, "Filters/predicates").
//!
//! Ground truth: `original_source/kernel/lang/predicate.h`. Each function here keeps that file's
//! name and logic, translated from raw `skb_ip_header_pointer` probing to the already-parsed
//! [`net::packet::Headers`] this dataplane carries — there is no "header not yet pulled into
//! linear data" case to account for, so the original's `skb_header_available` fallback collapses
//! to a plain `Option::is_some` check.

use net::headers::{Net, TryEth, TryHeaders, TryIcmp, TryIp, TryIpv4, TryIpv6, TryTcp, TryUdp};
use net::packet::Packet;
use net::buffer::PacketBufferMut;

use crate::arg::Arg;

fn require_u8(arg: &Arg) -> u8 {
    match arg {
        Arg::U8(v) => *v,
        _ => unreachable!("validated: symbol/arg pairing is fixed by registration"),
    }
}

fn require_u16(arg: &Arg) -> u16 {
    match arg {
        Arg::U16(v) => *v,
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

fn require_cidr(arg: &Arg) -> &lpm::prefix::Prefix {
    match arg {
        Arg::Cidr(p) => p,
        _ => unreachable!("validated: symbol/arg pairing is fixed by registration"),
    }
}

/// `is_ip` in the original: true for any IPv4 packet.
pub fn ip<Buf: PacketBufferMut>(pkt: &Packet<Buf>, _arg: &Arg) -> bool {
    pkt.try_ipv4().is_some()
}

/// `is_ip6` in the original.
pub fn ip6<Buf: PacketBufferMut>(pkt: &Packet<Buf>, _arg: &Arg) -> bool {
    pkt.try_ipv6().is_some()
}

/// `is_udp` in the original, minus the header-availability probe (already parsed).
pub fn udp<Buf: PacketBufferMut>(pkt: &Packet<Buf>, _arg: &Arg) -> bool {
    pkt.try_udp().is_some()
}

/// `is_tcp` in the original.
pub fn tcp<Buf: PacketBufferMut>(pkt: &Packet<Buf>, _arg: &Arg) -> bool {
    pkt.try_tcp().is_some()
}

/// `is_icmp` in the original. IPv4 ICMP only, matching the original's scope.
pub fn icmp<Buf: PacketBufferMut>(pkt: &Packet<Buf>, _arg: &Arg) -> bool {
    pkt.try_icmp().is_some()
}

/// `is_flow` in the original: IPv4 with a TCP or UDP transport header.
pub fn flow<Buf: PacketBufferMut>(pkt: &Packet<Buf>, _arg: &Arg) -> bool {
    matches!(pkt.try_ip(), Some(Net::Ipv4(_))) && (pkt.try_tcp().is_some() || pkt.try_udp().is_some())
}

/// `has_vlan` in the original: at least one VLAN tag present.
pub fn has_vlan<Buf: PacketBufferMut>(pkt: &Packet<Buf>, _arg: &Arg) -> bool {
    !pkt.get_headers().vlan.is_empty()
}

/// `vlan` in the original: a separate catalogue entry with the identical test as `has_vlan`
/// (`pf_q-functional.c` registers both names against the same `bool_vlan` implementation).
/// Kept as its own symbol rather than collapsed into `has_vlan` so existing programs that
/// reference either name keep compiling.
pub fn vlan<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    has_vlan(pkt, arg)
}

/// `no_frag`: negation of the original's `is_frag`. Non-IP packets are vacuously unfragmented.
pub fn no_frag<Buf: PacketBufferMut>(pkt: &Packet<Buf>, _arg: &Arg) -> bool {
    match pkt.try_ipv4() {
        Some(ip) => !ip.more_fragments() && ip.fragment_offset().value() == 0,
        None => true,
    }
}

/// `no_more_frag`: negation of the original's `is_more_frag`.
pub fn no_more_frag<Buf: PacketBufferMut>(pkt: &Packet<Buf>, _arg: &Arg) -> bool {
    match pkt.try_ipv4() {
        Some(ip) => ip.fragment_offset().value() == 0,
        None => true,
    }
}

/// `is_l3_proto`: compares the Ethernet header's ethertype.
pub fn is_l3_proto<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    let want = require_u16(arg);
    pkt.try_eth().is_some_and(|eth| eth.ether_type().raw() == want)
}

/// `is_l4_proto`: compares the IP header's next-header/protocol field.
pub fn is_l4_proto<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    let want = require_u8(arg);
    pkt.try_ip().is_some_and(|ip| ip.next_header().as_u8() == want)
}

/// `has_src_port`: TCP or UDP source port equals `arg`.
pub fn has_src_port<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    let want = require_u16(arg);
    if let Some(tcp) = pkt.try_tcp() {
        return u16::from(tcp.source()) == want;
    }
    if let Some(udp) = pkt.try_udp() {
        return u16::from(udp.source()) == want;
    }
    false
}

/// `has_dst_port`: TCP or UDP destination port equals `arg`.
pub fn has_dst_port<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    let want = require_u16(arg);
    if let Some(tcp) = pkt.try_tcp() {
        return u16::from(tcp.destination()) == want;
    }
    if let Some(udp) = pkt.try_udp() {
        return u16::from(udp.destination()) == want;
    }
    false
}

/// `has_port`: either direction matches (original: `has_src_port || has_dst_port`).
pub fn has_port<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    has_src_port(pkt, arg) || has_dst_port(pkt, arg)
}

/// `has_addr`: either source or destination address is covered by the CIDR.
pub fn has_addr<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    has_src_addr(pkt, arg) || has_dst_addr(pkt, arg)
}

/// `has_src_addr`.
pub fn has_src_addr<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    let cidr = require_cidr(arg);
    pkt.try_ip().is_some_and(|ip| cidr.covers_addr(&ip.src_addr()))
}

/// `has_dst_addr`.
pub fn has_dst_addr<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    let cidr = require_cidr(arg);
    pkt.try_ip().is_some_and(|ip| cidr.covers_addr(&ip.dst_addr()))
}

/// `has_vid`: the outermost VLAN tag's VID equals `arg`.
pub fn has_vid<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    let want = require_i32(arg);
    if want < 0 || want > i32::from(u16::MAX) {
        return false;
    }
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let want = want as u16;
    pkt.get_headers()
        .vlan
        .first()
        .is_some_and(|v| u16::from(v.vid()) == want)
}

/// `has_mark`.
pub fn has_mark<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    pkt.get_meta().mark == require_u32(arg)
}

/// `has_state`.
pub fn has_state<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    pkt.get_meta().state == require_u32(arg)
}

/// Bloom-family predicate, keyed on the packet's source address.
///
/// Not grounded in `original_source` (no bloom filter module was retrieved); derived from
/// spec.md §4.4.5's "bloom family" entry alone (see `DESIGN.md`).
pub fn bloom_src<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    let filter = match arg {
        Arg::Bloom(f) => f,
        _ => unreachable!("validated: symbol/arg pairing is fixed by registration"),
    };
    pkt.try_ip()
        .is_some_and(|ip| filter.contains(crate::bloom::ip_addr_key(ip.src_addr())))
}

/// Bloom-family predicate, keyed on the packet's destination address.
pub fn bloom_dst<Buf: PacketBufferMut>(pkt: &Packet<Buf>, arg: &Arg) -> bool {
    let filter = match arg {
        Arg::Bloom(f) => f,
        _ => unreachable!("validated: symbol/arg pairing is fixed by registration"),
    };
    pkt.try_ip()
        .is_some_and(|ip| filter.contains(crate::bloom::ip_addr_key(ip.dst_addr())))
}
