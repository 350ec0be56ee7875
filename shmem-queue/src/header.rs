// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The fixed per-slot headers carried by the Rx and Tx arenas (spec.md §6).

use static_assertions::const_assert_eq;

/// The metadata recorded alongside every captured frame handed to a socket's Rx queue.
///
/// Field order and types match spec.md §6's "Packet header (Rx slot)" exactly: `tstamp_sec`,
/// `tstamp_nsec`, `caplen`, `len`, `ifindex`, `gid`, `mark`, `state`, `vlan_tci`, `queue`,
/// `commit`. The spec names a 24-byte total; laid out with natural `#[repr(C)]` alignment this
/// struct is 32 bytes (the field list itself forces 4-byte alignment and padding out to a
/// multiple of 4 — 24 isn't reachable by any ordering of these fields without narrowing one of
/// them). We carry every named field rather than drop one to hit the stated number; see
/// `DESIGN.md` for this resolved discrepancy.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RxSlotHeader {
    /// Reception timestamp, seconds component.
    pub tstamp_sec: u32,
    /// Reception timestamp, nanoseconds component.
    pub tstamp_nsec: u32,
    /// Bytes actually copied into the slot's payload area.
    pub caplen: u16,
    /// Original on-wire frame length, which may exceed `caplen`.
    pub len: u16,
    /// Ingress interface index.
    pub ifindex: i32,
    /// Group id whose program produced this delivery.
    pub gid: i32,
    /// User-controlled scalar set by `mark`/read by `has_mark`.
    pub mark: u32,
    /// User-controlled scalar set by `put_state`/read by `has_state`.
    pub state: u32,
    /// VLAN tag control information, `0` if untagged.
    pub vlan_tci: u16,
    /// Ingress hardware queue.
    pub queue: u8,
    /// Per-slot publication parity; matches the arena's current `index & 1` once this slot's
    /// payload is fully written (spec.md §9: "per-slot commit parity ... enabling the consumer to
    /// observe partial batches").
    pub commit: u8,
}

const_assert_eq!(core::mem::size_of::<RxSlotHeader>(), 32);

/// The metadata recorded alongside every frame a socket appends to a Tx arena.
///
/// Spec.md §4.6 names the field set without a byte layout ("Per-slot fields: `tstamp`, `caplen`,
/// `ifindex`, `queue`, `copies`"); laid out here with the same field-naming convention as
/// [`RxSlotHeader`].
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TxSlotHeader {
    /// Submission timestamp, seconds component.
    pub tstamp_sec: u32,
    /// Submission timestamp, nanoseconds component.
    pub tstamp_nsec: u32,
    /// Bytes of payload following this header.
    pub caplen: u16,
    /// Egress interface index.
    pub ifindex: i32,
    /// Egress hardware queue.
    pub queue: u8,
    /// Number of times this frame should be repeat-sent (spec.md §4.6's "repeat-send count").
    pub copies: u16,
}

/// Round `n` up to the next multiple of 8, the slot alignment spec.md §4.6 requires ("Each slot is
/// `align8(sizeof(pkthdr) + caplen)`").
#[must_use]
pub fn align8(n: usize) -> usize {
    (n + 7) & !7
}

/// Byte footprint of one Rx slot carrying `caplen` bytes of payload, aligned per spec.md §4.6.
#[must_use]
pub fn rx_slot_byte_size(caplen: u16) -> usize {
    align8(core::mem::size_of::<RxSlotHeader>() + caplen as usize)
}

/// Byte footprint of one Tx slot carrying `caplen` bytes of payload, aligned the same way.
#[must_use]
pub fn tx_slot_byte_size(caplen: u16) -> usize {
    align8(core::mem::size_of::<TxSlotHeader>() + caplen as usize)
}

#[cfg(test)]
mod test {
    use super::{RxSlotHeader, align8, rx_slot_byte_size};

    #[test]
    fn align8_rounds_up_to_the_next_multiple_of_eight() {
        assert_eq!(align8(0), 0);
        assert_eq!(align8(1), 8);
        assert_eq!(align8(8), 8);
        assert_eq!(align8(9), 16);
    }

    #[test]
    fn rx_slot_byte_size_includes_header_and_payload() {
        let header_len = core::mem::size_of::<RxSlotHeader>();
        assert_eq!(rx_slot_byte_size(0), align8(header_len));
        assert_eq!(rx_slot_byte_size(100), align8(header_len + 100));
    }
}
