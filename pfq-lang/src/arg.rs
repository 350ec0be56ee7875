// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed arguments bound to a compiled node.
//!
//! The original kernel module copies each node's argument out of user memory into a POD byte
//! arena, prefixed by its size (`context_get`/`pod_user` in `pf_q-functional.c`). There is no
//! userspace/kernel boundary here, so there is nothing to copy: each node simply owns a typed
//! [`Arg`] value. This sidesteps the original's undersized context-arena allocation entirely
//! (see `DESIGN.md`) rather than reproducing it and then working around it.

use lpm::prefix::Prefix;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use crate::bloom::BloomFilter;

/// One node's bound argument, if it has one.
#[derive(Debug, Clone)]
pub enum Arg {
    /// No argument.
    None,
    /// A raw `u8` (e.g. `is_l4_proto`).
    U8(u8),
    /// A raw `u16` (e.g. `has_port`, `is_l3_proto`).
    U16(u16),
    /// A raw `u32` (e.g. `mark`, `put_state`, `has_mark`, `has_state`).
    U32(u32),
    /// A signed scalar (e.g. `inc`/`dec`, `has_vid`).
    I32(i32),
    /// A CIDR prefix (e.g. `has_addr`, `has_src_addr`, `has_dst_addr`).
    Cidr(Prefix),
    /// A network device, by interface index, with an optional hardware queue
    /// (e.g. `forward`, `forwardIO`, `bridge`, `tee`, `tap`).
    Device {
        /// Target interface index.
        ifindex: u32,
        /// Target hardware queue, or `None` to let the device pick one.
        queue: Option<u8>,
    },
    /// `steer_net`'s `(net, port, src_port)` triple.
    SteerNet {
        /// Network prefix the destination address is checked against.
        net: Prefix,
        /// Optional destination port to also hash on.
        port: Option<u16>,
        /// Optional source port to also hash on.
        src_port: Option<u16>,
    },
    /// `steer_field`'s `(offset, size)` pair into the raw frame.
    Field {
        /// Byte offset from the start of the frame.
        offset: u16,
        /// Number of bytes to read (1, 2, 4, or 8).
        size: u8,
    },
    /// A shared bloom filter, for the `bloom*` predicate family.
    Bloom(Arc<BloomFilter>),
    /// A shared counter, materialized by a node's `init` hook rather than carried by the
    /// descriptor (e.g. `steer_rrobin`'s round-robin cursor).
    Counter(Arc<AtomicU64>),
}

impl Arg {
    /// True iff this is the "no argument" case.
    ///
    /// Mirrors the original's `arg_ptr == NULL` check, used during validation to confirm a
    /// node's `symbol` agrees with whether it was given an argument.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Arg::None)
    }
}
