// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The socket control surface (C6's control plane): one [`Socket`] handle per open control
//! object, [`SockOpt`] enumerating every recognized option (spec.md §6), and [`SocketTable`]
//! dispatching them against the shared [`group::GroupTable`] and [`devmap::DevMap`].
//!
//! This crate owns control-plane state only. The data path (per-CPU capture, steering, and the
//! shared Rx/Tx queues a socket maps on `ENABLE`) lives in `gc`, `group`, and `shmem-queue`; this
//! crate wires a socket's lifecycle to those three plus `devmap` and `pfq-lang`'s validator.

#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod sockopt;
mod table;

use tracectl::trace_target;
use tracing::LevelFilter;

trace_target!("socket", LevelFilter::INFO, &["socket"]);

pub use sockopt::{
    EgressBindArgs, GroupBindArgs, GroupJoinArgs, RawFprog, SockOpt, TxBindArgs, VlanFiltArgs,
    VlanFiltToggleArgs,
};
pub use table::{MAX_WEIGHT, Socket, SockOptResult, SocketId, SocketStats, SocketTable};
