// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tx async workers (C8, spec.md §4.7): a fixed pool of CPU-pinned threads, each draining a
//! subset of per-socket asynchronous Tx arenas ([`shmem_queue::TxRegion`]) and submitting
//! coalesced batches to a [`TxSink`].

#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod pool;
mod sink;

pub use pool::{MAX_XMIT_BATCH_LEN, TxAssignment, TxWorkerError, TxWorkerPool, WorkerSpec};
pub use sink::TxSink;
