// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The shared queue (C6): the double-buffered single-producer/single-consumer ring through which
//! the engine hands captured frames to a joined socket, and through which a socket submits
//! frames for transmission (spec.md §4.6).
//!
//! [`rx::RxRegion`] and [`tx::TxRegion`]/[`tx::TxQueueSet`] implement the two halves; the fixed
//! per-slot header layouts live in [`header`]; [`region::QueueRegion`] bundles both halves plus
//! the socket-controlled tunables (`RX_SLOTS`, `TX_SLOTS`, `RX_CAPLEN`) into the single region a
//! socket maps on `ENABLE`.

#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod header;
pub mod region;
pub mod rx;
pub mod tx;

use tracectl::trace_target;
use tracing::LevelFilter;

trace_target!("shmem-queue", LevelFilter::INFO, &["shmem-queue"]);

pub use header::{RxSlotHeader, TxSlotHeader, align8, rx_slot_byte_size, tx_slot_byte_size};
pub use region::{QueueRegion, QueueRegionConfig, QueueRegionError};
pub use rx::{RxConsumer, RxProducer, RxRegion, RxSlot};
pub use tx::{TxConsumer, TxProducer, TxQueueSet, TxRegion, TxSlot};
