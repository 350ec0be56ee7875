// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The Tx half of the shared queue (spec.md §4.6): a double-buffered producer region per queue,
//! one synchronous queue plus N asynchronous ones (spec.md §4.7's async workers drain the
//! latter).

use concurrency::sync::Mutex;
use concurrency::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crate::header::TxSlotHeader;

/// One frame a socket has submitted for transmission.
#[derive(Debug, Clone)]
pub struct TxSlot {
    /// The slot's fixed metadata.
    pub header: TxSlotHeader,
    /// The frame payload, `header.caplen` bytes.
    pub payload: Vec<u8>,
}

/// A double-buffered Tx producer region (spec.md §4.6): the producer (a socket) appends slots
/// into the current arena; the consumer (the kernel driver or a `tx-workers` worker) drains the
/// other arena once the producer has flipped away from it.
pub struct TxRegion {
    arenas: [Mutex<Vec<TxSlot>>; 2],
    prod_index: AtomicU8,
    cons_index: AtomicU8,
    off0: AtomicUsize,
    off1: AtomicUsize,
}

impl Default for TxRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl TxRegion {
    /// Build an empty Tx region with both arenas at offset `0`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            arenas: [Mutex::new(Vec::new()), Mutex::new(Vec::new())],
            prod_index: AtomicU8::new(0),
            cons_index: AtomicU8::new(0),
            off0: AtomicUsize::new(0),
            off1: AtomicUsize::new(0),
        }
    }

    /// A handle restricted to producer operations (the socket submitting frames).
    #[must_use]
    pub fn producer(&self) -> TxProducer<'_> {
        TxProducer { region: self }
    }

    /// A handle restricted to consumer operations (the driver or async worker draining frames).
    #[must_use]
    pub fn consumer(&self) -> TxConsumer<'_> {
        TxConsumer { region: self }
    }

    fn offset(&self, arena: u8) -> &AtomicUsize {
        if arena & 1 == 0 { &self.off0 } else { &self.off1 }
    }
}

/// The socket's view of a [`TxRegion`]: appends frames, then asks the region to hand its current
/// arena to the consumer.
pub struct TxProducer<'a> {
    region: &'a TxRegion,
}

impl TxProducer<'_> {
    /// Append one frame into the arena currently being produced into, bumping that arena's
    /// offset with release ordering (spec.md §4.6).
    pub fn append(&self, header: TxSlotHeader, payload: Vec<u8>) {
        let arena = self.region.prod_index.load(Ordering::Relaxed) & 1;
        let mut guard = self.region.arenas[arena as usize]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.push(TxSlot { header, payload });
        self.region.offset(arena).fetch_add(1, Ordering::Release);
    }

    /// Hand the current arena to the consumer and start producing into the other one
    /// (`TX_QUEUE` with queue id `0` flushes the synchronous queue this way, per spec.md §6).
    pub fn flush(&self) {
        self.region.prod_index.fetch_add(1, Ordering::Release);
    }
}

/// The draining side of a [`TxRegion`]: the kernel driver for the synchronous queue, or a
/// `tx-workers` worker thread for an asynchronous one.
pub struct TxConsumer<'a> {
    region: &'a TxRegion,
}

impl TxConsumer<'_> {
    /// If the producer has flipped since the last drain, take the now-idle arena's slots,
    /// reset its offset, and catch the consumer index up to the producer's.
    pub fn drain(&self) -> Vec<TxSlot> {
        let prod = self.region.prod_index.load(Ordering::Acquire);
        let cons = self.region.cons_index.load(Ordering::Relaxed);
        if prod == cons {
            return Vec::new();
        }
        let arena = cons & 1;
        let slots = {
            let mut guard = self.region.arenas[arena as usize]
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        self.region.offset(arena).store(0, Ordering::Release);
        self.region.cons_index.store(prod, Ordering::Release);
        slots
    }
}

/// One socket's full Tx surface: a synchronous queue (flushed inline on `TX_QUEUE(0)`) plus a
/// fixed number of asynchronous queues, each drained by a dedicated `tx-workers` worker.
pub struct TxQueueSet {
    /// The synchronous Tx queue.
    pub sync: TxRegion,
    /// The asynchronous Tx queues, indexed by queue id minus one.
    pub async_queues: Vec<TxRegion>,
}

impl TxQueueSet {
    /// Build a queue set with `async_count` asynchronous queues alongside the synchronous one.
    #[must_use]
    pub fn new(async_count: usize) -> Self {
        Self {
            sync: TxRegion::new(),
            async_queues: (0..async_count).map(|_| TxRegion::new()).collect(),
        }
    }

    /// Resolve a `TX_QUEUE` id to its region: `0` is the synchronous queue, `n` is asynchronous
    /// queue `n - 1` (spec.md §6: "`TX_QUEUE` ... queue id (0 = sync flush)").
    #[must_use]
    pub fn queue(&self, id: usize) -> Option<&TxRegion> {
        if id == 0 {
            Some(&self.sync)
        } else {
            self.async_queues.get(id - 1)
        }
    }
}

#[cfg(test)]
mod test {
    use super::{TxQueueSet, TxRegion};
    use crate::header::TxSlotHeader;

    fn frame() -> (TxSlotHeader, Vec<u8>) {
        (TxSlotHeader::default(), vec![1, 2, 3])
    }

    #[test]
    fn drain_is_empty_until_the_producer_flushes() {
        let region = TxRegion::new();
        let (header, payload) = frame();
        region.producer().append(header, payload);
        assert!(region.consumer().drain().is_empty());

        region.producer().flush();
        let drained = region.consumer().drain();
        assert_eq!(drained.len(), 1);
    }

    #[test]
    fn drained_arena_offset_resets_for_reuse() {
        let region = TxRegion::new();
        let (header, payload) = frame();
        region.producer().append(header.clone(), payload.clone());
        region.producer().flush();
        region.consumer().drain();

        region.producer().append(header, payload);
        region.producer().flush();
        let drained = region.consumer().drain();
        assert_eq!(drained.len(), 1);
    }

    #[test]
    fn queue_zero_resolves_to_sync_and_others_to_async() {
        let set = TxQueueSet::new(2);
        assert!(std::ptr::eq(set.queue(0).unwrap(), &set.sync));
        assert!(std::ptr::eq(set.queue(1).unwrap(), &set.async_queues[0]));
        assert!(std::ptr::eq(set.queue(2).unwrap(), &set.async_queues[1]));
        assert!(set.queue(3).is_none());
    }
}
