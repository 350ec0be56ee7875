// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The Rx half of the shared queue (spec.md §4.6): a double-buffered single-producer/
//! single-consumer ring, with a packed `(index<<24)|len` control word published with
//! release/acquire ordering and a per-slot `commit` byte giving finer-grained readiness than the
//! control word alone.

use concurrency::sync::Mutex;
use concurrency::sync::atomic::{AtomicU32, Ordering};

use crate::header::RxSlotHeader;

/// One captured frame as it sits in an Rx arena: header plus the bytes actually copied
/// (`caplen`), VLAN tag already re-inlined if present (spec.md §4.5 step 3).
#[derive(Debug, Clone)]
pub struct RxSlot {
    /// The slot's fixed metadata.
    pub header: RxSlotHeader,
    /// The captured payload, `header.caplen` bytes.
    pub payload: Vec<u8>,
}

impl RxSlot {
    /// Whether this slot's `commit` byte matches `parity`, meaning the producer has finished
    /// writing it and a consumer may read it even mid-batch (spec.md §9).
    #[must_use]
    pub fn is_committed(&self, parity: u8) -> bool {
        self.header.commit == parity
    }
}

/// The packed Rx control word: top byte is the producer's batch index, low 24 bits are the
/// published batch's slot count.
///
/// Ground truth: spec.md §4.6. `index` is never masked — left-shifting it into the word's top
/// byte naturally discards any bits above bit 7 on overflow, which is exactly the "index wraps"
/// behavior the wraparound-boundary check in the original relies on.
#[derive(Debug, Default)]
pub struct RxControl(AtomicU32);

const LEN_MASK: u32 = 0x00FF_FFFF;

impl RxControl {
    #[must_use]
    fn pack(index: u32, len: u32) -> u32 {
        (index << 24) | (len & LEN_MASK)
    }

    #[must_use]
    fn unpack(word: u32) -> (u32, u32) {
        (word >> 24, word & LEN_MASK)
    }

    /// The producer's current index and the length of the last batch it published.
    #[must_use]
    pub fn load(&self) -> (u32, u32) {
        Self::unpack(self.0.load(Ordering::Acquire))
    }

    /// Publish a batch of `len` slots written into arena `(index & 1)`, handing the arena to the
    /// consumer and advancing the producer's index.
    pub fn publish(&self, index: u32, len: u32) {
        let next_index = index.wrapping_add(1);
        self.0.store(Self::pack(next_index, len), Ordering::Release);
    }

    /// Consume the currently published batch, if any: atomically zeroes the published length
    /// while preserving the index, so a concurrent producer can tell the arena is still in use
    /// until the consumer is done with it. Returns `(arena index, slot count)`.
    pub fn take(&self) -> Option<(usize, u32)> {
        let mut taken = None;
        let _ = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
            let (index, len) = Self::unpack(word);
            if len == 0 {
                return None;
            }
            let arena = (index.wrapping_sub(1) & 1) as usize;
            taken = Some((arena, len));
            Some(Self::pack(index, 0))
        });
        taken
    }
}

/// A per-socket Rx queue: two identically-sized arenas, the shared control word, and the
/// configured per-arena slot capacity (spec.md §6's `RX_SLOTS` tunable).
pub struct RxRegion {
    arenas: [Mutex<Vec<RxSlot>>; 2],
    control: RxControl,
    capacity: usize,
}

impl RxRegion {
    /// Build an Rx region whose arenas hold up to `capacity` slots each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            arenas: [Mutex::new(Vec::new()), Mutex::new(Vec::new())],
            control: RxControl::default(),
            capacity,
        }
    }

    /// The configured per-arena slot capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// A handle restricted to producer operations (the engine, writing captured frames).
    #[must_use]
    pub fn producer(&self) -> RxProducer<'_> {
        RxProducer { region: self }
    }

    /// A handle restricted to consumer operations (the joined socket, reading captured frames).
    #[must_use]
    pub fn consumer(&self) -> RxConsumer<'_> {
        RxConsumer { region: self }
    }
}

/// The engine's view of an [`RxRegion`]: writes slots, then publishes a batch.
pub struct RxProducer<'a> {
    region: &'a RxRegion,
}

impl RxProducer<'_> {
    /// Write `slots` into the arena the next batch will occupy and publish them.
    ///
    /// Slots past the region's configured capacity are dropped; the caller (the engine's
    /// per-socket copy step, spec.md §4.5 step 3) is expected to have already bounded the batch
    /// to `capacity` before calling this.
    pub fn publish(&self, index: u32, mut slots: Vec<RxSlot>) {
        slots.truncate(self.region.capacity);
        #[allow(clippy::cast_possible_truncation)]
        let parity = (index.wrapping_add(1) & 1) as u8;
        for slot in &mut slots {
            slot.header.commit = parity;
        }
        let len = u32::try_from(slots.len()).unwrap_or(u32::MAX);
        let arena = (index & 1) as usize;
        {
            let mut guard = self.region.arenas[arena]
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *guard = slots;
        }
        self.region.control.publish(index, len);
    }
}

/// The socket's view of an [`RxRegion`]: polls for a published batch and drains it.
pub struct RxConsumer<'a> {
    region: &'a RxRegion,
}

impl RxConsumer<'_> {
    /// Current producer index and last-published length, without consuming anything.
    #[must_use]
    pub fn peek(&self) -> (u32, u32) {
        self.region.control.load()
    }

    /// Drain the most recently published batch, if any, bounding it to at most `rx_slots` entries
    /// (spec.md §4.6: "processes up to `min(len, rx_slots)` slots").
    pub fn poll(&self, rx_slots: usize) -> Vec<RxSlot> {
        let Some((arena, len)) = self.region.control.take() else {
            return Vec::new();
        };
        let mut guard = self.region.arenas[arena]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let take = (len as usize).min(rx_slots).min(guard.len());
        guard.drain(..take).collect()
    }
}

#[cfg(test)]
mod test {
    use super::{RxRegion, RxSlot};
    use crate::header::RxSlotHeader;

    fn slot(caplen: u16) -> RxSlot {
        RxSlot {
            header: RxSlotHeader {
                caplen,
                ..RxSlotHeader::default()
            },
            payload: vec![0u8; caplen as usize],
        }
    }

    #[test]
    fn publish_then_poll_round_trips_a_batch() {
        let region = RxRegion::new(8);
        let producer = region.producer();
        let consumer = region.consumer();

        assert!(consumer.poll(8).is_empty());

        producer.publish(0, vec![slot(4), slot(8)]);
        let drained = consumer.poll(8);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].payload.len(), 4);
        assert_eq!(drained[1].payload.len(), 8);

        assert!(consumer.poll(8).is_empty());
    }

    #[test]
    fn poll_bounds_to_the_configured_rx_slots() {
        let region = RxRegion::new(8);
        region.producer().publish(0, vec![slot(1), slot(1), slot(1)]);
        let drained = region.consumer().poll(2);
        assert_eq!(drained.len(), 2);
    }

    #[test]
    fn publish_truncates_past_arena_capacity() {
        let region = RxRegion::new(2);
        region
            .producer()
            .publish(0, vec![slot(1), slot(1), slot(1), slot(1)]);
        let drained = region.consumer().poll(8);
        assert_eq!(drained.len(), 2);
    }

    #[test]
    fn successive_batches_alternate_arenas() {
        let region = RxRegion::new(4);
        region.producer().publish(0, vec![slot(1)]);
        assert_eq!(region.consumer().poll(4).len(), 1);
        region.producer().publish(1, vec![slot(1), slot(1)]);
        assert_eq!(region.consumer().poll(4).len(), 2);
    }

    #[test]
    fn commit_parity_matches_the_published_index() {
        let region = RxRegion::new(4);
        region.producer().publish(0, vec![slot(1)]);
        let drained = region.consumer().poll(4);
        assert!(drained[0].is_committed(1));
    }
}
