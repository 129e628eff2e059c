use std::sync::Arc;

use arc_swap::ArcSwap;
use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::segment::Segment;

pub const MIN_CAPACITY_POWER: u32 = 1;
pub const MAX_CAPACITY_POWER: u32 = 20;
pub const DEFAULT_CAPACITY_POWER: u32 = 10;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CapacityError {
    #[error("Capacity power {power} is out of range, expected {min}..={max}")]
    OutOfRange { power: u32, min: u32, max: u32 },
}

/// An unbounded list of fixed size segments supporting concurrent `add` from many producers and
/// a bulk `evict_all` from a single evictor.
///
/// Appends into the current tail segment are lock free. The growth lock is only taken when the
/// tail is full and a new segment has to be linked, and for the swap performed by `evict_all`.
pub struct GrowableConcurrentList<T> {
    head: ArcSwap<Segment<T>>,
    tail: ArcSwap<Segment<T>>,
    capacity: usize,
    grow_lock: Mutex<()>,
}

impl<T> GrowableConcurrentList<T> {
    /// Creates an empty list whose segments hold `2^capacity_power` items each.
    pub fn new(capacity_power: u32) -> Result<Self, CapacityError> {
        if !(MIN_CAPACITY_POWER..=MAX_CAPACITY_POWER).contains(&capacity_power) {
            return Err(CapacityError::OutOfRange {
                power: capacity_power,
                min: MIN_CAPACITY_POWER,
                max: MAX_CAPACITY_POWER,
            });
        }

        Ok(Self::with_segment_capacity(1 << capacity_power))
    }

    fn with_segment_capacity(capacity: usize) -> Self {
        let segment = Arc::new(Segment::with_capacity(capacity));

        Self {
            head: ArcSwap::new(segment.clone()),
            tail: ArcSwap::new(segment),
            capacity,
            grow_lock: Mutex::new(()),
        }
    }

    /// Nominal number of items per segment.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn add(&self, value: T) {
        let mut value = value;

        loop {
            let tail = self.tail.load();

            match tail.try_append(value) {
                Ok(()) => return,
                Err(rejected) => {
                    value = rejected;
                    self.grow(&tail);
                }
            }
        }
    }

    fn grow(&self, observed: &Arc<Segment<T>>) {
        let _guard = self.grow_lock.lock();

        let tail = self.tail.load();
        if !Arc::ptr_eq(&*tail, observed) {
            // Another producer already grew the chain, or an eviction swapped in a fresh one.
            return;
        }

        let segment = Arc::new(Segment::with_capacity(self.capacity));
        let linked = tail.link(segment.clone());
        debug_assert!(linked, "tail segment already had a successor");

        self.tail.store(segment);

        debug!("Linked new segment, capacity: {}", self.capacity);
    }

    /// Takes every item currently in the list, in chain order.
    ///
    /// Must not be called from more than one thread at a time. Items added concurrently either
    /// land in the returned batch or remain in the list for the next eviction, never both and
    /// never neither.
    pub fn evict_all(&self) -> Vec<T> {
        {
            let head = self.head.load();
            if head.is_empty() && head.next().is_none() {
                return Vec::new();
            }
        }

        let fresh = Arc::new(Segment::with_capacity(self.capacity));

        let (previous_head, previous_tail) = {
            let _guard = self.grow_lock.lock();
            let previous_tail = self.tail.swap(fresh.clone());
            let previous_head = self.head.swap(fresh);
            (previous_head, previous_tail)
        };

        // Every segment before the previous tail is full. Sealing the tail fixes the length of
        // the whole chain; producers still holding it fall through to the fresh chain.
        previous_tail.seal();

        let total: usize = chain(&previous_head).map(Segment::len).sum();
        let mut evicted = Vec::with_capacity(total);

        for segment in chain(&previous_head) {
            segment.drain_into(segment.len(), &mut evicted);
        }

        debug!(
            "Evicted {} items from {} segments",
            evicted.len(),
            chain(&previous_head).count()
        );

        evicted
    }

    /// True when the head segment holds no items. Only a hint while producers are running.
    pub fn is_empty(&self) -> bool {
        self.head.load().is_empty()
    }

    /// Number of reserved items across the chain. Exact only once producers are quiescent.
    pub fn len(&self) -> usize {
        let head = self.head.load_full();
        chain(&head).map(Segment::len).sum()
    }

    pub fn segment_count(&self) -> usize {
        let head = self.head.load_full();
        chain(&head).count()
    }
}

impl<T> Default for GrowableConcurrentList<T> {
    fn default() -> Self {
        Self::with_segment_capacity(1 << DEFAULT_CAPACITY_POWER)
    }
}

fn chain<T>(root: &Segment<T>) -> impl Iterator<Item = &Segment<T>> {
    std::iter::successors(Some(root), |segment| segment.next().map(|next| &**next))
}
