use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam::utils::Backoff;

/// High bit of the reservation counter. Once set, no further slot can be reserved.
const SEALED: usize = 1 << (usize::BITS - 1);

/// A fixed capacity buffer where many producers reserve slots with a CAS on a shared counter.
///
/// A slot is reserved by bumping `reserved`, written, and only then published through its
/// `written` flag. Readers never look at a slot before observing that flag with Acquire.
pub struct Segment<T> {
    slots: Box<[Slot<T>]>,
    reserved: AtomicUsize,
    next: OnceLock<Arc<Segment<T>>>,
}

struct Slot<T> {
    value: UnsafeCell<MaybeUninit<T>>,
    written: AtomicBool,
}

// Values are only ever moved in by the producer that reserved the slot and moved out by the
// single evictor, never shared by reference across threads.
unsafe impl<T: Send> Send for Segment<T> {}
unsafe impl<T: Send> Sync for Segment<T> {}

impl<T> Segment<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot {
            value: UnsafeCell::new(MaybeUninit::uninit()),
            written: AtomicBool::new(false),
        });

        Self {
            slots: slots.into_boxed_slice(),
            reserved: AtomicUsize::new(0),
            next: OnceLock::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of reserved slots. Reserved slots may not be written yet.
    pub fn len(&self) -> usize {
        self.reserved.load(Ordering::Acquire) & !SEALED
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    #[cfg(test)]
    fn is_sealed(&self) -> bool {
        self.reserved.load(Ordering::Acquire) & SEALED != 0
    }

    /// Attempts to append `value` into the next free slot.
    ///
    /// Returns the value back when the segment is full or sealed so the caller can move on to
    /// the next segment in the chain.
    pub fn try_append(&self, value: T) -> Result<(), T> {
        let mut reserved = self.reserved.load(Ordering::Acquire);

        let index = loop {
            if reserved & SEALED != 0 || reserved >= self.capacity() {
                return Err(value);
            }

            match self.reserved.compare_exchange_weak(
                reserved,
                reserved + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break reserved,
                Err(actual) => reserved = actual,
            }
        };

        let slot = &self.slots[index];

        // Safety: the successful CAS above handed out `index` to this call only, and the slot
        // is not read until `written` is observed as true.
        unsafe {
            (*slot.value.get()).write(value);
        }

        slot.written.store(true, Ordering::Release);
        Ok(())
    }

    /// Closes the segment to further reservations and returns the final number of reserved slots.
    pub fn seal(&self) -> usize {
        self.reserved.fetch_or(SEALED, Ordering::AcqRel) & !SEALED
    }

    pub fn next(&self) -> Option<&Arc<Segment<T>>> {
        self.next.get()
    }

    /// Links `next` after this segment. Returns false if a successor was already linked.
    pub(crate) fn link(&self, next: Arc<Segment<T>>) -> bool {
        self.next.set(next).is_ok()
    }

    /// Moves the first `count` items into `out`, in index order.
    ///
    /// The caller must be the only drainer of this segment and `count` must be final, which
    /// holds once the segment is full or sealed. Slots that are reserved but still being
    /// written by a late producer are waited on.
    pub(crate) fn drain_into(&self, count: usize, out: &mut Vec<T>) {
        debug_assert!(count <= self.capacity());

        for slot in &self.slots[..count] {
            let backoff = Backoff::new();
            while !slot.written.load(Ordering::Acquire) {
                backoff.snooze();
            }

            // Safety: `written` was published with Release after the value was initialized and
            // only this drainer clears it, so the value is read out exactly once.
            let value = unsafe { (*slot.value.get()).assume_init_read() };
            slot.written.store(false, Ordering::Relaxed);
            out.push(value);
        }
    }
}

impl<T> Drop for Segment<T> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            if *slot.written.get_mut() {
                unsafe {
                    slot.value.get_mut().assume_init_drop();
                }
            }
        }

        // Unlink the rest of the chain iteratively, a long chain would otherwise recurse once per segment.
        let mut next = self.next.take();
        while let Some(segment) = next {
            next = match Arc::try_unwrap(segment) {
                Ok(mut segment) => segment.next.take(),
                Err(_) => None,
            };
        }
    }
}
