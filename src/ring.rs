//! Bounded, stack-embedded MPSC event ring buffer.
//!
//! Multiple producer threads race to reserve slots via a CAS loop on a single
//! `write_cursor`; a single consumer thread owns `read_cursor` and pops in
//! FIFO order. Per-slot state flags give gap safety: a slot reserved but not
//! yet committed stays invisible to the consumer even if later slots commit
//! first, and `pop` blocks at that slot rather than skipping ahead.
//!
//! # Why not `fetch_add`?
//!
//! An unconditional `fetch_add` on `write_cursor` lets producers claim slots
//! the ring has no room for: the bounds check only happens *after* the
//! cursor has already moved, so by the time a producer observes "full" it
//! has already advanced `write_cursor` past the true capacity. The CAS loop
//! here checks free space and swaps in a single step, so a losing producer
//! never advances `write_cursor` at all.

use crate::config::RingConfig;
use crate::error::ContractViolation;
use crate::invariants::{
    debug_assert_bounded_count, debug_assert_head_not_past_tail, debug_assert_initialized_read,
    debug_assert_monotonic, debug_assert_no_wrap,
};
use crate::backoff::Backoff;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::reservation::{RangeReservation, Reservation};

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

const fn assert_power_of_two<const N: usize>() {
    assert!(N > 0, "RingBuffer capacity must be > 0");
    assert!(N.is_power_of_two(), "RingBuffer capacity must be a power of 2");
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    Empty = 0,
    Reserved = 1,
    /// `write_slot` finished initializing the value but it has not been
    /// published or cancelled yet. Distinct from `Reserved` so `cancel`,
    /// `pop` and teardown know whether there is a live value to drop.
    Constructed = 2,
    Committed = 3,
    Cancelled = 4,
}

impl SlotState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SlotState::Empty,
            1 => SlotState::Reserved,
            2 => SlotState::Constructed,
            3 => SlotState::Committed,
            4 => SlotState::Cancelled,
            _ => unreachable!("slot state byte outside 0..=4"),
        }
    }
}

pub(crate) struct Slot<T> {
    /// Current lifecycle state of this slot.
    state: AtomicU8,
    /// Sequence number currently owning this slot, checked on cancel to
    /// reject a stale `seq` from a slot that has since wrapped.
    seq: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: access to `value` is serialized by the `state` transitions: a
// producer writes only while it alone holds the slot in `Reserved`, and the
// consumer reads only after observing `Committed` via an Acquire load.
unsafe impl<T: Send> Sync for Slot<T> {}

/// A fixed-capacity, lock-free MPSC ring of slots.
///
/// `N` must be a power of two, checked at construction.
#[repr(C)]
pub struct RingBuffer<T, const N: usize> {
    write_cursor: CachePadded<AtomicU64>,
    read_cursor: CachePadded<AtomicU64>,
    config: RingConfig,
    metrics: Metrics,
    slots: [Slot<T>; N],
}

unsafe impl<T: Send, const N: usize> Send for RingBuffer<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T, const N: usize> RingBuffer<T, N> {
    const MASK: usize = N - 1;

    /// Creates an empty ring buffer with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RingConfig::default())
    }

    /// Creates an empty ring buffer with the given configuration.
    #[must_use]
    pub fn with_config(config: RingConfig) -> Self {
        assert_power_of_two::<N>();
        Self {
            write_cursor: CachePadded::new(AtomicU64::new(0)),
            read_cursor: CachePadded::new(AtomicU64::new(0)),
            config,
            metrics: Metrics::default(),
            slots: std::array::from_fn(|_| Slot {
                state: AtomicU8::new(SlotState::Empty as u8),
                seq: AtomicU64::new(0),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            }),
        }
    }

    /// Ring capacity, i.e. `N`.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of items currently reserved, committed or pending pop.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        let write = self.write_cursor.load(Ordering::Relaxed);
        let read = self.read_cursor.load(Ordering::Relaxed);
        write.wrapping_sub(read) as usize
    }

    /// True if no slots are reserved, committed or pending skip.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.write_cursor.load(Ordering::Relaxed) == self.read_cursor.load(Ordering::Relaxed)
    }

    /// True if the ring has no free slots for a new `reserve`.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    /// Point-in-time metrics snapshot. Counters stay at zero unless
    /// `RingConfig::enable_metrics` was set at construction.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    #[inline]
    fn slot(&self, seq: u64) -> &Slot<T> {
        &self.slots[(seq as usize) & Self::MASK]
    }

    /// Reserves a single slot for a producer to write into.
    ///
    /// Returns `None` if the ring is full. Retries internally on a lost CAS
    /// race against another producer; never blocks or sleeps.
    pub fn reserve(&self) -> Option<Reservation<'_, T, N>> {
        loop {
            let write = self.write_cursor.load(Ordering::Relaxed);
            let read = self.read_cursor.load(Ordering::Acquire);
            if write.wrapping_sub(read) as usize >= N {
                return None;
            }
            let next = write.wrapping_add(1);
            match self.write_cursor.compare_exchange_weak(
                write,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    debug_assert_monotonic!("write_cursor", write, next);
                    debug_assert_no_wrap!("write_cursor", write, next);
                    debug_assert_bounded_count!(next.wrapping_sub(read) as usize, N);
                    self.metrics.record_reserve_attempt(self.config.enable_metrics);
                    let slot = self.slot(write);
                    slot.seq.store(write, Ordering::Relaxed);
                    slot.state.store(SlotState::Reserved as u8, Ordering::Release);
                    return Some(Reservation::new(self, write));
                }
                Err(_) => {
                    self.metrics.record_cas_retry(self.config.enable_metrics);
                }
            }
        }
    }

    /// Reserves `count` contiguous sequence numbers for a batch write.
    ///
    /// The reserved range may wrap the ring's physical storage boundary;
    /// `RangeReservation` exposes the (at most two) contiguous segments.
    /// Returns `None` if `count` is zero, exceeds capacity, or there is not
    /// currently enough free space.
    pub fn reserve_range(&self, count: usize) -> Option<RangeReservation<'_, T, N>> {
        if count == 0 || count > N {
            return None;
        }
        loop {
            let write = self.write_cursor.load(Ordering::Relaxed);
            let read = self.read_cursor.load(Ordering::Acquire);
            let used = write.wrapping_sub(read) as usize;
            if N - used < count {
                return None;
            }
            let next = write.wrapping_add(count as u64);
            match self.write_cursor.compare_exchange_weak(
                write,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    debug_assert_monotonic!("write_cursor", write, next);
                    debug_assert_no_wrap!("write_cursor", write, next);
                    debug_assert_bounded_count!(next.wrapping_sub(read) as usize, N);
                    self.metrics.record_reserve_attempt(self.config.enable_metrics);
                    for i in 0..count {
                        let seq = write.wrapping_add(i as u64);
                        let slot = self.slot(seq);
                        slot.seq.store(seq, Ordering::Relaxed);
                        slot.state.store(SlotState::Reserved as u8, Ordering::Release);
                    }
                    return Some(RangeReservation::new(self, write, count));
                }
                Err(_) => {
                    self.metrics.record_cas_retry(self.config.enable_metrics);
                }
            }
        }
    }

    /// Writes `value` into the slot at `seq`.
    ///
    /// # Safety
    /// Caller must hold an unresolved reservation for `seq` and call this at
    /// most once before committing or cancelling it.
    pub(crate) unsafe fn write_slot(&self, seq: u64, value: T) {
        let slot = self.slot(seq);
        (*slot.value.get()).write(value);
        slot.state.store(SlotState::Constructed as u8, Ordering::Release);
    }

    /// Publishes the slot at `seq`, making it visible to `pop`.
    pub(crate) fn publish(&self, seq: u64) {
        let slot = self.slot(seq);
        slot.state.store(SlotState::Committed as u8, Ordering::Release);
        self.metrics.record_commit(self.config.enable_metrics);
    }

    /// Cancels the pending reservation at `seq`.
    ///
    /// The slot is marked so `pop` skips over it without yielding a value,
    /// instead of stalling the consumer forever on an abandoned reservation.
    /// If `write_slot` had already written a value into this slot, it is
    /// dropped here rather than leaked or silently overwritten later.
    pub fn cancel(&self, seq: u64) -> Result<(), ContractViolation> {
        let slot = self.slot(seq);
        if slot.seq.load(Ordering::Relaxed) != seq {
            return Err(ContractViolation::UnknownSequence(seq));
        }
        match slot.state.compare_exchange(
            SlotState::Reserved as u8,
            SlotState::Cancelled as u8,
            Ordering::Release,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.metrics.record_cancel(self.config.enable_metrics);
                Ok(())
            }
            Err(observed) if observed == SlotState::Constructed as u8 => {
                match slot.state.compare_exchange(
                    SlotState::Constructed as u8,
                    SlotState::Cancelled as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        // SAFETY: state was Constructed, so write_slot
                        // finished initializing this slot and no commit or
                        // pop has read it.
                        unsafe {
                            (*slot.value.get()).assume_init_drop();
                        }
                        self.metrics.record_cancel(self.config.enable_metrics);
                        Ok(())
                    }
                    Err(observed) => Self::cancel_err(seq, observed),
                }
            }
            Err(observed) => Self::cancel_err(seq, observed),
        }
    }

    fn cancel_err(seq: u64, observed: u8) -> Result<(), ContractViolation> {
        Err(match SlotState::from_u8(observed) {
            SlotState::Committed => ContractViolation::AlreadyCommitted(seq),
            SlotState::Cancelled => ContractViolation::AlreadyCancelled(seq),
            SlotState::Empty | SlotState::Reserved | SlotState::Constructed => {
                ContractViolation::UnknownSequence(seq)
            }
        })
    }

    /// Pops the next item in FIFO order.
    ///
    /// Returns `None` if the front slot has nothing committed yet, whether
    /// because no producer has reserved it or because a reservation there is
    /// still pending — `pop` never skips ahead of an uncommitted slot.
    /// Cancelled slots are skipped transparently and do not count as a pop.
    pub fn pop(&self) -> Option<T> {
        loop {
            let read = self.read_cursor.load(Ordering::Relaxed);
            let write = self.write_cursor.load(Ordering::Acquire);
            if read == write {
                return None;
            }
            debug_assert_head_not_past_tail!(read.wrapping_add(1), write);
            let slot = self.slot(read);
            let state = SlotState::from_u8(slot.state.load(Ordering::Acquire));
            match state {
                SlotState::Committed => {
                    debug_assert_initialized_read!(read, read, write);
                    // SAFETY: state is Committed, so the producer finished
                    // writing and released before this Acquire load.
                    let value = unsafe { (*slot.value.get()).assume_init_read() };
                    slot.state.store(SlotState::Empty as u8, Ordering::Relaxed);
                    let new_read = read.wrapping_add(1);
                    debug_assert_monotonic!("read_cursor", read, new_read);
                    self.read_cursor.store(new_read, Ordering::Release);
                    self.metrics.record_pop(self.config.enable_metrics);
                    return Some(value);
                }
                SlotState::Cancelled => {
                    slot.state.store(SlotState::Empty as u8, Ordering::Relaxed);
                    let new_read = read.wrapping_add(1);
                    self.read_cursor.store(new_read, Ordering::Release);
                    self.metrics.record_cancelled_skip(self.config.enable_metrics);
                }
                SlotState::Reserved | SlotState::Constructed | SlotState::Empty => return None,
            }
        }
    }

    /// Like `reserve`, but spins with [`Backoff`] instead of giving up
    /// immediately on a full ring. Still returns `None` once `Backoff`
    /// judges further spinning pointless — this never blocks indefinitely.
    pub fn reserve_with_backoff(&self) -> Option<Reservation<'_, T, N>> {
        let mut backoff = Backoff::new();
        loop {
            if let Some(r) = self.reserve() {
                return Some(r);
            }
            if backoff.is_completed() {
                return None;
            }
            backoff.snooze();
        }
    }

    /// Like `pop`, but spins with [`Backoff`] instead of giving up
    /// immediately on an empty or gapped ring.
    pub fn pop_with_backoff(&self) -> Option<T> {
        let mut backoff = Backoff::new();
        loop {
            if let Some(v) = self.pop() {
                return Some(v);
            }
            if backoff.is_completed() {
                return None;
            }
            backoff.snooze();
        }
    }

    /// Drops every live value in `[read, write)` and marks those slots
    /// `Empty`. Shared by `clear` and `Drop`.
    fn drop_live_range(&mut self, read: u64, write: u64) {
        let mut pos = read;
        while pos != write {
            let idx = (pos as usize) & Self::MASK;
            let slot = &mut self.slots[idx];
            let state = SlotState::from_u8(*slot.state.get_mut());
            if matches!(state, SlotState::Committed | SlotState::Constructed) {
                // SAFETY: both states mean a value was written, and `&mut
                // self` means nothing else can be reading or dropping it.
                unsafe {
                    slot.value.get_mut().assume_init_drop();
                }
            }
            *slot.state.get_mut() = SlotState::Empty as u8;
            pos = pos.wrapping_add(1);
        }
    }

    /// Drops any live values and resets the ring to empty, including its
    /// sequence counters.
    ///
    /// Takes `&mut self`: the caller must ensure no producer or consumer is
    /// concurrently operating on the ring while it clears.
    pub fn clear(&mut self) {
        let read = *self.read_cursor.get_mut();
        let write = *self.write_cursor.get_mut();
        self.drop_live_range(read, write);
        *self.read_cursor.get_mut() = 0;
        *self.write_cursor.get_mut() = 0;
    }
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for RingBuffer<T, N> {
    fn drop(&mut self) {
        let read = *self.read_cursor.get_mut();
        let write = *self.write_cursor.get_mut();
        self.drop_live_range(read, write);
    }
}
