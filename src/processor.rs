//! Reserve/commit/pop façade over a [`RingBuffer`] of boxed events.

use crate::config::RingConfig;
use crate::error::ContractViolation;
use crate::event::Event;
use crate::metrics::MetricsSnapshot;
use crate::reservation::{RangeReservation, Reservation};
use crate::ring::RingBuffer;

use std::sync::atomic::{AtomicBool, Ordering};

type BoxedEvent = Box<dyn Event + Send>;

/// A single reserved, not-yet-committed event slot.
///
/// Dropping without calling [`commit`][Self::commit] cancels the
/// reservation, same as the underlying [`Reservation`].
pub struct ReservedEvent<'a, const N: usize>(Reservation<'a, BoxedEvent, N>);

impl<const N: usize> ReservedEvent<'_, N> {
    /// The sequence number this reservation owns.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.0.seq()
    }

    /// Publishes the event, making it visible to `pop_event`.
    pub fn commit(self) {
        self.0.commit();
    }

    /// Explicitly abandons the reservation.
    pub fn cancel(self) {
        self.0.cancel();
    }
}

/// A reserved, not-yet-committed contiguous run of event slots.
pub struct ReservedEvents<'a, const N: usize>(RangeReservation<'a, BoxedEvent, N>);

impl<const N: usize> ReservedEvents<'_, N> {
    /// The first sequence number in this range.
    #[must_use]
    pub fn start(&self) -> u64 {
        self.0.start()
    }

    /// Number of slots reserved.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if this range reserved zero slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Places `event` at offset `index` within this range (`0..len()`).
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    pub fn emplace<E: Event + Send + 'static>(&mut self, index: usize, event: E) {
        self.0.emplace(index, Box::new(event));
    }

    /// Publishes every slot in the range, ascending.
    pub fn commit(self) {
        self.0.commit();
    }
}

/// Reserve/reserve_range/commit/pop façade over `RingBuffer<Box<dyn Event + Send>, N>`.
///
/// Owns the shared shutdown flag all producers observe: `shutdown` is called
/// once all producers are done enqueueing, and the consumer loop exits once
/// `is_drained` reports both shutdown-requested and ring-empty.
pub struct EventProcessor<const N: usize> {
    ring: RingBuffer<BoxedEvent, N>,
    writers_finished: AtomicBool,
}

impl<const N: usize> EventProcessor<N> {
    /// Creates a processor with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RingConfig::default())
    }

    /// Creates a processor with the given configuration.
    #[must_use]
    pub fn with_config(config: RingConfig) -> Self {
        Self {
            ring: RingBuffer::with_config(config),
            writers_finished: AtomicBool::new(false),
        }
    }

    /// Reserves a slot and boxes `event` into it. The event is not visible
    /// to `pop_event` until the returned handle is committed.
    pub fn reserve<E: Event + Send + 'static>(&self, event: E) -> Option<ReservedEvent<'_, N>> {
        let mut reservation = self.ring.reserve()?;
        reservation.write(Box::new(event));
        Some(ReservedEvent(reservation))
    }

    /// Reserves `count` contiguous slots for a batch of events.
    pub fn reserve_range(&self, count: usize) -> Option<ReservedEvents<'_, N>> {
        self.ring.reserve_range(count).map(ReservedEvents)
    }

    /// Cancels a pending reservation by sequence number, for callers that
    /// only kept the `seq` rather than the `ReservedEvent` handle.
    pub fn cancel(&self, seq: u64) -> Result<(), ContractViolation> {
        self.ring.cancel(seq)
    }

    /// Pops the next event in FIFO order.
    pub fn pop_event(&self) -> Option<BoxedEvent> {
        self.ring.pop()
    }

    /// Pops the next event, spinning with a [`Backoff`][crate::Backoff]
    /// instead of returning `None` immediately when the ring is momentarily
    /// empty or gapped.
    pub fn pop_event_with_backoff(&self) -> Option<BoxedEvent> {
        self.ring.pop_with_backoff()
    }

    /// Signals that no further `reserve` calls will arrive from any
    /// producer. The consumer should keep draining with `pop_event` until
    /// `is_drained` returns true.
    pub fn shutdown(&self) {
        self.writers_finished.store(true, Ordering::Release);
        #[cfg(feature = "tracing")]
        tracing::info!("event processor shutdown requested");
    }

    /// True once `shutdown` has been called and the ring has no pending or
    /// reserved events left. The consumer's exit condition.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.writers_finished.load(Ordering::Acquire) && self.ring.is_empty()
    }

    /// Point-in-time metrics snapshot, see `RingConfig::enable_metrics`.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ring.metrics()
    }
}

impl<const N: usize> Default for EventProcessor<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counted {
        target: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl Event for Counted {
        fn process(&mut self) {
            self.target.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn reserve_commit_pop_process_roundtrip() {
        let processor: EventProcessor<8> = EventProcessor::new();
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let reserved = processor
            .reserve(Counted {
                target: count.clone(),
            })
            .unwrap();
        reserved.commit();

        let mut event = processor.pop_event().unwrap();
        event.process();
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn shutdown_drains_before_reporting_done() {
        let processor: EventProcessor<4> = EventProcessor::new();
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let reserved = processor
            .reserve(Counted {
                target: count.clone(),
            })
            .unwrap();
        reserved.commit();

        processor.shutdown();
        assert!(!processor.is_drained());

        processor.pop_event().unwrap().process();
        assert!(processor.is_drained());
    }

    #[test]
    fn cancel_by_seq_frees_the_slot() {
        let processor: EventProcessor<4> = EventProcessor::new();
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let reserved = processor
            .reserve(Counted {
                target: count.clone(),
            })
            .unwrap();
        let seq = reserved.seq();
        let before = std::sync::Arc::strong_count(&count);
        reserved.cancel();
        assert!(processor.cancel(seq).is_err());
        assert!(processor.pop_event().is_none());
        assert_eq!(
            std::sync::Arc::strong_count(&count),
            before - 1,
            "cancelling a written reservation must drop the boxed event, not leak it"
        );
    }
}
