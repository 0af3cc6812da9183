use std::sync::atomic::{AtomicU64, Ordering};

/// Live, lock-free counters for a [`RingBuffer`][crate::RingBuffer] when
/// `RingConfig::enable_metrics` is set. Each field is an independent
/// `AtomicU64`, incremented with `Relaxed` ordering: these are observability
/// counters, not synchronization points.
#[derive(Debug, Default)]
pub struct Metrics {
    reserve_attempts: AtomicU64,
    cas_retries: AtomicU64,
    commits: AtomicU64,
    pops: AtomicU64,
    cancels: AtomicU64,
    cancelled_skips: AtomicU64,
}

impl Metrics {
    #[inline]
    pub(crate) fn record_reserve_attempt(&self, enabled: bool) {
        if enabled {
            self.reserve_attempts.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_cas_retry(&self, enabled: bool) {
        if enabled {
            self.cas_retries.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_commit(&self, enabled: bool) {
        if enabled {
            self.commits.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_pop(&self, enabled: bool) {
        if enabled {
            self.pops.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_cancel(&self, enabled: bool) {
        if enabled {
            self.cancels.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_cancelled_skip(&self, enabled: bool) {
        if enabled {
            self.cancelled_skips.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reserve_attempts: self.reserve_attempts.load(Ordering::Relaxed),
            cas_retries: self.cas_retries.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            pops: self.pops.load(Ordering::Relaxed),
            cancels: self.cancels.load(Ordering::Relaxed),
            cancelled_skips: self.cancelled_skips.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time read of [`Metrics`], returned by
/// `RingBuffer::metrics`/`EventProcessor::metrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Number of `reserve`/`reserve_range` calls that obtained a slot.
    pub reserve_attempts: u64,
    /// Number of times a `write_cursor` CAS lost the race and retried.
    pub cas_retries: u64,
    /// Number of slots published via `commit`/`commit_range`.
    pub commits: u64,
    /// Number of items handed back by `pop`.
    pub pops: u64,
    /// Number of reservations explicitly cancelled.
    pub cancels: u64,
    /// Number of cancelled slots the consumer skipped over in `pop`.
    pub cancelled_skips: u64,
}
