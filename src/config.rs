/// Configuration for a [`RingBuffer`][crate::RingBuffer] / [`EventProcessor`][crate::EventProcessor].
///
/// Capacity is not part of this struct: it is the const generic `N` on
/// `RingBuffer<T, N>`, fixed at compile time rather than chosen at runtime.
#[derive(Debug, Clone, Copy)]
pub struct RingConfig {
    /// Enable metrics collection (slight overhead on the reserve/commit/pop path).
    pub enable_metrics: bool,
}

impl RingConfig {
    /// Creates a new configuration.
    #[must_use]
    pub const fn new(enable_metrics: bool) -> Self {
        Self { enable_metrics }
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
        }
    }
}

/// Metrics disabled, no accounting overhead on the hot path.
pub const LOW_LATENCY_CONFIG: RingConfig = RingConfig::new(false);

/// Metrics enabled, for operators who want reserve/CAS/commit/pop/cancel counters.
pub const OBSERVABLE_CONFIG: RingConfig = RingConfig::new(true);
