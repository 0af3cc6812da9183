//! Debug assertion macros for ring buffer invariants.
//!
//! Active only in debug builds (`#[cfg(debug_assertions)]`), so there is zero
//! overhead in release builds. Used by `RingBuffer<T, N>` and `EventProcessor<N>`.

// =============================================================================
// INV-CAP: Bounded Count
// =============================================================================

/// `0 <= write_cursor - read_cursor <= capacity` at all times.
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "INV-CAP violated: count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

/// Consumer never advances `read_cursor` past `write_cursor`.
macro_rules! debug_assert_head_not_past_tail {
    ($new_read:expr, $write:expr) => {
        debug_assert!(
            $new_read <= $write,
            "INV-CAP violated: advancing read_cursor to {} beyond write_cursor {}",
            $new_read,
            $write
        )
    };
}

// =============================================================================
// INV-MONO: Monotonic Progress
// =============================================================================

/// A cursor only increases.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "INV-MONO violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// INV-WRAP: no accidental u64 sequence wrap
// =============================================================================

/// Detects a cursor jumping backwards due to a bug, as opposed to the
/// practically unreachable real wrap of a 64-bit sequence counter.
macro_rules! debug_assert_no_wrap {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new > $old || $old.wrapping_sub($new) > (1u64 << 32),
            "INV-WRAP potential wrap detected: {} went from {} to {} (delta {})",
            $name,
            $old,
            $new,
            $new.wrapping_sub($old)
        )
    };
}

// =============================================================================
// INV-INIT: Initialized Range Check
// =============================================================================

/// Consumer only reads a slot whose sequence falls in `[read_cursor,
/// write_cursor)`.
macro_rules! debug_assert_initialized_read {
    ($pos:expr, $read:expr, $write:expr) => {
        debug_assert!(
            $pos >= $read && $pos < $write,
            "INV-INIT violated: reading slot at seq {} outside reserved range [{}, {})",
            $pos,
            $read,
            $write
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_head_not_past_tail;
pub(crate) use debug_assert_initialized_read;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_no_wrap;
