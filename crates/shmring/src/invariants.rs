//! Debug assertion macros for the ring's header bookkeeping.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is zero
//! overhead in release builds. These catch bugs in this crate's own
//! read/write paths — a peer that corrupts the shared header is handled by
//! [`crate::ring::RingView`]'s runtime validation, not by these macros.

/// Occupancy (`head - tail`) never exceeds capacity.
macro_rules! debug_assert_occupancy_bounded {
    ($occupancy:expr, $capacity:expr) => {
        debug_assert!(
            $occupancy <= $capacity,
            "occupancy {} exceeds capacity {}",
            $occupancy,
            $capacity
        )
    };
}

/// A sequence number only moves forward (mod 2^32).
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new.wrapping_sub($old) <= (1u32 << 31),
            "{} moved backwards: {} -> {}",
            $name,
            $old,
            $new
        )
    };
}

/// The consumer never advances `tail` past the producer's published `head`.
macro_rules! debug_assert_tail_not_past_head {
    ($new_tail:expr, $head:expr) => {
        debug_assert!(
            $head.wrapping_sub($new_tail) <= (1u32 << 31),
            "tail {} advanced past head {}",
            $new_tail,
            $head
        )
    };
}

/// A byte position about to be read lies within the currently-published
/// `[tail, head)` range.
macro_rules! debug_assert_within_published_range {
    ($pos:expr, $tail:expr, $head:expr) => {
        debug_assert!(
            $pos.wrapping_sub($tail) < $head.wrapping_sub($tail),
            "read at {} outside published range [{}, {})",
            $pos,
            $tail,
            $head
        )
    };
}

pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_occupancy_bounded;
pub(crate) use debug_assert_tail_not_past_head;
pub(crate) use debug_assert_within_published_range;
