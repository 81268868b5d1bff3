//! Ring configuration and modular index arithmetic.
//!
//! Cursors live in `[0, capacity)` and step by one with wraparound at the
//! capacity. Capacity does not need to be a power of two, so these use
//! modular arithmetic rather than bitmasking.

/// Configuration for a request ring.
#[derive(Debug, Copy, Clone)]
pub struct RingConfig {
    /// Number of descriptor slots in the ring. One slot is always kept
    /// empty to tell "full" from "empty", so `capacity` slots hold at most
    /// `capacity - 1` in-flight requests.
    pub capacity: u32,
}

impl RingConfig {
    /// Creates a new ring configuration.
    ///
    /// # Panics
    /// Panics if `capacity < 2` (a ring with fewer than two slots cannot
    /// hold even a single request).
    pub fn new(capacity: u32) -> Self {
        assert!(capacity >= 2, "ring capacity must be at least 2");
        Self { capacity }
    }
}

/// Returns `(i + 1) % capacity`.
///
/// # Panics
/// Panics if `i >= capacity`. A cursor outside the ring means reservation
/// exclusivity has been violated somewhere; silently wrapping such a value
/// would mask that bug, so it is treated as fatal.
#[inline]
pub fn next(i: u32, capacity: u32) -> u32 {
    assert!(i < capacity, "ring cursor {i} out of range (capacity {capacity})");
    if i == capacity - 1 { 0 } else { i + 1 }
}

/// Returns `(i - 1 + capacity) % capacity`.
///
/// # Panics
/// Panics if `i >= capacity`, for the same reason as [`next`].
#[inline]
pub fn prev(i: u32, capacity: u32) -> u32 {
    assert!(i < capacity, "ring cursor {i} out of range (capacity {capacity})");
    if i == 0 { capacity - 1 } else { i - 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_wraps_at_capacity() {
        assert_eq!(next(0, 4), 1);
        assert_eq!(next(2, 4), 3);
        assert_eq!(next(3, 4), 0);
    }

    #[test]
    fn prev_wraps_at_zero() {
        assert_eq!(prev(3, 4), 2);
        assert_eq!(prev(1, 4), 0);
        assert_eq!(prev(0, 4), 3);
    }

    #[test]
    fn next_and_prev_are_inverses() {
        for cap in [2u32, 3, 5, 8, 1024] {
            for i in 0..cap {
                assert_eq!(prev(next(i, cap), cap), i);
                assert_eq!(next(prev(i, cap), cap), i);
            }
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn next_rejects_out_of_range_cursor() {
        next(4, 4);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn prev_rejects_out_of_range_cursor() {
        prev(7, 4);
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 2")]
    fn config_rejects_degenerate_capacity() {
        RingConfig::new(1);
    }
}
