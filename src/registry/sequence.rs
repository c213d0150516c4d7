//! Multicast sequence id arithmetic
//!
//! Sequence ids live in `1..=max` and wrap from `max` back to 1; 0 is never
//! handed out. A channel's live messages always occupy a contiguous run of
//! ids starting at `oldest` and ending just before `next`, possibly crossing
//! the wrap point:
//!
//! ```text
//!  not wrapped:   1 .. oldest ===== next .. max
//!  wrapped:       1 ===== next .. oldest ===== max
//! ```

/// A wrapping sequence id space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceSpace {
    max: u64,
}

impl SequenceSpace {
    /// First id of every channel, and the id after `max`
    pub const FIRST: u64 = 1;

    /// Create a space wrapping after `max` (at least 1)
    pub fn new(max: u64) -> Self {
        Self { max: max.max(1) }
    }

    /// Largest id in the space
    pub fn max(&self) -> u64 {
        self.max
    }

    /// Whether an id can ever be issued
    pub fn contains(&self, id: u64) -> bool {
        (Self::FIRST..=self.max).contains(&id)
    }

    /// The id following `id`, wrapping at `max`
    pub fn next(&self, id: u64) -> u64 {
        if id >= self.max {
            Self::FIRST
        } else {
            id + 1
        }
    }

    /// Distance walked forward from `from` to reach `to`, wrapping if needed
    pub fn offset(&self, from: u64, to: u64) -> u64 {
        if to >= from {
            to - from
        } else {
            // `to` lies past the wrap point: the rest of the space after
            // `from`, then `to` steps into the restarted range.
            (self.max - from) + to
        }
    }

    /// Resolve a client cursor to the id that should be read
    ///
    /// A cursor older than `oldest` normally refers to expired data and is
    /// moved forward to `oldest`. When `next` has lapped back past the wrap
    /// point (`next < oldest`), cursors at or below `next` are recent ids
    /// from the restarted range and are left alone.
    pub fn clamp_cursor(&self, cursor: u64, oldest: u64, next: u64) -> u64 {
        let wrapped = next < oldest;
        if cursor < oldest && (!wrapped || cursor > next) {
            oldest
        } else {
            cursor
        }
    }
}

impl Default for SequenceSpace {
    fn default() -> Self {
        Self::new(super::config::MAX_SEQUENCE_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_increments() {
        let space = SequenceSpace::default();

        assert_eq!(space.next(1), 2);
        assert_eq!(space.next(41), 42);
    }

    #[test]
    fn test_next_wraps_to_one() {
        let space = SequenceSpace::new(3);

        assert_eq!(space.next(2), 3);
        assert_eq!(space.next(3), 1);
        assert_eq!(space.next(u64::MAX), 1);
    }

    #[test]
    fn test_default_wraps_at_max_safe_integer() {
        let space = SequenceSpace::default();

        assert_eq!(space.next(9_007_199_254_740_991), 1);
        assert!(!space.contains(0));
        assert!(!space.contains(9_007_199_254_740_992));
    }

    #[test]
    fn test_offset_across_wrap() {
        let space = SequenceSpace::new(5);

        assert_eq!(space.offset(2, 4), 2);
        assert_eq!(space.offset(4, 4), 0);
        // 4 -> 5 -> 1 -> 2
        assert_eq!(space.offset(4, 2), 3);
        assert_eq!(space.offset(5, 1), 1);
    }

    #[test]
    fn test_clamp_stale_cursor() {
        let space = SequenceSpace::default();

        // Messages 1..=4 expired, 5..=9 live.
        assert_eq!(space.clamp_cursor(2, 5, 10), 5);
        assert_eq!(space.clamp_cursor(7, 5, 10), 7);
        assert_eq!(space.clamp_cursor(12, 5, 10), 12);
    }

    #[test]
    fn test_clamp_respects_wrap() {
        let space = SequenceSpace::new(10);

        // Live run is 8, 9, 10, 1, 2 with next = 3.
        assert_eq!(space.clamp_cursor(1, 8, 3), 1);
        assert_eq!(space.clamp_cursor(3, 8, 3), 3);
        // Between next and oldest: stale, catch up.
        assert_eq!(space.clamp_cursor(5, 8, 3), 8);
    }
}
