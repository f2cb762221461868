//! Highest device sequence number already recorded this session.

/// Dedup threshold for the poll loop.
///
/// Starts at 0 ("nothing consumed") and never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark(u64);

impl Watermark {
    pub const fn new(sequence: u64) -> Self {
        Watermark(sequence)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// True if `sequence` has not been consumed yet.
    #[inline]
    pub fn admits(self, sequence: u64) -> bool {
        sequence > self.0
    }

    /// Moves the watermark up to `candidate`; lower values are ignored.
    #[inline]
    pub fn advance_to(&mut self, candidate: u64) {
        self.0 = self.0.max(candidate);
    }
}
