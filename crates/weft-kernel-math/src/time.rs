//! Normalized time intervals.

/// A closed interval on the normalized time axis.
///
/// Geometry motion is parameterized over [`TimeRange::UNIT`]; pieces of a
/// primitive's motion (time segments, build windows) are sub-intervals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    /// Interval start.
    pub lower: f32,
    /// Interval end.
    pub upper: f32,
}

impl TimeRange {
    /// The full normalized time domain [0, 1].
    pub const UNIT: TimeRange = TimeRange {
        lower: 0.0,
        upper: 1.0,
    };

    /// Create an interval from its endpoints.
    pub fn new(lower: f32, upper: f32) -> Self {
        Self { lower, upper }
    }

    /// Create an empty (inverted) interval suitable for expansion.
    pub fn empty() -> Self {
        Self {
            lower: f32::INFINITY,
            upper: f32::NEG_INFINITY,
        }
    }

    /// Length of the interval. Negative when inverted.
    pub fn size(&self) -> f32 {
        self.upper - self.lower
    }

    /// True if the interval contains no time values.
    pub fn is_empty(&self) -> bool {
        self.lower > self.upper
    }

    /// True if the interval has zero length.
    pub fn is_degenerate(&self) -> bool {
        self.lower == self.upper
    }

    /// True if `t` lies inside the interval (boundary inclusive).
    pub fn contains(&self, t: f32) -> bool {
        self.lower <= t && t <= self.upper
    }

    /// The overlap of two intervals. May be empty.
    pub fn intersect(a: TimeRange, b: TimeRange) -> TimeRange {
        TimeRange::new(a.lower.max(b.lower), a.upper.min(b.upper))
    }

    /// Expand to cover another interval.
    pub fn extend(&mut self, other: TimeRange) {
        self.lower = self.lower.min(other.lower);
        self.upper = self.upper.max(other.upper);
    }

    /// Map a global time into this interval's local [0, 1] parametrization.
    pub fn to_local(&self, t: f32) -> f32 {
        (t - self.lower) / self.size()
    }
}
