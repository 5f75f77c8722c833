use portable_atomic::{AtomicU64, Ordering};

/// A pre-reserved range of sequence values with an atomic cursor.
///
/// A segment filled with `(start, step)` hands out `start..=start + step - 1`
/// through [`try_take`](Self::try_take). The cursor keeps advancing past
/// `max` once the range is spent; every such take reports exhaustion.
///
/// `Segment` does no locking of its own. [`fill`](Self::fill) takes `&mut
/// self`, so the owning [`SegmentBuffer`](crate::SegmentBuffer) serializes
/// fills against takes with its read-write lock.
#[derive(Debug)]
pub struct Segment {
    #[cfg(feature = "cache-padded")]
    value: crossbeam_utils::CachePadded<AtomicU64>,
    #[cfg(not(feature = "cache-padded"))]
    value: AtomicU64,
    max: u64,
    step: u64,
}

impl Default for Segment {
    fn default() -> Self {
        Self::empty()
    }
}

impl Segment {
    /// A segment that has never been filled. It is permanently exhausted.
    pub fn empty() -> Self {
        Self {
            #[cfg(feature = "cache-padded")]
            value: crossbeam_utils::CachePadded::new(AtomicU64::new(1)),
            #[cfg(not(feature = "cache-padded"))]
            value: AtomicU64::new(1),
            max: 0,
            step: 0,
        }
    }

    /// A segment covering `[start, start + step - 1]`.
    pub fn filled(start: u64, step: u64) -> Self {
        let mut segment = Self::empty();
        segment.fill(start, step);
        segment
    }

    /// Overwrites this segment with the range `[start, start + step - 1]`.
    ///
    /// A zero `step` leaves the segment exhausted.
    pub fn fill(&mut self, start: u64, step: u64) {
        if step == 0 {
            *self = Self::empty();
            return;
        }
        *self.value.get_mut() = start;
        self.max = start.saturating_add(step - 1);
        self.step = step;
    }

    /// Takes the next value, or `None` if the range is spent.
    ///
    /// Values returned by one fill generation are unique and strictly
    /// increasing in take order.
    #[inline]
    pub fn try_take(&self) -> Option<u64> {
        let value = self.value.fetch_add(1, Ordering::Relaxed);
        (value <= self.max && self.step != 0).then_some(value)
    }

    /// The cursor: the next value [`try_take`](Self::try_take) will attempt.
    #[inline]
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Inclusive upper bound of the range.
    pub const fn max(&self) -> u64 {
        self.max
    }

    /// Size of the range this segment was filled with.
    pub const fn step(&self) -> u64 {
        self.step
    }

    pub fn is_exhausted(&self) -> bool {
        self.step == 0 || self.current() > self.max
    }

    /// Fraction of the step consumed, measured as `(value mod step) / step`.
    ///
    /// Ranges start on arbitrary values, so this is a position within the
    /// step cycle rather than an exact count of takes.
    pub fn consumed_ratio(&self) -> f64 {
        if self.step == 0 {
            return 1.0;
        }
        (self.current() % self.step) as f64 / self.step as f64
    }
}
