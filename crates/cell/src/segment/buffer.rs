use core::time::Duration;
use std::{thread, time::Instant};

use parking_lot::RwLock;
use portable_atomic::{AtomicBool, Ordering};

use crate::{Error, RegistryRecord, Result, Segment};

/// First sleep of the exhausted-segment wait loop.
const MIN_BACKOFF: Duration = Duration::from_micros(50);
/// Longest single sleep of the exhausted-segment wait loop.
const MAX_BACKOFF: Duration = Duration::from_millis(5);

/// Double-buffered segments for one name.
///
/// One slot is active and serves allocations; the other is either stale
/// (free to refill) or a filled standby waiting to be promoted. At most one
/// refill is in flight at a time, guarded by the `expanding` flag rather
/// than by the lock, so the lock is never held across a store round trip.
///
/// ```text
///             allocate (read lock)
///                  │
///   ┌──────────────▼───────────┐      ┌──────────────────────────┐
///   │ active: [start..=max]    │      │ standby: stale / ready   │
///   └──────────────────────────┘      └──────────────────────────┘
///                  ▲  promote (write lock)     ▲ fill_standby (write lock)
/// ```
#[derive(Debug)]
pub struct SegmentBuffer {
    name: String,
    state: RwLock<BufferState>,
    expanding: AtomicBool,
}

#[derive(Debug)]
struct BufferState {
    segments: [Segment; 2],
    active: usize,
    next_ready: bool,
    last_refill: Instant,
}

impl BufferState {
    #[inline]
    fn active(&self) -> &Segment {
        &self.segments[self.active]
    }

    const fn standby_index(&self) -> usize {
        self.active ^ 1
    }

    fn needs_expansion(&self, threshold: f64) -> bool {
        !self.next_ready && self.active().consumed_ratio() >= threshold
    }
}

/// Point-in-time view of a [`SegmentBuffer`], for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferSnapshot {
    pub name: String,
    /// Index of the active slot, 0 or 1.
    pub active: usize,
    /// Cursor of the active segment.
    pub value: u64,
    /// Inclusive upper bound of the active segment.
    pub max: u64,
    /// Step of the active segment.
    pub step: u64,
    pub next_ready: bool,
    pub expanding: bool,
}

impl SegmentBuffer {
    /// Creates a buffer whose active slot holds the range reserved by
    /// `record`.
    pub fn new(record: &RegistryRecord) -> Self {
        Self {
            name: record.name.clone(),
            state: RwLock::new(BufferState {
                segments: [Segment::filled(record.value, record.step), Segment::empty()],
                active: 0,
                next_ready: false,
                last_refill: Instant::now(),
            }),
            expanding: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the standby slot should be refilled now.
    ///
    /// Always false while a filled standby is waiting; otherwise true once
    /// the active segment is at least `threshold` through its step.
    pub fn needs_expansion(&self, threshold: f64) -> bool {
        self.state.read().needs_expansion(threshold)
    }

    /// Claims the single refill slot. Only the caller that gets `true` may
    /// refill; it must eventually call [`end_expansion`](Self::end_expansion)
    /// or [`fill_standby`](Self::fill_standby).
    pub fn begin_expansion(&self) -> bool {
        self.expanding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the refill slot without installing a segment.
    pub fn end_expansion(&self) {
        self.expanding.store(false, Ordering::Release);
    }

    pub fn is_expanding(&self) -> bool {
        self.expanding.load(Ordering::Acquire)
    }

    pub fn is_next_ready(&self) -> bool {
        self.state.read().next_ready
    }

    fn is_active_exhausted(&self) -> bool {
        self.state.read().active().is_exhausted()
    }

    /// Installs the range reserved by `record` into the standby slot, marks
    /// it ready and releases the refill slot.
    pub fn fill_standby(&self, record: &RegistryRecord) {
        {
            let mut state = self.state.write();
            let standby = state.standby_index();
            state.segments[standby].fill(record.value, record.step);
            state.next_ready = true;
            state.last_refill = Instant::now();
        }
        self.end_expansion();
    }

    /// Swaps the ready standby in as the active segment.
    ///
    /// Returns `false`, changing nothing, if no standby is ready or the active
    /// segment still has values; a caller that saw it exhausted may be late
    /// and another caller already promoted.
    pub fn promote(&self) -> bool {
        let mut state = self.state.write();
        if !state.next_ready || !state.active().is_exhausted() {
            return false;
        }
        state.active = state.standby_index();
        state.next_ready = false;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            name = %self.name,
            active = state.active,
            start = state.active().current(),
            max = state.active().max(),
            "promoted standby segment"
        );
        true
    }

    /// Step of the active segment and time since the last fill; the inputs
    /// of the dynamic step policy.
    pub fn refill_hint(&self) -> (u64, Duration) {
        let state = self.state.read();
        (state.active().step(), state.last_refill.elapsed())
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        let state = self.state.read();
        let active = state.active();
        BufferSnapshot {
            name: self.name.clone(),
            active: state.active,
            value: active.current(),
            max: active.max(),
            step: active.step(),
            next_ready: state.next_ready,
            expanding: self.is_expanding(),
        }
    }

    /// Allocates the next value.
    ///
    /// The fast path takes the read lock, triggers `expand` if the active
    /// segment has crossed `threshold` and this caller wins the refill slot,
    /// and takes a value from the active segment.
    ///
    /// When the active segment is exhausted the call waits, with a bounded
    /// backoff, for a standby to become ready, promotes it and retries. An
    /// exhausted segment with no ready standby also triggers `expand`.
    ///
    /// `expand` must not block; it is expected to hand the refill off and
    /// release the refill slot if it cannot.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if no value could be taken within `timeout`.
    pub fn allocate<F>(&self, threshold: f64, timeout: Duration, mut expand: F) -> Result<u64>
    where
        F: FnMut(),
    {
        let start = Instant::now();
        let mut backoff = MIN_BACKOFF;

        loop {
            {
                let state = self.state.read();
                if state.needs_expansion(threshold) && self.begin_expansion() {
                    expand();
                }
                if let Some(value) = state.active().try_take() {
                    return Ok(value);
                }
                if !state.next_ready && self.begin_expansion() {
                    expand();
                }
            }

            if self.promote() || !self.is_active_exhausted() {
                continue;
            }

            let waited = start.elapsed();
            if waited >= timeout {
                #[cfg(feature = "tracing")]
                tracing::warn!(name = %self.name, ?waited, "sequence allocation timed out");
                return Err(Error::Timeout {
                    name: self.name.clone(),
                    waited,
                });
            }
            thread::sleep(backoff.min(timeout - waited));
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
}
