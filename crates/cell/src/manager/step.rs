use core::time::Duration;

/// Sizes the next refill from how quickly the previous segment was consumed.
///
/// - `elapsed < interval`: the segment went faster than planned, so the step
///   doubles, capped at `max_step`.
/// - `elapsed >= 2 * interval`: it went slower than planned, so the step
///   halves, floored at `min_step`.
/// - otherwise the step is kept.
///
/// The result always lies in `[min_step, max_step]`.
///
/// ```
/// use cell::compute_next_step;
/// use core::time::Duration;
///
/// let interval = Duration::from_secs(600);
/// assert_eq!(compute_next_step(1000, Duration::from_secs(60), interval, 250, 4000), 2000);
/// assert_eq!(compute_next_step(1000, Duration::from_secs(900), interval, 250, 4000), 1000);
/// assert_eq!(compute_next_step(1000, Duration::from_secs(1200), interval, 250, 4000), 500);
/// ```
pub fn compute_next_step(
    step: u64,
    elapsed: Duration,
    interval: Duration,
    min_step: u64,
    max_step: u64,
) -> u64 {
    let next = if elapsed < interval {
        step.saturating_mul(2)
    } else if elapsed >= interval.saturating_mul(2) {
        step / 2
    } else {
        step
    };
    next.clamp(min_step, max_step.max(min_step))
}
