//! Runtime configuration.
//!
//! [`Config`] groups the ID identity settings ([`CellConfig`]) with the
//! buffer tuning knobs ([`BufferConfig`]). All defaults are usable as-is;
//! [`Config::validate`] is run by [`CellFacade::new`](crate::CellFacade::new)
//! and any violation is fatal.

use core::time::Duration;

use crate::{Error, MAX_DATA_CENTER, MAX_MACHINE, MAX_SEQUENCE, Pattern, Result};

/// Default threshold at which the standby segment is refilled.
pub const DEFAULT_EXPANSION_THRESHOLD: f64 = 0.75;
/// Default target time between two refills of the same buffer.
pub const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_secs(10 * 60);
/// Default bound on how long an allocation waits for a standby segment.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(200);
/// Default number of long-lived refill workers.
pub const DEFAULT_POOL_CORE_SIZE: usize = 5;
/// Default upper bound on refill workers, long-lived and transient.
pub const DEFAULT_POOL_MAX_SIZE: usize = 64;
/// Default idle time after which a transient refill worker exits.
pub const DEFAULT_POOL_KEEP_ALIVE: Duration = Duration::from_secs(60);
/// Default range size stored for newly registered categories.
pub const DEFAULT_STEP: u64 = 1000;
/// Default step elasticity: the dynamic step stays within
/// `[step / 2^m, step * 2^m]`.
pub const DEFAULT_STEP_ELASTICITY: u32 = 2;

/// Identity and registry seed settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellConfig {
    /// Time granularity embedded in every ID.
    pub pattern: Pattern,
    /// Data center, `0..=9`.
    pub data_center: u32,
    /// Machine, `0..=99`.
    pub machine: u32,
    /// First value of a newly registered counter, and the value it wraps to.
    pub min_value: u64,
    /// Inclusive ceiling of every counter.
    pub max_value: u64,
    /// Initial range size of a newly registered counter.
    pub step: u64,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            pattern: Pattern::Day,
            data_center: 0,
            machine: 0,
            min_value: 0,
            max_value: MAX_SEQUENCE,
            step: DEFAULT_STEP,
        }
    }
}

impl CellConfig {
    /// # Errors
    ///
    /// [`Error::Configuration`] on the first violated bound.
    pub fn validate(&self) -> Result<()> {
        if self.data_center > MAX_DATA_CENTER {
            return Err(Error::configuration(format!(
                "data center {} exceeds {MAX_DATA_CENTER}",
                self.data_center
            )));
        }
        if self.machine > MAX_MACHINE {
            return Err(Error::configuration(format!(
                "machine {} exceeds {MAX_MACHINE}",
                self.machine
            )));
        }
        if self.max_value > MAX_SEQUENCE {
            return Err(Error::configuration(format!(
                "max value {} does not fit the sequence field (max {MAX_SEQUENCE})",
                self.max_value
            )));
        }
        if self.min_value >= self.max_value {
            return Err(Error::configuration(format!(
                "min value {} must be below max value {}",
                self.min_value, self.max_value
            )));
        }
        if self.step == 0 || self.step >= self.max_value - self.min_value {
            return Err(Error::configuration(format!(
                "step {} must be in 1..{}",
                self.step,
                self.max_value - self.min_value
            )));
        }
        Ok(())
    }
}

/// Refill worker pool sizing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub core_size: usize,
    pub max_size: usize,
    pub keep_alive: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_size: DEFAULT_POOL_CORE_SIZE,
            max_size: DEFAULT_POOL_MAX_SIZE,
            keep_alive: DEFAULT_POOL_KEEP_ALIVE,
        }
    }
}

/// Segment buffer tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferConfig {
    /// Fraction of the active segment consumed before the standby segment is
    /// refilled, in `(0, 1)`.
    pub expansion_threshold: f64,
    /// Floor of the dynamic step.
    pub min_step: u64,
    /// Ceiling of the dynamic step.
    pub max_step: u64,
    /// Target time for consuming one segment. Faster consumption grows the
    /// step, consumption slower than twice this shrinks it.
    pub refill_interval: Duration,
    /// Upper bound on how long an allocation waits for the standby segment
    /// once the active one is exhausted.
    pub wait_timeout: Duration,
    pub pool: PoolConfig,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::with_elasticity(DEFAULT_STEP, DEFAULT_STEP_ELASTICITY)
    }
}

impl BufferConfig {
    /// Default tuning with the step bounds derived from `step`:
    /// `[step / 2^elasticity, step * 2^elasticity]`.
    pub fn with_elasticity(step: u64, elasticity: u32) -> Self {
        let factor = 1_u64.checked_shl(elasticity).unwrap_or(u64::MAX);
        Self {
            expansion_threshold: DEFAULT_EXPANSION_THRESHOLD,
            min_step: (step / factor).max(1),
            max_step: step.saturating_mul(factor),
            refill_interval: DEFAULT_REFILL_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            pool: PoolConfig::default(),
        }
    }

    /// # Errors
    ///
    /// [`Error::Configuration`] on the first violated bound.
    pub fn validate(&self) -> Result<()> {
        if !(self.expansion_threshold > 0.0 && self.expansion_threshold < 1.0) {
            return Err(Error::configuration(format!(
                "expansion threshold {} must be in (0, 1)",
                self.expansion_threshold
            )));
        }
        if self.min_step == 0 || self.min_step > self.max_step {
            return Err(Error::configuration(format!(
                "step bounds [{}, {}] must satisfy 0 < min <= max",
                self.min_step, self.max_step
            )));
        }
        if self.refill_interval.is_zero() {
            return Err(Error::configuration("refill interval must be non-zero"));
        }
        if self.pool.core_size == 0 {
            return Err(Error::configuration("pool core size must be at least 1"));
        }
        if self.pool.max_size < self.pool.core_size {
            return Err(Error::configuration(format!(
                "pool max size {} is below core size {}",
                self.pool.max_size, self.pool.core_size
            )));
        }
        Ok(())
    }
}

/// Full configuration for a [`CellFacade`](crate::CellFacade).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    pub cell: CellConfig,
    pub buffer: BufferConfig,
}

impl Config {
    /// # Errors
    ///
    /// [`Error::Configuration`] if either section is invalid, or if the
    /// registry step falls outside the buffer's step bounds. Buffers are
    /// primed with the step stored on each registry row.
    pub fn validate(&self) -> Result<()> {
        self.cell.validate()?;
        self.buffer.validate()?;
        if !(self.buffer.min_step..=self.buffer.max_step).contains(&self.cell.step) {
            return Err(Error::configuration(format!(
                "step {} is outside the buffer step bounds [{}, {}]",
                self.cell.step, self.buffer.min_step, self.buffer.max_step
            )));
        }
        Ok(())
    }
}
