use anyhow::{Context, bail};
use cell::{BufferConfig, CategoryDescriptor, CellConfig, Config, Pattern, PoolConfig};
use clap::Parser;
use core::time::Duration;

/// Runtime configuration for the `cell-gen` binary.
///
/// Every option can be given as a flag or through the environment (a `.env`
/// file in the working directory is loaded first). Defaults match the
/// library defaults, so a bare `cell-gen` prints IDs for two sample
/// categories against an in-memory registry.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cell-gen",
    version,
    about = "Generates fixed-width, date-prefixed cell IDs"
)]
pub struct CliArgs {
    /// Categories to register, as `name:code` pairs. Codes are exactly three
    /// digits.
    ///
    /// Environment variable: `CELL_CATEGORIES`
    #[arg(
        long,
        env = "CELL_CATEGORIES",
        value_delimiter = ',',
        default_value = "order:101,goods:102"
    )]
    pub categories: Vec<String>,

    /// Number of IDs to generate per category.
    ///
    /// Environment variable: `CELL_COUNT`
    #[arg(short = 'n', long, env = "CELL_COUNT", default_value_t = 10)]
    pub count: usize,

    /// Number of threads generating concurrently. Defaults to the number of
    /// logical CPUs.
    ///
    /// Environment variable: `CELL_THREADS`
    #[arg(long, env = "CELL_THREADS")]
    pub threads: Option<usize>,

    /// Time granularity embedded in every ID: DAY, HOUR or MINUTE.
    ///
    /// Environment variable: `CELL_PATTERN`
    #[arg(long, env = "CELL_PATTERN", default_value_t = Pattern::Day)]
    pub pattern: Pattern,

    /// Data center digit, `0..=9`.
    ///
    /// Environment variable: `CELL_DATA_CENTER`
    #[arg(long, env = "CELL_DATA_CENTER", default_value_t = 0)]
    pub data_center: u32,

    /// Machine number, `0..=99`.
    ///
    /// Environment variable: `CELL_MACHINE`
    #[arg(long, env = "CELL_MACHINE", default_value_t = 0)]
    pub machine: u32,

    /// First value of every counter, and the value it wraps back to.
    ///
    /// Environment variable: `CELL_MIN_VALUE`
    #[arg(long, env = "CELL_MIN_VALUE", default_value_t = 0)]
    pub min_value: u64,

    /// Inclusive ceiling of every counter.
    ///
    /// Environment variable: `CELL_MAX_VALUE`
    #[arg(long, env = "CELL_MAX_VALUE", default_value_t = cell::MAX_SEQUENCE)]
    pub max_value: u64,

    /// Initial range size reserved from the registry per refill.
    ///
    /// Environment variable: `CELL_STEP`
    #[arg(long, env = "CELL_STEP", default_value_t = cell::DEFAULT_STEP)]
    pub step: u64,

    /// The dynamic step stays within `[step / 2^m, step * 2^m]`. Ignored for
    /// a bound given explicitly with `--min-step` or `--max-step`.
    ///
    /// Environment variable: `CELL_STEP_ELASTICITY`
    #[arg(long, env = "CELL_STEP_ELASTICITY", default_value_t = cell::DEFAULT_STEP_ELASTICITY)]
    pub step_elasticity: u32,

    /// Floor of the dynamic step.
    ///
    /// Environment variable: `CELL_MIN_STEP`
    #[arg(long, env = "CELL_MIN_STEP")]
    pub min_step: Option<u64>,

    /// Ceiling of the dynamic step.
    ///
    /// Environment variable: `CELL_MAX_STEP`
    #[arg(long, env = "CELL_MAX_STEP")]
    pub max_step: Option<u64>,

    /// Fraction of a segment consumed before the standby is refilled.
    ///
    /// Environment variable: `CELL_EXPANSION_THRESHOLD`
    #[arg(long, env = "CELL_EXPANSION_THRESHOLD", default_value_t = cell::DEFAULT_EXPANSION_THRESHOLD)]
    pub expansion_threshold: f64,

    /// Target time, in seconds, for consuming one segment.
    ///
    /// Environment variable: `CELL_REFILL_INTERVAL_SECS`
    #[arg(long, env = "CELL_REFILL_INTERVAL_SECS", default_value_t = cell::DEFAULT_REFILL_INTERVAL.as_secs())]
    pub refill_interval_secs: u64,

    /// How long, in milliseconds, an allocation waits for a refill once its
    /// segment is exhausted.
    ///
    /// Environment variable: `CELL_WAIT_TIMEOUT_MS`
    #[arg(long, env = "CELL_WAIT_TIMEOUT_MS", default_value_t = 200)]
    pub wait_timeout_ms: u64,

    /// Long-lived refill workers.
    ///
    /// Environment variable: `CELL_POOL_CORE_SIZE`
    #[arg(long, env = "CELL_POOL_CORE_SIZE", default_value_t = cell::DEFAULT_POOL_CORE_SIZE)]
    pub pool_core_size: usize,

    /// Upper bound on refill workers.
    ///
    /// Environment variable: `CELL_POOL_MAX_SIZE`
    #[arg(long, env = "CELL_POOL_MAX_SIZE", default_value_t = cell::DEFAULT_POOL_MAX_SIZE)]
    pub pool_max_size: usize,

    /// Idle seconds after which an extra refill worker exits.
    ///
    /// Environment variable: `CELL_POOL_KEEP_ALIVE_SECS`
    #[arg(long, env = "CELL_POOL_KEEP_ALIVE_SECS", default_value_t = cell::DEFAULT_POOL_KEEP_ALIVE.as_secs())]
    pub pool_keep_alive_secs: u64,

    /// Emit logs as JSON instead of the human-readable format.
    ///
    /// Environment variable: `CELL_LOG_JSON`
    #[arg(long, env = "CELL_LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cell: Config,
    pub categories: Vec<CategoryDescriptor>,
    pub count: usize,
    pub threads: usize,
    pub log_json: bool,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.categories.is_empty() {
            bail!("CELL_CATEGORIES must name at least one category");
        }
        let categories = args
            .categories
            .iter()
            .map(|entry| parse_category(entry))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let threads = args.threads.unwrap_or_else(num_cpus::get);
        if threads == 0 {
            bail!("CELL_THREADS must be greater than 0");
        }

        let mut buffer = BufferConfig::with_elasticity(args.step, args.step_elasticity);
        if let Some(min_step) = args.min_step {
            buffer.min_step = min_step;
        }
        if let Some(max_step) = args.max_step {
            buffer.max_step = max_step;
        }
        buffer.expansion_threshold = args.expansion_threshold;
        buffer.refill_interval = Duration::from_secs(args.refill_interval_secs);
        buffer.wait_timeout = Duration::from_millis(args.wait_timeout_ms);
        buffer.pool = PoolConfig {
            core_size: args.pool_core_size,
            max_size: args.pool_max_size,
            keep_alive: Duration::from_secs(args.pool_keep_alive_secs),
        };

        let cell = Config {
            cell: CellConfig {
                pattern: args.pattern,
                data_center: args.data_center,
                machine: args.machine,
                min_value: args.min_value,
                max_value: args.max_value,
                step: args.step,
            },
            buffer,
        };
        cell.validate().context("invalid cell configuration")?;

        Ok(Self {
            cell,
            categories,
            count: args.count,
            threads,
            log_json: args.log_json,
        })
    }
}

fn parse_category(entry: &str) -> anyhow::Result<CategoryDescriptor> {
    let Some((name, code)) = entry.split_once(':') else {
        bail!("category `{entry}` must be written as name:code");
    };
    let (name, code) = (name.trim(), code.trim());
    if name.is_empty() || code.is_empty() {
        bail!("category `{entry}` has an empty name or code");
    }
    Ok(CategoryDescriptor::new(name, code))
}
