use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use parking_lot::Mutex;

use crate::{
    BufferConfig, BufferSnapshot, Error, RefillPool, RegistryRecord, RegistryStore, Result,
    SegmentBuffer, compute_next_step,
};

/// Owns one [`SegmentBuffer`] per registered name and keeps them topped up
/// from a [`RegistryStore`].
///
/// The cache is built once by [`init_cache`](Self::init_cache) and never
/// changes shape afterwards; [`get_sequence`](Self::get_sequence) only looks
/// buffers up. Refills run on a bounded [`RefillPool`] and never hold a
/// buffer lock while talking to the store.
///
/// ```
/// use std::sync::Arc;
/// use cell::{BufferConfig, BufferManager, CellConfig, MemoryRegistryStore, RegistryRecord};
///
/// let store = Arc::new(MemoryRegistryStore::with_records([RegistryRecord::init(
///     "order",
///     &CellConfig::default(),
/// )]));
/// let manager = BufferManager::new(store, BufferConfig::default()).unwrap();
/// manager.init_cache().unwrap();
///
/// assert_eq!(manager.get_sequence("order").unwrap(), 0);
/// assert_eq!(manager.get_sequence("order").unwrap(), 1);
/// ```
pub struct BufferManager<S>
where
    S: RegistryStore + 'static,
{
    store: Arc<S>,
    config: BufferConfig,
    cache: OnceLock<HashMap<String, Arc<SegmentBuffer>>>,
    init_lock: Mutex<()>,
    pool: RefillPool,
}

impl<S> core::fmt::Debug for BufferManager<S>
where
    S: RegistryStore + 'static,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferManager")
            .field("config", &self.config)
            .field("ready", &self.is_ready())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Releases a buffer's refill slot unless the refill installed a segment.
///
/// Dropped without running when the pool rejects the job, or after a failed
/// fetch; either way a later allocation can claim the slot again.
struct ExpansionGuard {
    buffer: Arc<SegmentBuffer>,
    armed: bool,
}

impl ExpansionGuard {
    fn new(buffer: &Arc<SegmentBuffer>) -> Self {
        Self {
            buffer: Arc::clone(buffer),
            armed: true,
        }
    }

    /// Installs `record` in the standby slot. `fill_standby` releases the
    /// slot itself, so the guard must not release it a second time: a new
    /// refill may already have claimed it.
    fn complete(mut self, record: &RegistryRecord) {
        self.buffer.fill_standby(record);
        self.armed = false;
    }
}

impl Drop for ExpansionGuard {
    fn drop(&mut self) {
        if self.armed {
            self.buffer.end_expansion();
        }
    }
}

impl<S> BufferManager<S>
where
    S: RegistryStore + 'static,
{
    /// Creates a manager and starts its refill workers. The cache is empty
    /// until [`init_cache`](Self::init_cache) runs.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if `config` is invalid or the refill workers
    /// cannot be started.
    pub fn new(store: Arc<S>, config: BufferConfig) -> Result<Self> {
        config.validate()?;
        let pool = RefillPool::new(config.pool.clone())
            .map_err(|e| Error::configuration(format!("cannot start refill pool: {e}")))?;
        Ok(Self {
            store,
            config,
            cache: OnceLock::new(),
            init_lock: Mutex::new(()),
            pool,
        })
    }

    /// Primes one buffer per name known to the store with a synchronous
    /// fetch of the row's own step, clamped to the configured step bounds.
    /// Runs once; later calls return immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::Persistence`] if the store has no registered names or a
    ///   fetch fails. Nothing is cached and the call may be retried.
    /// - [`Error::Closed`] after [`close`](Self::close).
    pub fn init_cache(&self) -> Result<()> {
        if self.pool.is_closed() {
            return Err(Error::Closed);
        }
        let _guard = self.init_lock.lock();
        if self.cache.get().is_some() {
            #[cfg(feature = "tracing")]
            tracing::info!("buffer cache already initialized");
            return Ok(());
        }

        let names = self.store.query_all_names()?;
        if names.is_empty() {
            return Err(Error::persistence(
                "registry has no names; bootstrap categories before initializing the cache",
            ));
        }

        #[cfg(feature = "tracing")]
        tracing::info!(count = names.len(), "initializing buffer cache");

        let mut cache = HashMap::with_capacity(names.len());
        for name in names {
            let step = self.stored_step(&name)?;
            let record = self.store.advance_and_fetch(&name, step)?;

            #[cfg(feature = "tracing")]
            tracing::debug!(
                name = %name,
                start = record.value,
                step = record.step,
                "primed buffer"
            );
            cache.insert(name, Arc::new(SegmentBuffer::new(&record)));
        }

        // Guarded by `init_lock`, so nothing else can have set it.
        let _ = self.cache.set(cache);

        #[cfg(feature = "tracing")]
        tracing::info!("buffer cache initialized");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Allocates the next sequence value for `name`.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] after [`close`](Self::close).
    /// - [`Error::NotReady`] before [`init_cache`](Self::init_cache) has
    ///   completed.
    /// - [`Error::NotFound`] if `name` has no buffer.
    /// - [`Error::Timeout`] if the active segment is exhausted and no refill
    ///   landed within the configured wait.
    pub fn get_sequence(&self, name: &str) -> Result<u64> {
        if self.pool.is_closed() {
            return Err(Error::Closed);
        }
        let buffer = self.buffer(name)?;
        buffer.allocate(
            self.config.expansion_threshold,
            self.config.wait_timeout,
            || self.schedule_refill(buffer),
        )
    }

    /// Diagnostic view of the buffer for `name`.
    pub fn snapshot(&self, name: &str) -> Option<BufferSnapshot> {
        self.cache.get()?.get(name).map(|buffer| buffer.snapshot())
    }

    /// Names with a cached buffer, sorted. Empty before initialization.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .cache
            .get()
            .map(|cache| cache.keys().cloned().collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Stops the refill workers, waiting for in-flight refills. Subsequent
    /// allocations fail with [`Error::Closed`].
    pub fn close(&self) {
        self.pool.close();
    }

    /// Step recorded on the registry row for `name`, within
    /// `[min_step, max_step]`.
    fn stored_step(&self, name: &str) -> Result<u64> {
        let mut step = None;
        self.store.transaction(&mut |tx| {
            step = tx.lock_query_by_name(name)?.map(|record| record.step);
            Ok(())
        })?;
        let step =
            step.ok_or_else(|| Error::persistence(format!("no registry row for `{name}`")))?;
        Ok(step.clamp(self.config.min_step, self.config.max_step))
    }

    fn buffer(&self, name: &str) -> Result<&Arc<SegmentBuffer>> {
        let cache = self.cache.get().ok_or(Error::NotReady)?;
        cache.get(name).ok_or_else(|| {
            #[cfg(feature = "tracing")]
            tracing::warn!(name, "no buffer registered");
            Error::NotFound {
                name: name.to_owned(),
            }
        })
    }

    /// Hands a refill of `buffer`'s standby slot to the pool. The caller has
    /// already won the buffer's refill slot.
    fn schedule_refill(&self, buffer: &Arc<SegmentBuffer>) {
        let guard = ExpansionGuard::new(buffer);
        let store = Arc::clone(&self.store);
        let config = self.config.clone();

        let job = Box::new(move || refill(&*store, &config, guard));
        if let Err(_e) = self.pool.execute(job) {
            // The job, and with it the guard, was dropped: the refill slot
            // is free again for a later allocation.
            #[cfg(feature = "tracing")]
            tracing::warn!(name = buffer.name(), error = %_e, "refill not scheduled");
        }
    }
}

impl<S> Drop for BufferManager<S>
where
    S: RegistryStore + 'static,
{
    fn drop(&mut self) {
        self.close();
    }
}

fn refill<S>(store: &S, config: &BufferConfig, guard: ExpansionGuard)
where
    S: RegistryStore + ?Sized,
{
    let buffer = Arc::clone(&guard.buffer);
    let (step, elapsed) = buffer.refill_hint();
    let next_step = compute_next_step(
        step,
        elapsed,
        config.refill_interval,
        config.min_step,
        config.max_step,
    );

    match store.advance_and_fetch(buffer.name(), next_step) {
        Ok(record) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                name = buffer.name(),
                ?elapsed,
                step,
                next_step = record.step,
                start = record.value,
                "refilled standby segment"
            );
            guard.complete(&record);
        }
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(name = buffer.name(), error = %_e, "refill failed");
        }
    }
}
