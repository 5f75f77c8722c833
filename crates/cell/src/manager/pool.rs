use core::time::Duration;
use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use portable_atomic::{AtomicUsize, Ordering};

use crate::{PoolConfig, PoolError};

/// A unit of work for the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Bounded thread pool with direct hand-off and a reject policy.
///
/// There is no queue: [`execute`](Self::execute) hands a job straight to an
/// idle worker, or spawns a transient worker if the pool is below its
/// maximum size, or fails with [`PoolError::Rejected`]. A refill that cannot
/// run right away is dropped rather than backlogged; it would be computed
/// from stale consumption data by the time it ran.
///
/// `core_size` workers live until [`close`](Self::close). Workers beyond
/// that exit after `keep_alive` without work.
pub struct RefillPool {
    sender: RwLock<Option<Sender<Job>>>,
    receiver: Receiver<Job>,
    config: PoolConfig,
    live: Arc<AtomicUsize>,
    spawned: AtomicUsize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl core::fmt::Debug for RefillPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RefillPool")
            .field("config", &self.config)
            .field("live", &self.live.load(Ordering::Relaxed))
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Decrements the live worker count when a worker exits, panicking or not.
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl RefillPool {
    /// Starts `config.core_size` workers.
    ///
    /// # Errors
    ///
    /// [`PoolError::Spawn`] if a worker thread cannot be created. Workers
    /// already started are shut down.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        let pool = Self {
            sender: RwLock::new(Some(sender)),
            receiver,
            config,
            live: Arc::new(AtomicUsize::new(0)),
            spawned: AtomicUsize::new(0),
            handles: Mutex::new(Vec::new()),
        };

        for _ in 0..pool.config.core_size {
            pool.live.fetch_add(1, Ordering::AcqRel);
            if let Err(e) = pool.spawn_worker(None, None) {
                pool.live.fetch_sub(1, Ordering::AcqRel);
                pool.close();
                return Err(e);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            core_size = pool.config.core_size,
            max_size = pool.config.max_size,
            "refill pool started"
        );
        Ok(pool)
    }

    /// Runs `job` on a worker.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Rejected`] if every worker is busy and the pool is at
    ///   `max_size`.
    /// - [`PoolError::Shutdown`] after [`close`](Self::close).
    /// - [`PoolError::Spawn`] if a transient worker could not be created.
    ///
    /// On error the job is dropped without running.
    pub fn execute(&self, job: Job) -> Result<(), PoolError> {
        let sender = self.sender.read();
        let Some(sender) = sender.as_ref() else {
            return Err(PoolError::Shutdown);
        };

        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => self.spawn_transient(job),
            Err(TrySendError::Disconnected(_)) => Err(PoolError::Shutdown),
        }
    }

    /// Number of live workers, core and transient.
    pub fn size(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Stops accepting jobs and joins every worker. Jobs already running
    /// finish first. Calling it again is a no-op.
    pub fn close(&self) {
        let Some(sender) = self.sender.write().take() else {
            return;
        };
        drop(sender);

        let handles = core::mem::take(&mut *self.handles.lock());
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }

        #[cfg(feature = "tracing")]
        tracing::info!("refill pool shut down");
    }

    fn spawn_transient(&self, job: Job) -> Result<(), PoolError> {
        let max = self.config.max_size;
        if self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .is_err()
        {
            return Err(PoolError::Rejected { size: max });
        }

        if let Err(e) = self.spawn_worker(Some(job), Some(self.config.keep_alive)) {
            self.live.fetch_sub(1, Ordering::AcqRel);
            return Err(e);
        }
        Ok(())
    }

    /// Spawns a worker whose slot in `live` has already been reserved.
    fn spawn_worker(&self, first: Option<Job>, idle: Option<Duration>) -> Result<(), PoolError> {
        let id = self.spawned.fetch_add(1, Ordering::Relaxed);
        let receiver = self.receiver.clone();
        let live = Arc::clone(&self.live);

        let handle = thread::Builder::new()
            .name(format!("cell-refill-{id}"))
            .spawn(move || {
                let _guard = LiveGuard(live);
                if let Some(job) = first {
                    run(job);
                }
                match idle {
                    None => {
                        while let Ok(job) = receiver.recv() {
                            run(job);
                        }
                    }
                    Some(keep_alive) => loop {
                        match receiver.recv_timeout(keep_alive) {
                            Ok(job) => run(job),
                            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                                break;
                            }
                        }
                    },
                }
            })
            .map_err(|e| PoolError::Spawn {
                context: e.to_string(),
            })?;

        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        Ok(())
    }
}

impl Drop for RefillPool {
    fn drop(&mut self) {
        self.close();
    }
}

fn run(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        #[cfg(feature = "tracing")]
        tracing::error!("refill job panicked");
    }
}
