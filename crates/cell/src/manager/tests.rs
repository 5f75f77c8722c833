use crate::{
    BufferConfig, BufferManager, CellConfig, Error, MemoryRegistryStore, PoolConfig,
    RegistryRecord, RegistryStore, RegistryTransaction, Result,
};
use core::time::Duration;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::scope;
use std::time::Instant;

fn seeded(names: &[&str], step: u64) -> Arc<MemoryRegistryStore> {
    let cell = CellConfig {
        step,
        ..CellConfig::default()
    };
    Arc::new(MemoryRegistryStore::with_records(
        names.iter().map(|name| RegistryRecord::init(*name, &cell)),
    ))
}

fn buffer_config(min_step: u64, max_step: u64) -> BufferConfig {
    BufferConfig {
        min_step,
        max_step,
        pool: PoolConfig {
            core_size: 2,
            max_size: 4,
            ..PoolConfig::default()
        },
        ..BufferConfig::default()
    }
}

/// Wraps a [`MemoryRegistryStore`]; every fetch after the first `allowed`
/// fails.
struct FailingStore {
    inner: MemoryRegistryStore,
    allowed: usize,
    calls: AtomicUsize,
}

impl RegistryStore for FailingStore {
    fn exists_table(&self) -> Result<bool> {
        self.inner.exists_table()
    }

    fn query_all_names(&self) -> Result<Vec<String>> {
        self.inner.query_all_names()
    }

    fn advance_and_fetch(&self, name: &str, step: u64) -> Result<RegistryRecord> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.allowed {
            return Err(Error::Persistence {
                context: "connection refused".into(),
            });
        }
        self.inner.advance_and_fetch(name, step)
    }

    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn RegistryTransaction) -> Result<()>,
    ) -> Result<()> {
        self.inner.transaction(work)
    }
}

/// Every fetch after the first blocks until `release` is dropped.
struct StalledStore {
    inner: MemoryRegistryStore,
    calls: AtomicUsize,
    release: Receiver<()>,
}

impl RegistryStore for StalledStore {
    fn exists_table(&self) -> Result<bool> {
        self.inner.exists_table()
    }

    fn query_all_names(&self) -> Result<Vec<String>> {
        self.inner.query_all_names()
    }

    fn advance_and_fetch(&self, name: &str, step: u64) -> Result<RegistryRecord> {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            let _ = self.release.recv();
        }
        self.inner.advance_and_fetch(name, step)
    }

    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn RegistryTransaction) -> Result<()>,
    ) -> Result<()> {
        self.inner.transaction(work)
    }
}

fn stalled(step: u64) -> (Arc<StalledStore>, Sender<()>) {
    let (tx, rx) = bounded(0);
    let cell = CellConfig {
        step,
        ..CellConfig::default()
    };
    let store = StalledStore {
        inner: MemoryRegistryStore::with_records([RegistryRecord::init("order", &cell)]),
        calls: AtomicUsize::new(0),
        release: rx,
    };
    (Arc::new(store), tx)
}

#[test]
fn get_sequence_before_init_is_not_ready() {
    let manager = BufferManager::new(seeded(&["order"], 10), BufferConfig::default()).unwrap();
    assert!(!manager.is_ready());
    assert_eq!(manager.get_sequence("order"), Err(Error::NotReady));
    assert!(manager.names().is_empty());
    assert!(manager.snapshot("order").is_none());
}

#[test]
fn unknown_name_is_not_found() {
    let manager = BufferManager::new(seeded(&["order"], 10), BufferConfig::default()).unwrap();
    manager.init_cache().unwrap();
    assert_eq!(
        manager.get_sequence("refund"),
        Err(Error::NotFound {
            name: "refund".into()
        })
    );
}

#[test]
fn init_with_empty_registry_is_fatal() {
    let manager =
        BufferManager::new(Arc::new(MemoryRegistryStore::new()), BufferConfig::default()).unwrap();
    assert!(matches!(
        manager.init_cache(),
        Err(Error::Persistence { .. })
    ));
    assert!(!manager.is_ready());
}

#[test]
fn init_is_idempotent() {
    let store = seeded(&["order", "goods"], 10);
    let manager = BufferManager::new(Arc::clone(&store), buffer_config(5, 40)).unwrap();
    manager.init_cache().unwrap();
    manager.init_cache().unwrap();

    assert_eq!(manager.names(), vec!["goods".to_string(), "order".to_string()]);
    // One priming fetch per name.
    assert_eq!(store.get("order").unwrap().value, 10);
    assert_eq!(store.get("goods").unwrap().value, 10);
}

#[test]
fn init_primes_with_the_stored_step() {
    let store = seeded(&["order"], 32);
    let manager = BufferManager::new(Arc::clone(&store), buffer_config(8, 64)).unwrap();
    manager.init_cache().unwrap();

    let snapshot = manager.snapshot("order").unwrap();
    assert_eq!(snapshot.step, 32);
    assert_eq!(snapshot.max, 31);
    assert_eq!(store.get("order").unwrap().value, 32);
}

#[test]
fn init_clamps_the_stored_step_to_bounds() {
    let store = seeded(&["order", "goods"], 1000);
    store
        .transaction(&mut |tx| {
            let mut small = RegistryRecord::init("refund", &CellConfig::default());
            small.step = 2;
            tx.save(small)
        })
        .unwrap();
    let manager = BufferManager::new(Arc::clone(&store), buffer_config(5, 40)).unwrap();
    manager.init_cache().unwrap();

    assert_eq!(manager.snapshot("order").unwrap().step, 40);
    assert_eq!(manager.snapshot("goods").unwrap().step, 40);
    assert_eq!(manager.snapshot("refund").unwrap().step, 5);
}

#[test]
fn invalid_buffer_config_is_rejected() {
    let config = BufferConfig {
        expansion_threshold: 1.5,
        ..BufferConfig::default()
    };
    assert!(matches!(
        BufferManager::new(seeded(&["order"], 10), config),
        Err(Error::Configuration { .. })
    ));
}

#[test]
fn sequences_continue_across_refills() {
    let manager = BufferManager::new(seeded(&["order"], 10), buffer_config(10, 10)).unwrap();
    manager.init_cache().unwrap();

    let values: Vec<u64> = (0..100)
        .map(|_| manager.get_sequence("order").unwrap())
        .collect();
    // A single caller with a fixed step sees one contiguous run.
    assert_eq!(values, (0..100).collect::<Vec<_>>());
}

#[test]
fn concurrent_sequences_are_unique_across_refills() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 2_000;

    let config = BufferConfig {
        wait_timeout: Duration::from_secs(5),
        ..buffer_config(8, 64)
    };
    let manager = BufferManager::new(seeded(&["order", "goods"], 16), config).unwrap();
    manager.init_cache().unwrap();
    let seen = Mutex::new(HashSet::new());

    scope(|s| {
        for t in 0..THREADS {
            let manager = &manager;
            let seen = &seen;
            s.spawn(move || {
                let name = if t % 2 == 0 { "order" } else { "goods" };
                let mut local = Vec::with_capacity(PER_THREAD);
                for _ in 0..PER_THREAD {
                    local.push((name, manager.get_sequence(name).unwrap()));
                }
                let mut seen = seen.lock().unwrap();
                for entry in local {
                    assert!(seen.insert(entry), "duplicate {entry:?}");
                }
            });
        }
    });

    assert_eq!(seen.into_inner().unwrap().len(), THREADS * PER_THREAD);
}

#[test]
fn fast_consumption_grows_the_step() {
    let store = seeded(&["order"], 10);
    let manager = BufferManager::new(Arc::clone(&store), buffer_config(5, 40)).unwrap();
    manager.init_cache().unwrap();

    // Drain the first segment; the refill lands well inside the interval.
    for _ in 0..12 {
        manager.get_sequence("order").unwrap();
    }
    let snapshot = manager.snapshot("order").unwrap();
    assert_eq!(snapshot.active, 1);
    assert_eq!(snapshot.step, 20);
}

#[test]
fn failed_refill_times_out_and_frees_the_slot() {
    let store = Arc::new(FailingStore {
        inner: MemoryRegistryStore::with_records([RegistryRecord::init(
            "order",
            &CellConfig::default(),
        )]),
        allowed: 1,
        calls: AtomicUsize::new(0),
    });
    let config = BufferConfig {
        wait_timeout: Duration::from_millis(50),
        ..buffer_config(4, 4)
    };
    let manager = BufferManager::new(Arc::clone(&store), config).unwrap();
    manager.init_cache().unwrap();

    for expected in 0..4 {
        assert_eq!(manager.get_sequence("order").unwrap(), expected);
    }
    assert!(matches!(
        manager.get_sequence("order"),
        Err(Error::Timeout { .. })
    ));

    // Each exhausted allocation retries the refill once the slot is free.
    let before = store.calls.load(Ordering::SeqCst);
    let _ = manager.get_sequence("order");
    assert!(store.calls.load(Ordering::SeqCst) > before);
    assert!(!manager.snapshot("order").unwrap().next_ready);
}

#[test]
fn stalled_refill_times_out_within_bound() {
    let (store, release) = stalled(1);
    let config = BufferConfig {
        wait_timeout: Duration::from_millis(200),
        ..buffer_config(1, 1)
    };
    let manager = BufferManager::new(store, config).unwrap();
    manager.init_cache().unwrap();

    assert_eq!(manager.get_sequence("order").unwrap(), 0);

    let start = Instant::now();
    let err = manager.get_sequence("order").unwrap_err();
    let elapsed = start.elapsed();
    assert!(matches!(err, Error::Timeout { .. }), "{err:?}");
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(700), "{elapsed:?}");
    assert!(manager.snapshot("order").unwrap().expanding);

    drop(release);
    manager.close();
}

#[test]
fn closed_manager_rejects_requests() {
    let manager = BufferManager::new(seeded(&["order"], 10), BufferConfig::default()).unwrap();
    manager.init_cache().unwrap();
    manager.close();
    assert_eq!(manager.get_sequence("order"), Err(Error::Closed));
    assert_eq!(manager.init_cache(), Err(Error::Closed));
    manager.close();
}
