use cell::{
    BufferConfig, BufferManager, CategoryDescriptor, Cell, CellConfig, CellFacade, CellSpec,
    Config, MemoryRegistryStore, Pattern, RegistryRecord, Segment, TimeSource,
};
use chrono::{NaiveDate, NaiveDateTime};
use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::{Duration, Instant},
};

struct FixedMockTime(NaiveDateTime);

impl TimeSource for FixedMockTime {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

fn nov_5_2023() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 11, 5)
        .unwrap()
        .and_hms_opt(1, 40, 27)
        .unwrap()
}

// Number of values allocated per benchmark iteration (shared across threads
// for contended runs).
const TOTAL_IDS: usize = 4096;

/// Large enough that the hot path never waits on a refill.
const STEP: u64 = 100_000;

fn cell_config() -> CellConfig {
    CellConfig {
        step: STEP,
        ..CellConfig::default()
    }
}

fn buffer_config() -> BufferConfig {
    BufferConfig {
        wait_timeout: Duration::from_secs(5),
        ..BufferConfig::with_elasticity(STEP, 2)
    }
}

fn manager() -> BufferManager<MemoryRegistryStore> {
    let store = Arc::new(MemoryRegistryStore::with_records([RegistryRecord::init(
        "order",
        &cell_config(),
    )]));
    let manager = BufferManager::new(store, buffer_config()).unwrap();
    manager.init_cache().unwrap();
    manager
}

/// Raw atomic take on a single segment.
fn bench_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let segment = Segment::filled(0, TOTAL_IDS as u64);
                for _ in 0..TOTAL_IDS {
                    black_box(segment.try_take());
                }
            }
            start.elapsed()
        });
    });

    group.finish();
}

/// Sequential allocation through the manager, refills included.
fn bench_manager_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager/sequential");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    let manager = manager();
    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        b.iter(|| {
            for _ in 0..TOTAL_IDS {
                black_box(manager.get_sequence("order").unwrap());
            }
        });
    });

    group.finish();
}

/// One manager shared by several threads allocating the same name.
fn bench_manager_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager/contended");
    let manager = manager();

    for thread_count in [1, 2, 4, 8, 16] {
        let ids_per_thread = TOTAL_IDS / thread_count;

        group.throughput(Throughput::Elements(TOTAL_IDS as u64));
        group.bench_function(
            format!("elems/{}/threads/{}", TOTAL_IDS, thread_count),
            |b| {
                b.iter_custom(|iters| {
                    let start = Instant::now();

                    for _ in 0..iters {
                        let barrier = Arc::new(Barrier::new(thread_count + 1));
                        scope(|s| {
                            for _ in 0..thread_count {
                                let manager = &manager;
                                let barrier = Arc::clone(&barrier);
                                s.spawn(move || {
                                    barrier.wait();
                                    for _ in 0..ids_per_thread {
                                        black_box(manager.get_sequence("order").unwrap());
                                    }
                                });
                            }
                            barrier.wait();
                        });
                    }

                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

fn bench_encoder(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoder");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    for pattern in [Pattern::Day, Pattern::Hour, Pattern::Minute] {
        let spec = CellSpec::new(pattern);
        let cell = Cell::builder()
            .code("101")
            .date(nov_5_2023())
            .data_center(2)
            .machine(12)
            .sequence(1_217_589)
            .build()
            .unwrap();

        group.bench_function(format!("{pattern}/elems/{}", TOTAL_IDS), |b| {
            let mut out = String::with_capacity(pattern.encoded_len());
            b.iter(|| {
                for _ in 0..TOTAL_IDS {
                    out.clear();
                    spec.encode_into(&cell, &mut out).unwrap();
                    black_box(&out);
                }
            });
        });
    }

    group.finish();
}

/// Full `generate_id`: allocation, tuple construction and encoding.
fn bench_facade(c: &mut Criterion) {
    let mut group = c.benchmark_group("facade");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    let order = CategoryDescriptor::new("order", "101");
    let config = Config {
        cell: cell_config(),
        buffer: buffer_config(),
    };
    let facade = CellFacade::with_time_source(
        Arc::new(MemoryRegistryStore::new()),
        config,
        [order.clone()],
        FixedMockTime(nov_5_2023()),
    )
    .unwrap();
    facade.start().unwrap();

    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        b.iter(|| {
            for _ in 0..TOTAL_IDS {
                black_box(facade.generate_id(&order).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_segment,
    bench_manager_sequential,
    bench_manager_contended,
    bench_encoder,
    bench_facade,
);
criterion_main!(benches);
