use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{EventStore, EventStoreExt, SqliteEventStore, StoreConfig};
use tempfile::TempDir;

fn open_store(rt: &tokio::runtime::Runtime) -> (TempDir, SqliteEventStore) {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path().join("bench.sqlite").to_string_lossy());
    let store = rt.block_on(async {
        let store = SqliteEventStore::connect(config).await.unwrap();
        store.ensure_schema().await.unwrap();
        store
    });
    (dir, store)
}

fn bench_record_event(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (_dir, store) = open_store(&rt);

    c.bench_function("event_store/record_event", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.record_increment().await.unwrap();
            });
        });
    });
}

fn bench_compute_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_store/compute_aggregate");
    let rt = tokio::runtime::Runtime::new().unwrap();

    for events in [100_usize, 1_000, 10_000] {
        let (_dir, store) = open_store(&rt);
        rt.block_on(async {
            for _ in 0..events {
                store.record_increment().await.unwrap();
            }
        });

        group.bench_function(format!("{events}_events"), |b| {
            b.iter(|| {
                rt.block_on(async {
                    store.compute_aggregate().await.unwrap();
                });
            });
        });
    }

    group.finish();
}

fn bench_latest_aggregate(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (_dir, store) = open_store(&rt);
    rt.block_on(async {
        for _ in 0..500 {
            store.record_increment().await.unwrap();
            store.compute_aggregate().await.unwrap();
        }
    });

    c.bench_function("event_store/latest_aggregate_500_snapshots", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.get_latest_aggregate().await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_record_event,
    bench_compute_aggregate,
    bench_latest_aggregate,
);
criterion_main!(benches);
