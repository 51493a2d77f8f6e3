//! # Pipeline Benchmarks
//!
//! | Stage | Measured |
//! |-------|----------|
//! | ac-01 CSV parsing | rows per second through `read_crashes` |
//! | ac-03 Hub fan-out | records broadcast to N listeners |

use ac_01_ingress::read_crashes;
use ac_03_live_feed::{Hub, ListenerConnection};
use ac_tests::fixtures::{CSV_HEADER, CSV_ROWS};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shared_bus::shutdown_channel;
use shared_types::FlightCrash;
use std::time::Duration;

fn bench_csv_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("ac-01-csv-parsing");

    for copies in [10, 100, 1000] {
        let csv = format!("{CSV_HEADER}{}", CSV_ROWS.repeat(copies));
        let rows = CSV_ROWS.lines().count() * copies;
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("read_crashes", rows), &csv, |b, csv| {
            b.iter(|| black_box(read_crashes(csv.as_bytes()).map(|file| file.records.len())))
        });
    }

    group.finish();
}

fn bench_hub_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("ac-03-hub-fan-out");
    group.measurement_time(Duration::from_secs(10));
    let runtime = tokio::runtime::Runtime::new().unwrap();
    const RECORDS: usize = 100;

    for listeners in [1, 10, 100] {
        group.throughput(Throughput::Elements((RECORDS * listeners) as u64));
        group.bench_with_input(
            BenchmarkId::new("broadcast", listeners),
            &listeners,
            |b, &listeners| {
                b.iter(|| {
                    runtime.block_on(async {
                        let (hub, handle) = Hub::new();
                        let (trigger, signal) = shutdown_channel();
                        let hub = tokio::spawn(hub.run(signal));

                        let mut outbound = Vec::with_capacity(listeners);
                        for _ in 0..listeners {
                            let (connection, rx) = ListenerConnection::new(RECORDS);
                            handle.register(connection).unwrap();
                            outbound.push(rx);
                        }
                        for i in 0..RECORDS {
                            let record = FlightCrash {
                                location: i.to_string(),
                                ..Default::default()
                            };
                            handle.broadcast(record).await.unwrap();
                        }
                        for rx in &mut outbound {
                            for _ in 0..RECORDS {
                                black_box(rx.recv().await);
                            }
                        }

                        trigger.fire();
                        hub.await.unwrap();
                    })
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_csv_parsing, bench_hub_fan_out);
criterion_main!(benches);
