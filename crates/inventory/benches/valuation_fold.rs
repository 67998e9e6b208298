use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{DateTime, Duration, TimeZone, Utc};
use stockval_core::{LocationId, MovementId, ProductId};
use stockval_inventory::{
    ClassifiedMovement, Cutoff, Direction, MovementRecord, MovementStatus, ValuationEngine,
};

const PRODUCT: ProductId = ProductId::new(1);

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
}

/// Two receipts per issue, one movement per hour, fed in reverse order.
fn history(len: usize) -> Vec<ClassifiedMovement> {
    let start = start();
    let mut movements: Vec<ClassifiedMovement> = (0..len)
        .map(|i| {
            let inbound = i % 3 != 2;
            let (from, to, direction) = if inbound {
                (LocationId::new(1), LocationId::new(8), Direction::Inbound)
            } else {
                (LocationId::new(8), LocationId::new(5), Direction::Outbound)
            };
            let record = MovementRecord::new(
                MovementId::new(i as i64 + 1),
                start + Duration::hours(i as i64),
                PRODUCT,
                10.0 + (i % 7) as f64,
                5.0 + (i % 11) as f64 * 0.25,
                from,
                to,
                MovementStatus::Done,
                format!("BENCH/{i}"),
            )
            .unwrap();
            ClassifiedMovement::new(record, direction)
        })
        .collect();
    movements.reverse();
    movements
}

fn bench_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("valuation_fold");
    let engine = ValuationEngine::new();

    for size in [100usize, 1_000, 10_000] {
        let movements = history(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("as_of_now", size), &movements, |b, m| {
            b.iter(|| engine.fold(black_box(PRODUCT), black_box(m)));
        });

        let midpoint = Cutoff::EndOfDay((start() + Duration::hours(size as i64 / 2)).date_naive());
        group.bench_with_input(BenchmarkId::new("as_of_date", size), &movements, |b, m| {
            b.iter(|| engine.fold_as_of(black_box(PRODUCT), black_box(m), midpoint));
        });
    }

    group.finish();
}

fn bench_timeline(c: &mut Criterion) {
    let movements = history(5_000);
    let engine = ValuationEngine::new();
    c.bench_function("valuation_timeline_5000", |b| {
        b.iter(|| engine.timeline(black_box(PRODUCT), black_box(&movements), Cutoff::Unbounded));
    });
}

criterion_group!(benches, bench_fold, bench_timeline);
criterion_main!(benches);
