use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;

use booking_engine::idgen::{ReferenceGenerator, ReferenceKind};
use booking_engine::models::{derive_payment_status, BookingStatus};
use booking_engine::services::BookingStateMachine;

fn benchmark_state_machine(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_machine");

    let statuses = [
        BookingStatus::Pending,
        BookingStatus::Processing,
        BookingStatus::Confirmed,
        BookingStatus::Booked,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    group.bench_function("full_transition_table", |b| {
        b.iter(|| {
            let mut allowed = 0u32;
            for from in statuses {
                for to in statuses {
                    if BookingStateMachine::can_transition(black_box(from), black_box(to)) {
                        allowed += 1;
                    }
                }
            }
            black_box(allowed)
        });
    });

    group.finish();
}

fn benchmark_payment_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("payment_status");

    for claims in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("incremental_claims", claims),
            claims,
            |b, &claims| {
                let total = Decimal::from(claims);
                b.iter(|| {
                    let mut claimed = Decimal::ZERO;
                    for _ in 0..claims {
                        claimed += Decimal::ONE;
                        black_box(derive_payment_status(claimed, total));
                    }
                    black_box(claimed)
                });
            },
        );
    }

    group.finish();
}

fn benchmark_reference_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("references");
    let generator = ReferenceGenerator::new();

    group.bench_function("booking_ref", |b| {
        b.iter(|| black_box(generator.generate(ReferenceKind::Booking)));
    });

    group.bench_function("invoice_ref", |b| {
        b.iter(|| black_box(generator.generate(ReferenceKind::Invoice)));
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_state_machine,
    benchmark_payment_derivation,
    benchmark_reference_generation
);
criterion_main!(benches);
