//! Delivery benchmarks for murmur.
//!
//! These measure the synchronous enqueue paths: broadcast fan-out and
//! private delivery, with and without room in the mailboxes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use murmur_bench::Fixture;
use murmur_core::DEFAULT_MAILBOX_CAPACITY;
use murmur_protocol::{Credentials, Frame};
use std::sync::Arc;
use std::time::Instant;

/// Benchmark broadcast fan-out to N listeners, draining after each round.
fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");

    for size in [10, 100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut fixture = Fixture::listening(size, DEFAULT_MAILBOX_CAPACITY);
            let frame = Arc::new(Frame::public("user-0", "x".repeat(64), 0));

            b.iter_custom(|iters| {
                let mut elapsed = std::time::Duration::ZERO;
                for _ in 0..iters {
                    let start = Instant::now();
                    black_box(fixture.router.deliver_to_all(Arc::clone(&frame)));
                    elapsed += start.elapsed();
                    fixture.drain();
                }
                elapsed
            });
        });
    }

    group.finish();
}

/// Benchmark fan-out when every mailbox is already full.
fn bench_fanout_full(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout_full");

    for size in [100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let fixture = Fixture::listening(size, 1);
            let frame = Arc::new(Frame::public("user-0", "x".repeat(64), 0));
            fixture.router.deliver_to_all(Arc::clone(&frame));

            b.iter(|| fixture.router.deliver_to_all(black_box(Arc::clone(&frame))));
        });
    }

    group.finish();
}

/// Benchmark private delivery to a listening recipient.
fn bench_private(c: &mut Criterion) {
    let mut group = c.benchmark_group("private");
    let sender = Credentials::new("user-0");

    group.bench_function("listening_recipient", |b| {
        let mut fixture = Fixture::listening(100, DEFAULT_MAILBOX_CAPACITY);
        b.iter(|| {
            let delivery = fixture
                .router
                .send_private(black_box(&sender), "user-42", "hello");
            fixture.readers[42].try_recv();
            delivery
        });
    });

    group.bench_function("unknown_recipient", |b| {
        let fixture = Fixture::listening(100, DEFAULT_MAILBOX_CAPACITY);
        b.iter(|| {
            fixture
                .router
                .send_private(black_box(&sender), "nobody", "hello")
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fanout, bench_fanout_full, bench_private);
criterion_main!(benches);
