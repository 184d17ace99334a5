//! Strided variable operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nsfslite_bench::{engine_with_variable, random_data};
use nsfslite_core::Stride;

/// Benchmark appending to a variable.
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (engine, id) = engine_with_variable(0);
            let data = random_data(size);

            b.iter(|| {
                let len = engine.length(id).unwrap();
                engine.insert(id, None, len, black_box(&data)).unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark strided reads across step sizes.
fn bench_strided_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("strided_read");
    let (engine, id) = engine_with_variable(64 * 1024);

    // (step, element size) pairs covering the whole variable
    for (step, size) in [(1u64, 1u64), (2, 1), (16, 1), (2, 4), (2, 8)] {
        let nelems = 64 * 1024 / (step * size);
        let stride = Stride::with_elem_size(0, step, nelems, size).unwrap();
        group.throughput(Throughput::Bytes(stride.byte_len()));
        let label = BenchmarkId::new(format!("size_{size}"), step);
        group.bench_with_input(label, &stride, |b, stride| {
            b.iter(|| {
                let bytes = engine.read(id, black_box(stride)).unwrap();
                black_box(bytes);
            });
        });
    }
    group.finish();
}

/// Benchmark strided writes over variables of growing size.
fn bench_strided_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("strided_write");

    for size in [1024u64, 16 * 1024, 256 * 1024].iter() {
        group.throughput(Throughput::Bytes(size / 2));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (engine, id) = engine_with_variable(size as usize);
            let stride = Stride::from_slice(0, size as i64, 2).unwrap();
            let data = random_data(stride.byte_len() as usize);

            b.iter(|| {
                engine.write(id, None, black_box(&stride), &data).unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark removing then re-inserting a strided slice.
fn bench_remove_reinsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove_reinsert");

    for size in [1024u64, 16 * 1024].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (engine, id) = engine_with_variable(size as usize);
            let stride = Stride::contiguous(0, 64).unwrap();

            b.iter(|| {
                let removed = engine.remove(id, None, black_box(&stride), true).unwrap();
                engine
                    .insert(id, None, 0, &removed.unwrap_or_default())
                    .unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark transactions of several small writes.
fn bench_transaction_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("transaction_batch");

    for ops in [10u64, 100].iter() {
        group.throughput(Throughput::Elements(*ops));
        group.bench_with_input(BenchmarkId::from_parameter(ops), ops, |b, &ops| {
            let (engine, id) = engine_with_variable(4096);
            let data = random_data(8);

            b.iter(|| {
                engine
                    .transaction(|txn| {
                        for i in 0..ops {
                            let stride = Stride::contiguous((i * 8) % 4088, 8)?;
                            engine.write(id, Some(txn), &stride, &data)?;
                        }
                        Ok(())
                    })
                    .unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_append,
    bench_strided_read,
    bench_strided_write,
    bench_remove_reinsert,
    bench_transaction_batch,
);
criterion_main!(benches);
