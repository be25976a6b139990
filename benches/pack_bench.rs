// Packer and system heap performance benchmarks.
// Exercises pack() directly across representative request sizes, then the
// full SystemHeap allocate/free cycle to measure pool-warm vs. pool-cold
// cost.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tiered_page_heap::buffer::{BufferFlags, HeapBuffer, SimpleBuffer};
use tiered_page_heap::config::HeapConfig;
use tiered_page_heap::heap::{HeapOps, SystemHeap};
use tiered_page_heap::host::SystemHostAllocator;
use tiered_page_heap::packer;

fn make_heap() -> SystemHeap {
    let config = HeapConfig::default();
    let host = Arc::new(SystemHostAllocator::new(config.page_size));
    SystemHeap::new(config, host)
}

fn bench_pack_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack");

    let sizes = vec![
        ("4kb", 4 * 1024),
        ("64kb", 64 * 1024),
        ("1mb", 1024 * 1024),
        ("1mb_plus_68kb", 1024 * 1024 + 68 * 1024),
    ];

    for (label, size) in sizes {
        let config = HeapConfig::default();
        let host: Arc<dyn tiered_page_heap::host::HostAllocator> =
            Arc::new(SystemHostAllocator::new(config.page_size));
        let pools: Vec<_> = config
            .orders
            .iter()
            .map(|&order| tiered_page_heap::pool::PagePool::new(order, Arc::clone(&host)))
            .collect();

        group.bench_with_input(BenchmarkId::new("pack", label), &size, |b, &size| {
            b.iter(|| {
                let runs = packer::pack(&pools, &host, &config, black_box(size), BufferFlags::empty())
                    .unwrap();
                for run in runs {
                    if let Some(pool) = pools.iter().find(|p| p.order() == run.order) {
                        pool.free(run.page);
                    }
                }
            });
        });
    }

    group.finish();
}

fn bench_allocate_free_cold(c: &mut Criterion) {
    c.bench_function("allocate_free_cold_1mb", |b| {
        b.iter(|| {
            let heap = make_heap();
            let mut buffer = SimpleBuffer::new(1024 * 1024, BufferFlags::empty());
            heap.allocate(&mut buffer, 0).unwrap();
            black_box(buffer.sg_table());
            heap.free(&mut buffer).unwrap();
        });
    });
}

fn bench_allocate_free_warm(c: &mut Criterion) {
    let heap = make_heap();
    let mut warm = SimpleBuffer::new(1024 * 1024, BufferFlags::empty());
    heap.allocate(&mut warm, 0).unwrap();
    heap.free(&mut warm).unwrap();

    c.bench_function("allocate_free_warm_1mb", |b| {
        b.iter(|| {
            let mut buffer = SimpleBuffer::new(1024 * 1024, BufferFlags::empty());
            heap.allocate(&mut buffer, 0).unwrap();
            black_box(buffer.sg_table());
            heap.free(&mut buffer).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_pack_sizes,
    bench_allocate_free_cold,
    bench_allocate_free_warm
);
criterion_main!(benches);
