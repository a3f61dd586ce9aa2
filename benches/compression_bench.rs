#![allow(clippy::unwrap_used, clippy::uninlined_format_args)]

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use steam_protocol::utils::compression::{compress, decompress, decompress_sized};

fn bench_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression");
    let sizes = [64usize, 512, 4096, 65536, 1024 * 1024];

    for &size in &sizes {
        // mildly repetitive, like a batch of similar sub-messages
        let data: Vec<u8> = (0..size).map(|i| (i % 61) as u8).collect();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("gzip_compress_{}b", size), |b| {
            b.iter_batched(
                || data.clone(),
                |d| {
                    let _ = compress(&d).unwrap();
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("gzip_decompress_{}b", size), |b| {
            let compressed = compress(&data).unwrap();
            b.iter(|| {
                let out = decompress(&compressed).unwrap();
                assert_eq!(out.len(), data.len());
            })
        });
        group.bench_function(format!("gzip_decompress_sized_{}b", size), |b| {
            let compressed = compress(&data).unwrap();
            b.iter(|| decompress_sized(&compressed, data.len()).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compression);
criterion_main!(benches);
