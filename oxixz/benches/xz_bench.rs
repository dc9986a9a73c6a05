//! Performance benchmarks for the XZ container
//!
//! This benchmark suite evaluates:
//! - Whole-buffer compression per check type
//! - Streaming decompression through `XzReader`
//! - Block size impact on compression speed
//! - Parallel block compression (with the `parallel` feature)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxixz::{CheckType, XzOptions, XzReader, compress, decompress};
use std::hint::black_box;
use std::io::Read;

/// Text-like data with numbers breaking up the repeats
fn text_like(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut i = 0u32;
    while data.len() < size {
        data.extend_from_slice(b"Pack my box with five dozen liquor jugs ");
        data.extend_from_slice(format!("{} ", i.wrapping_mul(48271) % 65521).as_bytes());
        i += 1;
    }
    data.truncate(size);
    data
}

const SIZE: usize = 1024 * 1024;

fn bench_compress_checks(c: &mut Criterion) {
    let mut group = c.benchmark_group("xz_compress_checks");
    let data = text_like(SIZE);

    for check in [
        CheckType::None,
        CheckType::Crc32,
        CheckType::Crc64,
        CheckType::Sha256,
    ] {
        let options = XzOptions::default().check(check).level(3);
        group.throughput(Throughput::Bytes(SIZE as u64));
        group.bench_with_input(BenchmarkId::from_parameter(check.name()), &data, |b, data| {
            b.iter(|| black_box(compress(black_box(data), &options).unwrap()));
        });
    }

    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("xz_decompress");
    let data = text_like(SIZE);
    let packed = compress(&data, &XzOptions::default().level(3)).unwrap();

    group.throughput(Throughput::Bytes(SIZE as u64));
    group.bench_function("whole_buffer", |b| {
        b.iter(|| black_box(decompress(black_box(&packed)).unwrap()));
    });
    group.bench_function("reader_8k", |b| {
        let mut buf = vec![0u8; 8192];
        b.iter(|| {
            let mut reader = XzReader::new(&packed[..]);
            let mut total = 0;
            loop {
                let n = reader.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                total += n;
            }
            black_box(total)
        });
    });

    group.finish();
}

fn bench_block_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("xz_block_sizes");
    let data = text_like(SIZE);

    for block_size in [64 * 1024u64, 256 * 1024, SIZE as u64] {
        let options = XzOptions::default().level(1).block_size(block_size);
        group.throughput(Throughput::Bytes(SIZE as u64));
        group.bench_with_input(BenchmarkId::from_parameter(block_size), &data, |b, data| {
            b.iter(|| black_box(compress(black_box(data), &options).unwrap()));
        });
    }

    group.finish();
}

#[cfg(feature = "parallel")]
fn bench_parallel(c: &mut Criterion) {
    let mut group = c.benchmark_group("xz_parallel");
    let data = text_like(4 * SIZE);
    let options = XzOptions::default().level(3).block_size(SIZE as u64);

    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("sequential", |b| {
        b.iter(|| black_box(compress(black_box(&data), &options).unwrap()));
    });
    group.bench_function("parallel", |b| {
        b.iter(|| black_box(oxixz::compress_parallel(black_box(&data), &options).unwrap()));
    });

    group.finish();
}

#[cfg(feature = "parallel")]
criterion_group!(
    benches,
    bench_compress_checks,
    bench_decompress,
    bench_block_sizes,
    bench_parallel,
);

#[cfg(not(feature = "parallel"))]
criterion_group!(
    benches,
    bench_compress_checks,
    bench_decompress,
    bench_block_sizes,
);

criterion_main!(benches);
