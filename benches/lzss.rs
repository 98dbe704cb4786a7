use allegro_dat::{compress_bytes, decompress_bytes, LzssWriter};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::io::Write;
use std::time::Duration;

fn generate_test_data(size: usize, pattern: &str) -> Vec<u8> {
    match pattern {
        "text" => {
            let base = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit. ";
            base.iter().copied().cycle().take(size).collect()
        }
        "pixels" => {
            // Mostly flat rows with a few edges, like 8-bit sprite sheets
            (0..size)
                .map(|i| if (i / 64) % 7 == 0 { (i % 13) as u8 } else { 0 })
                .collect()
        }
        "random" => (0..size)
            .map(|i| {
                let x = i as u32;
                (x.wrapping_mul(1664525).wrapping_add(1013904223) >> 13) as u8
            })
            .collect(),
        _ => panic!("Unknown pattern: {}", pattern),
    }
}

fn size_label(size: usize) -> &'static str {
    match size {
        1024 => "1KB",
        65536 => "64KB",
        1048576 => "1MB",
        _ => "unknown",
    }
}

fn compression_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("lzss_compress");
    group.measurement_time(Duration::from_secs(10));

    for size in [1024, 65536, 1048576] {
        for pattern in ["text", "pixels", "random"] {
            let data = generate_test_data(size, pattern);
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(
                BenchmarkId::new(pattern, size_label(size)),
                &data,
                |b, data| b.iter(|| compress_bytes(black_box(data))),
            );
        }
    }
    group.finish();
}

fn decompression_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("lzss_decompress");

    for size in [1024, 65536, 1048576] {
        for pattern in ["text", "pixels", "random"] {
            let data = generate_test_data(size, pattern);
            let compressed = compress_bytes(&data).expect("compression failed");
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(
                BenchmarkId::new(pattern, size_label(size)),
                &compressed,
                |b, compressed| b.iter(|| decompress_bytes(black_box(compressed))),
            );
        }
    }
    group.finish();
}

fn streaming_writer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lzss_streaming");
    let data = generate_test_data(65536, "pixels");

    for chunk in [64, 4096] {
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("chunk", chunk), &chunk, |b, &chunk| {
            b.iter_batched(
                || LzssWriter::new(Vec::with_capacity(data.len())),
                |mut writer| {
                    for piece in data.chunks(chunk) {
                        writer.write_all(piece).expect("write failed");
                    }
                    writer.finish().expect("finish failed")
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    compression_throughput,
    decompression_throughput,
    streaming_writer
);
criterion_main!(benches);
