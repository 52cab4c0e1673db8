//! Page pool benchmarks: hot-page reads, random writes through the cache,
//! and the flush cycle.
//!
//! ```sh
//! cargo bench --bench pager
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

use pagepool::File;

const FILE_SIZE: usize = 1 << 24; // 16 MiB

fn hot_page_reads(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let f = File::create(dir.path().join("read"), FILE_SIZE as i64, 0).unwrap();
    f.write_at(&vec![7u8; 1 << 20], 0).unwrap();

    let mut group = c.benchmark_group("pager");
    group.throughput(Throughput::Bytes(4096));
    group.bench_function("read_hot_page", |b| {
        let mut buf = [0u8; 4096];
        b.iter(|| {
            f.read_at(black_box(&mut buf), 8192).unwrap();
        })
    });
    group.finish();
}

fn random_writes(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let f = File::create(dir.path().join("write"), FILE_SIZE as i64, 0).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let payload = [0x5Au8; 256];

    let mut group = c.benchmark_group("pager");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("write_random_offset", |b| {
        b.iter(|| {
            let off = rng.gen_range(0..FILE_SIZE - payload.len()) as i64;
            f.write_at(black_box(&payload), off).unwrap();
        })
    });
    group.finish();
}

fn flush_dirty_pages(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let f = File::create(dir.path().join("flush"), FILE_SIZE as i64, 0).unwrap();
    let mut rng = StdRng::seed_from_u64(43);

    let mut group = c.benchmark_group("pager");
    group.bench_function("flush_100_dirty", |b| {
        b.iter(|| {
            for _ in 0..100 {
                let off = rng.gen_range(0..FILE_SIZE - 64) as i64;
                f.write_at(&[1u8; 64], off).unwrap();
            }
            f.flush().unwrap();
        })
    });
    group.finish();
}

criterion_group!(benches, hot_page_reads, random_writes, flush_dirty_pages);
criterion_main!(benches);
