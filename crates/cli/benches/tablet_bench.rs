use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use memtable::Memtable;
use std::io::Cursor;
use tablet::{Compression, TabletReader, TabletWriter, WriterOptions};
use tempfile::tempdir;

const N_KEYS: usize = 10_000;
const VALUE_SIZE: usize = 100;

fn build_memtable() -> Memtable {
    let mut mem = Memtable::new();
    for i in 0..N_KEYS {
        mem.set(format!("key{:06}", i).into_bytes(), vec![b'x'; VALUE_SIZE]);
    }
    mem
}

fn build_tablet(compression: Compression) -> Vec<u8> {
    let mem = build_memtable();
    let mut buf = Vec::new();
    TabletWriter::new(WriterOptions::default().with_compression(compression))
        .write_tablet(&mut buf, mem.find(None))
        .unwrap();
    buf
}

fn tablet_write_benchmark(c: &mut Criterion) {
    c.bench_function("tablet_write_to_path_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("bench.tab");
                (dir, path, build_memtable())
            },
            |(_dir, path, mem)| {
                TabletWriter::new(WriterOptions::default())
                    .write_to_path(&path, mem.find(None))
                    .unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

fn tablet_scan_benchmark(c: &mut Criterion) {
    for compression in [Compression::None, Compression::Snappy] {
        let bytes = build_tablet(compression);
        c.bench_function(&format!("tablet_full_scan_10k_{}", compression), |b| {
            b.iter_batched(
                || TabletReader::from_source(Cursor::new(bytes.clone())).unwrap(),
                |reader| {
                    let n = reader.find(None).map(|p| p.unwrap()).count();
                    assert_eq!(n, N_KEYS);
                },
                BatchSize::LargeInput,
            );
        });
    }
}

fn tablet_find_benchmark(c: &mut Criterion) {
    let bytes = build_tablet(Compression::None);
    let reader = TabletReader::from_source(Cursor::new(bytes)).unwrap();
    c.bench_function("tablet_find_first_10k", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let key = format!("key{:06}", (i * 7919) % N_KEYS);
            i += 1;
            let pair = reader.find(Some(key.as_bytes())).next().unwrap().unwrap();
            assert_eq!(pair.key.as_bytes(), key.as_bytes());
        });
    });
}

criterion_group!(
    benches,
    tablet_write_benchmark,
    tablet_scan_benchmark,
    tablet_find_benchmark
);
criterion_main!(benches);
