use codec::{uintx, StickyReader, StickyWriter};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn uintx_encode(c: &mut Criterion) {
    // One value per bit width, covering every encoded length.
    let values: Vec<u64> = (0..64).map(|shift| (1u64 << shift) - 1).collect();

    c.bench_function("uintx_encode_all_lengths", |b| {
        b.iter(|| {
            let mut buf = [0u8; uintx::MAX_LEN];
            let mut total = 0usize;
            for &v in &values {
                total += uintx::encode(black_box(v), &mut buf);
            }
            total
        })
    });
}

fn uintx_decode(c: &mut Criterion) {
    let mut bytes = Vec::new();
    let mut w = StickyWriter::new(&mut bytes);
    for shift in 0..64 {
        w.write_uintx((1u64 << shift) - 1);
    }
    w.finish().unwrap();

    c.bench_function("uintx_decode_all_lengths", |b| {
        b.iter(|| {
            let mut r = StickyReader::new(black_box(&bytes[..]));
            let mut sum = 0u64;
            for _ in 0..64 {
                sum = sum.wrapping_add(r.read_uintx());
            }
            sum
        })
    });
}

criterion_group!(benches, uintx_encode, uintx_decode);
criterion_main!(benches);
