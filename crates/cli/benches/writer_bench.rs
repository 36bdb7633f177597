use criterion::{criterion_group, criterion_main, Criterion};
use node::{Branch, Leaf};
use treefile::serialize;

const VAL_SIZE: usize = 100;

fn wide_tree(fanout: usize) -> Branch<'static> {
    let mut root = Branch::new();
    for i in 0..fanout {
        root.add(format!("entry{i:04}"), Leaf(vec![b'x'; VAL_SIZE]))
            .unwrap();
    }
    root
}

fn deep_tree(depth: usize) -> Branch<'static> {
    let mut node = Branch::new();
    node.add("leaf", Leaf(b"payload".to_vec())).unwrap();
    for level in (0..depth).rev() {
        let mut parent = Branch::new();
        parent.add(format!("level{level:02}"), node).unwrap();
        node = parent;
    }
    node
}

fn serialize_wide(c: &mut Criterion) {
    let tree = wide_tree(1_000);
    c.bench_function("serialize_wide_1k_children", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(1 << 17);
            serialize(&mut out, &tree).unwrap();
            out.len()
        })
    });
}

fn serialize_deep(c: &mut Criterion) {
    let tree = deep_tree(64);
    c.bench_function("serialize_deep_64_levels", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            serialize(&mut out, &tree).unwrap();
            out.len()
        })
    });
}

criterion_group!(benches, serialize_wide, serialize_deep);
criterion_main!(benches);
