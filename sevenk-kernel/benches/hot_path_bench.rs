// Hot path benchmarks: ask/add/validate latency and materialization cost

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use sevenk_kernel::prelude::*;

fn warm_engine() -> (Engine, NodeId, NodeId, NodeId) {
    let mut e = Engine::new(4 << 20, 8192, 2048).unwrap();
    let s = e.intern(b"alice").unwrap();
    let p = e.intern(b"knows").unwrap();
    let o = e.intern(b"bob").unwrap();
    e.add(s, p, o).unwrap();
    // A spread of other subjects so the hash index is realistically loaded.
    for i in 0..512u32 {
        e.add(NodeId::new(100 + i), p, o).unwrap();
    }
    (e, s, p, o)
}

fn bench_ask(c: &mut Criterion) {
    sevenk_hot::calibrate();
    let (e, s, p, o) = warm_engine();
    c.bench_function("ask_hit", |b| b.iter(|| black_box(e.ask(s, p, o))));
    c.bench_function("ask_miss", |b| {
        b.iter(|| black_box(e.ask(s, p, NodeId::new(9999))))
    });
    // Random subjects defeat the branch predictor's memory of one chain.
    let mut rng = StdRng::seed_from_u64(7);
    c.bench_function("ask_random_subject", |b| {
        b.iter(|| {
            let subject = NodeId::new(100 + rng.gen_range(0..512u32));
            black_box(e.ask(subject, p, o))
        })
    });
}

fn bench_add(c: &mut Criterion) {
    c.bench_function("add_steady_state", |b| {
        b.iter_batched(
            || Engine::new(16 << 20, 1 << 16, 8192).unwrap(),
            |mut e| {
                for i in 0..1000u32 {
                    e.add(NodeId::new(i & 63), NodeId::new(2), NodeId::new(i)).unwrap();
                }
                e
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_validate(c: &mut Criterion) {
    let (mut e, s, p, _) = warm_engine();
    let class_pred = e.intern(b"type").unwrap();
    let person = e.intern(b"Person").unwrap();
    e.set_class_predicate(class_pred);
    e.add(s, class_pred, person).unwrap();
    let shape = Shape::builder().target_class(person).min_count(p, 1).build();
    c.bench_function("validate_min_count", |b| {
        b.iter(|| black_box(e.validate(&shape, s)))
    });
}

fn bench_materialize(c: &mut Criterion) {
    c.bench_function("materialize_chain_64", |b| {
        b.iter_batched(
            || {
                let mut e = Engine::new(4 << 20, 4096, 1024).unwrap();
                for i in 0..63u32 {
                    e.assert_axiom(
                        NodeId::new(i),
                        NodeId::default(),
                        NodeId::new(i + 1),
                        AxiomKind::SubClassOf,
                    )
                    .unwrap();
                }
                e
            },
            |mut e| {
                black_box(e.materialize().unwrap());
                e
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_ask, bench_add, bench_validate, bench_materialize);
criterion_main!(benches);
