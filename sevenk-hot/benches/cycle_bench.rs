// Counter-read and meter overhead benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sevenk_hot::{calibrate, read_cycles, BitMatrix, CycleTimer, OpMeter};

fn bench_counter_read(c: &mut Criterion) {
    calibrate();
    c.bench_function("read_cycles", |b| b.iter(|| black_box(read_cycles())));
    c.bench_function("cycle_timer_pair", |b| {
        b.iter(|| {
            let t = CycleTimer::start();
            black_box(t.elapsed())
        })
    });
}

fn bench_meter_record(c: &mut Criterion) {
    let meter = OpMeter::new(7);
    c.bench_function("op_meter_record", |b| {
        b.iter(|| meter.record(black_box(5)))
    });
}

fn bench_row_union(c: &mut Criterion) {
    let mut m = BitMatrix::new(256, 512);
    for j in (0..512).step_by(3) {
        m.set(1, j);
    }
    c.bench_function("bitmatrix_union_row_512", |b| {
        b.iter(|| black_box(m.union_row_into(0, 1)))
    });
}

criterion_group!(benches, bench_counter_read, bench_meter_record, bench_row_union);
criterion_main!(benches);
