use criterion::{black_box, criterion_group, criterion_main, Criterion};
use uniflow::pipe::Pipe;

fn single_element_round_trip(c: &mut Criterion) {
    let pipe = Pipe::new(1024);
    c.bench_function("pipe_write_read_1k", |b| {
        b.iter(|| {
            for v in 0..1024u32 {
                assert!(pipe.try_write(black_box(v)));
            }
            for _ in 0..1024 {
                black_box(pipe.try_read());
            }
        })
    });
}

fn reserved_bulk_round_trip(c: &mut Criterion) {
    let pipe = Pipe::new(1024);
    c.bench_function("pipe_reserved_bulk_1k", |b| {
        b.iter(|| {
            for _ in 0..8 {
                let r = pipe.try_reserve_write(128).expect("room for 128");
                for i in 0..128 {
                    r.set(i, black_box(i as u32));
                }
                drop(r);
                let mut r = pipe.try_reserve_read(128).expect("128 visible");
                black_box(r.to_vec());
                r.commit();
            }
        })
    });
}

criterion_group!(benches, single_element_round_trip, reserved_bulk_round_trip);
criterion_main!(benches);
