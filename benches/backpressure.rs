use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use stream_stages::{bounded, Consumer, Fork, Mirror, Stage, StageExt, StageSlot};

fn slow_consumer() -> StageSlot<Vec<u8>> {
    Consumer::new(1, |data: Vec<u8>| {
        std::thread::sleep(Duration::from_micros(100));
        data
    })
    .slot()
}

fn fast_consumer() -> StageSlot<Vec<u8>> {
    Consumer::new(1, |data: Vec<u8>| data).slot()
}

fn run_to_completion<S: Stage<Vec<u8>>>(stage: &S, messages: usize) -> usize {
    let (input, source) = bounded(100);
    let output = stage.run(source);

    std::thread::spawn(move || {
        for i in 0..messages {
            let data = vec![i as u8; 64];
            if input.send(black_box(data)).is_err() {
                break;
            }
        }
    });

    output.into_iter().count()
}

fn benchmark_fork_slow_branch(c: &mut Criterion) {
    c.bench_function("fork_slow_branch_1000_msgs", |b| {
        let fork = Fork::new(vec![fast_consumer(), slow_consumer()]);
        b.iter(|| run_to_completion(&fork, 1000));
    });
}

fn benchmark_mirror_slow_mirror(c: &mut Criterion) {
    c.bench_function("mirror_slow_mirror_1000_msgs", |b| {
        let mirror = Mirror::new(fast_consumer(), vec![slow_consumer()]);
        b.iter(|| run_to_completion(&mirror, 1000));
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(15))
        .sample_size(20);
    targets = benchmark_fork_slow_branch, benchmark_mirror_slow_mirror
);
criterion_main!(benches);
