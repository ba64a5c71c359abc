use criterion::{
    BenchmarkGroup, Criterion, Throughput, black_box, criterion_group, criterion_main,
    measurement::WallTime,
};
use pacesim_core::{Scheduler, SimTime};
use std::time::Duration;

const PACING: Duration = Duration::from_nanos(116_800);

fn schedule(c: &mut Criterion) {
    let mut scheduler: Scheduler<u64> = Scheduler::new();

    c.bench_function("schedule", |b| {
        b.iter(|| scheduler.schedule_after(black_box(PACING), black_box(42)))
    });
}

fn bench_drain_size(group: &mut BenchmarkGroup<'_, WallTime>, size: u64) {
    group.throughput(Throughput::Elements(size));
    group.bench_function(format!("{size} events"), |b| {
        b.iter(|| {
            let mut scheduler = Scheduler::new();
            for i in 0..size {
                // every other event is cancelled, like timers of stopped senders
                let id = scheduler.schedule_at(SimTime::from_nanos(i * 116_800), i);
                if i % 2 == 0 {
                    scheduler.cancel(id);
                }
            }
            while let Some(event) = scheduler.pop() {
                black_box(event);
            }
        })
    });
}

fn drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain");

    for size in [1_000, 10_000, 100_000] {
        bench_drain_size(&mut group, size);
    }

    group.finish();
}

criterion_group!(benches, schedule, drain);
criterion_main!(benches);
