//! Relaxation-distance overhead: the cost `check_relaxation_distance`'s
//! enqueue/dequeue logging adds to each subject, measured by running the
//! same mixed op workload with and without RDM instrumentation enabled.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use relaxq::driver::{build_subject, Subject};
use relaxq::thread_id;
use std::sync::Arc;

const SUBJECTS: &[Subject] = &[Subject::DqRr, Subject::Cbo, Subject::Tswd, Subject::TsInterval];

fn run_workload(subject: Subject, num_thread: usize, track: bool) {
    let queue = build_subject(subject, num_thread, 2, 4);
    if track {
        queue.check_relaxation_distance();
    }
    std::thread::scope(|scope| {
        for t in 0..num_thread {
            let queue = Arc::clone(&queue);
            scope.spawn(move || {
                thread_id::set(t as i32);
                for i in 0..500 {
                    queue.enq(i);
                    queue.deq();
                }
            });
        }
    });
    if track {
        let _ = queue.get_relaxation_distance();
    }
}

fn bench_instrumentation_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("relaxation_distance/overhead");

    for &subject in SUBJECTS {
        group.bench_with_input(
            BenchmarkId::new(subject.name(), "untracked"),
            &subject,
            |b, &subject| b.iter(|| run_workload(subject, 4, false)),
        );
        group.bench_with_input(
            BenchmarkId::new(subject.name(), "tracked"),
            &subject,
            |b, &subject| b.iter(|| run_workload(subject, 4, true)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_instrumentation_overhead);
criterion_main!(benches);
