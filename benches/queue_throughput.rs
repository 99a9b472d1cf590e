//! Throughput of a pure enqueue/dequeue mix across every subject, at a
//! handful of thread counts, mirroring the op-mix shape
//! `microbenchmark_thread_func.h` drives in the original's own benchmark
//! (distinct from that benchmark: this one is tuned for criterion's
//! statistical sampling rather than the fixed-op-count sweep the driver
//! itself runs).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use relaxq::driver::{build_subject, Subject};
use relaxq::thread_id;
use std::sync::Arc;

const SUBJECTS: &[Subject] = &[
    Subject::DqRr,
    Subject::Cbo,
    Subject::TwoDd,
    Subject::Tswd,
    Subject::TsAtomic,
    Subject::TsStutter,
    Subject::TsCas,
    Subject::TsInterval,
];

fn bench_mixed_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_throughput/mixed_enq_deq");

    for &subject in SUBJECTS {
        for &num_thread in &[1usize, 4] {
            group.bench_with_input(
                BenchmarkId::new(subject.name(), num_thread),
                &num_thread,
                |b, &num_thread| {
                    let queue = build_subject(subject, num_thread, 2, 4);
                    b.iter(|| {
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
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_mixed_ops);
criterion_main!(benches);
