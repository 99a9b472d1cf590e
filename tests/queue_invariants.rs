//! Property and scenario tests for the queue invariants in spec.md §8:
//! conservation, FIFO-within-own-insert-path, the k-relaxation distance
//! bound, and bag-equivalence under randomized mixed op scripts.

use proptest::prelude::*;
use relaxq::algorithms::cbo::Cbo;
use relaxq::algorithms::dqrr::Dqrr;
use relaxq::algorithms::tswd::Tswd;
use relaxq::algorithms::twodd::TwoDd;
use relaxq::algorithms::RelaxedQueue;
use relaxq::thread_id;
use std::collections::VecDeque;

fn drain_all(queue: &dyn RelaxedQueue) -> Vec<i32> {
    let mut out = vec![];
    while let Some(v) = queue.deq() {
        out.push(v);
    }
    out
}

/// Scenario 1: single-thread TSWD, depth = 8, enqueue [1..5], dequeue 5
/// times. Strict FIFO order, zero relaxation distance.
#[test]
fn tswd_single_thread_strict_fifo_zero_distance() {
    thread_id::set(0);
    let q = Tswd::new(1, 8);
    q.check_relaxation_distance();
    for v in 1..=5 {
        q.enq(v);
    }
    let mut dequeued = vec![];
    for _ in 0..5 {
        dequeued.push(q.deq().unwrap());
    }
    assert_eq!(dequeued, vec![1, 2, 3, 4, 5]);

    let (num_dequeued, sum_rd, max_rd) = q.get_relaxation_distance();
    assert_eq!(num_dequeued, 5);
    assert_eq!(sum_rd, 0);
    assert_eq!(max_rd, 0);
}

/// Scenario 2: two-thread TSWD, depth = 4; concurrent per-thread enqueues,
/// single-thread drain. Every value appears once; bound holds.
#[test]
fn tswd_two_thread_bounded_relaxation() {
    let q = std::sync::Arc::new(Tswd::new(2, 4));
    q.check_relaxation_distance();

    let q0 = std::sync::Arc::clone(&q);
    let t0 = std::thread::spawn(move || {
        thread_id::set(0);
        for v in [10, 11, 12] {
            q0.enq(v);
        }
    });
    let q1 = std::sync::Arc::clone(&q);
    let t1 = std::thread::spawn(move || {
        thread_id::set(1);
        for v in [20, 21, 22] {
            q1.enq(v);
        }
    });
    t0.join().unwrap();
    t1.join().unwrap();

    thread_id::set(0);
    let mut dequeued = drain_all(q.as_ref());
    dequeued.sort_unstable();
    assert_eq!(dequeued, vec![10, 11, 12, 20, 21, 22]);

    let (_, _, max_rd) = q.get_relaxation_distance();
    let bound = (2 - 1) * 4;
    assert!(max_rd <= bound, "max_rd {max_rd} exceeds (num_thread-1)*depth = {bound}");
}

/// Scenario 3: 2Dd width = 4, depth = 2; single-thread enqueue/dequeue of
/// 16 distinct values. No loss; bounded positional distance.
#[test]
fn twodd_single_thread_conserves_and_bounds_distance() {
    thread_id::set(0);
    let q = TwoDd::new(4, 1, 2);
    q.check_relaxation_distance();
    for v in 0..16 {
        q.enq(v);
    }
    let mut dequeued = drain_all(&q);
    dequeued.sort_unstable();
    assert_eq!(dequeued, (0..16).collect::<Vec<_>>());

    let (_, _, max_rd) = q.get_relaxation_distance();
    assert!(max_rd <= 4 * 2, "max_rd {max_rd} exceeds width*depth");
}

/// Scenario 4: DQ-RR, 4 queues, b = 1, balanced mix across 8 threads;
/// every enqueued value eventually dequeued after a quiescence sweep.
#[test]
fn dqrr_eight_threads_conserve_all_elements() {
    let q = std::sync::Arc::new(Dqrr::new(4, 8, 1));
    let per_thread = 200;

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let q = std::sync::Arc::clone(&q);
            std::thread::spawn(move || {
                thread_id::set(t);
                for i in 0..per_thread {
                    q.enq(t * per_thread + i);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    thread_id::set(0);
    let mut dequeued = drain_all(q.as_ref());
    dequeued.sort_unstable();
    let mut expected: Vec<i32> = (0..8 * per_thread).collect();
    expected.sort_unstable();
    assert_eq!(dequeued, expected);
}

/// Conservation under a single-threaded randomized op script: replay the
/// same sequence of enq/push and deq/pop calls against a plain `VecDeque`
/// reference and check bag-equivalence of everything drained at
/// quiescence.
fn conservation_against_reference(ops: &[Option<i32>]) -> (Vec<i32>, Vec<i32>) {
    thread_id::set(0);
    let subject = Dqrr::new(2, 1, 1);
    let mut reference = VecDeque::new();

    let mut subject_out = vec![];
    let mut reference_out = vec![];
    for &op in ops {
        match op {
            Some(v) => {
                subject.enq(v);
                reference.push_back(v);
            }
            None => {
                if let Some(v) = subject.deq() {
                    subject_out.push(v);
                }
                if let Some(v) = reference.pop_front() {
                    reference_out.push(v);
                }
            }
        }
    }
    subject_out.extend(drain_all(&subject));
    reference_out.extend(reference.drain(..));

    (subject_out, reference_out)
}

proptest! {
    #[test]
    fn conserves_bag_equivalence_under_random_op_scripts(
        ops in prop::collection::vec(prop::option::of(0i32..1000), 1..200)
    ) {
        let (mut subject_out, mut reference_out) = conservation_against_reference(&ops);
        subject_out.sort_unstable();
        reference_out.sort_unstable();
        prop_assert_eq!(subject_out, reference_out);
    }

    #[test]
    fn cbo_conserves_bag_equivalence_under_random_op_scripts(
        values in prop::collection::vec(0i32..1000, 1..100)
    ) {
        thread_id::set(0);
        let q = Cbo::new(4, 1, 2);
        for &v in &values {
            q.enq(v);
        }
        let mut dequeued = drain_all(&q);
        let mut expected = values.clone();
        dequeued.sort_unstable();
        expected.sort_unstable();
        prop_assert_eq!(dequeued, expected);
    }
}
