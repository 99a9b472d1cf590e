//! Worker bodies run by each benchmark thread: prefilling a queue before a
//! timed run, the microbenchmark op-mix loop, and the macrobenchmark's
//! parallel relaxed BFS entry point.
//!
//! Grounded on `microbenchmark_thread_func.h` and `macrobenchmark_thread_func.h`:
//! the op counts, prefill size, and the per-op "roll a percentage, compare
//! against the enqueue rate" dispatch are lifted directly from those two
//! files' thread functions.

use crate::algorithms::RelaxedQueue;
use crate::graph::Graph;
use crate::thread_id;
use crate::timing::{self, BusyWait};

/// Total operations across *all* threads for a microbenchmark run: a small
/// fixed budget on modest hardware, scaled up once there's enough
/// parallelism to actually stress the queue (`microbenchmark_thread_func.h`'s
/// `kTotalNumOp`).
pub fn total_num_op() -> i64 {
    if num_cpus::get() <= 8 {
        360_000
    } else {
        18_000_000
    }
}

/// Elements enqueued per thread before a microbenchmark's timed region
/// starts, so the queue isn't measured from empty.
pub const NUM_PREFILL: i64 = 100_000;

#[derive(Clone, Copy)]
pub struct WorkloadConfig {
    /// Probability (0..100) that a given op is an enqueue rather than a
    /// dequeue.
    pub enq_rate_percent: f32,
    /// Busy-wait delay applied between consecutive ops, modeling the
    /// "real work" a thread would otherwise be doing between queue calls.
    pub delay_microseconds: f32,
}

/// Fill `subject` with `NUM_PREFILL / num_thread` random values before
/// timing begins. Grounded on `Prefill`: values are drawn uniformly from
/// `[0, 65535]`, independent of the later op-mix's `[0, 9999]` range.
pub fn prefill(thread_id_value: i32, num_thread: usize, subject: &dyn RelaxedQueue) {
    thread_id::set(thread_id_value);
    let num_op = NUM_PREFILL / num_thread as i64;
    for _ in 0..num_op {
        subject.enq(timing::uniform_int(0, 65535) as i32);
    }
}

/// The timed op-mix loop: each iteration rolls a uniform float in
/// `[0, 100)` and enqueues a random value if it falls at or below
/// `config.enq_rate_percent`, otherwise dequeues; then busy-waits for
/// `config.delay_microseconds` before the next op. Grounded on
/// `MicrobenchmarkFunc`.
pub fn microbench(
    thread_id_value: i32,
    num_thread: usize,
    config: WorkloadConfig,
    subject: &dyn RelaxedQueue,
) {
    thread_id::set(thread_id_value);
    let num_op = total_num_op() / num_thread as i64;
    let delay = if config.delay_microseconds > 0.0 {
        Some(BusyWait::calibrate())
    } else {
        None
    };

    for _ in 0..num_op {
        let roll = timing::uniform_f32(0.0, 100.0);
        if roll <= config.enq_rate_percent {
            subject.enq(timing::uniform_int(0, 9999) as i32);
        } else {
            subject.deq();
        }
        if let Some(ref busy) = delay {
            busy.wait(config.delay_microseconds);
        }
    }
}

/// The macrobenchmark worker: thread 0 seeds the frontier with the source
/// vertex, then every thread drains the relaxed queue until the
/// destination's distance is settled. Grounded on `MacrobenchmarkFunc`.
pub fn macrobench(
    thread_id_value: i32,
    num_thread: usize,
    subject: &dyn RelaxedQueue,
    graph: &Graph,
) -> i32 {
    thread_id::set(thread_id_value);
    if thread_id_value == 0 {
        subject.enq(0);
    }
    graph.relaxed_bfs(num_thread, subject)
}
