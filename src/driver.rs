//! The benchmark driver: subject selection, queue construction, and the
//! sweeps that run a subject across a fixed thread-count ladder.
//!
//! Grounded on `benchmark_tester.h`/`.cpp`: the `Tester` constructor's
//! hardware-concurrency branch (picking a thread-count ladder and a single
//! "fixed" thread count used when sweeping the other axis) is reproduced in
//! [`Driver::new`], and `Measure`'s two shapes (micro: prefill then timed
//! op-mix; macro: reset graph then timed relaxed BFS) become
//! [`Driver::run_microbenchmark_once`]/[`Driver::run_macrobenchmark_once`].

use crate::algorithms::cbo::Cbo;
use crate::algorithms::dqrr::Dqrr;
use crate::algorithms::ts_pool::{TsAtomic, TsCas, TsInterval, TsStutter};
use crate::algorithms::tswd::Tswd;
use crate::algorithms::twodd::TwoDd;
use crate::algorithms::RelaxedQueue;
use crate::error::ConfigError;
use crate::graph::Graph;
use crate::timing::Stopwatch;
use crate::worker::{self, WorkloadConfig};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The eight concrete relaxed-queue algorithms a sweep may select
/// (spec.md §2, rows F-J; `benchmark_tester.h`'s `SubjectType` enum, minus
/// `kLRU` which spec.md never names).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    DqRr,
    Cbo,
    TwoDd,
    Tswd,
    TsAtomic,
    TsStutter,
    TsCas,
    TsInterval,
}

impl Subject {
    pub fn name(self) -> &'static str {
        match self {
            Subject::DqRr => "dq-rr",
            Subject::Cbo => "cbo",
            Subject::TwoDd => "2dd",
            Subject::Tswd => "tswd",
            Subject::TsAtomic => "ts-atomic",
            Subject::TsStutter => "ts-stutter",
            Subject::TsCas => "ts-cas",
            Subject::TsInterval => "ts-interval",
        }
    }

    pub fn from_str_name(s: &str) -> Result<Self, ConfigError> {
        match s {
            "dq-rr" | "dqrr" => Ok(Subject::DqRr),
            "cbo" => Ok(Subject::Cbo),
            "2dd" | "twodd" => Ok(Subject::TwoDd),
            "tswd" => Ok(Subject::Tswd),
            "ts-atomic" => Ok(Subject::TsAtomic),
            "ts-stutter" => Ok(Subject::TsStutter),
            "ts-cas" => Ok(Subject::TsCas),
            "ts-interval" => Ok(Subject::TsInterval),
            other => Err(ConfigError::UnknownSubject(other.to_string())),
        }
    }

    /// Only TSWD and 2Dd take a `depth` parameter and participate in
    /// depth-scaling sweeps (spec.md §4.L); every other subject's
    /// `parameter` means something else (queues-per-thread, `d`, or a
    /// delay) and depth scaling doesn't apply to it.
    pub fn supports_depth_scaling(self) -> bool {
        matches!(self, Subject::Tswd | Subject::TwoDd)
    }
}

/// Construct the concrete queue for `subject`, sized for `num_thread`
/// workers. `width` is queues-per-thread for the multi-queue families
/// (DQ-RR, CBO, 2Dd) and ignored by the single-queue-per-thread families
/// (TSWD, the TS-pool variants). `parameter` means whatever
/// `benchmark_tester.cpp::SetParameter` documents it to mean for that
/// subject: bucket count for DQ-RR, `d` for CBO, depth for TSWD/2Dd.
pub fn build_subject(
    subject: Subject,
    num_thread: usize,
    width: usize,
    parameter: i64,
) -> Arc<dyn RelaxedQueue> {
    let num_queue = width.max(1) * num_thread.max(1);
    match subject {
        Subject::DqRr => Arc::new(Dqrr::new(num_queue, num_thread, parameter.max(1) as usize)),
        Subject::Cbo => Arc::new(Cbo::new(num_queue, num_thread, parameter.max(1) as usize)),
        Subject::TwoDd => Arc::new(TwoDd::new(num_queue, num_thread, parameter.max(1) as u64)),
        Subject::Tswd => Arc::new(Tswd::new(num_thread, parameter.max(1) as u64)),
        Subject::TsAtomic => Arc::new(TsAtomic::new(num_thread)),
        Subject::TsStutter => Arc::new(TsStutter::new(num_thread)),
        Subject::TsCas => Arc::new(TsCas::new(num_thread)),
        Subject::TsInterval => Arc::new(TsInterval::new(num_thread)),
    }
}

/// Derive a `depth` parameter from a target relaxation bound at a fixed
/// thread count (spec.md §4.L: "depth = relaxation_bound / (fixed_num_thread
/// − 1) (or − 1 for TSWD)"). TSWD's worst-case bound is `(num_thread − 1) *
/// depth` (spec.md §4.J); 2Dd's is `width * depth`, so both divide the
/// target bound by `fixed_num_thread − 1` and TSWD additionally steps the
/// result down by one to keep its realized bound at or under the target.
fn depth_for_bound(subject: Subject, bound: i64, fixed_num_thread: usize) -> i64 {
    let denom = (fixed_num_thread as i64 - 1).max(1);
    let base = (bound / denom).max(1);
    match subject {
        Subject::Tswd => (base - 1).max(1),
        _ => base,
    }
}

/// The geometric relaxation-bound ladder a depth sweep walks: the minimum
/// bound, doubled five times, reaching 32x the minimum (spec.md §4.L).
fn relaxation_bound_ladder(min_relaxation_bound: i64) -> [i64; 6] {
    [1, 2, 4, 8, 16, 32].map(|multiplier| min_relaxation_bound * multiplier)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MicroResult {
    pub elapsed_secs: f64,
    pub num_dequeued: u64,
    pub sum_rd: u64,
    pub max_rd: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MacroResult {
    pub elapsed_secs: f64,
    pub distance: i32,
}

/// Driver state: the subject/parameter/width selection, workload shape,
/// installed graph, and the thread-count ladder to sweep. Mirrors the
/// mutable state `benchmark_tester.h`'s `Tester` keeps between REPL
/// commands.
pub struct Driver {
    pub subject: Option<Subject>,
    pub parameter: i64,
    pub width: usize,
    pub enq_rate_percent: f32,
    pub delay_microseconds: f32,
    pub checks_relaxation_distance: bool,
    pub scales_with_depth: bool,
    pub graph: Option<Arc<Graph>>,
    pub num_threads: [usize; 4],
    pub fixed_num_thread: usize,
}

impl Driver {
    /// Picks a thread-count ladder and a single "fixed" thread count from
    /// the detected core count, exactly as `Tester`'s constructor does: the
    /// ladder is used when sweeping width/parameter at a constant thread
    /// count, and the fixed count is that constant.
    pub fn new() -> Self {
        let cores = num_cpus::get();
        let (fixed_num_thread, num_threads) = if cores <= 8 {
            (6, [2, 4, 6, 8])
        } else if cores <= 16 {
            (11, [4, 8, 12, 16])
        } else if cores <= 40 {
            (33, [10, 20, 30, 40])
        } else {
            (41, [12, 24, 48, 72])
        };

        Driver {
            subject: None,
            parameter: 1,
            width: 1,
            enq_rate_percent: 50.0,
            delay_microseconds: 1.2,
            checks_relaxation_distance: false,
            scales_with_depth: false,
            graph: None,
            num_threads,
            fixed_num_thread,
        }
    }

    fn require_subject(&self) -> Result<Subject, ConfigError> {
        self.subject.ok_or(ConfigError::MissingParameter("subject"))
    }

    fn require_graph(&self) -> Result<Arc<Graph>, ConfigError> {
        self.graph.clone().ok_or(ConfigError::MissingGraph)
    }

    /// Sweep the thread-count ladder at this driver's fixed parameter/width,
    /// running one prefill-then-timed-op-mix measurement per thread count.
    pub fn run_microbenchmark_sweep(&self) -> Result<BTreeMap<i64, Vec<MicroResult>>, ConfigError> {
        let subject = self.require_subject()?;
        let mut results = BTreeMap::new();
        for &num_thread in &self.num_threads {
            let result = self.run_microbenchmark_once(subject, num_thread, self.width, self.parameter);
            results.insert(num_thread as i64, vec![result]);
        }
        Ok(results)
    }

    /// Sweep the relaxation bound geometrically, from `min_relaxation_bound`
    /// to 32x that minimum, at this driver's fixed thread count (spec.md
    /// §4.L "scaling with depth"). Only TSWD and 2Dd take a `depth`
    /// parameter, so only they participate; every other subject refuses.
    pub fn run_depth_sweep(
        &self,
        min_relaxation_bound: i64,
    ) -> Result<BTreeMap<i64, Vec<MicroResult>>, ConfigError> {
        let subject = self.require_subject()?;
        if !subject.supports_depth_scaling() {
            return Err(ConfigError::ParameterOutOfRange {
                name: "subject",
                value: subject as i64,
                expected: "tswd or 2dd (the only depth-parameterized subjects)",
            });
        }
        let mut results = BTreeMap::new();
        for bound in relaxation_bound_ladder(min_relaxation_bound) {
            let depth = depth_for_bound(subject, bound, self.fixed_num_thread);
            let result =
                self.run_microbenchmark_once(subject, self.fixed_num_thread, self.width, depth);
            results.insert(bound, vec![result]);
        }
        Ok(results)
    }

    /// Sweep the thread-count ladder running the parallel relaxed-BFS
    /// macrobenchmark against the installed graph.
    pub fn run_macrobenchmark_sweep(&self) -> Result<BTreeMap<i64, Vec<MacroResult>>, ConfigError> {
        let subject = self.require_subject()?;
        let graph = self.require_graph()?;
        let mut results = BTreeMap::new();
        for &num_thread in &self.num_threads {
            let result =
                self.run_macrobenchmark_once(subject, num_thread, self.width, self.parameter, &graph);
            results.insert(num_thread as i64, vec![result]);
        }
        Ok(results)
    }

    /// A single prefill-then-timed-op-mix measurement, mirroring
    /// `Tester::Measure`'s microbenchmark overload.
    pub fn run_microbenchmark_once(
        &self,
        subject: Subject,
        num_thread: usize,
        width: usize,
        parameter: i64,
    ) -> MicroResult {
        let queue = build_subject(subject, num_thread, width, parameter);
        if self.checks_relaxation_distance {
            queue.check_relaxation_distance();
        }

        std::thread::scope(|scope| {
            for t in 0..num_thread {
                let queue = Arc::clone(&queue);
                scope.spawn(move || worker::prefill(t as i32, num_thread, queue.as_ref()));
            }
        });

        let config = WorkloadConfig {
            enq_rate_percent: self.enq_rate_percent,
            delay_microseconds: self.delay_microseconds,
        };
        let watch = Stopwatch::start();
        std::thread::scope(|scope| {
            for t in 0..num_thread {
                let queue = Arc::clone(&queue);
                scope.spawn(move || worker::microbench(t as i32, num_thread, config, queue.as_ref()));
            }
        });
        let elapsed_secs = watch.elapsed_secs();

        let (num_dequeued, sum_rd, max_rd) = queue.get_relaxation_distance();
        MicroResult {
            elapsed_secs,
            num_dequeued,
            sum_rd,
            max_rd,
        }
    }

    /// A single reset-then-timed-relaxed-BFS measurement, mirroring
    /// `Tester::Measure`'s macrobenchmark overload.
    pub fn run_macrobenchmark_once(
        &self,
        subject: Subject,
        num_thread: usize,
        width: usize,
        parameter: i64,
        graph: &Arc<Graph>,
    ) -> MacroResult {
        let queue = build_subject(subject, num_thread, width, parameter);
        graph.reset();

        let watch = Stopwatch::start();
        let distance = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..num_thread)
                .map(|t| {
                    let queue = Arc::clone(&queue);
                    let graph = Arc::clone(graph);
                    scope.spawn(move || worker::macrobench(t as i32, num_thread, queue.as_ref(), &graph))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("macrobenchmark worker panicked"))
                .min()
                .unwrap_or(-1)
        });
        let elapsed_secs = watch.elapsed_secs();

        MacroResult {
            elapsed_secs,
            distance,
        }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_name_round_trips_every_subject() {
        let all = [
            Subject::DqRr,
            Subject::Cbo,
            Subject::TwoDd,
            Subject::Tswd,
            Subject::TsAtomic,
            Subject::TsStutter,
            Subject::TsCas,
            Subject::TsInterval,
        ];
        for subject in all {
            assert_eq!(Subject::from_str_name(subject.name()).unwrap(), subject);
        }
    }

    #[test]
    fn unknown_subject_name_is_rejected() {
        assert!(Subject::from_str_name("not-a-subject").is_err());
    }

    #[test]
    fn only_tswd_and_twodd_scale_with_depth() {
        assert!(Subject::Tswd.supports_depth_scaling());
        assert!(Subject::TwoDd.supports_depth_scaling());
        assert!(!Subject::DqRr.supports_depth_scaling());
        assert!(!Subject::TsInterval.supports_depth_scaling());
    }

    #[test]
    fn microbenchmark_sweep_requires_subject() {
        let driver = Driver::new();
        assert!(driver.run_microbenchmark_sweep().is_err());
    }

    #[test]
    fn microbenchmark_once_conserves_relaxation_instrumentation() {
        let mut driver = Driver::new();
        driver.subject = Some(Subject::DqRr);
        driver.checks_relaxation_distance = true;
        let result = driver.run_microbenchmark_once(Subject::DqRr, 2, 2, 1);
        assert!(result.elapsed_secs >= 0.0);
    }

    #[test]
    fn depth_sweep_rejects_non_depth_subjects() {
        let mut driver = Driver::new();
        driver.subject = Some(Subject::DqRr);
        assert!(driver.run_depth_sweep(4).is_err());
    }

    #[test]
    fn relaxation_bound_ladder_spans_a_32x_geometric_range() {
        let ladder = relaxation_bound_ladder(3);
        assert_eq!(ladder, [3, 6, 12, 24, 48, 96]);
        assert_eq!(ladder[ladder.len() - 1] / ladder[0], 32);
    }

    #[test]
    fn depth_for_bound_keeps_tswd_strictly_below_generic() {
        let generic = depth_for_bound(Subject::TwoDd, 100, 5);
        let tswd = depth_for_bound(Subject::Tswd, 100, 5);
        assert_eq!(tswd, generic - 1);
    }
}
