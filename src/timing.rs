//! Per-thread RNG, a monotonic stopwatch, and a calibrated busy-wait.
//!
//! Grounded on `random.h` (per-thread `std::default_random_engine`),
//! `stopwatch.h`, and `idle.h` from the original source.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::hint::black_box;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

thread_local! {
    static RNG: RefCell<StdRng> = RefCell::new(StdRng::from_entropy());
}

/// Draw a uniform integer in `[min, max]` from this thread's RNG.
pub fn uniform_int(min: i64, max: i64) -> i64 {
    RNG.with(|rng| rng.borrow_mut().gen_range(min..=max))
}

/// Draw a uniform float in `[min, max)` from this thread's RNG.
pub fn uniform_f32(min: f32, max: f32) -> f32 {
    RNG.with(|rng| rng.borrow_mut().gen_range(min..max))
}

/// Monotonic stopwatch, nanosecond resolution, reporting elapsed seconds.
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Stopwatch {
            start: Instant::now(),
        }
    }

    pub fn restart(&mut self) {
        self.start = Instant::now();
    }

    /// Elapsed time in seconds since construction or the last [`restart`](Self::restart).
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// A busy-wait calibrated once per process: how many spin iterations fit in
/// one microsecond on this machine. `wait` then spins a proportional count.
///
/// The spin loop reads its counter through [`black_box`] on every iteration
/// so the optimizer cannot prove the loop has no observable effect and
/// elide it — the Rust analogue of the original's `volatile int32_t`.
pub struct BusyWait {
    ops_per_microsecond: i64,
}

/// Sentinel meaning "not yet calibrated", matching `idle.h`'s `kUndefinedDelay`.
const UNCALIBRATED: i64 = -1;
static CACHED_OPS_PER_US: AtomicI64 = AtomicI64::new(UNCALIBRATED);

impl BusyWait {
    /// Calibrate (once per process; subsequent calls reuse the cached value).
    pub fn calibrate() -> Self {
        let cached = CACHED_OPS_PER_US.load(Ordering::Relaxed);
        let ops_per_microsecond = if cached != UNCALIBRATED {
            cached
        } else {
            let measured = Self::measure();
            CACHED_OPS_PER_US.store(measured, Ordering::Relaxed);
            measured
        };
        BusyWait { ops_per_microsecond }
    }

    fn measure() -> i64 {
        const LOOP: u64 = 1_000_000_000;
        let sw = Stopwatch::start();
        let mut counter: u64 = 0;
        for _ in 0..LOOP {
            counter = black_box(counter.wrapping_add(1));
        }
        black_box(counter);
        let secs = sw.elapsed_secs();
        let us = secs * 1.0e6;
        ((LOOP as f64) / us) as i64
    }

    pub fn ops_per_microsecond(&self) -> i64 {
        self.ops_per_microsecond
    }

    /// Spin for approximately `microseconds`. A `microseconds` of `0.0` is a
    /// no-op, matching `Idle::Do`.
    pub fn wait(&self, microseconds: f32) {
        if microseconds == 0.0 {
            return;
        }
        let iterations = (self.ops_per_microsecond as f32 * microseconds) as i64;
        let mut counter: i64 = 0;
        for _ in 0..iterations {
            counter = black_box(counter.wrapping_add(1));
        }
        black_box(counter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_int_stays_in_range() {
        for _ in 0..1000 {
            let v = uniform_int(0, 9);
            assert!((0..=9).contains(&v));
        }
    }

    #[test]
    fn stopwatch_reports_nonnegative_elapsed() {
        let sw = Stopwatch::start();
        assert!(sw.elapsed_secs() >= 0.0);
    }

    #[test]
    fn busy_wait_zero_is_noop() {
        let bw = BusyWait::calibrate();
        let sw = Stopwatch::start();
        bw.wait(0.0);
        assert!(sw.elapsed_secs() < 1.0);
    }
}
