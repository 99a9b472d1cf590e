//! Timestamp-pool queues: TS-atomic, TS-stutter, TS-CAS, TS-interval.
//!
//! The four sibling headers `ts_atomic.h`, `ts_stutter.h`, `ts_cas.h`, and
//! `ts_interval.h` differ only in how an enqueued node's timestamp is
//! minted; the pool shape (one lock-free sub-queue per thread, a dequeuer
//! that scans every sub-queue's head and takes whichever carries the
//! smallest timestamp) is identical across all four. `TsPool<S>` factors
//! that shape out once; each variant supplies a [`TimestampSource`].
//!
//! Per the originals, only TS-interval instruments relaxation distance —
//! the other three mint timestamps too cheaply for the coarse enqueue/
//! dequeue locks to be worth paying for, so `TimestampSource::SUPPORTS_RDM`
//! is `false` for them and [`Rdm`] is never engaged regardless of whether a
//! caller asks for it.

use super::RelaxedQueue;
use crate::cache_padded::CachePadded;
use crate::ebr::Reclaimer;
use crate::rdm::Rdm;
use crate::thread_id;
use crate::timing::{BusyWait, Stopwatch};
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

/// A timestamp total order sufficient for picking "the oldest pending
/// node" across sub-queues. `precedes` need not be a strict total order in
/// the mathematical sense (TS-CAS and TS-interval stamps are intervals
/// that may tie); it only needs to pick a consistent winner.
pub trait TimestampSource: Send + Sync {
    type Stamp: Copy + Send + Sync;

    fn new(num_threads: usize) -> Self;
    fn issue(&self) -> Self::Stamp;
    fn precedes(a: Self::Stamp, b: Self::Stamp) -> bool;
    fn max_stamp() -> Self::Stamp;
    const SUPPORTS_RDM: bool;
}

struct Node<S> {
    next: AtomicPtr<Node<S>>,
    time_stamp: S,
    value: i32,
}

struct SubQueue<S> {
    tail: CachePadded<AtomicPtr<Node<S>>>,
    head: CachePadded<AtomicPtr<Node<S>>>,
}

impl<S: Copy + Default> SubQueue<S> {
    fn new() -> Self {
        let sentinel = Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            time_stamp: S::default(),
            value: 0,
        }));
        SubQueue {
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
            head: CachePadded::new(AtomicPtr::new(sentinel)),
        }
    }

    fn enq(&self, value: i32, time_stamp: S, rdm: &Rdm) {
        let node = Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            time_stamp,
            value,
        }));
        let guard = rdm.lock_enq();
        let tail = self.tail.load(Ordering::Relaxed);
        unsafe { (*tail).next.store(node, Ordering::Release) };
        self.tail.store(node, Ordering::Release);
        rdm.record_enq(node as usize);
        drop(guard);
    }

    fn head_first(&self) -> (*mut Node<S>, *mut Node<S>) {
        let head = self.head.load(Ordering::Acquire);
        let first = unsafe { (*head).next.load(Ordering::Acquire) };
        (head, first)
    }

    fn try_deq(&self, ebr: &Reclaimer<Node<S>>, first: *mut Node<S>, rdm: &Rdm) -> Option<i32> {
        let head = self.head.load(Ordering::Acquire);
        if unsafe { (*head).next.load(Ordering::Acquire) } != first {
            return None;
        }
        let guard = rdm.lock_deq();
        if self
            .head
            .compare_exchange(head, first, Ordering::Release, Ordering::Acquire)
            .is_err()
        {
            drop(guard);
            return None;
        }
        rdm.record_deq(first as usize);
        drop(guard);
        let value = unsafe { (*first).value };
        unsafe { ebr.retire(head) };
        Some(value)
    }
}

impl<S> Drop for SubQueue<S> {
    fn drop(&mut self) {
        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            let next = unsafe { (*current).next.load(Ordering::Relaxed) };
            unsafe { drop(Box::from_raw(current)) };
            current = next;
        }
    }
}

pub struct TsPool<S: TimestampSource> {
    source: S,
    queues: Vec<SubQueue<S::Stamp>>,
    ebr: Reclaimer<Node<S::Stamp>>,
    rdm: Rdm,
}

impl<S: TimestampSource> TsPool<S>
where
    S::Stamp: Default,
{
    pub fn new(num_thread: usize) -> Self {
        TsPool {
            source: S::new(num_thread),
            queues: (0..num_thread).map(|_| SubQueue::new()).collect(),
            ebr: Reclaimer::new(num_thread),
            rdm: Rdm::new(),
        }
    }
}

impl<S: TimestampSource> RelaxedQueue for TsPool<S>
where
    S::Stamp: Default,
{
    fn enq(&self, value: i32) {
        let stamp = self.source.issue();
        self.queues[thread_id::get_index()].enq(value, stamp, &self.rdm);
    }

    fn deq(&self) -> Option<i32> {
        self.ebr.start_op();
        let mut id = thread_id::get_index();
        loop {
            let mut min_stamp = S::max_stamp();
            let mut youngest: Option<(usize, *mut Node<S::Stamp>)> = None;
            let mut old_heads = vec![ptr::null_mut(); self.queues.len()];

            for _ in 0..self.queues.len() {
                let (head, first) = self.queues[id].head_first();
                if first.is_null() {
                    old_heads[id] = head;
                } else {
                    let stamp = unsafe { (*first).time_stamp };
                    if S::precedes(stamp, min_stamp) {
                        min_stamp = stamp;
                        youngest = Some((id, first));
                    }
                }
                id = (id + 1) % self.queues.len();
            }

            match youngest {
                None => {
                    let mut any_nonempty = false;
                    for (i, &head) in old_heads.iter().enumerate() {
                        if !head.is_null() && !unsafe { (*head).next.load(Ordering::Acquire) }.is_null()
                        {
                            id = i;
                            any_nonempty = true;
                            break;
                        }
                    }
                    if !any_nonempty {
                        self.ebr.end_op();
                        return None;
                    }
                }
                Some((qid, first)) => {
                    if let Some(value) = self.queues[qid].try_deq(&self.ebr, first, &self.rdm) {
                        self.ebr.end_op();
                        return Some(value);
                    }
                }
            }
        }
    }

    fn check_relaxation_distance(&self) {
        if S::SUPPORTS_RDM {
            self.rdm.enable();
        }
    }

    fn get_relaxation_distance(&self) -> (u64, u64, u64) {
        if S::SUPPORTS_RDM {
            self.rdm.relaxation_distance()
        } else {
            (0, 0, 0)
        }
    }
}

/// TS-atomic: a single global counter, `fetch_add`-minted per enqueue.
pub struct AtomicSource {
    counter: AtomicU64,
}

impl TimestampSource for AtomicSource {
    type Stamp = u64;

    fn new(_num_threads: usize) -> Self {
        AtomicSource {
            counter: AtomicU64::new(1),
        }
    }

    fn issue(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    fn precedes(a: u64, b: u64) -> bool {
        a < b
    }

    fn max_stamp() -> u64 {
        u64::MAX
    }

    const SUPPORTS_RDM: bool = false;
}

/// TS-stutter: every thread keeps its own last-issued counter; a new
/// timestamp is one more than the maximum seen across all threads'
/// counters, read without synchronization (stutters are tolerated — two
/// threads may mint the same value, hence the name).
pub struct StutterSource {
    per_thread: Vec<CachePadded<AtomicU64>>,
}

impl TimestampSource for StutterSource {
    type Stamp = u64;

    fn new(num_threads: usize) -> Self {
        StutterSource {
            per_thread: (0..num_threads)
                .map(|_| CachePadded::new(AtomicU64::new(1)))
                .collect(),
        }
    }

    fn issue(&self) -> u64 {
        let max_cnt = self
            .per_thread
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .max()
            .unwrap_or(0);
        let stamp = max_cnt + 1;
        self.per_thread[thread_id::get_index()].store(stamp, Ordering::Relaxed);
        stamp
    }

    fn precedes(a: u64, b: u64) -> bool {
        a < b
    }

    fn max_stamp() -> u64 {
        u64::MAX
    }

    const SUPPORTS_RDM: bool = false;
}

/// TS-CAS: a shared counter read twice around a calibrated busy-wait; if it
/// changed between reads the observed window `[t1, t2)` is used directly,
/// otherwise a CAS claims the next value. Stamps are `(t1, t2)` intervals
/// compared by `t2 < other.t1` (a node is older only once its whole
/// interval precedes the other's start).
pub struct CasSource {
    counter: AtomicU64,
    delay_iterations: i64,
}

impl TimestampSource for CasSource {
    type Stamp = (u64, u64);

    fn new(_num_threads: usize) -> Self {
        CasSource {
            counter: AtomicU64::new(1),
            delay_iterations: BusyWait::calibrate().ops_per_microsecond(),
        }
    }

    fn issue(&self) -> (u64, u64) {
        let t1 = self.counter.load(Ordering::Acquire);
        let mut counter: u64 = 0;
        for _ in 0..self.delay_iterations {
            counter = std::hint::black_box(counter.wrapping_add(1));
        }
        std::hint::black_box(counter);
        let t2 = self.counter.load(Ordering::Acquire);

        if t1 != t2 {
            (t1, t2.saturating_sub(1))
        } else if self
            .counter
            .compare_exchange(t1, t1 + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            (t1, t1)
        } else {
            (t1, self.counter.load(Ordering::Acquire).saturating_sub(1))
        }
    }

    fn precedes(a: (u64, u64), b: (u64, u64)) -> bool {
        a.1 < b.0
    }

    fn max_stamp() -> (u64, u64) {
        (u64::MAX, u64::MAX)
    }

    const SUPPORTS_RDM: bool = false;
}

/// TS-interval: the full RDM-instrumented variant. A stamp is `[t1, t2)`
/// measured against a shared wall-clock base with a calibrated busy-wait
/// between the two reads, giving every node an honest uncertainty window
/// instead of a single instant.
pub struct IntervalSource {
    base: std::time::Instant,
    delay: BusyWait,
    delay_microseconds: f32,
}

impl TimestampSource for IntervalSource {
    type Stamp = (u64, u64);

    fn new(_num_threads: usize) -> Self {
        IntervalSource {
            base: std::time::Instant::now(),
            delay: BusyWait::calibrate(),
            delay_microseconds: 1.0,
        }
    }

    fn issue(&self) -> (u64, u64) {
        let t1 = self.base.elapsed().as_micros() as u64;
        self.delay.wait(self.delay_microseconds);
        let t2 = self.base.elapsed().as_micros() as u64;
        (t1, t2)
    }

    fn precedes(a: (u64, u64), b: (u64, u64)) -> bool {
        a.1 < b.0
    }

    fn max_stamp() -> (u64, u64) {
        (u64::MAX, u64::MAX)
    }

    const SUPPORTS_RDM: bool = true;
}

pub type TsAtomic = TsPool<AtomicSource>;
pub type TsStutter = TsPool<StutterSource>;
pub type TsCas = TsPool<CasSource>;
pub type TsInterval = TsPool<IntervalSource>;

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrips<S: TimestampSource>()
    where
        S::Stamp: Default,
    {
        thread_id::set(0);
        let q: TsPool<S> = TsPool::new(1);
        for i in 0..30 {
            q.enq(i);
        }
        let mut drained = vec![];
        while let Some(v) = q.deq() {
            drained.push(v);
        }
        drained.sort_unstable();
        assert_eq!(drained, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn ts_atomic_conserves_elements() {
        roundtrips::<AtomicSource>();
    }

    #[test]
    fn ts_stutter_conserves_elements() {
        roundtrips::<StutterSource>();
    }

    #[test]
    fn ts_cas_conserves_elements() {
        roundtrips::<CasSource>();
    }

    #[test]
    fn ts_interval_conserves_elements() {
        roundtrips::<IntervalSource>();
    }
}
