//! D-ary Queue, Round Robin (DQRR).
//!
//! Grounded on `dqrr.h`: `num_queue` plain Michael-Scott sub-queues, and
//! two banks of `b` round-robin counters (one bank for enqueuers, one for
//! dequeuers) shared by `num_thread / b` threads apiece, so contention on
//! any single counter stays bounded regardless of thread count.

use super::RelaxedQueue;
use crate::cache_padded::CachePadded;
use crate::ebr::Reclaimer;
use crate::rdm::Rdm;
use crate::thread_id;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

struct Node {
    next: AtomicPtr<Node>,
    value: i32,
}

struct SubQueue {
    head: CachePadded<AtomicPtr<Node>>,
    tail: CachePadded<AtomicPtr<Node>>,
}

impl SubQueue {
    fn new() -> Self {
        let sentinel = Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            value: 0,
        }));
        SubQueue {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
        }
    }

    fn tail_ptr(&self) -> *mut Node {
        self.tail.load(Ordering::Acquire)
    }

    fn enq(&self, value: i32, rdm: &Rdm) {
        let node = Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            value,
        }));
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let next = unsafe { (*tail).next.load(Ordering::Acquire) };
            if tail != self.tail.load(Ordering::Acquire) {
                continue;
            }
            if next.is_null() {
                let guard = rdm.lock_enq();
                let cas = unsafe {
                    (*tail).next.compare_exchange(
                        ptr::null_mut(),
                        node,
                        Ordering::Release,
                        Ordering::Acquire,
                    )
                };
                if cas.is_ok() {
                    rdm.record_enq(node as usize);
                    drop(guard);
                    let _ = self.tail.compare_exchange(
                        tail,
                        node,
                        Ordering::Release,
                        Ordering::Acquire,
                    );
                    return;
                }
            } else {
                let _ =
                    self.tail
                        .compare_exchange(tail, next, Ordering::Release, Ordering::Acquire);
            }
        }
    }

    /// `Ok(Some(v))` on success, `Ok(None)` when empty, `Err(())` to signal
    /// "lagging tail observed, caller should retry the scan".
    fn try_deq(&self, ebr: &Reclaimer<Node>, rdm: &Rdm) -> Result<Option<i32>, ()> {
        loop {
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);
            let first = unsafe { (*head).next.load(Ordering::Acquire) };
            if head != self.head.load(Ordering::Acquire) {
                continue;
            }
            if first.is_null() {
                return Ok(None);
            }
            if head == tail {
                let _ =
                    self.tail
                        .compare_exchange(tail, first, Ordering::Release, Ordering::Acquire);
                return Err(());
            }
            let value = unsafe { (*first).value };
            let guard = rdm.lock_deq();
            if self
                .head
                .compare_exchange(head, first, Ordering::Release, Ordering::Acquire)
                .is_err()
            {
                continue;
            }
            rdm.record_deq(first as usize);
            drop(guard);
            unsafe { ebr.retire(head) };
            return Ok(Some(value));
        }
    }
}

impl Drop for SubQueue {
    fn drop(&mut self) {
        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            let next = unsafe { (*current).next.load(Ordering::Relaxed) };
            unsafe { drop(Box::from_raw(current)) };
            current = next;
        }
    }
}

struct RrCounter(CachePadded<AtomicU64>);

pub struct Dqrr {
    buckets: usize,
    queues: Vec<SubQueue>,
    enq_rrs: Vec<RrCounter>,
    deq_rrs: Vec<RrCounter>,
    ebr: Reclaimer<Node>,
    rdm: Rdm,
}

impl Dqrr {
    pub fn new(num_queue: usize, num_thread: usize, buckets: usize) -> Self {
        let enq_rrs = (0..buckets)
            .map(|i| RrCounter(CachePadded::new(AtomicU64::new((i * num_queue / buckets) as u64))))
            .collect();
        let deq_rrs = (0..buckets)
            .map(|i| RrCounter(CachePadded::new(AtomicU64::new((i * num_queue / buckets) as u64))))
            .collect();
        Dqrr {
            buckets,
            queues: (0..num_queue).map(|_| SubQueue::new()).collect(),
            enq_rrs,
            deq_rrs,
            ebr: Reclaimer::new(num_thread),
            rdm: Rdm::new(),
        }
    }

    fn enqueuer_index(&self) -> usize {
        let bucket = thread_id::get_index() % self.buckets;
        let rr = self.enq_rrs[bucket].0.fetch_add(1, Ordering::Relaxed);
        rr as usize % self.queues.len()
    }

    fn dequeuer_start(&self) -> usize {
        let bucket = thread_id::get_index() % self.buckets;
        let rr = self.deq_rrs[bucket].0.fetch_add(1, Ordering::Relaxed);
        rr as usize % self.queues.len()
    }
}

impl RelaxedQueue for Dqrr {
    fn enq(&self, value: i32) {
        self.ebr.start_op();
        self.queues[self.enqueuer_index()].enq(value, &self.rdm);
        self.ebr.end_op();
    }

    fn deq(&self) -> Option<i32> {
        self.ebr.start_op();
        let mut old_tails = vec![ptr::null_mut(); self.queues.len()];
        let mut start = self.dequeuer_start();

        loop {
            for i in 0..self.queues.len() {
                let id = (start + i) % self.queues.len();
                match self.queues[id].try_deq(&self.ebr, &self.rdm) {
                    Ok(Some(v)) => {
                        self.ebr.end_op();
                        return Some(v);
                    }
                    Ok(None) => old_tails[id] = self.queues[id].tail_ptr(),
                    Err(()) => {}
                }
            }

            let mut exhausted = true;
            for (i, &old_tail) in old_tails.iter().enumerate() {
                if old_tail != self.queues[i].tail_ptr() {
                    start = i;
                    exhausted = false;
                    break;
                }
            }
            if exhausted {
                self.ebr.end_op();
                return None;
            }
        }
    }

    fn check_relaxation_distance(&self) {
        self.rdm.enable();
    }

    fn get_relaxation_distance(&self) -> (u64, u64, u64) {
        self.rdm.relaxation_distance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conserves_all_enqueued_elements() {
        thread_id::set(0);
        let q = Dqrr::new(4, 1, 1);
        for i in 0..50 {
            q.enq(i);
        }
        let mut drained = vec![];
        while let Some(v) = q.deq() {
            drained.push(v);
        }
        drained.sort_unstable();
        assert_eq!(drained, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn empty_pool_returns_none() {
        thread_id::set(0);
        let q = Dqrr::new(4, 1, 1);
        assert_eq!(q.deq(), None);
    }
}
